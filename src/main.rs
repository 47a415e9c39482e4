use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        error::AppError,
        groups::{CreateGroupCommand, GroupService},
        repos::GroupsRepo,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpOptions, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let uploads = UploadStorage::new(settings.uploads.directory.clone())
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let state = HttpState::new(
        repositories,
        Arc::new(uploads),
        HttpOptions::from(&settings),
    );
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::server",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        },
    )
    .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(shutdown_rx, grace) => {
            warn!(
                target = "yatube::server",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "yatube::server", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "yatube::server", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "yatube::server", "shutdown requested");
}

/// Completes `grace` after shutdown has been requested.
async fn drain_deadline(shutdown: tokio::sync::oneshot::Receiver<()>, grace: Duration) {
    if shutdown.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target = "yatube::migrate", "migrations applied");
    Ok(())
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(repo);

    match command {
        config::GroupsCommand::Create(args) => {
            let group = service
                .create(CreateGroupCommand {
                    title: args.title,
                    slug: args.slug,
                    description: args.description,
                })
                .await
                .map_err(|err| AppError::validation(err.to_string()))?;
            println!("{}\t{}", group.slug, group.title);
        }
        config::GroupsCommand::List(_) => {
            let groups = service
                .list()
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            for group in groups {
                println!("{}\t{}", group.slug, group.title);
            }
        }
        config::GroupsCommand::Delete(args) => {
            let removed = service
                .delete(&args.slug)
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            if !removed {
                return Err(AppError::NotFound);
            }
            println!("deleted {}", args.slug);
        }
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}
