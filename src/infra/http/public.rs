use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{
            CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE,
            X_CONTENT_TYPE_OPTIONS,
        },
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        error::HttpError,
        feed::{FeedService, GroupFeed, PostDetail, ProfileFeed},
        follows::FollowService,
        forms::ImageFormat,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    cache::{PageCacheConfig, PageCacheState, page_cache_layer},
    config::Settings,
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        CommentFormView, GroupTemplate, IndexTemplate, LayoutView, PaginatorView, PostTemplate,
        ProfileTemplate, render_template_response,
    },
};

use super::{
    Viewer, auth, db_health_response, follows,
    middleware::{log_responses, set_request_context},
    posts, profile_path,
};

/// Characters of post text used as the detail page title.
const TITLE_EXCERPT_CHARS: usize = 30;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub uploads: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: PageCacheState,
    pub cookie_secure: bool,
    pub max_request_bytes: usize,
}

/// Knobs the HTTP surface takes from [`Settings`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub cache: PageCacheConfig,
    pub session_ttl: time::Duration,
    pub cookie_secure: bool,
    pub max_request_bytes: usize,
}

impl From<&Settings> for HttpOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            cache: PageCacheConfig::from(&settings.cache),
            session_ttl: settings.sessions.ttl,
            cookie_secure: settings.sessions.cookie_secure,
            max_request_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
                .unwrap_or(usize::MAX),
        }
    }
}

impl HttpState {
    /// Wire every service to one repository implementation.
    pub fn new<R>(repositories: Arc<R>, uploads: Arc<UploadStorage>, options: HttpOptions) -> Self
    where
        R: UsersRepo
            + GroupsRepo
            + PostsRepo
            + PostsWriteRepo
            + CommentsRepo
            + FollowsRepo
            + SessionsRepo
            + HealthRepo
            + 'static,
    {
        let users: Arc<dyn UsersRepo> = repositories.clone();
        let groups: Arc<dyn GroupsRepo> = repositories.clone();
        let posts: Arc<dyn PostsRepo> = repositories.clone();
        let posts_write: Arc<dyn PostsWriteRepo> = repositories.clone();
        let comments: Arc<dyn CommentsRepo> = repositories.clone();
        let follows: Arc<dyn FollowsRepo> = repositories.clone();
        let sessions: Arc<dyn SessionsRepo> = repositories.clone();
        let health: Arc<dyn HealthRepo> = repositories;

        Self {
            feed: Arc::new(FeedService::new(
                posts.clone(),
                groups.clone(),
                users.clone(),
                follows.clone(),
                comments.clone(),
            )),
            posts: Arc::new(PostService::new(
                posts.clone(),
                posts_write,
                groups,
                uploads.clone(),
            )),
            comments: Arc::new(CommentService::new(posts, comments)),
            follows: Arc::new(FollowService::new(users.clone(), follows)),
            accounts: Arc::new(AccountService::new(users, sessions, options.session_ttl)),
            uploads,
            health,
            cache: PageCacheState::new(options.cache),
            cookie_secure: options.cookie_secure,
            max_request_bytes: options.max_request_bytes,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global feed is served from the page cache.
    let cached_routes = Router::new()
        .route("/", get(index))
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            page_cache_layer,
        ));

    let site_routes = Router::new()
        .route("/group/{slug}/", get(group_index))
        .route("/follow/", get(follows::follow_index))
        .route(
            "/new/",
            get(posts::new_post_form).post(posts::create_post),
        )
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup),
        )
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(public_health))
        .route("/{username}/", get(profile))
        .route("/{username}/follow/", post(follows::follow_author))
        .route("/{username}/unfollow/", post(follows::unfollow_author))
        .route("/{username}/{post_id}/", get(post_detail))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route("/{username}/{post_id}/comment/", post(posts::add_comment));

    cached_routes
        .merge(site_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.max_request_bytes))
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, auth::resolve_session))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    pub(super) page: Option<String>,
}

async fn index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.index(query.page.as_deref()).await {
        Ok(page) => {
            let paginator = PaginatorView::new(&page, "/");
            render_template_response(
                IndexTemplate {
                    layout: LayoutView::new(viewer, "Latest posts"),
                    cards: page.items,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group(&slug, query.page.as_deref()).await {
        Ok(GroupFeed { group, page }) => {
            let paginator = PaginatorView::new(&page, &format!("/group/{}/", group.slug));
            render_template_response(
                GroupTemplate {
                    layout: LayoutView::new(viewer, group.title.clone()),
                    group,
                    cards: page.items,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .profile(viewer.as_ref(), &username, query.page.as_deref())
        .await
    {
        Ok(ProfileFeed {
            author,
            following,
            can_follow,
            page,
        }) => {
            let paginator = PaginatorView::new(&page, &profile_path(&author.username));
            render_template_response(
                ProfileTemplate {
                    layout: LayoutView::new(viewer, author.display_name.clone()),
                    author,
                    following,
                    can_follow,
                    cards: page.items,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    match state
        .feed
        .post_detail(viewer.as_ref(), &username, &post_id)
        .await
    {
        Ok(detail) => render_post_page(viewer, detail, CommentFormView::default()),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Render the post page, with `comment_form` carrying any rejected comment.
pub(super) fn render_post_page(
    viewer: Option<crate::application::accounts::CurrentUser>,
    detail: PostDetail,
    comment_form: CommentFormView,
) -> Response {
    let title: String = detail.card.text.chars().take(TITLE_EXCERPT_CHARS).collect();
    render_template_response(
        PostTemplate {
            layout: LayoutView::new(viewer, title),
            card: detail.card,
            author: detail.author,
            comments: detail.comments,
            can_edit: detail.can_edit,
            comment_form,
        },
        StatusCode::OK,
    )
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.uploads.read(&path).await {
        Ok(bytes) => build_media_response(bytes),
        Err(UploadStorageError::InvalidPath) => {
            HttpError::not_found(SOURCE, "invalid media path").into_response()
        }
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            HttpError::not_found(SOURCE, "media file does not exist").into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            )
            .into_response()
        }
    }
}

/// The content type follows the stored bytes, never the path's extension.
fn build_media_response(bytes: Bytes) -> Response {
    let format = ImageFormat::sniff(&bytes);
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = match format {
        Some(format) => mime_guess::from_ext(format.extension()).first_or_octet_stream(),
        None => mime_guess::mime::APPLICATION_OCTET_STREAM,
    };
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if format.is_none() {
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
    }
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn not_found() -> Response {
    HttpError::not_found("infra::http::public::not_found", "no route matched").into_response()
}
