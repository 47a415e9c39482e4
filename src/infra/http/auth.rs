//! Session resolution and the signup/login/logout pages.

use std::convert::Infallible;

use axum::{
    Form,
    body::Body,
    extract::{FromRequestParts, Query, State},
    http::{Request, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        accounts::{AccountError, CurrentUser, SESSION_COOKIE},
        error::HttpError,
        forms::{LoginSubmission, SignupSubmission, safe_next},
    },
    presentation::views::{
        LayoutView, LoginFormView, LoginTemplate, SignupFormView, SignupTemplate,
        render_template_response,
    },
};

use super::{HttpState, LOGIN_PATH, login_redirect, redirect};

/// The signed-in user, if any. Never rejects.
pub struct Viewer(pub Option<CurrentUser>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// A signed-in user. Anonymous requests are redirected to the login page
/// with the requested URL as `next`, before any body is read.
pub struct SignedIn(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(SignedIn)
            .ok_or_else(|| login_redirect(&parts.uri))
    }
}

/// Attach the [`CurrentUser`] behind the session cookie to the request.
pub async fn resolve_session(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.accounts.authenticate(cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = "yatube::http::auth",
                    error = %err,
                    "failed to resolve session; treating request as anonymous"
                );
            }
        }
    }

    next.run(request).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

pub(super) async fn signup_form(Viewer(viewer): Viewer) -> Response {
    render_signup(viewer, SignupFormView::default())
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Form(form): Form<SignupSubmission>,
) -> Response {
    match state.accounts.signup(&form).await {
        Ok(_) => redirect(LOGIN_PATH),
        Err(AccountError::Invalid(errors)) => render_signup(
            viewer,
            SignupFormView {
                first_name: form.first_name,
                last_name: form.last_name,
                username: form.username,
                email: form.email,
                errors,
            },
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn login_form(
    Viewer(viewer): Viewer,
    Query(query): Query<NextQuery>,
) -> Response {
    render_login(
        viewer,
        LoginFormView {
            next: safe_next(query.next.as_deref()),
            ..Default::default()
        },
    )
}

pub(super) async fn login(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Form(form): Form<LoginSubmission>,
) -> Response {
    let next = safe_next(form.next.as_deref());

    match state.accounts.login(&form).await {
        Ok(session) => {
            let cookie = Cookie::build((SESSION_COOKIE, session.token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.cookie_secure)
                .expires(session.expires_at)
                .build();
            let destination = next.unwrap_or_else(|| "/".to_string());
            (jar.add(cookie), redirect(&destination)).into_response()
        }
        Err(err) => match err.login_errors() {
            Some(errors) => render_login(
                viewer,
                LoginFormView {
                    username: form.username,
                    next,
                    errors,
                },
            ),
            None => HttpError::from(err).into_response(),
        },
    }
}

pub(super) async fn logout(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }

    if let Some(user) = viewer {
        info!(target = "yatube::http::auth", username = %user.username, "signed out");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, redirect("/")).into_response()
}

fn render_signup(viewer: Option<CurrentUser>, form: SignupFormView) -> Response {
    render_template_response(
        SignupTemplate {
            layout: LayoutView::new(viewer, "Sign up"),
            form,
        },
        StatusCode::OK,
    )
}

fn render_login(viewer: Option<CurrentUser>, form: LoginFormView) -> Response {
    render_template_response(
        LoginTemplate {
            layout: LayoutView::new(viewer, "Log in"),
            form,
        },
        StatusCode::OK,
    )
}
