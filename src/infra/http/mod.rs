mod auth;
mod follows;
mod middleware;
mod posts;
mod public;

pub use auth::{SignedIn, Viewer, resolve_session};
pub use public::{HttpOptions, HttpState, build_router};

use axum::{
    http::{HeaderValue, StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Response},
};
use url::form_urlencoded;

use crate::application::{error::ErrorReport, repos::RepoError};

pub const LOGIN_PATH: &str = "/auth/login/";

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// `302 Found` to `location`.
pub(crate) fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => {
            response.headers_mut().insert(LOCATION, HeaderValue::from_static("/"));
        }
    }
    response
}

/// Send an anonymous visitor to the login page, remembering where they were headed.
pub(crate) fn login_redirect(target: &Uri) -> Response {
    let next = target
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    redirect(&format!("{LOGIN_PATH}?next={}", encode_next(next)))
}

/// Query-encode a local path, leaving `/` readable.
fn encode_next(path: &str) -> String {
    form_urlencoded::byte_serialize(path.as_bytes())
        .collect::<String>()
        .replace("%2F", "/")
}

fn profile_path(username: &str) -> String {
    format!("/{username}/")
}

fn post_path(username: &str, post_id: &str) -> String {
    format!("/{username}/{post_id}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_keeps_slashes_in_next() {
        let uri: Uri = "/new/".parse().expect("uri");
        let response = login_redirect(&uri);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/auth/login/?next=/new/")
        );
    }

    #[test]
    fn login_redirect_encodes_query() {
        let uri: Uri = "/follow/?page=2".parse().expect("uri");
        let response = login_redirect(&uri);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/auth/login/?next=/follow/%3Fpage%3D2")
        );
    }
}
