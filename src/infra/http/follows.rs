use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    application::error::HttpError,
    presentation::views::{FollowTemplate, LayoutView, PaginatorView, render_template_response},
};

use super::{HttpState, SignedIn, profile_path, public::PageQuery, redirect};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.follow_feed(&user, query.page.as_deref()).await {
        Ok(page) => {
            let paginator = PaginatorView::new(&page, "/follow/");
            render_template_response(
                FollowTemplate {
                    layout: LayoutView::new(Some(user), "Following"),
                    cards: page.items,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(author) => redirect(&profile_path(&author.username)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(author) => redirect(&profile_path(&author.username)),
        Err(err) => HttpError::from(err).into_response(),
    }
}
