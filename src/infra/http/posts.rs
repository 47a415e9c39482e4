//! Post publication, editing and commenting.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use tracing::warn;

use crate::{
    application::{
        accounts::CurrentUser,
        comments::CommentError,
        error::HttpError,
        forms::{CommentSubmission, PostSubmission, UploadedFile},
        posts::{EditAccess, EditOutcome, PostError},
    },
    domain::entities::PostListing,
    presentation::views::{
        CommentFormView, LayoutView, PostFormTemplate, PostFormView, render_template_response,
    },
};

use super::{HttpState, SignedIn, post_path, public::render_post_page, redirect};

const SOURCE: &str = "infra::http::posts";

pub(super) async fn new_post_form(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
) -> Response {
    render_post_form(&state, user, PostFormView::new("/new/"), "").await
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    multipart: Multipart,
) -> Response {
    let submission = match read_post_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };

    match state.posts.create_post(&user, &submission).await {
        Ok(_) => redirect("/"),
        Err(PostError::Invalid(errors)) => {
            let form = PostFormView::new("/new/")
                .with_text(submission.text)
                .with_errors(errors);
            render_post_form(&state, user, form, &submission.group).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_post_form(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let listing = match state.posts.edit_access(&user, &username, &post_id).await {
        Ok(EditAccess::Author(listing)) => listing,
        Ok(EditAccess::ReadOnly(listing)) => return redirect_to_post(&listing),
        Err(err) => return HttpError::from(err).into_response(),
    };

    let selected = listing
        .group
        .as_ref()
        .map(|group| group.id.to_string())
        .unwrap_or_default();
    let form = PostFormView::new(edit_path(&listing))
        .with_text(listing.post.text)
        .editing(listing.post.image);
    render_post_form(&state, user, form, &selected).await
}

pub(super) async fn update_post(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Response {
    let submission = match read_post_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };

    match state
        .posts
        .edit_post(&user, &username, &post_id, &submission)
        .await
    {
        Ok(EditOutcome::Updated(_)) => redirect(&post_path(&username, &post_id)),
        Ok(EditOutcome::NotAuthor(listing)) => redirect_to_post(&listing),
        Err(PostError::Invalid(errors)) => {
            let listing = match state.posts.find_authored(&username, &post_id).await {
                Ok(listing) => listing,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let form = PostFormView::new(edit_path(&listing))
                .with_text(submission.text)
                .editing(listing.post.image)
                .with_errors(errors);
            render_post_form(&state, user, form, &submission.group).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    SignedIn(user): SignedIn,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentSubmission>,
) -> Response {
    match state
        .comments
        .add_comment(&user, &username, &post_id, &form)
        .await
    {
        Ok((post, _)) => redirect_to_post(&post),
        Err(CommentError::Invalid(errors)) => {
            match state
                .feed
                .post_detail(Some(&user), &username, &post_id)
                .await
            {
                Ok(detail) => render_post_page(
                    Some(user),
                    detail,
                    CommentFormView {
                        text: form.text,
                        errors,
                    },
                ),
                Err(err) => HttpError::from(err).into_response(),
            }
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn redirect_to_post(listing: &PostListing) -> Response {
    redirect(&post_path(
        &listing.author_username,
        &listing.post.id.to_string(),
    ))
}

fn edit_path(listing: &PostListing) -> String {
    format!("{}edit/", post_path(&listing.author_username, &listing.post.id.to_string()))
}

/// Render `form` with the group choices attached, `selected` pre-chosen.
async fn render_post_form(
    state: &HttpState,
    user: CurrentUser,
    form: PostFormView,
    selected: &str,
) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let title = if form.editing { "Edit post" } else { "New post" };

    render_template_response(
        PostFormTemplate {
            layout: LayoutView::new(Some(user), title),
            form: form.with_groups(&groups, selected),
        },
        StatusCode::OK,
    )
}

async fn read_post_submission(mut multipart: Multipart) -> Result<PostSubmission, HttpError> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("text") => submission.text = field.text().await.map_err(multipart_error)?,
            Some("group") => submission.group = field.text().await.map_err(multipart_error)?,
            Some("image-clear") => {
                let value = field.text().await.map_err(multipart_error)?;
                submission.clear_image = matches!(value.trim(), "on" | "true" | "1");
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !filename.trim().is_empty() {
                    submission.image = Some(UploadedFile { filename, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn multipart_error(err: MultipartError) -> HttpError {
    let status = err.status();
    warn!(
        target = SOURCE,
        status = status.as_u16(),
        error = %err,
        "failed to read multipart body"
    );
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Upload is too large"
    } else {
        "Request could not be processed"
    };
    HttpError::from_error(SOURCE, status, message, &err)
}
