use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::accounts::CurrentUser;
use crate::application::forms::{self, CommentSubmission, FormErrors};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::{CommentRecord, PostListing};
use crate::domain::users;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    NotFound,
    #[error("submitted comment is invalid")]
    Invalid(FormErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Attach a comment to the post addressed as `/{username}/{post_id}/`.
    pub async fn add_comment(
        &self,
        author: &CurrentUser,
        username: &str,
        post_id: &str,
        submission: &CommentSubmission,
    ) -> Result<(PostListing, CommentRecord), CommentError> {
        let id = uuid::Uuid::parse_str(post_id).map_err(|_| CommentError::NotFound)?;
        let post = self
            .posts
            .find_post(id)
            .await?
            .filter(|listing| users::same_username(&listing.author_username, username))
            .ok_or(CommentError::NotFound)?;

        let mut errors = FormErrors::new();
        let Some(text) = forms::required_text("text", &submission.text, &mut errors) else {
            return Err(CommentError::Invalid(errors));
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.post.id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = "yatube::comments",
            comment_id = %comment.id,
            post_id = %post.post.id,
            author = %author.username,
            "comment added"
        );

        Ok((post, comment))
    }
}
