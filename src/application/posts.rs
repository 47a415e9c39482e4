//! Publishing and editing posts.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::accounts::CurrentUser;
use crate::application::forms::{
    self, FormErrors, INVALID_CHOICE, PostSubmission, ValidImage,
};
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostListing, PostRecord};
use crate::domain::users;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("submitted post is invalid")]
    Invalid(FormErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to store post image")]
    Storage(#[from] UploadStorageError),
}

/// What a request for the edit page resolves to.
#[derive(Debug, Clone)]
pub enum EditAccess {
    Author(PostListing),
    /// Someone other than the author; they are sent to the read-only view.
    ReadOnly(PostListing),
}

#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(PostRecord),
    NotAuthor(PostListing),
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    uploads: Arc<UploadStorage>,
}

/// Fields that passed validation.
struct CleanPost {
    text: String,
    group_id: Option<Uuid>,
    image: Option<ValidImage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            uploads,
        }
    }

    /// Groups offered in the post form, ordered by title.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Look up a post addressed as `/{username}/{post_id}/`.
    ///
    /// The id must parse and the post must belong to `username`.
    pub async fn find_authored(
        &self,
        username: &str,
        post_id: &str,
    ) -> Result<PostListing, PostError> {
        let id = Uuid::parse_str(post_id).map_err(|_| PostError::NotFound)?;
        let listing = self.posts.find_post(id).await?.ok_or(PostError::NotFound)?;
        if !users::same_username(&listing.author_username, username) {
            return Err(PostError::NotFound);
        }
        Ok(listing)
    }

    pub async fn create_post(
        &self,
        author: &CurrentUser,
        submission: &PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let clean = self.clean(submission).await?;

        let image = match &clean.image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let params = CreatePostParams {
            author_id: author.id,
            group_id: clean.group_id,
            text: clean.text,
            image: image.clone(),
        };

        match self.writer.create_post(params).await {
            Ok(post) => {
                info!(
                    target = "yatube::posts",
                    post_id = %post.id,
                    author = %author.username,
                    "post published"
                );
                Ok(post)
            }
            Err(err) => {
                if let Some(path) = image {
                    self.discard_image(&path).await;
                }
                Err(err.into())
            }
        }
    }

    pub async fn edit_access(
        &self,
        editor: &CurrentUser,
        username: &str,
        post_id: &str,
    ) -> Result<EditAccess, PostError> {
        let listing = self.find_authored(username, post_id).await?;
        if listing.post.author_id == editor.id {
            Ok(EditAccess::Author(listing))
        } else {
            Ok(EditAccess::ReadOnly(listing))
        }
    }

    pub async fn edit_post(
        &self,
        editor: &CurrentUser,
        username: &str,
        post_id: &str,
        submission: &PostSubmission,
    ) -> Result<EditOutcome, PostError> {
        let listing = match self.edit_access(editor, username, post_id).await? {
            EditAccess::Author(listing) => listing,
            EditAccess::ReadOnly(listing) => return Ok(EditOutcome::NotAuthor(listing)),
        };

        let clean = self.clean(submission).await?;
        let previous = listing.post.image.clone();

        let image = match &clean.image {
            Some(image) => Some(self.store_image(image).await?),
            None if submission.clear_image => None,
            None => previous.clone(),
        };

        let params = UpdatePostParams {
            id: listing.post.id,
            group_id: clean.group_id,
            text: clean.text,
            image: image.clone(),
        };

        match self.writer.update_post(params).await {
            Ok(post) => {
                if let Some(old) = previous.filter(|old| image.as_deref() != Some(old.as_str())) {
                    self.discard_image(&old).await;
                }
                info!(
                    target = "yatube::posts",
                    post_id = %post.id,
                    author = %editor.username,
                    "post updated"
                );
                Ok(EditOutcome::Updated(post))
            }
            Err(err) => {
                if clean.image.is_some()
                    && let Some(path) = image
                {
                    self.discard_image(&path).await;
                }
                Err(err.into())
            }
        }
    }

    async fn clean(&self, submission: &PostSubmission) -> Result<CleanPost, PostError> {
        let mut errors = FormErrors::new();

        let text = forms::required_text("text", &submission.text, &mut errors);
        let mut group_id = forms::optional_choice("group", &submission.group, &mut errors);
        if let Some(id) = group_id
            && self.groups.find_by_id(id).await?.is_none()
        {
            errors.add("group", INVALID_CHOICE);
            group_id = None;
        }
        let image = forms::optional_image("image", submission.image.as_ref(), &mut errors);

        match text {
            Some(text) if errors.is_empty() => Ok(CleanPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn store_image(&self, image: &ValidImage) -> Result<String, PostError> {
        let stored = self
            .uploads
            .store(&image.filename, image.format.extension(), image.bytes.clone())
            .await?;
        info!(
            target = "yatube::posts",
            path = %stored.stored_path,
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            width = image.width,
            height = image.height,
            "post image stored"
        );
        Ok(stored.stored_path)
    }

    async fn discard_image(&self, path: &str) {
        if let Err(err) = self.uploads.delete(path).await {
            warn!(target = "yatube::posts", path, error = %err, "failed to remove post image");
        }
    }
}
