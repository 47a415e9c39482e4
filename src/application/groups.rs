//! Operator-side group management.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{self, SlugAsyncError, SlugError};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title must not be empty")]
    EmptyTitle,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateGroupCommand {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = cmd.title.trim();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }

        let slug = match cmd.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => {
                slug::validate_slug(explicit)?;
                if self.repo.find_by_slug(explicit).await?.is_some() {
                    return Err(GroupError::SlugTaken(explicit.to_string()));
                }
                explicit.to_string()
            }
            None => {
                let repo = self.repo.clone();
                slug::generate_unique_slug(title, move |candidate| {
                    let repo = repo.clone();
                    async move { Ok::<_, RepoError>(repo.find_by_slug(&candidate).await?.is_none()) }
                })
                .await?
            }
        };

        let group = self
            .repo
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.clone(),
                description: cmd.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(target = "yatube::groups", slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.repo.list_groups().await?)
    }

    /// Delete a group; its posts stay and lose their group.
    pub async fn delete(&self, slug: &str) -> Result<bool, GroupError> {
        let removed = self.repo.delete_group(slug).await?;
        if removed {
            info!(target = "yatube::groups", slug, "group deleted");
        }
        Ok(removed)
    }
}
