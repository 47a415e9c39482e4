use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::accounts::CurrentUser;
use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author not found")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Subscribe `requester` to `username`. Following oneself or an author
    /// already followed changes nothing.
    pub async fn follow(
        &self,
        requester: &CurrentUser,
        username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.author(username).await?;
        if author.id != requester.id {
            let created = self.follows.follow(requester.id, author.id).await?;
            debug!(
                target = "yatube::follows",
                follower = %requester.username,
                author = %author.username,
                created,
                "follow requested"
            );
        }
        Ok(author)
    }

    /// Remove the subscription if it exists.
    pub async fn unfollow(
        &self,
        requester: &CurrentUser,
        username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.author(username).await?;
        let removed = self.follows.unfollow(requester.id, author.id).await?;
        debug!(
            target = "yatube::follows",
            follower = %requester.username,
            author = %author.username,
            removed,
            "unfollow requested"
        );
        Ok(author)
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
