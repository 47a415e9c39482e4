use async_trait::async_trait;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::types::PostRow;
use super::{POST_COLUMNS, PostgresRepositories};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            group_id,
            text,
            image,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (author_id, group_id, text, image) VALUES ($1, $2, $3, $4) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(author_id)
        .bind(group_id)
        .bind(text)
        .bind(image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            group_id,
            text,
            image,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET group_id = $2, text = $3, image = $4 WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(group_id)
        .bind(text)
        .bind(image)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
