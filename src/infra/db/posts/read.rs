use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostScope, PostsRepo, RepoError};
use crate::domain::entities::PostListing;
use crate::infra::db::map_sqlx_error;
use crate::infra::db::util::convert_count;

use super::types::PostListingRow;
use super::{LISTING_SELECT, PostgresRepositories};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostListing>, RepoError> {
        let offset = i64::try_from(window.offset).map_err(|_| RepoError::InvalidInput {
            message: "page offset out of range".to_string(),
        })?;

        let mut qb = QueryBuilder::<Postgres>::new(LISTING_SELECT);
        qb.push(" WHERE 1=1 ");
        Self::apply_post_scope(&mut qb, scope);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostListingRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostListing::from).collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_post_scope(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostListing>, RepoError> {
        let row = sqlx::query_as::<_, PostListingRow>(&format!("{LISTING_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostListing::from))
    }
}
