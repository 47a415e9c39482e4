use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{GroupRef, PostListing, PostRecord, display_name};

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) author_id: Uuid,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) text: String,
    pub(crate) image: Option<String>,
    pub(crate) created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            group_id: row.group_id,
            text: row.text,
            image: row.image,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostListingRow {
    pub(crate) id: Uuid,
    pub(crate) author_id: Uuid,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) text: String,
    pub(crate) image: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) author_username: String,
    pub(crate) author_first_name: String,
    pub(crate) author_last_name: String,
    pub(crate) group_slug: Option<String>,
    pub(crate) group_title: Option<String>,
    pub(crate) comment_count: i64,
}

impl From<PostListingRow> for PostListing {
    fn from(row: PostListingRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };
        let author_name = display_name(
            &row.author_username,
            &row.author_first_name,
            &row.author_last_name,
        );

        Self {
            post: PostRecord {
                id: row.id,
                author_id: row.author_id,
                group_id: group.as_ref().map(|group| group.id),
                text: row.text,
                image: row.image,
                created_at: row.created_at,
            },
            author_username: row.author_username,
            author_name,
            group,
            comment_count: u64::try_from(row.comment_count).unwrap_or_default(),
        }
    }
}
