mod read;
mod types;
mod write;

use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::PostScope;

use super::PostgresRepositories;

/// Columns of a feed entry: the post with its author, group and comment count.
const LISTING_SELECT: &str = "SELECT p.id, p.author_id, p.group_id, p.text, p.image, p.created_at, \
     u.username AS author_username, u.first_name AS author_first_name, \
     u.last_name AS author_last_name, g.slug AS group_slug, g.title AS group_title, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id ";

const POST_COLUMNS: &str = "id, author_id, group_id, text, image, created_at";

impl PostgresRepositories {
    fn apply_post_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: PostScope) {
        match scope {
            PostScope::All => {}
            PostScope::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(group_id);
            }
            PostScope::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
            PostScope::FollowedBy(user_id) => {
                qb.push(" AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ");
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
    }
}
