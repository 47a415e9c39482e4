//! Read side of the site: feeds, profiles and post pages.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::accounts::CurrentUser;
use crate::application::pagination::{FEED_PAGE_SIZE, Page, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::users;
use crate::presentation::views::{AuthorSummary, CommentView, PostCard};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostCard>,
}

pub struct ProfileFeed {
    pub author: AuthorSummary,
    pub following: bool,
    /// Whether the follow/unfollow control applies (signed in, not own profile).
    pub can_follow: bool,
    pub page: Page<PostCard>,
}

pub struct PostDetail {
    pub card: PostCard,
    pub author: AuthorSummary,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
        }
    }

    pub async fn index(&self, page: Option<&str>) -> Result<Page<PostCard>, FeedError> {
        self.page_of(PostScope::All, page).await
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::NotFound("group"))?;
        let page = self.page_of(PostScope::Group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        viewer: Option<&CurrentUser>,
        username: &str,
        page: Option<&str>,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self.author(username).await?;
        let page = self.page_of(PostScope::Author(author.id), page).await?;

        let (following, can_follow) = match viewer {
            Some(viewer) if viewer.id != author.id => {
                (self.follows.is_following(viewer.id, author.id).await?, true)
            }
            _ => (false, false),
        };

        let author = self.summary(&author, Some(page.total_items)).await?;
        Ok(ProfileFeed {
            author,
            following,
            can_follow,
            page,
        })
    }

    /// Posts from every author `viewer` follows.
    pub async fn follow_feed(
        &self,
        viewer: &CurrentUser,
        page: Option<&str>,
    ) -> Result<Page<PostCard>, FeedError> {
        self.page_of(PostScope::FollowedBy(viewer.id), page).await
    }

    pub async fn post_detail(
        &self,
        viewer: Option<&CurrentUser>,
        username: &str,
        post_id: &str,
    ) -> Result<PostDetail, FeedError> {
        let id = Uuid::parse_str(post_id).map_err(|_| FeedError::NotFound("post"))?;
        let listing = self
            .posts
            .find_post(id)
            .await?
            .filter(|listing| users::same_username(&listing.author_username, username))
            .ok_or(FeedError::NotFound("post"))?;

        let author = self
            .users
            .find_by_id(listing.post.author_id)
            .await?
            .ok_or(FeedError::NotFound("author"))?;
        let author = self.summary(&author, None).await?;

        let comments = self
            .comments
            .list_for_post(listing.post.id)
            .await?
            .iter()
            .map(CommentView::from_listing)
            .collect();

        let can_edit = viewer.is_some_and(|viewer| viewer.id == listing.post.author_id);

        Ok(PostDetail {
            card: PostCard::from_listing(&listing),
            author,
            comments,
            can_edit,
        })
    }

    async fn page_of(
        &self,
        scope: PostScope,
        requested: Option<&str>,
    ) -> Result<Page<PostCard>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let paginator = Paginator::new(total, FEED_PAGE_SIZE);
        let number = paginator.resolve(requested);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(scope, paginator.window(number))
                .await?
        };
        Ok(paginator
            .page(number, items)
            .map(|listing| PostCard::from_listing(&listing)))
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FeedError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::NotFound("author"))
    }

    async fn summary(
        &self,
        author: &UserRecord,
        known_posts: Option<u64>,
    ) -> Result<AuthorSummary, FeedError> {
        let posts = match known_posts {
            Some(count) => count,
            None => self.posts.count_posts(PostScope::Author(author.id)).await?,
        };
        Ok(AuthorSummary {
            username: author.username.clone(),
            display_name: author.display_name(),
            posts,
            followers: self.follows.count_followers(author.id).await?,
            following: self.follows.count_following(author.id).await?,
        })
    }
}
