//! In-memory repositories and a router harness for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::accounts::SESSION_COOKIE;
use yatube::application::pagination::PageWindow;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo, PostsWriteRepo,
    RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
};
use yatube::cache::PageCacheConfig;
use yatube::domain::entities::{
    CommentListing, CommentRecord, FollowRecord, GroupRecord, GroupRef, PostListing, PostRecord,
    SessionRecord, UserRecord, display_name,
};
use yatube::domain::users::same_username;
use yatube::infra::http::{HttpOptions, HttpState, build_router};
use yatube::infra::uploads::UploadStorage;

/// 1x1 transparent GIF.
pub const GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

const BOUNDARY: &str = "yatube-test-boundary";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.id == id)
    }

    fn listing(&self, post: &PostRecord) -> PostListing {
        let author = self.user(post.author_id);
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .map(|group| GroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            });
        PostListing {
            post: post.clone(),
            author_username: author.map(|a| a.username.clone()).unwrap_or_default(),
            author_name: author
                .map(|a| display_name(&a.username, &a.first_name, &a.last_name))
                .unwrap_or_default(),
            group,
            comment_count: self
                .comments
                .iter()
                .filter(|comment| comment.post_id == post.id)
                .count() as u64,
        }
    }

    fn in_scope(&self, post: &PostRecord, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(id) => post.group_id == Some(id),
            PostScope::Author(id) => post.author_id == id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }
}

/// Every repository trait over one set of in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub async fn post_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.tables.lock().await.follows.len()
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.tables
            .lock()
            .await
            .posts
            .iter()
            .max_by_key(|post| (post.created_at, post.id))
            .cloned()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|user| same_username(&user.username, &params.username))
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_lower_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            email: params.email,
            first_name: params.first_name,
            last_name: params.last_name,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| same_username(&user.username, username))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables.lock().await.user(id).cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn delete_group(&self, slug: &str) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let Some(index) = tables.groups.iter().position(|group| group.slug == slug) else {
            return Ok(false);
        };
        let removed = tables.groups.remove(index);
        for post in tables.posts.iter_mut() {
            if post.group_id == Some(removed.id) {
                post.group_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostListing>, RepoError> {
        let tables = self.tables.lock().await;
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(posts
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| tables.listing(post))
            .collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .count() as u64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostListing>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.listing(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            group_id: params.group_id,
            text: params.text,
            image: params.image,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.group_id = params.group_id;
        post.text = params.text;
        post.image = params.image;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentListing>, RepoError> {
        let tables = self.tables.lock().await;
        let mut comments: Vec<CommentListing> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| CommentListing {
                comment: comment.clone(),
                author_username: tables
                    .user(comment.author_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_default(),
            })
            .collect();
        comments.sort_by_key(|listing| listing.comment.created_at);
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        let mut tables = self.tables.lock().await;
        if tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Ok(false);
        }
        tables.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn count_followers(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .follows
            .iter()
            .filter(|edge| edge.author_id == author_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        self.tables
            .lock()
            .await
            .sessions
            .retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Router wired to a fresh [`MemoryStore`] and a temporary media directory.
pub struct TestApp {
    pub router: Router,
    pub state: HttpState,
    pub store: Arc<MemoryStore>,
    media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(PageCacheConfig::default())
    }

    pub fn with_cache(cache: PageCacheConfig) -> Self {
        let media = TempDir::new().expect("temp media dir");
        let uploads = UploadStorage::new(media.path().to_path_buf()).expect("upload storage");
        let store = Arc::new(MemoryStore::default());
        let state = HttpState::new(
            store.clone(),
            Arc::new(uploads),
            HttpOptions {
                cache,
                session_ttl: time::Duration::hours(1),
                cookie_secure: false,
                max_request_bytes: 1024 * 1024,
            },
        );
        let router = build_router(state.clone());
        Self {
            router,
            state,
            store,
            media,
        }
    }

    pub fn media_root(&self) -> &std::path::Path {
        self.media.path()
    }

    /// Stored media files, relative to the media root.
    pub fn stored_media(&self) -> Vec<std::path::PathBuf> {
        let posts = self.media.path().join("posts");
        match std::fs::read_dir(posts) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// A user that cannot log in with a password; use [`TestApp::cookie_for`].
    pub async fn user(&self, username: &str) -> UserRecord {
        UsersRepo::create_user(
            self.store.as_ref(),
            CreateUserParams {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "!".to_string(),
            },
        )
        .await
        .expect("create user")
    }

    /// Cookie header value for a fresh session of `user`.
    pub async fn cookie_for(&self, user: &UserRecord) -> String {
        let session = self
            .state
            .accounts
            .start_session(user)
            .await
            .expect("start session");
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        GroupsRepo::create_group(
            self.store.as_ref(),
            CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: String::new(),
            },
        )
        .await
        .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        PostsWriteRepo::create_post(
            self.store.as_ref(),
            CreatePostParams {
                author_id: author.id,
                group_id: group.map(|g| g.id),
                text: text.to_string(),
                image: None,
            },
        )
        .await
        .expect("create post")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        form: Multipart,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

/// Minimal `multipart/form-data` body builder.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub fn assert_redirect(response: &Response<Body>, expected: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(response), Some(expected));
}
