use askama::{Error as AskamaError, Template};
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::error;

use crate::application::{
    accounts::CurrentUser,
    error::HttpError,
    forms::FormErrors,
    pagination::Page,
};
use crate::domain::entities::{CommentListing, GroupRecord, PostListing};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year] [hour]:[minute]");

/// Page numbers shown on either side of the current one.
const PAGINATOR_SPAN: u32 = 2;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the generic error page. Falls back to plain text if the error
/// template itself cannot be rendered.
pub fn render_error_page(status: StatusCode, message: &'static str) -> Response {
    let template = ErrorTemplate {
        layout: LayoutView::new(None, message),
        status: status.as_u16(),
        message,
    };

    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!(
                target = "yatube::presentation",
                error = %err,
                "failed to render error page"
            );
            (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                message,
            )
                .into_response()
        }
    }
}

fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

/// Shared chrome: the signed-in viewer and the document title.
#[derive(Clone, Debug)]
pub struct LayoutView {
    pub viewer: Option<CurrentUser>,
    pub title: String,
}

impl LayoutView {
    pub fn new(viewer: Option<CurrentUser>, title: impl Into<String>) -> Self {
        Self {
            viewer,
            title: title.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupLink {
    pub slug: String,
    pub title: String,
}

#[derive(Clone, Debug)]
pub struct PostCard {
    pub id: String,
    pub text: String,
    pub author_username: String,
    pub author_name: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub comment_count: u64,
}

impl PostCard {
    pub fn from_listing(listing: &PostListing) -> Self {
        Self {
            id: listing.post.id.to_string(),
            text: listing.post.text.clone(),
            author_username: listing.author_username.clone(),
            author_name: listing.author_name.clone(),
            group: listing.group.as_ref().map(|group| GroupLink {
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image_url: listing.post.image.as_ref().map(|path| format!("/media/{path}")),
            created_at: format_timestamp(listing.post.created_at),
            comment_count: listing.comment_count,
        }
    }

    pub fn detail_href(&self) -> String {
        format!("/{}/{}/", self.author_username, self.id)
    }

    pub fn edit_href(&self) -> String {
        format!("/{}/{}/edit/", self.author_username, self.id)
    }

    pub fn comment_href(&self) -> String {
        format!("/{}/{}/comment/", self.author_username, self.id)
    }
}

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl CommentView {
    pub fn from_listing(listing: &CommentListing) -> Self {
        Self {
            author_username: listing.author_username.clone(),
            text: listing.comment.text.clone(),
            created_at: format_timestamp(listing.comment.created_at),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthorSummary {
    pub username: String,
    pub display_name: String,
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

#[derive(Clone, Debug)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub show: bool,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
    pub links: Vec<PageLink>,
}

impl PaginatorView {
    /// Build links for `page`, served at `base_path` with a `?page=` query.
    pub fn new<T>(page: &Page<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        let start = page.number.saturating_sub(PAGINATOR_SPAN).max(1);
        let end = (page.number + PAGINATOR_SPAN).min(page.num_pages);

        Self {
            number: page.number,
            num_pages: page.num_pages,
            show: page.has_other_pages(),
            first_href: page.has_previous().then(|| href(1)),
            previous_href: page.previous_number().map(href),
            next_href: page.next_number().map(href),
            last_href: page.has_next().then(|| href(page.num_pages)),
            links: (start..=end)
                .map(|number| PageLink {
                    number,
                    href: href(number),
                    current: number == page.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupChoice {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

/// State of the post form as it is (re-)rendered.
#[derive(Clone, Debug, Default)]
pub struct PostFormView {
    pub action: String,
    pub editing: bool,
    pub text: String,
    pub groups: Vec<GroupChoice>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Offer `groups` as choices, marking the one whose id equals `selected`.
    pub fn with_groups(mut self, groups: &[GroupRecord], selected: &str) -> Self {
        let selected = selected.trim();
        self.groups = groups
            .iter()
            .map(|group| {
                let id = group.id.to_string();
                GroupChoice {
                    selected: id == selected,
                    id,
                    title: group.title.clone(),
                }
            })
            .collect();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn editing(mut self, current_image: Option<String>) -> Self {
        self.editing = true;
        self.current_image = current_image.map(|path| format!("/media/{path}"));
        self
    }

    pub fn with_errors(mut self, errors: FormErrors) -> Self {
        self.errors = errors;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommentFormView {
    pub text: String,
    pub errors: FormErrors,
}

#[derive(Clone, Debug, Default)]
pub struct SignupFormView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Clone, Debug, Default)]
pub struct LoginFormView {
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub layout: LayoutView,
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub layout: LayoutView,
    pub group: GroupRecord,
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub layout: LayoutView,
    pub author: AuthorSummary,
    pub following: bool,
    pub can_follow: bool,
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub layout: LayoutView,
    pub cards: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub layout: LayoutView,
    pub card: PostCard,
    pub author: AuthorSummary,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub comment_form: CommentFormView,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub layout: LayoutView,
    pub form: PostFormView,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub layout: LayoutView,
    pub form: SignupFormView,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: LayoutView,
    pub form: LoginFormView,
}

#[derive(Template)]
#[template(path = "misc/error.html")]
pub struct ErrorTemplate {
    pub layout: LayoutView,
    pub status: u16,
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::Paginator;

    #[test]
    fn paginator_links_stay_within_bounds() {
        let paginator = Paginator::new(45, 10);
        let page = paginator.page(1, vec![(); 10]);
        let view = PaginatorView::new(&page, "/");

        assert!(view.show);
        assert_eq!(view.previous_href, None);
        assert_eq!(view.next_href.as_deref(), Some("/?page=2"));
        assert_eq!(view.last_href.as_deref(), Some("/?page=5"));
        let numbers: Vec<u32> = view.links.iter().map(|link| link.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(view.links[0].current);
    }

    #[test]
    fn single_page_hides_paginator() {
        let paginator = Paginator::new(3, 10);
        let page = paginator.page(1, vec![(); 3]);
        let view = PaginatorView::new(&page, "/group/cats/");
        assert!(!view.show);
        assert_eq!(view.links.len(), 1);
    }

    #[test]
    fn post_form_marks_selected_group() {
        let group = GroupRecord {
            id: uuid::Uuid::new_v4(),
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let form = PostFormView::new("/new/")
            .with_groups(std::slice::from_ref(&group), &group.id.to_string());
        assert!(form.groups[0].selected);

        let form = PostFormView::new("/new/").with_groups(&[group], "");
        assert!(!form.groups[0].selected);
    }

    #[test]
    fn error_page_renders_with_status() {
        let response = render_error_page(StatusCode::NOT_FOUND, "Page not found");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
