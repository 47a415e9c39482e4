//! Publishing, editing and commenting on posts.

mod support;

use axum::http::{StatusCode, header};

use support::{GIF, Multipart, TestApp, assert_redirect, body_text};
use yatube::application::repos::PostsRepo;

#[tokio::test]
async fn anonymous_publish_redirects_to_login() {
    let app = TestApp::new();

    let response = app
        .post_multipart("/new/", None, Multipart::new().text("text", "hello"))
        .await;
    assert_redirect(&response, "/auth/login/?next=/new/");
    assert_eq!(app.store.post_count().await, 0);

    let response = app.get("/new/", None).await;
    assert_redirect(&response, "/auth/login/?next=/new/");
}

#[tokio::test]
async fn published_post_shows_on_index_profile_and_detail() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new().text("text", "first light over the river"),
        )
        .await;
    assert_redirect(&response, "/");

    let post = app.store.latest_post().await.expect("stored post");
    assert_eq!(post.author_id, author.id);

    app.state.cache.store.invalidate_all();
    for uri in ["/".to_string(), "/writer/".to_string(), format!("/writer/{}/", post.id)] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(
            body_text(response).await.contains("first light over the river"),
            "{uri} should show the post"
        );
    }
}

#[tokio::test]
async fn blank_text_rerenders_form() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart("/new/", Some(&cookie), Multipart::new().text("text", "   "))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("This field is required."));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn post_can_be_filed_under_group() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let group = app.group("Cats", "cats").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new()
                .text("text", "a cat sat")
                .text("group", &group.id.to_string()),
        )
        .await;
    assert_redirect(&response, "/");

    let response = app.get("/group/cats/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("a cat sat"));
}

#[tokio::test]
async fn unknown_group_choice_is_a_form_error() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new()
                .text("text", "orphan")
                .text("group", &uuid::Uuid::new_v4().to_string()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Select a valid choice."));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected_and_nothing_is_stored() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new()
                .text("text", "with attachment")
                .file("image", "notes.txt", "text/plain", b"definitely not pixels"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Upload a valid image."));
    assert_eq!(app.store.post_count().await, 0);
    assert!(app.stored_media().is_empty());
}

#[tokio::test]
async fn image_upload_is_stored_and_served() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new()
                .text("text", "pixel")
                .file("image", "dot.gif", "image/gif", GIF),
        )
        .await;
    assert_redirect(&response, "/");

    let post = app.store.latest_post().await.expect("stored post");
    let image = post.image.expect("image path");
    assert!(image.starts_with("posts/"));
    assert_eq!(app.stored_media().len(), 1);

    let response = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/gif")
    );
}

#[tokio::test]
async fn image_with_markup_tail_is_stored_and_served_as_image() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;

    let mut payload = GIF.to_vec();
    payload.extend_from_slice(b"<script>alert(document.domain)</script>");

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            Multipart::new()
                .text("text", "disguised")
                .file("image", "x.html", "text/html", &payload),
        )
        .await;
    assert_redirect(&response, "/");

    let post = app.store.latest_post().await.expect("stored post");
    let image = post.image.expect("image path");
    assert!(image.ends_with("-x.gif"), "stored as {image}");

    let response = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("image/gif")
    );
    assert_eq!(
        headers
            .get(header::X_CONTENT_TYPE_OPTIONS)
            .and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
}

#[tokio::test]
async fn stored_non_image_is_served_as_download() {
    let app = TestApp::new();
    let dir = app.media_root().join("posts");
    std::fs::create_dir_all(&dir).expect("posts dir");
    std::fs::write(dir.join("page.html"), b"<script>alert(1)</script>").expect("write");

    let response = app.get("/media/posts/page.html", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/octet-stream")
    );
    assert_eq!(
        headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok()),
        Some("attachment")
    );
}

#[tokio::test]
async fn author_edit_updates_text_everywhere() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let post = app.post(&author, "draft wording", None).await;
    let cookie = app.cookie_for(&author).await;
    let edit = format!("/writer/{}/edit/", post.id);

    let response = app.get(&edit, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("draft wording"));

    let response = app
        .post_multipart(&edit, Some(&cookie), Multipart::new().text("text", "final wording"))
        .await;
    assert_redirect(&response, &format!("/writer/{}/", post.id));

    let stored = app.store.find_post(post.id).await.expect("lookup").expect("post");
    assert_eq!(stored.post.text, "final wording");

    app.state.cache.store.invalidate_all();
    let body = body_text(app.get("/", None).await).await;
    assert!(body.contains("final wording"));
    assert!(!body.contains("draft wording"));
}

#[tokio::test]
async fn non_author_edit_is_redirected_without_change() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let intruder = app.user("intruder").await;
    let post = app.post(&author, "original words", None).await;
    let cookie = app.cookie_for(&intruder).await;
    let edit = format!("/writer/{}/edit/", post.id);
    let detail = format!("/writer/{}/", post.id);

    let response = app.get(&edit, Some(&cookie)).await;
    assert_redirect(&response, &detail);

    let response = app
        .post_multipart(&edit, Some(&cookie), Multipart::new().text("text", "defaced"))
        .await;
    assert_redirect(&response, &detail);

    let stored = app.store.find_post(post.id).await.expect("lookup").expect("post");
    assert_eq!(stored.post.text, "original words");
}

#[tokio::test]
async fn edit_keeps_image_unless_cleared() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let cookie = app.cookie_for(&author).await;
    app.post_multipart(
        "/new/",
        Some(&cookie),
        Multipart::new()
            .text("text", "pixel")
            .file("image", "dot.gif", "image/gif", GIF),
    )
    .await;
    let post = app.store.latest_post().await.expect("stored post");
    let edit = format!("/writer/{}/edit/", post.id);

    app.post_multipart(
        &edit,
        Some(&cookie),
        Multipart::new()
            .text("text", "pixel, again")
            .file("image", "", "application/octet-stream", b""),
    )
    .await;
    let kept = app.store.find_post(post.id).await.expect("lookup").expect("post");
    assert_eq!(kept.post.image, post.image);

    app.post_multipart(
        &edit,
        Some(&cookie),
        Multipart::new()
            .text("text", "no pixel")
            .text("image-clear", "on"),
    )
    .await;
    let cleared = app.store.find_post(post.id).await.expect("lookup").expect("post");
    assert_eq!(cleared.post.image, None);
    assert!(app.stored_media().is_empty());
}

#[tokio::test]
async fn comment_is_added_and_shown() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let reader = app.user("reader").await;
    let post = app.post(&author, "discuss me", None).await;
    let cookie = app.cookie_for(&reader).await;

    let response = app
        .post_form(
            &format!("/writer/{}/comment/", post.id),
            Some(&cookie),
            "text=well+said",
        )
        .await;
    assert_redirect(&response, &format!("/writer/{}/", post.id));

    let body = body_text(app.get(&format!("/writer/{}/", post.id), None).await).await;
    assert!(body.contains("well said"));
    assert!(body.contains("reader"));
}

#[tokio::test]
async fn blank_comment_rerenders_post_with_error() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let post = app.post(&author, "discuss me", None).await;
    let cookie = app.cookie_for(&author).await;

    let response = app
        .post_form(&format!("/writer/{}/comment/", post.id), Some(&cookie), "text=")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("discuss me"));
    assert!(body.contains("This field is required."));
}

#[tokio::test]
async fn anonymous_comment_redirects_with_next() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    let post = app.post(&author, "discuss me", None).await;
    let target = format!("/writer/{}/comment/", post.id);

    let response = app.post_form(&target, None, "text=hi").await;
    assert_redirect(&response, &format!("/auth/login/?next={target}"));
}

#[tokio::test]
async fn post_urls_must_name_the_author() {
    let app = TestApp::new();
    let author = app.user("writer").await;
    app.user("someone").await;
    let post = app.post(&author, "mine", None).await;

    let response = app.get(&format!("/someone/{}/", post.id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/writer/not-a-uuid/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&format!("/WRITER/{}/", post.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
