//! Signup, login and logout through the router.

mod support;

use axum::http::{StatusCode, header};

use support::{TestApp, assert_redirect, body_text};
use yatube::application::repos::UsersRepo;

const SIGNUP: &str =
    "first_name=Lev&last_name=Tolstoy&username=leo&email=leo%40example.com&password1=war-and-peace&password2=war-and-peace";

#[tokio::test]
async fn signup_redirects_to_login_and_profile_exists() {
    let app = TestApp::new();

    let response = app.post_form("/auth/signup/", None, SIGNUP).await;
    assert_redirect(&response, "/auth/login/");

    let response = app.get("/leo/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Lev Tolstoy"));
}

#[tokio::test]
async fn signup_then_login_issues_session_cookie() {
    let app = TestApp::new();
    app.post_form("/auth/signup/", None, SIGNUP).await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=war-and-peace&next=%2Ffollow%2F",
        )
        .await;
    assert_redirect(&response, "/follow/");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();
    assert!(cookie.starts_with("yatube_session=sid_"));

    let response = app.get("/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = TestApp::new();
    app.post_form("/auth/signup/", None, SIGNUP).await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=war-and-peace&next=https%3A%2F%2Fevil.example%2F",
        )
        .await;
    assert_redirect(&response, "/");
}

#[tokio::test]
async fn wrong_password_rerenders_form_with_error() {
    let app = TestApp::new();
    app.post_form("/auth/signup/", None, SIGNUP).await;

    let response = app
        .post_form("/auth/login/", None, "username=leo&password=wrong-password")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_text(response).await;
    assert!(body.contains("Please enter a correct username and password"));
}

#[tokio::test]
async fn duplicate_username_is_rejected_case_insensitively() {
    let app = TestApp::new();
    app.user("Leo").await;

    let response = app.post_form("/auth/signup/", None, SIGNUP).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("A user with that username already exists."));
}

#[tokio::test]
async fn reserved_and_weak_signups_are_rejected() {
    let app = TestApp::new();

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=follow&email=f%40example.com&password1=long-enough&password2=long-enough",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("This username is reserved."));
    assert!(
        app.store
            .find_by_username("follow")
            .await
            .expect("lookup")
            .is_none()
    );

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=numbers&email=n%40example.com&password1=12345678901&password2=12345678901",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("entirely numeric"));

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=..&email=d%40example.com&password1=long-enough&password2=long-enough",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("may not consist of dots only"));
    assert!(app.store.find_by_username("..").await.expect("lookup").is_none());
}

#[tokio::test]
async fn unknown_username_fails_like_wrong_password() {
    let app = TestApp::new();
    app.post_form("/auth/signup/", None, SIGNUP).await;

    let unknown = app
        .post_form("/auth/login/", None, "username=nobody&password=war-and-peace")
        .await;
    assert_eq!(unknown.status(), StatusCode::OK);
    assert!(unknown.headers().get(header::SET_COOKIE).is_none());
    let unknown = body_text(unknown).await;

    let wrong = app
        .post_form("/auth/login/", None, "username=leo&password=wrong-password")
        .await;
    let wrong = body_text(wrong).await;

    assert!(unknown.contains("Please enter a correct username and password"));
    assert_eq!(
        unknown.replace("nobody", "leo"),
        wrong,
        "unknown and wrong-password responses differ"
    );
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let user = app.user("reader").await;
    let cookie = app.cookie_for(&user).await;

    let response = app.post_form("/auth/logout/", Some(&cookie), "").await;
    assert_redirect(&response, "/");
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("removal cookie");
    assert!(cleared.starts_with("yatube_session="));

    let response = app.get("/follow/", Some(&cookie)).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn forged_session_cookie_is_anonymous() {
    let app = TestApp::new();
    let user = app.user("reader").await;
    let cookie = app.cookie_for(&user).await;
    let forged = format!("{}z", &cookie[..cookie.len() - 1]);

    let response = app.get("/follow/", Some(&forged)).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");
}
