use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use serial_test::serial;
use tower::ServiceExt;

mod common;

/// Test helper to register a new user
async fn register_user(
    app: &axum::Router,
    email: &str,
    password: &str,
    name: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = json!({
        "email": email,
        "password": password,
        "name": name,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();

    // Extract cookies from Set-Cookie headers
    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str, cookies)
}

/// Test helper to login a user
async fn login_user(
    app: &axum::Router,
    email: &str,
    password: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = json!({
        "email": email,
        "password": password,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();

    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str, cookies)
}

/// Extract access_token from JSON response
fn extract_access_token(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    value["access_token"].as_str().map(|s| s.to_string())
}

/// Extract the full refresh_token cookie (name=value) for a Cookie header
fn extract_refresh_cookie(cookies: &[String]) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .and_then(|c| c.split(';').next())
        .map(|s| s.to_string())
}

fn unique_email() -> String {
    format!("user-{}@test.local", uuid::Uuid::new_v4())
}

#[tokio::test]
#[serial]
#[ignore = "requires MongoDB and Redis"]
async fn register_then_fetch_profile() {
    let (app, _db) = common::create_test_app().await;
    let email = unique_email();

    let (status, body, cookies) = register_user(&app, &email, "password123", "Test User").await;
    assert_eq!(status, StatusCode::CREATED);

    let token = extract_access_token(&body).expect("register returns access_token");
    assert!(extract_refresh_cookie(&cookies).is_some());

    // Refresh token must never appear in the JSON body
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(value.get("refresh_token").is_none());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/auth/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let profile: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(profile["email"], email);
}

#[tokio::test]
#[serial]
#[ignore = "requires MongoDB and Redis"]
async fn login_rejects_wrong_password() {
    let (app, _db) = common::create_test_app().await;
    let email = unique_email();

    let (status, _, _) = register_user(&app, &email, "password123", "Test User").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = login_user(&app, &email, "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
#[ignore = "requires MongoDB and Redis"]
async fn refresh_rotates_access_token_and_logout_revokes() {
    let (app, _db) = common::create_test_app().await;
    let email = unique_email();

    register_user(&app, &email, "password123", "Test User").await;
    let (status, _, cookies) = login_user(&app, &email, "password123").await;
    assert_eq!(status, StatusCode::OK);

    let cookie = extract_refresh_cookie(&cookies).expect("login sets refresh cookie");

    // Refresh with the cookie yields a fresh access token
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value["access_token"].as_str().is_some());

    // Logout revokes the refresh token
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // A revoked token no longer refreshes
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
#[ignore = "requires MongoDB and Redis"]
async fn protected_routes_require_token() {
    let (app, _db) = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/paths/active")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
