use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use wayfinder::api::AppState;
use wayfinder::config::{Config, SecurityConfig};

const ROOT_PASSWORD: &str = "R00t!Passw0rd";

async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();

    let state = wayfinder::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    state
        .auth()
        .bootstrap_default_admin()
        .await
        .expect("Failed to bootstrap default admin");

    // A second admin that is past the forced password change.
    state
        .store()
        .create_user("root", ROOT_PASSWORD, true, false, &SecurityConfig::default())
        .await
        .expect("Failed to create user")
        .expect("Username should be free");

    let app = wayfinder::api::router(state.clone()).await;
    (app, state)
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            mime::APPLICATION_WWW_FORM_URLENCODED.as_ref(),
        )
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_root(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(form_post(
            "/login",
            &format!("username=root&password={ROOT_PASSWORD}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("Login should set a session cookie")
        .to_string()
}

async fn authed_get(app: &Router, cookie: &str, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn authed_post(app: &Router, cookie: &str, uri: &str, body: &str) -> Response<Body> {
    let mut request = form_post(uri, body);
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    app.clone().oneshot(request).await.unwrap()
}

async fn user_id_of(app: &Router, cookie: &str, username: &str) -> i64 {
    let response = authed_get(app, cookie, "/admin/users").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    body["data"]
        .as_array()
        .expect("User list should be an array")
        .iter()
        .find(|user| user["username"] == username)
        .and_then(|user| user["id"].as_i64())
        .expect("User should be listed")
}

#[tokio::test]
async fn test_list_users_returns_admins_oldest_first() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    let response = authed_get(&app, &cookie, "/admin/users").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "admin");
    assert_eq!(users[0]["password_must_change"], true);
    assert_eq!(users[1]["username"], "root");
    assert!(users[1]["created_at"].is_string());
}

#[tokio::test]
async fn test_create_user_then_duplicate_is_rejected() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    let response = authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=Val1d!Pass99",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["message"],
        "Admin user 'carol' created successfully"
    );

    let response = authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=Val1d!Pass99",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User 'carol' already exists");
}

#[tokio::test]
async fn test_create_user_validation_failures() {
    let (app, state) = spawn_app().await;
    let cookie = login_root(&app).await;

    let response = authed_post(&app, &cookie, "/admin/users/create", "username=carol").await;
    let body = json_body(response).await;
    assert_eq!(body["error"], "Username and password are required");

    let response = authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=alllowercase1!",
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "Password must contain at least one uppercase letter"
    );

    let long_name = "x".repeat(81);
    let response = authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        &format!("username={long_name}&password=Val1d!Pass99"),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["error"], "Username must be 80 characters or fewer");

    // None of the rejected submissions left a row behind.
    let carol = state
        .store()
        .get_user_by_username("carol")
        .await
        .expect("Store lookup should succeed");
    assert!(carol.is_none());
}

#[tokio::test]
async fn test_created_user_must_change_password_on_first_login() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=Val1d!Pass99",
    )
    .await;

    let response = app
        .clone()
        .oneshot(form_post(
            "/login",
            "username=carol&password=Val1d!Pass99",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/change-password");
}

#[tokio::test]
async fn test_delete_user_and_self_delete_guard() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=Val1d!Pass99",
    )
    .await;
    let carol_id = user_id_of(&app, &cookie, "carol").await;
    let root_id = user_id_of(&app, &cookie, "root").await;

    let response = authed_post(
        &app,
        &cookie,
        &format!("/admin/users/{carol_id}/delete"),
        "",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["data"]["message"],
        "Admin user 'carol' deleted successfully"
    );

    // The listing no longer includes the deleted account.
    let response = authed_get(&app, &cookie, "/admin/users").await;
    let body = json_body(response).await;
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|user| user["username"] != "carol"));

    let response = authed_post(&app, &cookie, &format!("/admin/users/{root_id}/delete"), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "You cannot delete yourself");

    let response = authed_post(&app, &cookie, "/admin/users/9999/delete", "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_password_forces_change_at_next_login() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    authed_post(
        &app,
        &cookie,
        "/admin/users/create",
        "username=carol&password=Val1d!Pass99",
    )
    .await;
    let carol_id = user_id_of(&app, &cookie, "carol").await;

    let response = authed_post(
        &app,
        &cookie,
        &format!("/admin/users/{carol_id}/reset-password"),
        "new_password=An0ther!Pass",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["data"]["message"],
        "Password reset for 'carol'. They must change it on next login."
    );

    // The old password is gone, the new one lands on the change flow.
    let response = app
        .clone()
        .oneshot(form_post(
            "/login",
            "username=carol&password=Val1d!Pass99",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(form_post(
            "/login",
            "username=carol&password=An0ther!Pass",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/change-password");
}

#[tokio::test]
async fn test_reset_password_reinstates_forced_change() {
    let (app, state) = spawn_app().await;
    let cookie = login_root(&app).await;
    let root_id = user_id_of(&app, &cookie, "root").await;

    // root is past its forced change before the reset.
    let before = state
        .store()
        .get_user_by_username("root")
        .await
        .expect("Store lookup should succeed")
        .expect("root should exist");
    assert!(!before.password_must_change);

    let response = authed_post(
        &app,
        &cookie,
        &format!("/admin/users/{root_id}/reset-password"),
        "new_password=An0ther!Pass",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);

    let after = state
        .store()
        .get_user_by_username("root")
        .await
        .expect("Store lookup should succeed")
        .expect("root should exist");
    assert!(after.password_must_change);
}

#[tokio::test]
async fn test_reset_password_validation() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;
    let root_id = user_id_of(&app, &cookie, "root").await;

    let response = authed_post(
        &app,
        &cookie,
        &format!("/admin/users/{root_id}/reset-password"),
        "new_password=",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["error"], "New password is required");

    let response = authed_post(
        &app,
        &cookie,
        "/admin/users/9999/reset-password",
        "new_password=An0ther!Pass",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_status_reports_store_health() {
    let (app, _state) = spawn_app().await;
    let cookie = login_root(&app).await;

    let response = authed_get(&app, &cookie, "/admin/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["admin_count"], 2);
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn test_metrics_requires_session() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = login_root(&app).await;
    let response = authed_get(&app, &cookie, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}
