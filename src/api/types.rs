use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::db::User;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Admin account as exposed over the API. No hash material leaves the store,
/// but this keeps the shape explicit.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub password_must_change: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            password_must_change: user.password_must_change,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginPrompt {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordPrompt {
    pub username: String,
    pub password_must_change: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub version: String,
    pub uptime_seconds: u64,
    pub database: bool,
    pub admin_count: u64,
}

/// A 302 redirect. Form flows use 302 so a later GET of the target re-runs
/// the handler; `axum::response::Redirect::to` would emit 303.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// A failed form submission: HTTP 200 with the failure in the envelope, so
/// the form can be redisplayed with the message.
pub fn form_error(message: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::<()>::error(message))).into_response()
}
