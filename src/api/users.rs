use axum::{
    Extension, Json,
    extract::{Form, Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::types::{MessageResponse, UserDto, form_error};
use super::{ApiError, ApiResponse, AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateUserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /admin/users
/// List all admin accounts
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.auth().list_admin_users(&user).await?;
    let users: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
    Ok(Json(ApiResponse::success(users)))
}

/// POST /admin/users/create
/// Create a new admin account that must change its password on first login
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<CreateUserForm>,
) -> Result<Response, ApiError> {
    match state
        .auth()
        .create_admin_user(&user, &form.username, &form.password)
        .await
    {
        Ok(created) => Ok(message_response(format!(
            "Admin user '{}' created successfully",
            created.username
        ))),
        Err(e) if e.is_form_error() => Ok(form_error(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// POST /admin/users/{id}/delete
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(user_id): Path<i32>,
) -> Result<Response, ApiError> {
    match state.auth().delete_admin_user(&user, user_id).await {
        Ok(deleted) => Ok(message_response(format!(
            "Admin user '{}' deleted successfully",
            deleted.username
        ))),
        Err(e) if e.is_form_error() => Ok(form_error(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// POST /admin/users/{id}/reset-password
/// Set a new password on the target and force a change at next login
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(user_id): Path<i32>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, ApiError> {
    match state
        .auth()
        .reset_admin_password(&user, user_id, &form.new_password)
        .await
    {
        Ok(target) => Ok(message_response(format!(
            "Password reset for '{}'. They must change it on next login.",
            target.username
        ))),
        Err(e) if e.is_form_error() => Ok(form_error(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

fn message_response(message: String) -> Response {
    Json(ApiResponse::success(MessageResponse { message })).into_response()
}
