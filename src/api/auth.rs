use axum::{
    Extension, Json,
    extract::{Form, Query, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;
use tracing::{info, warn};

use super::redirect::is_safe_redirect;
use super::types::{ChangePasswordPrompt, LoginPrompt, form_error, found};
use super::{ApiError, ApiResponse, AppState};
use crate::db::User;

/// Session key holding the authenticated account id.
const SESSION_USER_KEY: &str = "user_id";

/// Landing page after login and successful form flows.
const DEFAULT_LANDING: &str = "/admin/users";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// The authenticated user, inserted by [`session_middleware`] for handlers
/// behind it.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ============================================================================
// Middleware
// ============================================================================

/// Session gate for everything that requires a login.
///
/// Anonymous requests are redirected to the login view with the original
/// path in `next`. A session whose account has since been deleted is
/// discarded the same way. Accounts flagged must-change are diverted to the
/// change-password flow for every guarded path except that flow and logout.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    let Some(user_id) = user_id else {
        return Ok(found(&login_redirect(&request)));
    };

    let Some(user) = state
        .store()
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session user: {e}")))?
    else {
        // The account went away mid-session, e.g. deleted by another admin.
        let _ = session.flush().await;
        return Ok(found(&login_redirect(&request)));
    };

    tracing::Span::current().record("user_id", user.id);

    let path = request.uri().path();
    if user.password_must_change && path != "/change-password" && path != "/logout" {
        info!(username = %user.username, "Password change required before continuing");
        return Ok(found("/change-password"));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Login URL carrying the original destination, percent-encoded.
fn login_redirect(request: &Request) -> String {
    let original = request.uri().path_and_query().map_or_else(
        || request.uri().path().to_owned(),
        |pq| pq.as_str().to_owned(),
    );

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", &original)
        .finish();

    format!("/login?{query}")
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
/// Login prompt, or a redirect when a session already exists
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    if let Some(user) = session_user(&state, &session).await? {
        return Ok(landing_redirect(&user));
    }

    Ok(Json(ApiResponse::success(LoginPrompt {
        message: "Please log in to access this page".to_string(),
    }))
    .into_response())
}

/// POST /login
/// Authenticate and establish a session. 302 on success, 200 with the error
/// in the body on failure.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextQuery>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if let Some(user) = session_user(&state, &session).await? {
        return Ok(landing_redirect(&user));
    }

    let user = match state.auth().login(&form.username, &form.password).await {
        Ok(user) => user,
        Err(e) if e.is_form_error() => return Ok(form_error(e.to_string())),
        Err(e) => return Err(e.into()),
    };

    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    // A forced change outranks any next parameter.
    if user.password_must_change {
        info!(username = %user.username, "Password change required before continuing");
        return Ok(found("/change-password"));
    }

    if let Some(next) = query.next.as_deref() {
        let base = request_base(&state, &headers).await;
        if is_safe_redirect(next, &base) {
            return Ok(found(next));
        }
        warn!(username = %user.username, next_target = next, "Discarding unsafe redirect target");
    }

    Ok(found(DEFAULT_LANDING))
}

/// GET /logout
/// Clear the session and return to the public landing page
pub async fn logout(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Response {
    let _ = session.flush().await;
    info!(username = %user.username, "Logged out successfully");
    found("/")
}

/// GET /change-password
pub async fn change_password_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<ChangePasswordPrompt>> {
    Json(ApiResponse::success(ChangePasswordPrompt {
        username: user.username,
        password_must_change: user.password_must_change,
    }))
}

/// POST /change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response, ApiError> {
    match state
        .auth()
        .change_password(
            &user,
            &form.current_password,
            &form.new_password,
            &form.confirm_password,
        )
        .await
    {
        Ok(()) => {
            info!(username = %user.username, "Password changed successfully");
            Ok(found(DEFAULT_LANDING))
        }
        Err(e) if e.is_form_error() => Ok(form_error(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Load the user bound to this session, if any. Does not flush stale
/// sessions; callers on public routes fall through to the anonymous view.
async fn session_user(state: &AppState, session: &Session) -> Result<Option<User>, ApiError> {
    let Some(user_id) = session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
    else {
        return Ok(None);
    };

    state
        .store()
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session user: {e}")))
}

fn landing_redirect(user: &User) -> Response {
    if user.password_must_change {
        found("/change-password")
    } else {
        found(DEFAULT_LANDING)
    }
}

/// Scheme and authority the request arrived on, for redirect vetting.
async fn request_base(state: &AppState, headers: &HeaderMap) -> String {
    let scheme = if state.config().read().await.server.secure_cookies {
        "https"
    } else {
        "http"
    };

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}
