use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::types::{AdminStatus, ServiceInfo};
use super::{ApiError, ApiResponse, AppState};

/// GET /
/// Service name and version, the only unauthenticated endpoint besides login
pub async fn service_info() -> Json<ApiResponse<ServiceInfo>> {
    Json(ApiResponse::success(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// GET /admin/status
/// Operational snapshot for the admin view
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<AdminStatus>>, ApiError> {
    let database = state.store().ping().await.is_ok();
    let admin_count = state.store().count_admins().await.unwrap_or(0);

    Ok(Json(ApiResponse::success(AdminStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
        admin_count,
    })))
}
