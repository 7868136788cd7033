use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::AppState;

/// GET /metrics
/// Prometheus exposition text
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> String {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize\n".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

/// Wraps every request in a span carrying a generated request id, records
/// latency and outcome metrics, and emits one wide event per request.
///
/// The `user_id` field starts empty and is filled in by the session
/// middleware once the account is known.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_owned();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
        route = matched_path.as_deref().unwrap_or("unmatched"),
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;

        let status = response.status();
        let duration = start.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        let outcome = if status.is_server_error() {
            "error"
        } else if status.is_client_error() {
            "client_error"
        } else {
            "success"
        };

        // Label metrics by route template, not raw path, to keep cardinality
        // bounded.
        let metrics_path = matched_path.unwrap_or_else(|| "unmatched".to_owned());
        let labels = [
            ("method", method.to_string()),
            ("path", metrics_path),
            ("status", status.as_u16().to_string()),
        ];
        counter!("http_requests_total", &labels).increment(1);
        histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

        info!(
            status = status.as_u16(),
            duration_ms,
            user_agent,
            outcome,
            "Request finished"
        );

        response
    }
    .instrument(span)
    .await
}

/// Adds browser hardening headers to every response. The service only ever
/// serves JSON and redirects, so the policy can deny everything.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
