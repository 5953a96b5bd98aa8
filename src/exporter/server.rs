//! HTTP surface of the exporter
//!
//! - `GET /limit`: last check result as JSON
//! - `GET /metrics`: Prometheus text format
//! - `GET /` and `GET /get.js`: a small status page polling `/limit`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::core::debug_logger::get_debug_logger;
use crate::exporter::metrics::ExporterMetrics;
use crate::exporter::poller::SharedState;

const INDEX_HTML: &str = include_str!("static/index.html");
const GET_JS: &str = include_str!("static/get.js");

/// Shared handler state
pub struct AppState {
    pub metrics: Arc<ExporterMetrics>,
    pub state: SharedState,
}

pub fn router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/get.js", get(script))
        .route("/limit", get(limit))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(log_requests))
        .with_state(app)
}

async fn limit(State(app): State<Arc<AppState>>) -> Response {
    let state = app.state.read().await;

    match (&state.last_result, &state.last_error) {
        (Some(result), _) => match result.to_json_bytes() {
            Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (None, Some(error)) => json_error(StatusCode::INTERNAL_SERVER_ERROR, error.clone()),
        (None, None) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no rate-limit check has completed yet".to_string(),
        ),
    }
}

async fn metrics(State(app): State<Arc<AppState>>) -> Response {
    match app.metrics.encode() {
        Ok(text) => ([(header::CONTENT_TYPE, app.metrics.content_type())], text).into_response(),
        Err(e) => {
            get_debug_logger().error("Server", "metrics_encode", &e.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], GET_JS)
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn log_requests(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    get_debug_logger().http_request(request.method().as_str(), request.uri().path(), &remote);

    next.run(request).await
}
