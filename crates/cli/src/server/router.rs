use std::any::Any;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any as AnyValue, CorsLayer};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::server::handlers;
use crate::server::state::AppState;

/// Creates the application router with all routes and middleware.
///
/// The API routes get an `x-request-id` (generated when the caller sent
/// none, echoed on the response). Everything is wrapped in CORS, gzip,
/// panic recovery and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let allowed_origins = state.server.cors_allowed_origins.clone();

    let api = Router::new()
        .route("/v1/api/index", post(handlers::index))
        .route("/v1/api/chat", post(handlers::chat))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state);

    with_middleware(app, &allowed_origins)
}

fn with_middleware(app: Router, allowed_origins: &[String]) -> Router {
    app.layer(CompressionLayer::new())
        .layer(build_cors_layer(allowed_origins))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AnyValue)
        .allow_headers(AnyValue)
        .expose_headers([header::CONTENT_LENGTH])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Something went wrong" })),
    )
        .into_response()
}

#[derive(Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
