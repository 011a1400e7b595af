//! HTTP route definitions

use crate::{handlers, middleware, rpc, AppState};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/rpc", post(rpc::rpc_handler))
        .route(
            "/upload/{bucket}/{*object}",
            put(handlers::upload).layer(RequestBodyLimitLayer::new(state.config.max_body_size)),
        )
        .route("/download/{bucket}/{*object}", get(handlers::download))
        .route("/healthz", get(handlers::health_check))
        // request_id wraps logging so the id exists when the log line is written
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware));

    let router = if state.config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            // Path only: download tokens travel in the query string
            tracing::debug_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path()
            )
        }))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}
