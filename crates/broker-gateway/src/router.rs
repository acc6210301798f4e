//! Axum router wiring.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport::handlers};

pub fn build_router(state: AppState) -> Router {
    let limit = state.cfg().gateway.max_body_bytes;
    Router::new()
        .route("/", post(handlers::broker))
        .route("/handle", post(handlers::handle_submission))
        .route("/log/:variant", post(handlers::log_via))
        .route("/healthz", get(ops::healthz))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
