//! API module for all HTTP handlers

pub mod stats;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

pub use stats::{root, status};
pub use webhook::handle_notify;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/notify", routing::post(handle_notify))
        .route("/status", routing::get(status))
        .with_state(state)
}
