use axum::{Json, extract::State as AxumState, response::IntoResponse};
use serde_json::json;

use crate::SharedState;

pub async fn root() -> &'static str {
    "gitlab_irc_notify is running"
}

/// Returns server info, the routed channels and request counters
pub async fn status(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let routing = state.dispatcher.routing();

    Json(json!({
        "server": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "routing": {
            "default": routing.default,
            "groups": routing.groups.len(),
            "explicit": routing.explicit.len(),
            "channels": routing.all_channels(),
        },
        "events": state.stats.snapshot(),
    }))
}
