//! Webhook handler for GitLab events

use axum::{
    Json,
    body::Bytes,
    extract::Query,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::SharedState;
use crate::dispatch::{DispatchReport, MessageBatch, Outcome};
use crate::events::EVENT_HEADER;

/// Rendered lines returned in dry-run mode instead of being delivered
#[derive(Debug, Serialize)]
pub struct DryRunResponse {
    pub request_id: Uuid,
    pub event: String,
    pub messages: Vec<DryRunMessage>,
}

#[derive(Debug, Serialize)]
pub struct DryRunMessage {
    pub channels: Vec<String>,
    pub text: String,
}

/// Handles the GitLab webhook POST request.
pub async fn handle_notify(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::now_v7();
    let span = info_span!("notify", request_id = %request_id);

    async move {
        let dry_run = params.get("dry_run").map(|v| v == "true").unwrap_or(false)
            || headers.get("X-Dry-Run").is_some();
        let label = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());

        state.stats.record_received();

        if dry_run {
            return match state.dispatcher.prepare(label, &body) {
                Ok(Outcome::Rendered(batch)) => {
                    info!("[DRY_RUN] Rendered {} lines", batch.messages.len());
                    Json(dry_run_response(&state, request_id, &batch)).into_response()
                }
                Ok(Outcome::Dropped(reason)) => {
                    debug!("[DRY_RUN] Dropped: {:?}", reason);
                    state.stats.record_dropped();
                    StatusCode::NO_CONTENT.into_response()
                }
                Err(e) => {
                    warn!("[DRY_RUN] Rejecting webhook: {}", e);
                    state.stats.record_malformed();
                    StatusCode::BAD_REQUEST.into_response()
                }
            };
        }

        match state
            .dispatcher
            .dispatch(label, &body, state.sink.as_ref())
            .await
        {
            Ok(DispatchReport::Delivered { batch, report }) => {
                info!(
                    "Delivered {} {} lines for {} ({} deliveries, {} failed)",
                    batch.messages.len(),
                    batch.kind.as_str(),
                    batch.project,
                    report.delivered,
                    report.failed
                );
                state.stats.record_delivered(report.delivered);
                StatusCode::OK.into_response()
            }
            Ok(DispatchReport::Dropped(reason)) => {
                debug!("Dropped: {:?}", reason);
                state.stats.record_dropped();
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => {
                warn!("Rejecting webhook: {}", e);
                state.stats.record_malformed();
                StatusCode::BAD_REQUEST.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn dry_run_response(state: &SharedState, request_id: Uuid, batch: &MessageBatch) -> DryRunResponse {
    DryRunResponse {
        request_id,
        event: batch.kind.as_str().to_string(),
        messages: batch
            .messages
            .iter()
            .map(|message| DryRunMessage {
                channels: state.dispatcher.resolve(message).to_vec(),
                text: message.text.clone(),
            })
            .collect(),
    }
}
