//! HTTP API endpoints for publishing and inspecting the hub.

use axum::{extract::State, http::StatusCode, Form, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::HubError;
use crate::state::AppState;
use crate::types::{DispatchMode, SubscriberInfo};

/// Form body of a publish request
#[derive(Debug, Deserialize)]
pub struct PublishForm {
    #[serde(default)]
    pub msg: String,
}

/// Broadcast a message to every connected subscriber.
///
/// POST /broadcast (form field `msg`)
///
/// The status reflects request handling, not delivery: an empty message is
/// ignored and still answered with 200.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PublishForm>,
) -> StatusCode {
    match state.hub.broadcast(&form.msg).await {
        Ok(report) => {
            tracing::info!(
                delivered = report.delivered,
                len = form.msg.len(),
                "Broadcast message"
            );
            StatusCode::OK
        }
        Err(HubError::EmptyMessage) => {
            tracing::info!("Empty message received");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!("Broadcast failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Response structure for the subscriber listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribersResponse {
    /// Tracked entries, including closed ones awaiting eviction
    pub count: usize,
    pub dispatch: DispatchMode,
    pub started_at: DateTime<Utc>,
    pub subscribers: Vec<SubscriberInfo>,
}

/// List tracked subscribers.
///
/// GET /api/subscribers
pub async fn list_subscribers(
    State(state): State<Arc<AppState>>,
) -> Json<SubscribersResponse> {
    let subscribers = state.hub.subscribers().await;

    Json(SubscribersResponse {
        count: subscribers.len(),
        dispatch: state.hub.mode(),
        started_at: state.started_at,
        subscribers,
    })
}
