//! Webhook surface — the HTTP endpoint events arrive through.
//!
//! Two routes on one path: `GET /webhook` answers the platform's
//! subscription handshake, `POST /webhook` takes signed page-event batches,
//! peels out the messaging events, and hands each one to the moderation
//! pipeline on its own task. A failed event never takes the process down;
//! it is logged and the next event proceeds independently.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::review::ModerationPipeline;
use crate::types::InboundMessage;

pub mod signature;

// ---------------------------------------------------------------------------
// Webhook payload types (minimal subset)
// ---------------------------------------------------------------------------

/// A page-subscription delivery: one or more entries, batched.
#[derive(Debug, Deserialize)]
struct PageEvent {
    object: String,
    #[serde(default)]
    entry: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    messaging: Vec<MessagingEvent>,
}

/// One messaging event within an entry.
#[derive(Debug, Deserialize)]
struct MessagingEvent {
    sender: Participant,
    timestamp: Option<i64>,
    message: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct Participant {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    text: Option<String>,
    reply_to: Option<ReplyTo>,
}

#[derive(Debug, Deserialize)]
struct ReplyTo {
    mid: String,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a messaging event into an [`InboundMessage`].
///
/// Returns `None` for event types without a message payload (delivery
/// receipts, read markers, and the like).
fn normalize_event(event: MessagingEvent) -> Option<InboundMessage> {
    let message = event.message?;
    let timestamp = event
        .timestamp
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    Some(InboundMessage {
        event_id: Uuid::new_v4(),
        sender: event.sender.id,
        text: message.text,
        reply_to: message.reply_to.map(|r| r.mid),
        timestamp,
    })
}

/// Answer the subscription handshake: the challenge to echo, if the
/// request is a valid subscribe with the right token.
fn handshake(validation_token: &str, params: &HashMap<String, String>) -> Option<String> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    if mode == Some("subscribe") && token == Some(validation_token) {
        Some(params.get("hub.challenge").cloned().unwrap_or_default())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Shared state for the webhook handlers.
pub struct WebhookState {
    /// The moderation pipeline events dispatch into.
    pub pipeline: Arc<ModerationPipeline>,
    /// HMAC key for delivery signatures.
    pub app_secret: String,
    /// Token expected during the subscription handshake.
    pub validation_token: String,
}

/// Build the webhook router.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription).post(receive_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /webhook` — subscription handshake.
async fn verify_subscription(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match handshake(&state.validation_token, &params) {
        Some(challenge) => {
            info!("validating webhook subscription");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("failed webhook validation, tokens do not match");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// `POST /webhook` — signed page-event intake.
async fn receive_event(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided = headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !signature::verify(&state.app_secret, provided, &body) {
        warn!("rejected delivery with missing or invalid signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    let event: PageEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if event.object != "page" {
        return StatusCode::NOT_FOUND.into_response();
    }

    for entry in event.entry {
        for messaging in entry.messaging {
            let Some(inbound) = normalize_event(messaging) else {
                debug!("skipping messaging event without a message payload");
                continue;
            };
            let pipeline = Arc::clone(&state.pipeline);
            tokio::spawn(async move {
                match pipeline.handle_message(&inbound).await {
                    Ok(outcome) => {
                        debug!(event_id = %inbound.event_id, ?outcome, "event handled");
                    }
                    Err(e) => {
                        error!(event_id = %inbound.event_id, error = %e, "event handling failed");
                    }
                }
            });
        }
    }

    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
