//! Facebook Graph API adapters — moderator messaging and the page feed.
//!
//! Two separate authenticated sessions, as the platform requires: the Send
//! API uses a message-scoped page token ([`GraphMessenger`]), feed listing
//! and scheduled-post creation use the page token ([`GraphFeed`]). Each
//! struct holds its token for the process lifetime.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::adapters::{AdapterError, FeedPublisher, Messenger};
use crate::types::FeedPost;

/// Base URL for the Graph API.
const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Timestamp format the Graph API emits, e.g. `2024-03-10T22:00:00+0000`.
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

// ---------------------------------------------------------------------------
// Graph API types (minimal subset)
// ---------------------------------------------------------------------------

/// Error envelope returned in failing response bodies.
#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: String,
}

/// `GET /<message_id>?fields=message,from` response.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

/// Post listing response (`/scheduled_posts`, `/feed`).
#[derive(Debug, Default, Deserialize)]
struct PostList {
    #[serde(default)]
    data: Vec<PostEntry>,
}

#[derive(Debug, Deserialize)]
struct PostEntry {
    message: Option<String>,
    created_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Parse a Graph timestamp into UTC.
fn parse_graph_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT)?.with_timezone(&Utc))
}

/// Turn a non-success response into an [`AdapterError::Api`] carrying the
/// Graph error message when the body has one.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorEnvelope>(&body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));
    Err(AdapterError::Api(message))
}

/// Convert listed post entries into [`FeedPost`]s.
///
/// Entries missing either the message or the timestamp are dropped — they
/// cannot anchor scheduling.
fn posts_from_list(list: PostList) -> Result<Vec<FeedPost>, AdapterError> {
    let mut posts = Vec::with_capacity(list.data.len());
    for entry in list.data {
        let (Some(label), Some(raw_time)) = (entry.message, entry.created_time) else {
            continue;
        };
        posts.push(FeedPost {
            label,
            timestamp: parse_graph_time(&raw_time)?,
        });
    }
    Ok(posts)
}

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

/// Send API implementation of [`Messenger`].
pub struct GraphMessenger {
    client: reqwest::Client,
    access_token: String,
}

impl GraphMessenger {
    /// Create a messenger over an existing HTTP client.
    pub fn new(client: reqwest::Client, access_token: String) -> Self {
        Self {
            client,
            access_token,
        }
    }
}

#[async_trait::async_trait]
impl Messenger for GraphMessenger {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AdapterError> {
        let body = serde_json::json!({
            "recipient": { "id": recipient },
            "message": { "text": text },
        });

        let resp = self
            .client
            .post(format!("{GRAPH_API_BASE}/me/messages"))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;

        debug!(recipient, "sent message");
        Ok(())
    }

    async fn fetch_text(&self, message_id: &str) -> Result<String, AdapterError> {
        let resp = self
            .client
            .get(format!("{GRAPH_API_BASE}/{message_id}"))
            .query(&[
                ("fields", "message,from"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound);
        }
        let resp = check_status(resp).await?;

        let body: MessageResponse = resp.json().await?;
        body.message.ok_or(AdapterError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Page feed implementation of [`FeedPublisher`].
pub struct GraphFeed {
    client: reqwest::Client,
    page_id: String,
    access_token: String,
}

impl GraphFeed {
    /// Create a feed publisher over an existing HTTP client.
    pub fn new(client: reqwest::Client, page_id: String, access_token: String) -> Self {
        Self {
            client,
            page_id,
            access_token,
        }
    }
}

#[async_trait::async_trait]
impl FeedPublisher for GraphFeed {
    async fn list_scheduled(&self) -> Result<Vec<FeedPost>, AdapterError> {
        let resp = self
            .client
            .get(format!(
                "{GRAPH_API_BASE}/{}/scheduled_posts",
                self.page_id
            ))
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        posts_from_list(resp.json().await?)
    }

    async fn list_published(&self, limit: u32) -> Result<Vec<FeedPost>, AdapterError> {
        let resp = self
            .client
            .get(format!("{GRAPH_API_BASE}/{}/feed", self.page_id))
            .query(&[
                ("limit", limit.to_string().as_str()),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        posts_from_list(resp.json().await?)
    }

    async fn create_scheduled(
        &self,
        label: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<(), AdapterError> {
        let body = serde_json::json!({
            "message": label,
            "published": false,
            "scheduled_publish_time": publish_at.timestamp(),
        });

        let resp = self
            .client
            .post(format!("{GRAPH_API_BASE}/{}/feed", self.page_id))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;

        debug!(label, %publish_at, "created scheduled post");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
