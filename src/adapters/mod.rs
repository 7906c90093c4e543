//! Adapters — narrow capability interfaces over the external services.
//!
//! Each external collaborator sits behind a trait the core consumes:
//! [`RowStore`] (spreadsheet rows and their status markers), [`Messenger`]
//! (moderator chat), and [`FeedPublisher`] (public page feed). One long-lived
//! authenticated instance per service is constructed at startup and injected
//! into the pipeline; retry, backoff, and circuit-breaking can be layered on
//! behind these traits without touching core logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{FeedPost, StatusMarker, SubmissionRow};

pub mod graph;
pub mod sheets;

/// Adapter transport errors.
///
/// Anything in here is a `TransportError` to the core: logged, propagated to
/// the operation boundary, never retried in-core.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The remote API returned an error response.
    #[error("API error: {0}")]
    Api(String),
    /// HTTP transport error (network, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Response deserialization failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Response timestamp could not be parsed.
    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,
}

/// Row store — a range-readable sequence of submission rows with a
/// writable visual status marker per row.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read one page of rows starting at `start_row` (1-based), in row
    /// order. Restartable and finite; an empty range yields an empty vec.
    async fn read_range(&self, start_row: u64) -> Result<Vec<SubmissionRow>, AdapterError>;

    /// Overwrite the status marker of `row_index`.
    async fn write_status(
        &self,
        row_index: u64,
        marker: StatusMarker,
    ) -> Result<(), AdapterError>;
}

/// Messaging transport to and from moderators.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message to a recipient. Fire-and-forget: the core does
    /// not need the outbound message id.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AdapterError>;

    /// Fetch the text of a previously sent message by its id.
    ///
    /// # Errors
    ///
    /// [`AdapterError::NotFound`] if the platform no longer knows the id.
    async fn fetch_text(&self, message_id: &str) -> Result<String, AdapterError>;
}

/// Public feed — scheduled and published posts.
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    /// List currently scheduled posts with their creation timestamps.
    async fn list_scheduled(&self) -> Result<Vec<FeedPost>, AdapterError>;

    /// List up to `limit` recently published posts.
    async fn list_published(&self, limit: u32) -> Result<Vec<FeedPost>, AdapterError>;

    /// Create a post scheduled to publish at `publish_at`.
    async fn create_scheduled(
        &self,
        label: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<(), AdapterError>;
}
