//! Core types shared across the moderation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review state of a single submission row.
///
/// Transitions `Unreviewed -> Approved` or `Unreviewed -> Rejected` exactly
/// once under normal operation. The store itself allows re-decision; the
/// pipeline does not guard against it (last writer wins, see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    /// Not yet surfaced to a moderator, or surfaced but undecided.
    Unreviewed,
    /// Approved by a moderator — scheduled for publication.
    Approved,
    /// Rejected by a moderator — will never be published.
    Rejected,
}

/// Visual status marker as stored in the row store.
///
/// The spreadsheet has no enum column; review state is encoded as the row's
/// background color. [`ReviewStatus::marker`] and [`ReviewStatus::from_marker`]
/// are the single fixed lookup between the two representations — the core
/// never interprets colors anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusMarker {
    /// Red channel, 0-255.
    pub red: u8,
    /// Green channel, 0-255.
    pub green: u8,
    /// Blue channel, 0-255.
    pub blue: u8,
}

/// White — a row the form wrote and nobody has touched.
pub const MARKER_UNREVIEWED: StatusMarker = StatusMarker {
    red: 255,
    green: 255,
    blue: 255,
};

/// Gray — approved and handed to the feed scheduler.
pub const MARKER_APPROVED: StatusMarker = StatusMarker {
    red: 153,
    green: 153,
    blue: 153,
};

/// Pale yellow — rejected, never to be published.
pub const MARKER_REJECTED: StatusMarker = StatusMarker {
    red: 255,
    green: 242,
    blue: 204,
};

impl ReviewStatus {
    /// The marker written to the store for this status.
    pub fn marker(self) -> StatusMarker {
        match self {
            ReviewStatus::Unreviewed => MARKER_UNREVIEWED,
            ReviewStatus::Approved => MARKER_APPROVED,
            ReviewStatus::Rejected => MARKER_REJECTED,
        }
    }

    /// Decode a marker back into a status.
    ///
    /// Returns `None` for colors outside the fixed lookup — e.g. a row a
    /// human hand-colored in the sheet. Callers treat unknown markers as
    /// "already handled", never as unreviewed.
    pub fn from_marker(marker: StatusMarker) -> Option<Self> {
        match marker {
            MARKER_UNREVIEWED => Some(ReviewStatus::Unreviewed),
            MARKER_APPROVED => Some(ReviewStatus::Approved),
            MARKER_REJECTED => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

/// One submission row read from the row store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    /// 1-based row index — the submission's identity.
    pub row_index: u64,
    /// Raw submitted text.
    pub text: String,
    /// Visual status marker as currently stored.
    pub marker: StatusMarker,
}

impl SubmissionRow {
    /// Whether this row still awaits a moderator decision.
    pub fn is_unreviewed(&self) -> bool {
        ReviewStatus::from_marker(self.marker) == Some(ReviewStatus::Unreviewed)
    }
}

/// A post returned by the feed adapter's listing calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPost {
    /// Public label text, `"<prefix><integer>: <text>"` for posts this
    /// system created.
    pub label: String,
    /// Creation timestamp as reported by the feed.
    pub timestamp: DateTime<Utc>,
}

/// A publication slot assigned to an approved submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSlot {
    /// When the post goes live. Strictly after "now" and after the
    /// reference post considered at assignment time.
    pub publish_at: DateTime<Utc>,
    /// Sequential public identifier, one past the reference post's.
    pub sequence_id: u64,
}

/// A normalized inbound moderator message from the webhook surface.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Synthetic id for trace correlation across the event's task.
    pub event_id: Uuid,
    /// Platform id of the sender (the moderator).
    pub sender: String,
    /// Message text, if any.
    pub text: Option<String>,
    /// Message id this message replies to, if it is a reply.
    pub reply_to: Option<String>,
    /// When the platform timestamped the event.
    pub timestamp: DateTime<Utc>,
}
