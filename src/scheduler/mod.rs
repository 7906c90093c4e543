//! Slot scheduler — computing the next publication slot and sequence id.
//!
//! The feed itself is the source of truth for cadence: the most recently
//! created scheduled post (or, when nothing is scheduled, the most recently
//! published one) anchors both the next timestamp and the next sequential
//! public label. Nothing about past assignments is stored locally.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::adapters::{AdapterError, FeedPublisher};
use crate::config::FeedConfig;
use crate::types::{FeedPost, ScheduledSlot};

/// Slot scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Neither a scheduled nor a published post exists to anchor on. The
    /// feed needs manual seeding before the scheduler can run.
    #[error("no scheduled or published reference post")]
    NoReferencePost,
    /// The reference post's label does not match the public format. Failing
    /// loudly beats guessing a sequence number.
    #[error("malformed reference label: {label:?}")]
    MalformedLabel {
        /// The label that failed to parse.
        label: String,
    },
    /// Adding the interval pushed the timestamp out of representable range.
    #[error("computed publish time out of range")]
    TimeOutOfRange,
    /// A feed adapter call failed.
    #[error(transparent)]
    Transport(#[from] AdapterError),
}

/// Posting cadence settings, extracted from the feed configuration.
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Public label prefix, e.g. `"Post #"`.
    pub label_prefix: String,
    /// Hours between consecutive scheduled posts.
    pub page_interval_hours: u32,
    /// Hour-of-day used after a day-boundary rollover.
    pub page_start_hour: u32,
    /// Published-posts lookback when nothing is scheduled.
    pub published_lookback: u32,
}

impl From<&FeedConfig> for CadenceConfig {
    fn from(feed: &FeedConfig) -> Self {
        Self {
            label_prefix: feed.label_prefix.clone(),
            page_interval_hours: feed.page_interval_hours,
            page_start_hour: feed.page_start_hour,
            published_lookback: feed.published_lookback,
        }
    }
}

// ---------------------------------------------------------------------------
// Label format
// ---------------------------------------------------------------------------

/// Compose the public label: `"<prefix><sequence_id>: <text>"`.
///
/// [`parse_label`] is the inverse; the two are the ends of one protocol,
/// like the prompt format in [`crate::review::retrieval`].
pub fn format_label(prefix: &str, sequence_id: u64, text: &str) -> String {
    format!("{prefix}{sequence_id}: {text}")
}

/// Extract the sequence id from a label produced by [`format_label`].
///
/// # Errors
///
/// [`SchedulerError::MalformedLabel`] when the label lacks the prefix, the
/// integer, or the `:` separator.
pub fn parse_label(prefix: &str, label: &str) -> Result<u64, SchedulerError> {
    let malformed = || SchedulerError::MalformedLabel {
        label: label.to_string(),
    };
    let rest = label.strip_prefix(prefix).ok_or_else(malformed)?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, tail) = rest.split_at(digits_end);
    if digits.is_empty() || !tail.starts_with(':') {
        return Err(malformed());
    }
    digits.parse().map_err(|_| malformed())
}

// ---------------------------------------------------------------------------
// Slot computation
// ---------------------------------------------------------------------------

/// Advance `base` by the posting interval, rolling forward to `start_hour`
/// when the interval crosses a calendar day.
///
/// The day comparison and the hour override happen in `base`'s own time
/// zone; mixing zones here would misplace the midnight boundary. Minutes
/// and seconds carry over unchanged on a rollover — only the hour is
/// overridden, which keeps early-morning low-visibility slots off the
/// schedule without collapsing distinct slots onto one instant.
pub fn compute_slot<Tz: TimeZone>(
    base: DateTime<Tz>,
    interval_hours: u32,
    start_hour: u32,
) -> Result<DateTime<Tz>, SchedulerError> {
    let candidate = base
        .clone()
        .checked_add_signed(Duration::hours(i64::from(interval_hours)))
        .ok_or(SchedulerError::TimeOutOfRange)?;

    if candidate.date_naive() == base.date_naive() {
        return Ok(candidate);
    }
    candidate
        .with_hour(start_hour)
        .ok_or(SchedulerError::TimeOutOfRange)
}

/// The newest post by creation timestamp.
fn latest_post(posts: Vec<FeedPost>) -> Option<FeedPost> {
    posts.into_iter().max_by_key(|post| post.timestamp)
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Computes `(publish_at, sequence_id)` pairs for approved submissions.
///
/// Two approvals racing through [`SlotScheduler::next_slot`] concurrently
/// can observe the same reference post and compute the same slot; the
/// read-reference-then-create window is not serialized. Ported behavior,
/// flagged in `DESIGN.md`.
pub struct SlotScheduler {
    feed: Arc<dyn FeedPublisher>,
    config: CadenceConfig,
}

impl SlotScheduler {
    /// Create a scheduler over the feed adapter.
    pub fn new(feed: Arc<dyn FeedPublisher>, config: CadenceConfig) -> Self {
        Self { feed, config }
    }

    /// The configured public label prefix.
    pub fn label_prefix(&self) -> &str {
        &self.config.label_prefix
    }

    /// Compute the next publication slot, anchored on the current wall
    /// clock in the local zone.
    pub async fn next_slot(&self) -> Result<ScheduledSlot, SchedulerError> {
        self.next_slot_from(Local::now()).await
    }

    /// Clock-injected variant of [`SlotScheduler::next_slot`]: `now` fixes
    /// both the lower bound of the slot and the zone of the day-boundary
    /// rule.
    pub async fn next_slot_from<Tz: TimeZone>(
        &self,
        now: DateTime<Tz>,
    ) -> Result<ScheduledSlot, SchedulerError> {
        let reference = self.reference_post().await?;
        let last_sequence = parse_label(&self.config.label_prefix, &reference.label)?;

        let reference_at = reference.timestamp.with_timezone(&now.timezone());
        let base = if reference_at > now { reference_at } else { now };
        let publish_at = compute_slot(
            base,
            self.config.page_interval_hours,
            self.config.page_start_hour,
        )?
        .with_timezone(&Utc);

        debug!(
            reference = %reference.label,
            last_sequence,
            %publish_at,
            "computed next slot"
        );
        Ok(ScheduledSlot {
            publish_at,
            sequence_id: last_sequence.saturating_add(1),
        })
    }

    /// Pick the anchor post: newest scheduled post, else newest published
    /// post within the lookback.
    async fn reference_post(&self) -> Result<FeedPost, SchedulerError> {
        let scheduled = self.feed.list_scheduled().await?;
        if let Some(post) = latest_post(scheduled) {
            return Ok(post);
        }
        let published = self
            .feed
            .list_published(self.config.published_lookback)
            .await?;
        latest_post(published).ok_or(SchedulerError::NoReferencePost)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
