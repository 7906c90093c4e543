//! Review state machine — applying a moderator's decision to a row.
//!
//! A decision message carries no row of its own; the target is recovered by
//! fetching the replied-to prompt and parsing the row index back out of its
//! text (see [`crate::review::retrieval`]).

use tracing::{debug, info, warn};

use crate::adapters::{FeedPublisher, Messenger, RowStore};
use crate::review::retrieval::parse_prompt;
use crate::review::ReviewError;
use crate::scheduler::{format_label, SlotScheduler};
use crate::types::{ReviewStatus, ScheduledSlot};

/// What a decision message amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The message was not a reply; there is no target row. Silently
    /// ignored — indistinguishable from casual conversation.
    NotAReply,
    /// The row was marked rejected.
    Rejected {
        /// The decided row.
        row_index: u64,
    },
    /// The row was marked approved and a post was scheduled.
    Approved {
        /// The decided row.
        row_index: u64,
        /// The slot the post was scheduled into.
        slot: ScheduledSlot,
    },
}

/// Apply a moderator's approve/reject decision.
///
/// The status write is unconditional: the row is not checked to still be
/// unreviewed first, so a second decision on the same prompt overwrites the
/// first, and a second approval schedules a duplicate post. Ported behavior,
/// kept observable (see `DESIGN.md`).
///
/// On approval the slot assignment and the scheduled-post creation happen
/// after the status write; a failure there leaves the row marked approved
/// with no scheduled post. The write is never rolled back.
pub async fn handle_decision(
    store: &dyn RowStore,
    messenger: &dyn Messenger,
    feed: &dyn FeedPublisher,
    scheduler: &SlotScheduler,
    reply_to: Option<&str>,
    moderator: &str,
    approve: bool,
) -> Result<DecisionOutcome, ReviewError> {
    let Some(message_id) = reply_to else {
        debug!(moderator, "decision without a reply target, ignoring");
        return Ok(DecisionOutcome::NotAReply);
    };

    let prompt = messenger.fetch_text(message_id).await?;
    let (row_index, text) = parse_prompt(&prompt)?;

    let status = if approve {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Rejected
    };
    store.write_status(row_index, status.marker()).await?;

    if !approve {
        info!(row_index, moderator, "submission rejected");
        confirm(messenger, moderator, &format!("Row {row_index} rejected.")).await;
        return Ok(DecisionOutcome::Rejected { row_index });
    }

    let slot = scheduler.next_slot().await?;
    let label = format_label(scheduler.label_prefix(), slot.sequence_id, &text);
    feed.create_scheduled(&label, slot.publish_at).await?;

    info!(
        row_index,
        moderator,
        sequence_id = slot.sequence_id,
        publish_at = %slot.publish_at,
        "submission approved and scheduled"
    );
    confirm(
        messenger,
        moderator,
        &format!(
            "Row {row_index} approved. Scheduled {}{} for {}.",
            scheduler.label_prefix(),
            slot.sequence_id,
            slot.publish_at.format("%Y-%m-%d %H:%M UTC")
        ),
    )
    .await;
    Ok(DecisionOutcome::Approved { row_index, slot })
}

/// Best-effort confirmation back to the moderator. A failed send is logged
/// and dropped: the decision already took effect.
async fn confirm(messenger: &dyn Messenger, moderator: &str, text: &str) {
    if let Err(e) = messenger.send(moderator, text).await {
        warn!(error = %e, moderator, "failed to send confirmation");
    }
}
