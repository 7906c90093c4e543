//! The moderation pipeline — command dispatch over the injected adapters.
//!
//! One [`ModerationPipeline`] instance serves the whole process. Each
//! inbound message is handled independently; the watermark tracker is the
//! only shared mutable state, and it is atomic. No ordering is imposed
//! between two replies deciding the same row: the last status write wins.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::adapters::{AdapterError, FeedPublisher, Messenger, RowStore};
use crate::scheduler::{SchedulerError, SlotScheduler};
use crate::types::InboundMessage;

pub mod commands;
pub mod decision;
pub mod retrieval;
pub mod watermark;

pub use commands::Command;
pub use decision::DecisionOutcome;
pub use watermark::WatermarkTracker;

/// Review pipeline errors.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The replied-to message does not carry a leading row index — the
    /// prompt/reply text protocol broke. Never guessed around.
    #[error("malformed prompt text: {text:?}")]
    MalformedPrompt {
        /// The offending message text.
        text: String,
    },
    /// An adapter call failed.
    #[error(transparent)]
    Transport(#[from] AdapterError),
    /// Slot assignment failed after the row was already marked approved.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// What handling one inbound message amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command (or the reserved `manual` command); nothing done.
    Ignored,
    /// A retrieval pass ran and sent this many prompts.
    Prompted {
        /// Number of prompts sent (0 means the no-new-submissions notice
        /// went out instead).
        sent: usize,
    },
    /// A decision was processed.
    Decided(DecisionOutcome),
}

/// The moderation pipeline.
///
/// Holds one long-lived instance of each adapter plus the watermark, and
/// routes normalized moderator commands to retrieval or decision handling.
pub struct ModerationPipeline {
    store: Arc<dyn RowStore>,
    messenger: Arc<dyn Messenger>,
    feed: Arc<dyn FeedPublisher>,
    scheduler: SlotScheduler,
    watermark: WatermarkTracker,
    review_window: u64,
}

impl ModerationPipeline {
    /// Assemble the pipeline from its collaborators.
    pub fn new(
        store: Arc<dyn RowStore>,
        messenger: Arc<dyn Messenger>,
        feed: Arc<dyn FeedPublisher>,
        scheduler: SlotScheduler,
        watermark: WatermarkTracker,
        review_window: u64,
    ) -> Self {
        Self {
            store,
            messenger,
            feed,
            scheduler,
            watermark,
            review_window,
        }
    }

    /// The watermark tracker (exposed for observability).
    pub fn watermark(&self) -> &WatermarkTracker {
        &self.watermark
    }

    /// Handle one inbound moderator message.
    ///
    /// Transport and protocol failures stop this message only; the caller
    /// logs them and moves on to the next event.
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<Outcome, ReviewError> {
        let Some(text) = message.text.as_deref() else {
            return Ok(Outcome::Ignored);
        };

        match Command::parse(text) {
            Command::CheckLatest => {
                let start = self.watermark.current();
                self.run_retrieval(&message.sender, start).await
            }
            Command::CheckUnread => {
                // Bounded lookback below the watermark, clamped off row 0.
                let start = self
                    .watermark
                    .current()
                    .saturating_sub(self.review_window)
                    .max(1);
                self.run_retrieval(&message.sender, start).await
            }
            Command::Approve => self.run_decision(message, true).await,
            Command::Reject => self.run_decision(message, false).await,
            Command::Manual | Command::Other => {
                debug!(event_id = %message.event_id, "message is not a command, ignoring");
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn run_retrieval(&self, recipient: &str, start_row: u64) -> Result<Outcome, ReviewError> {
        let sent = retrieval::fetch_unreviewed(
            self.store.as_ref(),
            self.messenger.as_ref(),
            &self.watermark,
            recipient,
            start_row,
        )
        .await?;
        Ok(Outcome::Prompted { sent })
    }

    async fn run_decision(
        &self,
        message: &InboundMessage,
        approve: bool,
    ) -> Result<Outcome, ReviewError> {
        let outcome = decision::handle_decision(
            self.store.as_ref(),
            self.messenger.as_ref(),
            self.feed.as_ref(),
            &self.scheduler,
            message.reply_to.as_deref(),
            &message.sender,
            approve,
        )
        .await?;
        Ok(Outcome::Decided(outcome))
    }
}
