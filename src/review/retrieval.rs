//! Submission retrieval — scanning the row store and prompting moderators.
//!
//! Also owns the prompt wire format. A moderator decision is correlated to
//! its row by parsing the text of the message the moderator replied to, so
//! [`format_prompt`] and [`parse_prompt`] are two ends of one protocol and
//! must stay in lockstep. There is no correlation id on the platform; the
//! row index rides in the message text itself.

use tracing::{debug, info};

use crate::adapters::{Messenger, RowStore};
use crate::review::watermark::WatermarkTracker;
use crate::review::ReviewError;

/// Notice sent when a scan finds no rows at all.
pub const NO_NEW_SUBMISSIONS_NOTICE: &str = "No new submissions!";

/// Compose the outbound prompt for one submission row.
///
/// Format: the row index as a leading token, one space, then the raw
/// submission text. [`parse_prompt`] is the inverse.
pub fn format_prompt(row_index: u64, text: &str) -> String {
    format!("{row_index} {text}")
}

/// Recover `(row_index, text)` from a prompt produced by [`format_prompt`].
///
/// # Errors
///
/// [`ReviewError::MalformedPrompt`] when the text has no leading integer
/// token — the reply targeted a message this system never produced.
pub fn parse_prompt(prompt: &str) -> Result<(u64, String), ReviewError> {
    let malformed = || ReviewError::MalformedPrompt {
        text: prompt.to_string(),
    };
    let (head, rest) = prompt.split_once(' ').ok_or_else(malformed)?;
    let row_index: u64 = head.parse().map_err(|_| malformed())?;
    Ok((row_index, rest.to_string()))
}

/// Scan forward from `start_row` and prompt `recipient` with every row
/// still unreviewed. Returns the number of prompts sent.
///
/// Rows already decided are passed over silently; an empty scan sends a
/// single [`NO_NEW_SUBMISSIONS_NOTICE`] instead. The watermark advances by
/// the scanned count after any successful scan, even one where every row
/// was already reviewed: it records "we looked", not "we found something".
/// A row store failure propagates without advancing the watermark, so the
/// rows are re-surfaced next time.
pub async fn fetch_unreviewed(
    store: &dyn RowStore,
    messenger: &dyn Messenger,
    watermark: &WatermarkTracker,
    recipient: &str,
    start_row: u64,
) -> Result<usize, ReviewError> {
    let start_row = start_row.max(1);
    let rows = store.read_range(start_row).await?;

    if rows.is_empty() {
        debug!(start_row, "scan found no rows");
        messenger.send(recipient, NO_NEW_SUBMISSIONS_NOTICE).await?;
        watermark.advance(start_row, 0);
        return Ok(0);
    }

    let mut sent: usize = 0;
    for row in &rows {
        if row.is_unreviewed() {
            messenger
                .send(recipient, &format_prompt(row.row_index, &row.text))
                .await?;
            sent = sent.saturating_add(1);
        }
    }

    let scanned = u64::try_from(rows.len()).unwrap_or(u64::MAX);
    let new_watermark = watermark.advance(start_row, scanned);
    info!(
        start_row,
        scanned,
        sent,
        new_watermark,
        "retrieval pass complete"
    );
    Ok(sent)
}
