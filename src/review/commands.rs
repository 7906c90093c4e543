//! The moderator command surface.
//!
//! Inbound text is normalized (punctuation stripped, trimmed, lowercased)
//! and matched against a fixed command set. Anything unmatched is ignored:
//! moderators also hold normal conversations in the same thread.

use std::sync::LazyLock;

use regex::Regex;

/// Everything that is not a word character or whitespace.
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static pattern"));

/// A recognized moderator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `check` — surface rows newer than the watermark.
    CheckLatest,
    /// `check unread` — re-surface the recent lookback window.
    CheckUnread,
    /// `yes` as a reply — approve the prompted row.
    Approve,
    /// `no` as a reply — reject the prompted row.
    Reject,
    /// `manual` — recognized and deliberately ignored (reserved).
    Manual,
    /// Anything else — not a command.
    Other,
}

impl Command {
    /// Match normalized message text against the command set.
    pub fn parse(text: &str) -> Self {
        match normalize(text).as_str() {
            "check" => Command::CheckLatest,
            "check unread" => Command::CheckUnread,
            "yes" => Command::Approve,
            "no" => Command::Reject,
            "manual" => Command::Manual,
            _ => Command::Other,
        }
    }
}

/// Strip punctuation, trim, lowercase.
pub fn normalize(text: &str) -> String {
    PUNCTUATION.replace_all(text, "").trim().to_lowercase()
}
