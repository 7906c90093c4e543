//! Greenroom — a submission moderation bot.
//!
//! Anonymous text submissions collected in a spreadsheet are relayed over
//! Messenger to human moderators, who approve or reject each one by replying
//! to the prompt. Approved submissions are scheduled for automatic
//! publication to a public page feed at a computed cadence.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod types;

pub mod adapters;

pub mod review;
pub mod scheduler;

pub mod webhook;
