//! End-to-end pipeline tests over in-memory adapters.
//!
//! Everything a moderator can do — checking for submissions, approving,
//! rejecting, replying to the wrong thing — driven through
//! [`ModerationPipeline::handle_message`] exactly as the webhook surface
//! drives it, with recording fakes standing in for the external services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use greenroom::adapters::{AdapterError, FeedPublisher, Messenger, RowStore};
use greenroom::review::{
    retrieval, DecisionOutcome, ModerationPipeline, Outcome, ReviewError, WatermarkTracker,
};
use greenroom::scheduler::{CadenceConfig, SchedulerError, SlotScheduler};
use greenroom::types::{
    FeedPost, InboundMessage, StatusMarker, SubmissionRow, MARKER_APPROVED, MARKER_REJECTED,
    MARKER_UNREVIEWED,
};

// ---------------------------------------------------------------------------
// In-memory adapters
// ---------------------------------------------------------------------------

/// Row store over a fixed set of rows, recording every status write.
struct MemoryRowStore {
    rows: Vec<SubmissionRow>,
    writes: Mutex<Vec<(u64, StatusMarker)>>,
    fail_reads: AtomicBool,
}

impl MemoryRowStore {
    fn new(rows: Vec<SubmissionRow>) -> Self {
        Self {
            rows,
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
        }
    }

    fn writes(&self) -> Vec<(u64, StatusMarker)> {
        self.writes.lock().expect("writes lock").clone()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn read_range(&self, start_row: u64) -> Result<Vec<SubmissionRow>, AdapterError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(AdapterError::Api("sheets unavailable".to_string()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| row.row_index >= start_row)
            .cloned()
            .collect())
    }

    async fn write_status(
        &self,
        row_index: u64,
        marker: StatusMarker,
    ) -> Result<(), AdapterError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push((row_index, marker));
        Ok(())
    }
}

/// Messenger that records outbound sends and serves canned prompt lookups.
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    prompts: HashMap<String, String>,
}

impl RecordingMessenger {
    fn new(prompts: HashMap<String, String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            prompts,
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AdapterError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn fetch_text(&self, message_id: &str) -> Result<String, AdapterError> {
        self.prompts
            .get(message_id)
            .cloned()
            .ok_or(AdapterError::NotFound)
    }
}

/// Feed with fixed listings, recording scheduled-post creations.
struct MemoryFeed {
    scheduled: Vec<FeedPost>,
    published: Vec<FeedPost>,
    created: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl MemoryFeed {
    fn new(scheduled: Vec<FeedPost>, published: Vec<FeedPost>) -> Self {
        Self {
            scheduled,
            published,
            created: Mutex::new(Vec::new()),
        }
    }

    fn created(&self) -> Vec<(String, DateTime<Utc>)> {
        self.created.lock().expect("created lock").clone()
    }
}

#[async_trait]
impl FeedPublisher for MemoryFeed {
    async fn list_scheduled(&self) -> Result<Vec<FeedPost>, AdapterError> {
        Ok(self.scheduled.clone())
    }

    async fn list_published(&self, _limit: u32) -> Result<Vec<FeedPost>, AdapterError> {
        Ok(self.published.clone())
    }

    async fn create_scheduled(
        &self,
        label: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<(), AdapterError> {
        self.created
            .lock()
            .expect("created lock")
            .push((label.to_string(), publish_at));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryRowStore>,
    messenger: Arc<RecordingMessenger>,
    feed: Arc<MemoryFeed>,
    pipeline: ModerationPipeline,
}

fn row(row_index: u64, text: &str, marker: StatusMarker) -> SubmissionRow {
    SubmissionRow {
        row_index,
        text: text.to_string(),
        marker,
    }
}

fn post(label: &str, timestamp: DateTime<Utc>) -> FeedPost {
    FeedPost {
        label: label.to_string(),
        timestamp,
    }
}

fn past() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0)
        .single()
        .expect("valid date")
}

fn cadence() -> CadenceConfig {
    CadenceConfig {
        label_prefix: "Post #".to_string(),
        page_interval_hours: 2,
        page_start_hour: 11,
        published_lookback: 2,
    }
}

fn harness(
    baseline: u64,
    window: u64,
    rows: Vec<SubmissionRow>,
    prompts: HashMap<String, String>,
    scheduled: Vec<FeedPost>,
) -> Harness {
    let store = Arc::new(MemoryRowStore::new(rows));
    let messenger = Arc::new(RecordingMessenger::new(prompts));
    let feed = Arc::new(MemoryFeed::new(scheduled, Vec::new()));

    let store_dyn: Arc<dyn RowStore> = store.clone();
    let messenger_dyn: Arc<dyn Messenger> = messenger.clone();
    let feed_dyn: Arc<dyn FeedPublisher> = feed.clone();
    let scheduler = SlotScheduler::new(Arc::clone(&feed_dyn), cadence());
    let pipeline = ModerationPipeline::new(
        store_dyn,
        messenger_dyn,
        feed_dyn,
        scheduler,
        WatermarkTracker::new(baseline),
        window,
    );

    Harness {
        store,
        messenger,
        feed,
        pipeline,
    }
}

fn message(sender: &str, text: &str, reply_to: Option<&str>) -> InboundMessage {
    InboundMessage {
        event_id: Uuid::new_v4(),
        sender: sender.to_string(),
        text: Some(text.to_string()),
        reply_to: reply_to.map(str::to_string),
        timestamp: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn check_prompts_each_unreviewed_row_in_order() {
    let h = harness(
        10,
        400,
        vec![
            row(10, "first pending", MARKER_UNREVIEWED),
            row(11, "already approved", MARKER_APPROVED),
            row(12, "second pending", MARKER_UNREVIEWED),
            row(13, "already rejected", MARKER_REJECTED),
            row(14, "third pending", MARKER_UNREVIEWED),
        ],
        HashMap::new(),
        Vec::new(),
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "check", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 3 });
    let sent = h.messenger.sent();
    assert_eq!(
        sent,
        vec![
            ("mod-1".to_string(), "10 first pending".to_string()),
            ("mod-1".to_string(), "12 second pending".to_string()),
            ("mod-1".to_string(), "14 third pending".to_string()),
        ]
    );
    // Five rows scanned from row 10.
    assert_eq!(h.pipeline.watermark().current(), 15);
}

#[tokio::test]
async fn check_with_no_rows_sends_notice() {
    let h = harness(100, 400, Vec::new(), HashMap::new(), Vec::new());

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "check", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 0 });
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, retrieval::NO_NEW_SUBMISSIONS_NOTICE);
    assert_eq!(h.pipeline.watermark().current(), 100);
}

#[tokio::test]
async fn check_with_only_reviewed_rows_still_advances_watermark() {
    let h = harness(
        20,
        400,
        vec![
            row(20, "done", MARKER_APPROVED),
            row(21, "done too", MARKER_REJECTED),
        ],
        HashMap::new(),
        Vec::new(),
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "check", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 0 });
    assert!(h.messenger.sent().is_empty());
    // "We looked", so the watermark still moves past the scanned rows.
    assert_eq!(h.pipeline.watermark().current(), 22);
}

#[tokio::test]
async fn check_unread_looks_back_within_window() {
    let h = harness(
        50,
        10,
        vec![row(40, "missed earlier", MARKER_UNREVIEWED)],
        HashMap::new(),
        Vec::new(),
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "check unread", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 1 });
    assert_eq!(
        h.messenger.sent(),
        vec![("mod-1".to_string(), "40 missed earlier".to_string())]
    );
}

#[tokio::test]
async fn check_unread_clamps_lookback_to_row_one() {
    let h = harness(
        5,
        400,
        vec![row(1, "very first", MARKER_UNREVIEWED)],
        HashMap::new(),
        Vec::new(),
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "check unread", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 1 });
}

#[tokio::test]
async fn transport_failure_does_not_advance_watermark() {
    let h = harness(30, 400, Vec::new(), HashMap::new(), Vec::new());
    h.store.fail_reads.store(true, Ordering::Relaxed);

    let err = h
        .pipeline
        .handle_message(&message("mod-1", "check", None))
        .await
        .expect_err("read should fail");

    assert!(matches!(err, ReviewError::Transport(_)));
    assert_eq!(h.pipeline.watermark().current(), 30);
    assert!(h.messenger.sent().is_empty());
}

#[tokio::test]
async fn concurrent_retrieval_passes_leave_watermark_at_max() {
    // Two passes over rows 10..15 and 15..20 against one tracker; whatever
    // order they finish in, the watermark lands on 20.
    let store_low = MemoryRowStore::new(vec![
        row(10, "a", MARKER_UNREVIEWED),
        row(11, "b", MARKER_UNREVIEWED),
        row(12, "c", MARKER_UNREVIEWED),
        row(13, "d", MARKER_UNREVIEWED),
        row(14, "e", MARKER_UNREVIEWED),
    ]);
    let store_high = MemoryRowStore::new(vec![
        row(15, "f", MARKER_UNREVIEWED),
        row(16, "g", MARKER_UNREVIEWED),
        row(17, "h", MARKER_UNREVIEWED),
        row(18, "i", MARKER_UNREVIEWED),
        row(19, "j", MARKER_UNREVIEWED),
    ]);
    let messenger = RecordingMessenger::new(HashMap::new());
    let watermark = WatermarkTracker::new(1);

    let (low, high) = tokio::join!(
        retrieval::fetch_unreviewed(&store_low, &messenger, &watermark, "mod-1", 10),
        retrieval::fetch_unreviewed(&store_high, &messenger, &watermark, "mod-2", 15),
    );
    assert_eq!(low.expect("low pass"), 5);
    assert_eq!(high.expect("high pass"), 5);
    assert_eq!(watermark.current(), 20);
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

fn prompt_lookup() -> HashMap<String, String> {
    HashMap::from([(
        "m.prompt".to_string(),
        "21954 i fed the ducks during the lecture".to_string(),
    )])
}

#[tokio::test]
async fn approval_writes_status_and_schedules_post() {
    let h = harness(
        1,
        400,
        Vec::new(),
        prompt_lookup(),
        vec![post("Post #41: older submission", past())],
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "yes", Some("m.prompt")))
        .await
        .expect("handled");

    let Outcome::Decided(DecisionOutcome::Approved { row_index, slot }) = outcome else {
        panic!("expected approval, got {outcome:?}");
    };
    assert_eq!(row_index, 21_954);
    assert_eq!(slot.sequence_id, 42);
    assert!(slot.publish_at > past());

    assert_eq!(h.store.writes(), vec![(21_954, MARKER_APPROVED)]);

    let created = h.feed.created();
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0].0,
        "Post #42: i fed the ducks during the lecture"
    );
    assert_eq!(created[0].1, slot.publish_at);

    // Moderator got a confirmation naming the assigned label.
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Post #42"));
}

#[tokio::test]
async fn rejection_writes_status_and_never_touches_feed() {
    let h = harness(
        1,
        400,
        Vec::new(),
        prompt_lookup(),
        vec![post("Post #41: older submission", past())],
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "no", Some("m.prompt")))
        .await
        .expect("handled");

    assert_eq!(
        outcome,
        Outcome::Decided(DecisionOutcome::Rejected { row_index: 21_954 })
    );
    assert_eq!(h.store.writes(), vec![(21_954, MARKER_REJECTED)]);
    assert!(h.feed.created().is_empty());
}

#[tokio::test]
async fn decision_without_reply_is_a_silent_noop() {
    let h = harness(1, 400, Vec::new(), prompt_lookup(), Vec::new());

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "yes", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Decided(DecisionOutcome::NotAReply));
    assert!(h.store.writes().is_empty());
    assert!(h.messenger.sent().is_empty());
}

#[tokio::test]
async fn reply_to_ordinary_message_is_malformed_and_writes_nothing() {
    let prompts = HashMap::from([(
        "m.chat".to_string(),
        "thanks for checking these".to_string(),
    )]);
    let h = harness(1, 400, Vec::new(), prompts, Vec::new());

    let err = h
        .pipeline
        .handle_message(&message("mod-1", "yes", Some("m.chat")))
        .await
        .expect_err("prompt parse should fail");

    assert!(matches!(err, ReviewError::MalformedPrompt { .. }));
    assert!(h.store.writes().is_empty());
    assert!(h.feed.created().is_empty());
}

#[tokio::test]
async fn scheduling_failure_leaves_row_approved() {
    // No scheduled or published posts: slot assignment fails after the
    // status write. The write stays; nothing is rolled back.
    let h = harness(1, 400, Vec::new(), prompt_lookup(), Vec::new());

    let err = h
        .pipeline
        .handle_message(&message("mod-1", "yes", Some("m.prompt")))
        .await
        .expect_err("no reference post");

    assert!(matches!(
        err,
        ReviewError::Scheduler(SchedulerError::NoReferencePost)
    ));
    assert_eq!(h.store.writes(), vec![(21_954, MARKER_APPROVED)]);
    assert!(h.feed.created().is_empty());
}

#[tokio::test]
async fn second_decision_overwrites_first() {
    // Known gap, kept observable: nothing guards a re-decision, so a second
    // reply to the same prompt overwrites the first write.
    let h = harness(
        1,
        400,
        Vec::new(),
        prompt_lookup(),
        vec![post("Post #41: older submission", past())],
    );

    h.pipeline
        .handle_message(&message("mod-1", "yes", Some("m.prompt")))
        .await
        .expect("first decision");
    h.pipeline
        .handle_message(&message("mod-2", "no", Some("m.prompt")))
        .await
        .expect("second decision");

    assert_eq!(
        h.store.writes(),
        vec![(21_954, MARKER_APPROVED), (21_954, MARKER_REJECTED)]
    );
    // The approval already scheduled a post; the rejection cannot unschedule.
    assert_eq!(h.feed.created().len(), 1);
}

// ---------------------------------------------------------------------------
// Command surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conversation_is_ignored() {
    let h = harness(1, 400, Vec::new(), HashMap::new(), Vec::new());

    for text in ["hello there", "manual", "yes please", ""] {
        let outcome = h
            .pipeline
            .handle_message(&message("mod-1", text, None))
            .await
            .expect("handled");
        assert_eq!(outcome, Outcome::Ignored, "text {text:?}");
    }
    assert!(h.messenger.sent().is_empty());
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn message_without_text_is_ignored() {
    let h = harness(1, 400, Vec::new(), HashMap::new(), Vec::new());
    let mut msg = message("mod-1", "x", None);
    msg.text = None;

    let outcome = h.pipeline.handle_message(&msg).await.expect("handled");
    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn commands_normalize_before_matching() {
    let h = harness(
        7,
        400,
        vec![row(7, "pending", MARKER_UNREVIEWED)],
        HashMap::new(),
        Vec::new(),
    );

    let outcome = h
        .pipeline
        .handle_message(&message("mod-1", "  Check!  ", None))
        .await
        .expect("handled");

    assert_eq!(outcome, Outcome::Prompted { sent: 1 });
}
