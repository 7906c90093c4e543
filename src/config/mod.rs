//! Configuration loading and management.
//!
//! Loads configuration from `./greenroom.toml` (or `$GREENROOM_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
///
/// Path: `./greenroom.toml` or `$GREENROOM_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process-level settings (`[service]`).
    pub service: ServiceConfig,
    /// Review pipeline settings (`[review]`).
    pub review: ReviewConfig,
    /// Row store settings (`[sheet]`).
    pub sheet: SheetConfig,
    /// Messaging settings (`[messenger]`).
    pub messenger: MessengerConfig,
    /// Feed publishing settings (`[feed]`).
    pub feed: FeedConfig,
    /// Webhook surface settings (`[webhook]`).
    pub webhook: WebhookConfig,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// `path_override` (from the CLI) wins over `$GREENROOM_CONFIG_PATH`.
    /// If the file does not exist, defaults are used.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let path = match path_override {
            Some(p) => p,
            None => Self::config_path_with(|key| std::env::var(key).ok()),
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: Config =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("GREENROOM_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("greenroom.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var`
    /// in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("GREENROOM_LOG_LEVEL") {
            self.service.log_level = v;
        }
        if let Some(v) = env("GREENROOM_SHEET_TOKEN") {
            self.sheet.access_token = v;
        }
        if let Some(v) = env("GREENROOM_MESSENGER_TOKEN") {
            self.messenger.access_token = v;
        }
        if let Some(v) = env("GREENROOM_FEED_TOKEN") {
            self.feed.access_token = v;
        }
        if let Some(v) = env("GREENROOM_APP_SECRET") {
            self.webhook.app_secret = v;
        }
        if let Some(v) = env("GREENROOM_VALIDATION_TOKEN") {
            self.webhook.validation_token = v;
        }
        if let Some(v) = env("GREENROOM_PORT") {
            match v.parse() {
                Ok(n) => self.webhook.port = n,
                Err(_) => tracing::warn!(
                    var = "GREENROOM_PORT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Warn about every credential still at its empty default.
    ///
    /// The process starts anyway; the adapters that need the missing value
    /// will fail at call time with a transport error.
    pub fn warn_missing_secrets(&self) {
        let missing: Vec<&str> = [
            ("sheet.access_token", self.sheet.access_token.is_empty()),
            (
                "messenger.access_token",
                self.messenger.access_token.is_empty(),
            ),
            ("feed.access_token", self.feed.access_token.is_empty()),
            ("webhook.app_secret", self.webhook.app_secret.is_empty()),
            (
                "webhook.validation_token",
                self.webhook.validation_token.is_empty(),
            ),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            tracing::warn!(?missing, "missing config values");
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Service config ──────────────────────────────────────────────

/// Process-level settings (`[service]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Tracing log level filter (overridden by `RUST_LOG`).
    pub log_level: String,
    /// Directory for rotated JSON log files.
    pub logs_dir: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logs_dir: "logs".to_string(),
        }
    }
}

// ── Review config ───────────────────────────────────────────────

/// Review pipeline settings (`[review]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Watermark baseline at startup — the highest row considered already
    /// surfaced when the process starts. Not persisted across restarts.
    pub baseline_row: u64,
    /// Row lookback for "check unread" — how far behind the watermark to
    /// re-surface previously-unreviewed rows.
    pub review_window: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            baseline_row: 21_900,
            review_window: 400,
        }
    }
}

// ── Sheet config ────────────────────────────────────────────────

/// Row store settings (`[sheet]`).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Spreadsheet document id.
    pub spreadsheet_id: String,
    /// Tab name holding form responses.
    pub tab: String,
    /// Numeric grid sheet id used by formatting updates.
    pub grid_sheet_id: i64,
    /// OAuth access token for the Sheets API.
    pub access_token: String,
}

impl std::fmt::Debug for SheetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("tab", &self.tab)
            .field("grid_sheet_id", &self.grid_sheet_id)
            .field("access_token", &"__REDACTED__")
            .finish()
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            tab: "Form Responses 1".to_string(),
            grid_sheet_id: 0,
            access_token: String::new(),
        }
    }
}

// ── Messenger config ────────────────────────────────────────────

/// Messaging settings (`[messenger]`).
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Message-scoped page access token for the Send API.
    pub access_token: String,
}

impl std::fmt::Debug for MessengerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerConfig")
            .field("access_token", &"__REDACTED__")
            .finish()
    }
}

// ── Feed config ─────────────────────────────────────────────────

/// Feed publishing settings (`[feed]`).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Page whose feed receives scheduled posts.
    pub page_id: String,
    /// Page access token for feed calls.
    pub access_token: String,
    /// Public label prefix, e.g. `"Post #"`.
    pub label_prefix: String,
    /// Hours between consecutive scheduled posts.
    pub page_interval_hours: u32,
    /// Hour-of-day (0-23) used after a day-boundary rollover.
    pub page_start_hour: u32,
    /// How many recently published posts to consider when no scheduled
    /// posts exist.
    pub published_lookback: u32,
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("page_id", &self.page_id)
            .field("access_token", &"__REDACTED__")
            .field("label_prefix", &self.label_prefix)
            .field("page_interval_hours", &self.page_interval_hours)
            .field("page_start_hour", &self.page_start_hour)
            .field("published_lookback", &self.published_lookback)
            .finish()
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_id: String::new(),
            access_token: String::new(),
            label_prefix: "Post #".to_string(),
            page_interval_hours: 2,
            page_start_hour: 11,
            published_lookback: 2,
        }
    }
}

// ── Webhook config ──────────────────────────────────────────────

/// Webhook surface settings (`[webhook]`).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// TCP port the webhook server binds.
    pub port: u16,
    /// App secret — HMAC key for request signature verification.
    pub app_secret: String,
    /// Token echoed during the subscription handshake.
    pub validation_token: String,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("port", &self.port)
            .field("app_secret", &"__REDACTED__")
            .field("validation_token", &"__REDACTED__")
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            app_secret: String::new(),
            validation_token: String::new(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
