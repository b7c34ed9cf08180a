//! chirp - a small social timeline over an embedded `SQLite` store
//!
//! Users post short tweets, reply, like, and follow each other. Pages are
//! assembled in two steps: the storage layer fetches raw rows, then the
//! aggregation layer derives counters, follow flags and orderings from them.
//!
//! # Modules
//!
//! - [`aggregate`] - Feed aggregation and social-graph denormalization
//! - [`app`] - Page and action handlers
//! - [`auth`] - Password hashing and credential checks
//! - [`cli`] - Command-line interface definitions
//! - [`error`] - Custom error types with rich context
//! - [`model`] - Entity records and view models
//! - [`render`] - Text and JSON output of pages
//! - [`session`] - Persisted sign-in
//! - [`storage`] - `SQLite` storage layer

pub mod aggregate;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod render;
pub mod session;
pub mod storage;

pub use app::App;
pub use cli::*;
pub use config::Config;
pub use error::{ChirpError, Result};
pub use model::*;
pub use storage::Storage;

use chrono::{DateTime, Datelike, Utc};
use unicode_normalization::UnicodeNormalization;

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "chirp.db";

/// Default session filename
pub const DEFAULT_SESSION_NAME: &str = "session.toml";

/// Standard width for content dividers in CLI output
pub const CONTENT_DIVIDER_WIDTH: usize = 60;

/// Get the default data directory for chirp
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("chirp")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Get the default session path
#[must_use]
pub fn default_session_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_SESSION_NAME)
}

/// Length of user-entered text as counted against field limits.
///
/// Counts Unicode scalar values after NFC normalization, so a precomposed
/// and a decomposed "é" both count as one character.
#[must_use]
pub fn text_length(text: &str) -> usize {
    text.nfc().count()
}

/// Format a datetime as a human-friendly relative string.
///
/// Uses smart thresholds for readability:
/// - < 1 minute: "just now"
/// - < 1 hour: "Nm ago"
/// - < 24 hours: "Nh ago"
/// - < 7 days: "Nd ago"
/// - Same calendar year: "Mon D"
/// - Different year: "Mon D, YYYY"
#[must_use]
pub fn format_relative_date(dt: DateTime<Utc>) -> String {
    format_relative_date_with_base(dt, Utc::now())
}

/// Format a datetime relative to a fixed base time (useful for tests).
#[must_use]
pub fn format_relative_date_with_base(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);

    if duration.num_seconds() < 0 {
        return dt.format("%b %d, %Y").to_string();
    }

    let minutes = duration.num_minutes();
    let hours = duration.num_hours();
    let days = duration.num_days();

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else if dt.year() == now.year() {
        dt.format("%b %d").to_string()
    } else {
        dt.format("%b %d, %Y").to_string()
    }
}

/// Format a count compactly (1.2K, 3.4M).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_count(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Truncate to at most `max_len` bytes on a char boundary, adding "...".
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len.saturating_sub(3);
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
