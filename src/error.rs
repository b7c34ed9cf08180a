//! Custom error types for chirp.
//!
//! Provides structured error handling with detailed context for better
//! diagnostics and user experience.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for chirp operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum ChirpError {
    // =========================================================================
    // Aggregation Errors
    // =========================================================================
    /// Inconsistent input rows handed to the aggregation module.
    ///
    /// This is a programmer error in the caller, never a user error.
    #[error("Precondition violated: {reason}")]
    PreconditionViolation { reason: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database file not found (not yet initialized).
    #[error("No database found. Run 'chirp init' first.\nExpected database at: {path}")]
    DatabaseNotFound { path: PathBuf },

    /// Database schema version mismatch.
    #[error("Database schema version mismatch: expected {expected}, found {found}.")]
    SchemaMismatch { expected: i32, found: i32 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A form field failed validation.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Record not found.
    #[error("{item_type} with ID '{id}' not found")]
    NotFound { item_type: &'static str, id: String },

    #[error("You have already liked tweet {tweet_id}")]
    AlreadyLiked { tweet_id: i64 },

    #[error("You haven't liked tweet {tweet_id}")]
    NotLiked { tweet_id: i64 },

    #[error("You are already following user {user_id}")]
    AlreadyFollowing { user_id: i64 },

    #[error("You aren't following user {user_id}")]
    NotFollowing { user_id: i64 },

    #[error("Cannot follow yourself")]
    CannotFollowSelf,

    #[error("Account '{account}' is already registered")]
    AccountTaken { account: String },

    #[error("Email '{email}' is already registered")]
    EmailTaken { email: String },

    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// Unknown account or wrong password. Deliberately indistinguishable.
    #[error("Account does not exist or password is incorrect")]
    InvalidCredentials,

    #[error("Not signed in. Run 'chirp signin <account>' first.")]
    NotSignedIn,

    /// An admin session used a command that needs a regular user.
    #[error("Admin accounts have no timeline")]
    AdminViewer,

    /// Acting on another user's private data.
    #[error("Permission denied: you can only access your own {resource}")]
    PermissionDenied { resource: &'static str },

    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    // =========================================================================
    // IO / Configuration Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration or session file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    /// Invalid command-line argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// JSON serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for chirp operations.
pub type Result<T> = std::result::Result<T, ChirpError>;

impl ChirpError {
    /// Create a precondition violation.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            reason: reason.into(),
        }
    }

    /// Create a validation error for a form field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(item_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            item_type,
            id: id.to_string(),
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DatabaseNotFound { path: path.into() }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Check if this error is recoverable (user can fix it).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseNotFound { .. }
                | Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::AlreadyLiked { .. }
                | Self::NotLiked { .. }
                | Self::AlreadyFollowing { .. }
                | Self::NotFollowing { .. }
                | Self::CannotFollowSelf
                | Self::AccountTaken { .. }
                | Self::EmailTaken { .. }
                | Self::InvalidCredentials
                | Self::NotSignedIn
                | Self::AdminViewer
                | Self::PermissionDenied { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DatabaseNotFound { .. } => Some("Run 'chirp init' to create the database."),
            Self::SchemaMismatch { .. } => {
                Some("Back up the database and run 'chirp init --force' to recreate it.")
            }
            Self::NotSignedIn | Self::InvalidCredentials => {
                Some("Sign in with 'chirp signin <account>' or register with 'chirp signup'.")
            }
            Self::AccountTaken { .. } | Self::EmailTaken { .. } => {
                Some("Pick a different account name or email address.")
            }
            Self::AdminViewer => Some("Sign in as a regular user with 'chirp signin <account>'."),
            _ => None,
        }
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}

/// Calculate the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();

    if a_chars.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Find the closest candidate within `max_distance` edits (default 2).
#[must_use]
pub fn find_closest_match<'a>(
    input: &str,
    candidates: &[&'a str],
    max_distance: Option<usize>,
) -> Option<&'a str> {
    let max_dist = max_distance.unwrap_or(2);
    let input_lower = input.to_lowercase();

    candidates
        .iter()
        .map(|&candidate| {
            let distance = levenshtein_distance(&input_lower, &candidate.to_lowercase());
            (candidate, distance)
        })
        .filter(|(_, distance)| *distance <= max_dist && *distance > 0)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Format an error for an unknown value with "did you mean?" support.
#[must_use]
pub fn format_unknown_value_error(kind: &str, input: &str, valid_options: &[&str]) -> String {
    let title = format!("Unknown {kind}: '{input}'");

    let mut suggestions = Vec::new();

    if let Some(closest) = find_closest_match(input, valid_options, None) {
        suggestions.push(format!("Did you mean '{}'?", closest.green()));
    }

    if valid_options.len() <= 8 {
        suggestions.push(format!("Valid {kind}s: {}", valid_options.join(", ")));
    }

    let suggestion_refs: Vec<&str> = suggestions.iter().map(String::as_str).collect();
    format_error(&title, "", &suggestion_refs)
}

/// Config keys accepted by `chirp config --set`.
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "paths.db",
    "paths.session",
    "feed.recommend_limit",
    "auth.bcrypt_cost",
    "profile.default_cover",
    "output.format",
    "output.colors",
    "logging.level",
    "logging.format",
];
