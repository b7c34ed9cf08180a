//! Configuration system for chirp.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/chirp/config.toml`
//! 3. **Environment variables** - `CHIRP_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/chirp/chirp.db"
//!
//! [feed]
//! recommend_limit = 10
//!
//! [auth]
//! bcrypt_cost = 10
//!
//! [output]
//! format = "text"
//! colors = true
//!
//! [logging]
//! level = "warn"
//! format = "compact"
//! ```

use crate::error::{ChirpError, Result, VALID_CONFIG_KEYS, format_unknown_value_error};
use crate::logging::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cover image restored by `chirp profile --reset-cover`.
pub const DEFAULT_COVER_URL: &str = "https://i.imgur.com/b7U6LXD.jpg";

/// Main configuration structure for chirp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Database and session file locations.
    pub paths: PathsConfig,
    /// Feed and sidebar behavior.
    pub feed: FeedConfig,
    /// Password hashing.
    pub auth: AuthConfig,
    /// Profile defaults.
    pub profile: ProfileConfig,
    /// Output formatting configuration.
    pub output: OutputConfig,
    /// Diagnostic logging on stderr.
    pub logging: LoggingConfig,
}

/// Path configuration for the database and the sign-in session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `CHIRP_DB`
    pub db: Option<PathBuf>,

    /// Path to the session file.
    /// Environment variable: `CHIRP_SESSION`
    pub session: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    /// Size of the "who to follow" sidebar.
    /// Environment variable: `CHIRP_RECOMMEND_LIMIT`
    pub recommend_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// bcrypt work factor (4..=31).
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileConfig {
    pub default_cover: String,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty.
    pub format: String,

    /// Enable colored output.
    pub colors: bool,
}

/// Logging defaults, used when neither `--quiet` nor `--verbose` is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug, trace or off.
    /// Environment variable: `CHIRP_LOG_LEVEL`
    pub level: String,

    /// pretty, compact or full.
    /// Environment variable: `CHIRP_LOG_FORMAT`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { recommend_limit: 10 }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { bcrypt_cost: 10 }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_cover: DEFAULT_COVER_URL.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. User config file (~/.config/chirp/config.toml)
    /// 3. Compiled defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::user_config_path().and_then(|p| Self::load_from_file(&p)) {
            config.merge(user_config);
        }

        config.apply_env_overrides();

        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from: {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chirp").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var("CHIRP_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Ok(session) = std::env::var("CHIRP_SESSION") {
            self.paths.session = Some(PathBuf::from(session));
        }
        if let Ok(limit) = std::env::var("CHIRP_RECOMMEND_LIMIT") {
            if let Ok(n) = limit.parse() {
                self.feed.recommend_limit = n;
            }
        }
        if let Ok(cost) = std::env::var("CHIRP_BCRYPT_COST") {
            if let Ok(n) = cost.parse() {
                self.auth.bcrypt_cost = n;
            }
        }
        if let Ok(format) = std::env::var("CHIRP_FORMAT") {
            self.output.format = format;
        }
        if let Ok(level) = std::env::var("CHIRP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CHIRP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if std::env::var("CHIRP_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok() {
            self.output.colors = false;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }
        if other.paths.session.is_some() {
            self.paths.session = other.paths.session;
        }

        self.feed = other.feed;
        self.auth = other.auth;
        self.profile = other.profile;
        self.output = other.output;
        self.logging = other.logging;
    }

    /// Set one value by dotted key, as `chirp config --set key=value` does.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::InvalidArgument`] for unknown keys (with a
    /// "did you mean" hint) or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |what: &str| ChirpError::InvalidArgument {
            reason: format!("'{value}' is not a valid {what} for {key}"),
        };

        match key {
            "paths.db" => self.paths.db = Some(PathBuf::from(value)),
            "paths.session" => self.paths.session = Some(PathBuf::from(value)),
            "feed.recommend_limit" => {
                self.feed.recommend_limit = value.parse().map_err(|_| invalid("number"))?;
            }
            "auth.bcrypt_cost" => {
                let cost: u32 = value.parse().map_err(|_| invalid("number"))?;
                if !(4..=31).contains(&cost) {
                    return Err(invalid("bcrypt cost (4-31)"));
                }
                self.auth.bcrypt_cost = cost;
            }
            "profile.default_cover" => self.profile.default_cover = value.to_string(),
            "output.format" => {
                if !matches!(value, "text" | "json" | "json-pretty") {
                    return Err(invalid("format"));
                }
                self.output.format = value.to_string();
            }
            "output.colors" => {
                self.output.colors = value.parse().map_err(|_| invalid("boolean"))?;
            }
            "logging.level" => {
                value.parse::<LogLevel>()?;
                self.logging.level = value.to_string();
            }
            "logging.format" => {
                value.parse::<LogFormat>()?;
                self.logging.format = value.to_string();
            }
            _ => {
                return Err(ChirpError::InvalidArgument {
                    reason: format_unknown_value_error("config key", key, VALID_CONFIG_KEYS),
                });
            }
        }
        Ok(())
    }

    /// Get the database path, using defaults if not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths.db.clone().unwrap_or_else(crate::default_db_path)
    }

    /// Get the session file path, using defaults if not configured.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.paths
            .session
            .clone()
            .unwrap_or_else(crate::default_session_path)
    }

    /// Save the current configuration to the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the parent directory cannot be created, or the file cannot be written.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path().ok_or_else(|| ChirpError::InvalidArgument {
            reason: "Could not determine config directory".to_string(),
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChirpError::path_error("create", parent, e))?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ChirpError::ConfigError {
            path: config_path.clone(),
            reason: e.to_string(),
        })?;

        std::fs::write(&config_path, content)
            .map_err(|e| ChirpError::path_error("write", &config_path, e))?;
        info!("Saved config to: {}", config_path.display());
        Ok(config_path)
    }

    /// Render the configuration as TOML.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.recommend_limit, 10);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.profile.default_cover, DEFAULT_COVER_URL);
        assert!(config.output.colors);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.feed.recommend_limit = 5;
        let parsed: Config = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str("[feed]\nrecommend_limit = 3\n").unwrap();
        assert_eq!(parsed.feed.recommend_limit, 3);
        assert_eq!(parsed.auth.bcrypt_cost, 10);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut other = Config::default();
        other.feed.recommend_limit = 50;
        other.paths.db = Some(PathBuf::from("/custom/path"));

        base.merge(other);

        assert_eq!(base.feed.recommend_limit, 50);
        assert_eq!(base.paths.db, Some(PathBuf::from("/custom/path")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[auth]\nbcrypt_cost = 4\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.auth.bcrypt_cost, 4);

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load_from_file(&path).is_none());
        assert!(Config::load_from_file(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn test_set_values() {
        let mut config = Config::default();
        config.set("feed.recommend_limit", "3").unwrap();
        config.set("output.colors", "false").unwrap();
        assert_eq!(config.feed.recommend_limit, 3);
        assert!(!config.output.colors);

        assert!(config.set("auth.bcrypt_cost", "99").is_err());
        assert!(config.set("output.format", "xml").is_err());

        config.set("logging.level", "info").unwrap();
        config.set("logging.format", "pretty").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.set("logging.level", "loud").is_err());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_logging_section_from_file() {
        let parsed: Config = toml::from_str("[logging]\nlevel = \"off\"\n").unwrap();
        assert_eq!(parsed.logging.level, "off");
        assert_eq!(parsed.logging.format, "compact");
    }

    #[test]
    fn test_set_unknown_key_suggests() {
        let mut config = Config::default();
        let err = config.set("feed.recomend_limit", "3").unwrap_err();
        assert!(err.to_string().contains("feed.recommend_limit"));
    }
}
