// Engine configuration.
//
// Global config: `~/.coedit/config.toml`
// Identity: `docId` / `userId` query parameters of the editor page URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use coedit_common::types::{DocId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::connection::{parse_endpoint, Backoff, ReconnectPolicy, TransportError};
use crate::debounce::DebounceConfig;
use crate::session::SessionIdentity;

/// Document id used when the page URL does not name one.
pub const DEFAULT_DOC_ID: &str = "default";

/// Root directory for coedit global state: `~/.coedit/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".coedit"))
}

/// Path to the global config file: `~/.coedit/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    InvalidEndpoint(#[from] TransportError),

    #[error("invalid page URL `{url}`: {reason}")]
    InvalidPageUrl { url: String, reason: String },
}

// ── Engine config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Socket endpoint (`ws://` or `wss://`).
    pub endpoint: String,
    /// Start syncing as soon as the plugin is initialized.
    pub auto_start: bool,
    /// Quiet window for outbound coalescing, in milliseconds.
    pub debounce_ms: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080".into(),
            auto_start: true,
            debounce_ms: 300,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `~/.coedit/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Resolve into the options the engine runs with.
    pub fn engine_options(&self) -> Result<EngineOptions, ConfigError> {
        Ok(EngineOptions {
            endpoint: parse_endpoint(&self.endpoint)?,
            debounce: DebounceConfig::with_millis(self.debounce_ms),
            reconnect: self.reconnect.policy(),
        })
    }
}

/// Reconnect settings under `[reconnect]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: BackoffKind,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { delay_ms: 3_000, max_delay_ms: 30_000, backoff: BackoffKind::Fixed }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        ReconnectPolicy {
            delay,
            max_delay: Duration::from_millis(self.max_delay_ms).max(delay),
            backoff: match self.backoff {
                BackoffKind::Fixed => Backoff::Fixed,
                BackoffKind::ExponentialJitter => Backoff::ExponentialJitter,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    ExponentialJitter,
}

/// Validated runtime options.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub endpoint: Url,
    pub debounce: DebounceConfig,
    pub reconnect: ReconnectPolicy,
}

// ── Identity ───────────────────────────────────────────────────────

impl SessionIdentity {
    /// Read `docId` and `userId` from the editor page URL.
    ///
    /// A missing or empty `userId` gets a fresh random id; a missing `docId`
    /// falls back to [`DEFAULT_DOC_ID`].
    pub fn from_page_url(page_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(page_url).map_err(|error| ConfigError::InvalidPageUrl {
            url: page_url.to_string(),
            reason: error.to_string(),
        })?;

        let mut doc_id = None;
        let mut user_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "docId" if !value.is_empty() => doc_id = Some(value.into_owned()),
                "userId" if !value.is_empty() => user_id = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            doc_id: DocId::new(doc_id.unwrap_or_else(|| DEFAULT_DOC_ID.to_string())),
            user_id: user_id.map(UserId::new).unwrap_or_else(UserId::generate),
        })
    }
}
