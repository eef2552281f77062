//! Client configuration.
//!
//! `DirectorConfig` can be built in code (`DirectorConfig::new(url)`) or
//! loaded from a TOML file:
//!
//! ```toml
//! base_url = "https://10.0.0.6:25555"
//! connect_timeout_secs = 10
//! request_timeout_secs = 300
//! context_header = "X-Bosh-Context-Id"
//!
//! [poll]
//! interval_ms = 1000
//! timeout_secs = 600
//! ```
//!
//! Every key is optional except `base_url`, which must be non-empty once
//! loaded. Unknown keys are rejected so typos do not silently fall back to
//! defaults.

use std::path::Path;
use std::time::Duration;

use reqwest::redirect;
use serde::Deserialize;

use crate::error::{DirectorError, Result};
use crate::task::PollConfig;

/// Header carrying the correlation id of a context-scoped client.
pub const DEFAULT_CONTEXT_HEADER: &str = "X-Bosh-Context-Id";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Covers the full round-trip including body download. Resource downloads
/// can be large blobs, so this is generous.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Connection settings for one director endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorConfig {
    /// Director base URL, e.g. `https://10.0.0.6:25555`. A trailing slash is
    /// ignored.
    pub base_url: String,
    /// TCP + TLS handshake timeout.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, body included.
    pub request_timeout_secs: u64,
    /// Name of the correlation-id header sent by context-scoped clients.
    pub context_header: String,
    /// Task polling settings.
    pub poll: PollSettings,
}

/// The `[poll]` table of [`DirectorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    /// Delay between two task status requests, in milliseconds.
    pub interval_ms: u64,
    /// Upper bound on the time spent waiting for one task, in seconds.
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let defaults = PollConfig::default();
        PollSettings {
            interval_ms: defaults.interval.as_millis() as u64,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        DirectorConfig {
            base_url: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            context_header: DEFAULT_CONTEXT_HEADER.to_string(),
            poll: PollSettings::default(),
        }
    }
}

impl DirectorConfig {
    /// Default settings pointed at `base_url`.
    pub fn new(base_url: &str) -> Self {
        DirectorConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: DirectorConfig = toml::from_str(raw).map_err(|e| DirectorError::Config {
            message: "failed to parse TOML".to_string(),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DirectorError::Config {
            message: format!("failed to read '{}'", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks the invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(DirectorError::config("base_url must not be empty"));
        }
        if self.context_header.trim().is_empty() {
            return Err(DirectorError::config("context_header must not be empty"));
        }
        if self.poll.interval_ms == 0 {
            return Err(DirectorError::config("poll.interval_ms must be greater than zero"));
        }
        let timeout = Duration::from_secs(self.poll.timeout_secs);
        if timeout < Duration::from_millis(self.poll.interval_ms) {
            return Err(DirectorError::config(
                "poll.timeout_secs must not be shorter than poll.interval_ms",
            ));
        }
        Ok(())
    }

    /// Polling behaviour derived from the `[poll]` table.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_millis(self.poll.interval_ms),
            Duration::from_secs(self.poll.timeout_secs),
        )
    }

    /// Base URL without a trailing slash; request paths start with `/`.
    pub(crate) fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    /// Builds the shared `reqwest::Client` for this director.
    ///
    /// Redirects are not followed: the director answers task submissions
    /// with `302 Found` and the task location, which the task layer reads
    /// itself.
    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| DirectorError::Config {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })
    }
}
