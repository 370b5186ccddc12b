//! Configuration types for blogger-export

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Largest page the Blogger feed serves per request
pub const MAX_PAGE_SIZE: usize = 500;

/// Feed fetching configuration
///
/// Controls how the feed URL is built and how pages are requested.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL scheme of the feed host (default: "https")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Hosting domain; blog URLs must contain `.<domain>` (default: "blogspot.com")
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Entries requested per page (default: 500, the feed maximum)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Timeout for a single page request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Treat transport errors and malformed pages as failures instead of end-of-feed
    ///
    /// By default a page that cannot be fetched or decoded ends pagination and the
    /// posts fetched so far are exported, with a warning attached to the summary.
    #[serde(default)]
    pub strict_pagination: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            domain: default_domain(),
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            strict_pagination: false,
        }
    }
}

impl FeedConfig {
    /// The literal substring that marks a hosted blog in a URL (e.g. ".blogspot.com")
    pub fn domain_marker(&self) -> String {
        format!(".{}", self.domain)
    }
}

/// Export configuration (output location, event fan-out)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the per-year documents are written to (default: "./export")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Capacity of the event broadcast channel (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Main configuration for [`Exporter`](crate::Exporter)
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed fetching settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load a configuration from a JSON file and validate it
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or fails validation
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if self.feed.page_size == 0 || self.feed.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config {
                message: format!(
                    "page size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, self.feed.page_size
                ),
                key: Some("feed.page_size".to_string()),
            });
        }

        if self.feed.domain.trim().is_empty() || self.feed.domain.contains('/') {
            return Err(Error::Config {
                message: format!("invalid feed domain '{}'", self.feed.domain),
                key: Some("feed.domain".to_string()),
            });
        }

        if !matches!(self.feed.scheme.as_str(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported scheme '{}'", self.feed.scheme),
                key: Some("feed.scheme".to_string()),
            });
        }

        if self.export.event_capacity == 0 {
            return Err(Error::Config {
                message: "event capacity must be at least 1".to_string(),
                key: Some("export.event_capacity".to_string()),
            });
        }

        Ok(())
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_domain() -> String {
    "blogspot.com".to_string()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("blogger-export/{}", env!("CARGO_PKG_VERSION"))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./export")
}

fn default_event_capacity() -> usize {
    256
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
