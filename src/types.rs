//! Core types and events for blogger-export

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Short identifier of a Blogger blog (the `myblog` in `myblog.blogspot.com`)
///
/// Always non-empty and free of path separators, so it is safe to use in
/// host names and output file names.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlogId(String);

impl BlogId {
    /// Create a new BlogId, checking the identifier invariants
    ///
    /// # Errors
    /// Returns [`Error::InvalidUrl`] if the identifier is empty or contains `/` or `\`
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(['/', '\\']) {
            return Err(Error::InvalidUrl {
                message: format!("'{}' is not a valid blog identifier", id),
                input: id,
            });
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlogId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BlogId> for String {
    fn from(id: BlogId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BlogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A blog together with the base URL of its posts feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTarget {
    /// Blog identifier, used for output file names
    pub blog_id: BlogId,
    /// Feed base URL without query parameters
    pub feed_url: String,
}

/// One blog post as delivered by the feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    /// Post title (may be empty)
    pub title: String,
    /// Publication timestamp (ISO 8601)
    pub published: String,
    /// Last update timestamp (ISO 8601)
    pub updated: String,
    /// Name of the first author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Post body as HTML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Labels attached to the post
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Canonical permalink (the `alternate` link)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

/// One page of the feed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedPage {
    /// Entries on this page, in feed order
    pub entries: Vec<PostEntry>,
    /// Total number of posts the feed claims to have, if reported
    pub total_results: Option<usize>,
}

/// Why pagination stopped before the feed reported an empty page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationHalt {
    /// `start-index` of the page that could not be read
    pub start_index: usize,
    /// Description of the transport or decoding failure
    pub reason: String,
}

/// Post count for one year
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    /// Calendar year
    pub year: i32,
    /// Number of posts published in that year
    pub count: usize,
}

/// Result of a completed export
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Blog that was exported
    pub blog_id: BlogId,
    /// Post counts per year, newest year first
    pub years: Vec<YearSummary>,
    /// Total number of posts exported
    pub total_posts: usize,
    /// Number of documents the export sink accepted
    pub file_count: usize,
    /// File names the export sink failed to save
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<String>,
    /// Set when pagination ended on a failed page instead of an empty one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<PaginationHalt>,
}

/// Exporter state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run in progress
    #[default]
    Idle,
    /// Requesting feed pages
    Fetching,
    /// Partitioning posts by year
    Grouping,
    /// Rendering and exporting documents
    Serializing,
    /// All documents exported
    Done,
    /// The run failed
    Error,
    /// The run was cancelled by the user
    Cancelled,
}

impl RunState {
    /// Whether a run is currently in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Fetching | RunState::Grouping | RunState::Serializing
        )
    }

    /// Whether this is a terminal state of a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Error | RunState::Cancelled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Grouping => "grouping",
            RunState::Serializing => "serializing",
            RunState::Done => "done",
            RunState::Error => "error",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Snapshot of the exporter's transient session state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSession {
    /// Current state
    pub state: RunState,
    /// Progress percentage (0 to 100)
    pub progress: u8,
    /// Human-readable status line
    pub status: String,
    /// Feed target derived from the blog URL
    pub target: Option<FeedTarget>,
    /// Number of posts fetched so far in the current run
    pub fetched: usize,
    /// Summary of the last successful run
    pub summary: Option<ExportSummary>,
}

/// Progress reported by the paginator after each page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchProgress {
    /// `start-index` of the page that was just received
    pub start_index: usize,
    /// Entries on that page
    pub page_entries: usize,
    /// Posts accumulated so far
    pub fetched: usize,
    /// Total posts the feed reported, or `fetched` when unknown
    pub estimated_total: usize,
    /// Percentage clamped to 99
    pub percent: u8,
    /// Status message including the running count
    pub message: String,
}

/// Event emitted by the exporter
///
/// Consumers subscribe via [`Exporter::subscribe`](crate::Exporter::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The exporter moved to a new state
    StateChanged {
        /// New state
        state: RunState,
    },

    /// Progress update
    Progress {
        /// Progress percentage (0 to 100)
        percent: u8,
        /// Status message
        message: String,
    },

    /// A feed page was received
    PageFetched {
        /// `start-index` of the page
        start_index: usize,
        /// Entries on the page
        entries: usize,
        /// Posts accumulated so far
        fetched: usize,
    },

    /// Pagination ended on a failed page; the posts fetched so far are kept
    PaginationHalted {
        /// Details of the failed page
        halt: PaginationHalt,
    },

    /// A per-year document was saved by the export sink
    DocumentExported {
        /// Year covered by the document
        year: i32,
        /// File name the document was saved under
        filename: String,
        /// Number of posts in the document
        posts: usize,
    },

    /// The export sink could not save a document; the run continues
    DocumentSaveFailed {
        /// Year covered by the document
        year: i32,
        /// File name the document was meant to be saved under
        filename: String,
        /// Error reported by the sink
        error: String,
    },

    /// The run finished successfully
    Completed {
        /// Export summary
        summary: ExportSummary,
    },

    /// The run failed
    Failed {
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// The run was cancelled by the user
    Cancelled,
}

/// Outcome of [`Exporter::start`](crate::Exporter::start)
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// All documents were exported
    Completed(ExportSummary),
    /// The run failed; the session holds the same message
    Failed {
        /// Machine-readable error code
        code: String,
        /// User-facing message
        message: String,
    },
    /// The run was cancelled by the user
    Cancelled,
    /// Another run is already active; nothing was started
    Busy,
}

impl RunOutcome {
    /// Whether the run completed successfully
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}
