//! Paginated fetching of a Blogger posts feed.
//!
//! The feed is requested in pages of up to 500 entries using the `start-index`
//! and `max-results` query parameters. Pages are fetched strictly in order
//! because each offset depends on the previous page. Pagination ends when:
//! - a page comes back with no entries (normal end of feed)
//! - a page cannot be fetched or decoded (lenient end, reported as a
//!   [`PaginationHalt`] unless `strict_pagination` is enabled)
//! - the feed answers with a non-success HTTP status ([`Error::Fetch`])
//! - the cancellation token fires ([`Error::Cancelled`])

mod schema;

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::types::{FeedPage, FetchProgress, PaginationHalt, PostEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Highest progress the fetch phase reports; 100 is reserved for export completion
pub const MAX_FETCH_PERCENT: u8 = 99;

/// Everything the paginator collected
#[derive(Clone, Debug, Default)]
pub struct FetchOutcome {
    /// All entries, in feed order
    pub entries: Vec<PostEntry>,
    /// Set when pagination stopped on a failed page instead of an empty one
    pub halted: Option<PaginationHalt>,
}

/// HTTP client for the Blogger JSON feed
#[derive(Clone, Debug)]
pub struct FeedClient {
    /// HTTP client for fetching feed pages
    http_client: reqwest::Client,

    /// Entries requested per page
    page_size: usize,

    /// Surface transport/decoding failures instead of ending pagination
    strict: bool,
}

impl FeedClient {
    /// Create a new feed client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            page_size: config.page_size,
            strict: config.strict_pagination,
        })
    }

    /// Entries requested per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Build the URL of one page of the feed
    ///
    /// # Errors
    /// Returns [`Error::InvalidUrl`] if `base_url` cannot be parsed
    pub fn page_url(&self, base_url: &str, start_index: usize) -> Result<String> {
        let mut url = url::Url::parse(base_url).map_err(|e| Error::InvalidUrl {
            message: format!("invalid feed URL: {}", e),
            input: base_url.to_string(),
        })?;

        url.query_pairs_mut()
            .append_pair("alt", "json")
            .append_pair("start-index", &start_index.to_string())
            .append_pair("max-results", &self.page_size.to_string());

        Ok(url.into())
    }

    /// Fetch and decode a single page
    ///
    /// # Errors
    /// - [`Error::Fetch`] on a non-success HTTP status
    /// - [`Error::Network`] on transport failures and timeouts
    /// - [`Error::Serialization`] if the body is not a feed document
    pub async fn fetch_page(&self, base_url: &str, start_index: usize) -> Result<FeedPage> {
        let url = self.page_url(base_url, start_index)?;
        debug!(url = %url, "Requesting feed page");

        let response = self.http_client.get(&url).send().await?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let document: schema::FeedDocument = serde_json::from_str(&body)?;
        Ok(document.into())
    }

    /// Fetch every page of the feed
    ///
    /// `on_progress` is called once per non-empty page. The cancellation token is
    /// checked before each request and raced against the request itself; a
    /// response that arrives after cancellation is discarded.
    ///
    /// # Errors
    /// - [`Error::Cancelled`] once cancellation is observed
    /// - [`Error::Fetch`] on a non-success HTTP status
    /// - [`Error::Network`]/[`Error::Serialization`] only in strict mode
    pub async fn fetch_all<F>(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<FetchOutcome>
    where
        F: FnMut(&FetchProgress),
    {
        let mut outcome = FetchOutcome::default();
        let mut start_index = 1;

        loop {
            if cancel.is_cancelled() {
                debug!(fetched = outcome.entries.len(), "Fetch cancelled");
                return Err(Error::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(start_index, "Discarding in-flight page after cancellation");
                    return Err(Error::Cancelled);
                }
                page = self.fetch_page(base_url, start_index) => page,
            };

            let page = match result {
                Ok(page) => page,
                Err(e @ (Error::Network(_) | Error::Serialization(_))) => {
                    if self.strict {
                        return Err(e);
                    }
                    warn!(
                        start_index,
                        fetched = outcome.entries.len(),
                        error = %e,
                        "Feed page could not be read, treating as end of feed"
                    );
                    outcome.halted = Some(PaginationHalt {
                        start_index,
                        reason: e.to_string(),
                    });
                    break;
                }
                Err(e) => return Err(e),
            };

            if page.entries.is_empty() {
                debug!(start_index, "Empty page, pagination complete");
                break;
            }

            let page_entries = page.entries.len();
            outcome.entries.extend(page.entries);
            let progress = progress_for(
                start_index,
                page_entries,
                outcome.entries.len(),
                page.total_results,
            );
            debug!(
                start_index,
                page_entries,
                fetched = progress.fetched,
                total = progress.estimated_total,
                "Received feed page"
            );
            on_progress(&progress);

            start_index += self.page_size;
        }

        info!(
            fetched = outcome.entries.len(),
            truncated = outcome.halted.is_some(),
            "Feed pagination finished"
        );
        Ok(outcome)
    }
}

/// Compute the progress report after a page, clamped to [`MAX_FETCH_PERCENT`]
pub(crate) fn progress_for(
    start_index: usize,
    page_entries: usize,
    fetched: usize,
    reported_total: Option<usize>,
) -> FetchProgress {
    let estimated_total = reported_total.filter(|t| *t > 0).unwrap_or(fetched);
    let percent = if estimated_total == 0 {
        0
    } else {
        (fetched.saturating_mul(100) / estimated_total).min(MAX_FETCH_PERCENT as usize) as u8
    };

    FetchProgress {
        start_index,
        page_entries,
        fetched,
        estimated_total,
        percent,
        message: format!("Fetched {} of {} posts...", fetched, estimated_total),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
