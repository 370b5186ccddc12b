//! Export orchestration: fetch, group, render and save.
//!
//! [`Exporter`] owns the transient [`ScrapeSession`] and is its only writer.
//! A run moves through `Fetching → Grouping → Serializing → Done`, or ends in
//! `Error` / `Cancelled`. Callers observe it through:
//! - [`Exporter::subscribe`] for the [`Event`] stream
//! - [`Exporter::session`] / [`Exporter::watch_session`] for snapshots
//! - the [`RunOutcome`] returned by [`Exporter::start`]
//!
//! No error escapes a run: every failure becomes a session state plus a status
//! message. Posts fetched by a run that fails or is cancelled are never exported.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::document;
use crate::error::{Error, Result};
use crate::feed::FeedClient;
use crate::grouping;
use crate::identifier;
use crate::sink::ExportSink;
use crate::types::{
    Event, ExportSummary, FeedTarget, FetchProgress, RunOutcome, RunState, ScrapeSession,
};

/// Progress floor once grouping starts (a fetch that already reached 99 stays there)
pub const GROUPING_PERCENT: u8 = 95;

/// Status message of a cancelled run
pub const CANCELLED_STATUS: &str = "Cancelled by user";

/// Drives one export at a time and publishes its progress
///
/// # Examples
///
/// ```no_run
/// use blogger_export::{Config, Exporter, RunOutcome};
/// use blogger_export::sink::DirectorySink;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let exporter = Exporter::new(Config::default())?;
///
/// let mut events = exporter.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// let sink = DirectorySink::new("./export");
/// match exporter.run("https://myblog.blogspot.com", &sink).await {
///     RunOutcome::Completed(summary) => println!("{} posts", summary.total_posts),
///     other => eprintln!("export did not finish: {:?}", other),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Exporter {
    /// Configuration (wrapped in Arc for sharing with callers)
    config: Arc<Config>,
    /// Feed paginator
    feed_client: FeedClient,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Session snapshot channel; only this struct writes to it
    session_tx: watch::Sender<ScrapeSession>,
    /// Cancellation token of the current (or last) run
    cancel_token: Mutex<CancellationToken>,
    /// Set while a run is active
    running: AtomicBool,
    /// Bumped by `reset`; a run only writes the session while its generation is current
    generation: AtomicU64,
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Exporter {
    /// Create a new exporter
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be created
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let feed_client = FeedClient::new(&config.feed)?;
        let (event_tx, _rx) = broadcast::channel(config.export.event_capacity);
        let (session_tx, _session_rx) = watch::channel(ScrapeSession::default());

        Ok(Self {
            config: Arc::new(config),
            feed_client,
            event_tx,
            session_tx,
            cancel_token: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    /// Subscribe to exporter events
    ///
    /// Receivers that fall behind by more than `export.event_capacity` events
    /// miss the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current session snapshot
    pub fn session(&self) -> ScrapeSession {
        self.session_tx.borrow().clone()
    }

    /// Receiver that is notified on every session change
    pub fn watch_session(&self) -> watch::Receiver<ScrapeSession> {
        self.session_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a run is currently active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Derive the feed target from a user-entered blog URL and store it
    ///
    /// On failure the session enters [`RunState::Error`] with the extractor's
    /// message and any previous target is cleared.
    ///
    /// # Errors
    /// - [`Error::InvalidUrl`] if the text is not a blog URL
    /// - [`Error::Other`] if a run is in progress
    pub fn set_blog_url(&self, url: &str) -> Result<FeedTarget> {
        if self.is_running() {
            return Err(Error::Other("an export is already running".to_string()));
        }

        match identifier::resolve_target(url, &self.config.feed) {
            Ok(target) => {
                self.store_target(target.clone());
                Ok(target)
            }
            Err(e) => {
                warn!(input = %url.trim(), error = %e, "Rejected blog URL");
                self.session_tx.send_modify(|s| {
                    s.state = RunState::Error;
                    s.progress = 0;
                    s.status = e.to_string();
                    s.target = None;
                });
                self.emit_event(Event::StateChanged {
                    state: RunState::Error,
                });
                Err(e)
            }
        }
    }

    /// Store an explicit feed target (alternate hosts, mirrors, tests)
    ///
    /// # Errors
    /// Returns [`Error::Other`] if a run is in progress
    pub fn set_feed_target(&self, target: FeedTarget) -> Result<()> {
        if self.is_running() {
            return Err(Error::Other("an export is already running".to_string()));
        }
        self.store_target(target);
        Ok(())
    }

    fn store_target(&self, target: FeedTarget) {
        info!(blog = %target.blog_id, feed = %target.feed_url, "Feed target set");
        let status = format!("Ready to export {}", target.blog_id);
        self.session_tx.send_modify(|s| {
            s.state = RunState::Idle;
            s.progress = 0;
            s.status = status;
            s.target = Some(target);
            s.fetched = 0;
        });
    }

    /// Set the blog URL and start a run
    pub async fn run(&self, url: &str, sink: &dyn ExportSink) -> RunOutcome {
        if let Err(e) = self.set_blog_url(url) {
            return RunOutcome::Failed {
                code: e.code().to_string(),
                message: e.to_string(),
            };
        }
        self.start(sink).await
    }

    /// Signal cancellation to the in-flight fetch, if any
    ///
    /// Only the fetch phase observes cancellation; a run that is already
    /// exporting documents finishes.
    pub async fn cancel(&self) {
        let token = self.cancel_token.lock().await;
        if self.is_running() && !token.is_cancelled() {
            info!("Cancelling export");
        }
        token.cancel();
    }

    /// Cancel any in-flight fetch and return to [`RunState::Idle`] with all
    /// transient fields (feed target included) cleared
    ///
    /// A run that is still winding down after a reset no longer touches the
    /// session, emits no events, and exports nothing further.
    pub async fn reset(&self) {
        self.cancel_token.lock().await.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.session_tx.send_replace(ScrapeSession::default());
        debug!("Exporter reset");
        self.emit_event(Event::StateChanged {
            state: RunState::Idle,
        });
    }

    /// Run the export pipeline once
    ///
    /// Requires a feed target set by [`set_blog_url`](Self::set_blog_url) or
    /// [`set_feed_target`](Self::set_feed_target). Returns
    /// [`RunOutcome::Busy`] without touching the session if another run is active.
    pub async fn start(&self, sink: &dyn ExportSink) -> RunOutcome {
        // the running flag and the fresh token change together under the token
        // lock, so a cancel() that sees this run as running always reaches it
        let mut token_slot = self.cancel_token.lock().await;
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Export already running, ignoring start request");
            return RunOutcome::Busy;
        };
        let cancel = CancellationToken::new();
        *token_slot = cancel.clone();
        drop(token_slot);

        let generation = self.generation.load(Ordering::SeqCst);

        let target = self.session_tx.borrow().target.clone();
        let Some(target) = target else {
            return self.finish_failed(generation, Error::MissingFeedUrl);
        };

        if !self.is_current(generation) {
            return RunOutcome::Cancelled;
        }

        info!(blog = %target.blog_id, "Starting export");
        let status = format!("Fetching posts from {}...", target.blog_id);
        self.update_session(generation, |s| {
            s.state = RunState::Fetching;
            s.progress = 0;
            s.status = status;
            s.fetched = 0;
            s.summary = None;
        });
        self.emit_for(
            generation,
            Event::StateChanged {
                state: RunState::Fetching,
            },
        );

        match self.execute(generation, &target, &cancel, sink).await {
            Ok(summary) => self.finish_completed(generation, summary),
            Err(Error::Cancelled) => self.finish_cancelled(generation),
            Err(e) => self.finish_failed(generation, e),
        }
    }

    async fn execute(
        &self,
        generation: u64,
        target: &FeedTarget,
        cancel: &CancellationToken,
        sink: &dyn ExportSink,
    ) -> Result<ExportSummary> {
        let outcome = self
            .feed_client
            .fetch_all(&target.feed_url, cancel, |progress| {
                self.report_fetch_progress(generation, progress)
            })
            .await?;

        if let Some(halt) = &outcome.halted {
            self.emit_for(generation, Event::PaginationHalted { halt: halt.clone() });
        }

        if outcome.entries.is_empty() {
            return Err(Error::EmptyResult);
        }

        let total_posts = outcome.entries.len();
        self.enter_state(
            generation,
            RunState::Grouping,
            GROUPING_PERCENT,
            format!("Grouping {} posts by year...", total_posts),
        );
        let buckets = grouping::group_by_year(outcome.entries)?;
        let years = grouping::summarize(&buckets);

        self.enter_state(
            generation,
            RunState::Serializing,
            GROUPING_PERCENT,
            format!("Writing {} files...", buckets.len()),
        );

        let year_count = buckets.len();
        let mut file_count = 0;
        let mut failed_files = Vec::new();
        for (index, (year, entries)) in buckets.iter().enumerate() {
            if !self.is_current(generation) {
                debug!(year, "Exporter was reset, stopping export");
                return Err(Error::Cancelled);
            }

            let filename = document::file_name(&target.blog_id, *year);
            let xml = document::render_year(*year, entries)?;

            let message = match sink.save(&filename, &xml).await {
                Ok(()) => {
                    file_count += 1;
                    debug!(year, file = %filename, posts = entries.len(), "Document exported");
                    self.emit_for(
                        generation,
                        Event::DocumentExported {
                            year: *year,
                            filename: filename.clone(),
                            posts: entries.len(),
                        },
                    );
                    format!("Saved {} ({}/{})", filename, index + 1, year_count)
                }
                Err(e) => {
                    warn!(file = %filename, error = %e, "Export sink failed to save document");
                    self.emit_for(
                        generation,
                        Event::DocumentSaveFailed {
                            year: *year,
                            filename: filename.clone(),
                            error: e.to_string(),
                        },
                    );
                    let message =
                        format!("Could not save {} ({}/{})", filename, index + 1, year_count);
                    failed_files.push(filename);
                    message
                }
            };

            let percent = GROUPING_PERCENT + ((index + 1) * 4 / year_count) as u8;
            self.advance_progress(generation, percent.min(99), message);
        }

        Ok(ExportSummary {
            blog_id: target.blog_id.clone(),
            years,
            total_posts,
            file_count,
            failed_files,
            truncated: outcome.halted,
        })
    }

    fn report_fetch_progress(&self, generation: u64, progress: &FetchProgress) {
        let mut percent = progress.percent;
        self.update_session(generation, |s| {
            // keep progress monotonic if the reported total shifts between pages
            s.progress = s.progress.max(progress.percent);
            s.status = progress.message.clone();
            s.fetched = progress.fetched;
            percent = s.progress;
        });
        self.emit_for(
            generation,
            Event::PageFetched {
                start_index: progress.start_index,
                entries: progress.page_entries,
                fetched: progress.fetched,
            },
        );
        self.emit_for(
            generation,
            Event::Progress {
                percent,
                message: progress.message.clone(),
            },
        );
    }

    fn enter_state(&self, generation: u64, state: RunState, percent: u8, status: String) {
        let mut reported = percent;
        let message = status.clone();
        self.update_session(generation, |s| {
            s.state = state;
            s.progress = s.progress.max(percent);
            s.status = status;
            reported = s.progress;
        });
        self.emit_for(generation, Event::StateChanged { state });
        self.emit_for(
            generation,
            Event::Progress {
                percent: reported,
                message,
            },
        );
    }

    /// Raise progress to at least `percent` and publish the resulting value
    ///
    /// The event carries the session's value after the update, so a later
    /// phase with a lower floor never reports progress going backwards.
    fn advance_progress(&self, generation: u64, percent: u8, message: String) {
        let mut reported = percent;
        let status = message.clone();
        self.update_session(generation, |s| {
            s.progress = s.progress.max(percent);
            s.status = status;
            reported = s.progress;
        });
        self.emit_for(
            generation,
            Event::Progress {
                percent: reported,
                message,
            },
        );
    }

    fn finish_completed(&self, generation: u64, summary: ExportSummary) -> RunOutcome {
        let mut status = format!(
            "Exported {} files ({} posts)",
            summary.file_count, summary.total_posts
        );
        if !summary.failed_files.is_empty() {
            status.push_str(&format!(
                "; {} failed to save",
                summary.failed_files.len()
            ));
        }
        if let Some(halt) = &summary.truncated {
            status.push_str(&format!(
                "; feed ended early at post {}",
                halt.start_index
            ));
        }
        info!(
            blog = %summary.blog_id,
            files = summary.file_count,
            failed = summary.failed_files.len(),
            posts = summary.total_posts,
            truncated = summary.truncated.is_some(),
            "Export complete"
        );

        let snapshot = summary.clone();
        self.update_session(generation, |s| {
            s.state = RunState::Done;
            s.progress = 100;
            s.status = status.clone();
            s.summary = Some(snapshot);
        });
        self.emit_for(
            generation,
            Event::Progress {
                percent: 100,
                message: status,
            },
        );
        self.emit_for(
            generation,
            Event::StateChanged {
                state: RunState::Done,
            },
        );
        self.emit_for(
            generation,
            Event::Completed {
                summary: summary.clone(),
            },
        );
        RunOutcome::Completed(summary)
    }

    fn finish_cancelled(&self, generation: u64) -> RunOutcome {
        info!("Export cancelled");
        self.update_session(generation, |s| {
            s.state = RunState::Cancelled;
            s.status = CANCELLED_STATUS.to_string();
            s.fetched = 0;
        });
        self.emit_for(
            generation,
            Event::StateChanged {
                state: RunState::Cancelled,
            },
        );
        self.emit_for(generation, Event::Cancelled);
        RunOutcome::Cancelled
    }

    fn finish_failed(&self, generation: u64, error: Error) -> RunOutcome {
        let code = error.code().to_string();
        let message = error.to_string();
        warn!(code = %code, error = %message, "Export failed");

        self.update_session(generation, |s| {
            s.state = RunState::Error;
            s.progress = 0;
            s.status = message.clone();
            s.fetched = 0;
        });
        self.emit_for(
            generation,
            Event::StateChanged {
                state: RunState::Error,
            },
        );
        self.emit_for(
            generation,
            Event::Failed {
                code: code.clone(),
                error: message.clone(),
            },
        );
        RunOutcome::Failed { code, message }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply `f` to the session unless the run has been superseded by a reset
    fn update_session(&self, generation: u64, f: impl FnOnce(&mut ScrapeSession)) {
        self.session_tx.send_if_modified(|session| {
            // checked under the channel lock so a concurrent reset always wins
            if !self.is_current(generation) {
                return false;
            }
            f(session);
            true
        });
    }

    fn emit_for(&self, generation: u64, event: Event) {
        if self.is_current(generation) {
            self.emit_event(event);
        }
    }

    /// Emit an event to all subscribers
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
