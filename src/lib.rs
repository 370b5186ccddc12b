//! # blogger-export
//!
//! Export every post of a Blogger blog into one XML document per publication year.
//!
//! ## Design Philosophy
//!
//! blogger-export is designed to be:
//! - **Library-first** - The CLI is a thin wrapper over [`Exporter`]
//! - **Event-driven** - Consumers subscribe to events instead of polling
//! - **Sink-agnostic** - Documents go wherever an [`ExportSink`] puts them
//!
//! ## Quick Start
//!
//! ```no_run
//! use blogger_export::{Config, DirectorySink, Exporter, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exporter = Exporter::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let sink = DirectorySink::new("./export");
//!     if let RunOutcome::Completed(summary) =
//!         exporter.run("https://myblog.blogspot.com", &sink).await
//!     {
//!         for year in &summary.years {
//!             println!("{}: {} posts", year.year, year.count);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-year XML rendering
pub mod document;
/// Error types
pub mod error;
/// Export orchestration and session state
pub mod exporter;
/// Blogger feed pagination
pub mod feed;
/// Grouping posts by publication year
pub mod grouping;
/// Blog identifier extraction
pub mod identifier;
/// Export sinks
pub mod sink;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, ExportConfig, FeedConfig};
pub use error::{Error, Result};
pub use exporter::Exporter;
pub use sink::{DirectorySink, ExportSink, MemorySink};
pub use types::{
    BlogId, Event, ExportSummary, FeedPage, FeedTarget, FetchProgress, PaginationHalt, PostEntry,
    RunOutcome, RunState, ScrapeSession, YearSummary,
};
