//! Export sinks that persist the rendered documents.
//!
//! The exporter hands each finished document to an [`ExportSink`] and does not
//! wait for any confirmation beyond the returned `Result`, which it only logs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Destination for exported documents
///
/// Implementations decide how a document is persisted: written to disk,
/// offered as a download, uploaded, or kept in memory.
///
/// # Examples
///
/// ```no_run
/// use blogger_export::sink::{DirectorySink, ExportSink};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = DirectorySink::new("./export");
/// sink.save("myblog_2020.xml", "<posts year=\"2020\"/>").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Persist one document under the given file name
    ///
    /// # Arguments
    ///
    /// * `filename` - Bare file name such as `myblog_2020.xml`
    /// * `content` - Complete document text
    async fn save(&self, filename: &str, content: &str) -> Result<()>;
}

/// Writes each document to a file inside a directory
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir` (created on first save if missing)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn save(&self, filename: &str, content: &str) -> Result<()> {
        // file names come from BlogId + year, but never let one escape the directory
        if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." {
            return Err(Error::Other(format!("refusing to write file '{}'", filename)));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "Document written");
        Ok(())
    }
}

/// Keeps documents in memory, in the order they were saved
///
/// Cloning shares the underlying storage.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    documents: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All saved documents as `(filename, content)` pairs
    pub async fn documents(&self) -> Vec<(String, String)> {
        self.documents.lock().await.clone()
    }

    /// Number of saved documents
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    /// Whether nothing has been saved
    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn save(&self, filename: &str, content: &str) -> Result<()> {
        self.documents
            .lock()
            .await
            .push((filename.to_string(), content.to_string()));
        Ok(())
    }
}
