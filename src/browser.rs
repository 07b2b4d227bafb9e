use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Where a scroll should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTarget {
    /// Bring the matching element into view.
    Element(String),
    /// Scroll the viewport vertically by this many pixels.
    By(i64),
}

/// The browser capability the agent drives.
///
/// One agent owns one browser for the lifetime of a task: `launch` is called
/// once when the task starts and `close` exactly once when it ends, whatever
/// the outcome. Every other call may fail; the agent decides which failures
/// are recoverable.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn launch(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    async fn scroll(&self, target: ScrollTarget) -> Result<()>;

    /// Full HTML of the current document.
    async fn content(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
}
