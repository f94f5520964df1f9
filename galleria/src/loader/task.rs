//! Load tasks and the handles callers wait on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::LoadError;

/// A request to load one image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadTask {
    /// URL to fetch.
    pub url: String,
    /// Priority tasks jump ahead of everything else in the backlog.
    pub priority: bool,
}

impl LoadTask {
    /// A normal-priority task.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: false,
        }
    }

    /// A priority task.
    pub fn priority(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: true,
        }
    }
}

/// Lifecycle of a load task. Only the queue transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting in the backlog.
    Queued,
    /// Admitted and fetching.
    Loading,
    /// Finished with bytes.
    Done,
    /// Finished with an error, or drained.
    Failed,
}

impl LoadState {
    /// Short label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Queued => "queued",
            LoadState::Loading => "loading",
            LoadState::Done => "done",
            LoadState::Failed => "failed",
        }
    }

    /// Whether the task has reached a final state.
    pub fn is_finished(&self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A successfully loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub url: String,
    pub bytes: Vec<u8>,
    /// Time spent fetching, excluding backlog wait.
    pub elapsed: Duration,
}

pub(crate) type LoadResult = Result<LoadedImage, LoadError>;

/// Shared task state written by the queue and read through the handle.
pub(crate) type SharedState = Arc<Mutex<LoadState>>;

/// Caller's view of an enqueued load.
#[derive(Debug)]
pub struct LoadHandle {
    url: String,
    state: SharedState,
    rx: oneshot::Receiver<LoadResult>,
}

impl LoadHandle {
    pub(crate) fn new(url: String, state: SharedState, rx: oneshot::Receiver<LoadResult>) -> Self {
        Self { url, state, rx }
    }

    /// URL being loaded.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoadState {
        *self.state.lock()
    }

    /// Wait for the outcome.
    pub async fn wait(self) -> LoadResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(LoadError::Abandoned { url: self.url }),
        }
    }
}
