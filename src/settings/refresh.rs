//! Hand-off of a model fetch from its background task to the draft owner

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::ollama::DirectoryError;

/// Outcome of one model list fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    /// Host the fetch was issued against
    pub host: String,
    pub outcome: Result<Vec<String>, DirectoryError>,
    /// Keeps the draft's `Loading` state alive until the result is applied
    pub(super) _in_flight: Arc<()>,
}

/// A fetch running on the async runtime
///
/// The owner of the draft either awaits [`PendingRefresh::wait`] or polls
/// [`PendingRefresh::try_take`] from its own loop, then hands the result to
/// `SettingsController::complete_refresh`. Dropping it (or the result)
/// does not stop the fetch, but the result is discarded and the draft stops
/// reporting `Loading`, so a new refresh can be started.
#[derive(Debug)]
pub struct PendingRefresh {
    host: String,
    rx: oneshot::Receiver<Result<Vec<String>, DirectoryError>>,
    in_flight: Arc<()>,
}

impl PendingRefresh {
    pub(super) fn new(
        host: String,
        rx: oneshot::Receiver<Result<Vec<String>, DirectoryError>>,
        in_flight: Arc<()>,
    ) -> Self {
        Self { host, rx, in_flight }
    }

    pub async fn wait(self) -> RefreshResult {
        let outcome = self.rx.await.unwrap_or_else(|_| Err(task_lost()));
        RefreshResult {
            host: self.host,
            outcome,
            _in_flight: self.in_flight,
        }
    }

    /// Non-blocking check; `None` while the fetch is still running
    pub fn try_take(&mut self) -> Option<RefreshResult> {
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(task_lost()),
        };
        Some(RefreshResult {
            host: self.host.clone(),
            outcome,
            _in_flight: Arc::clone(&self.in_flight),
        })
    }
}

// The fetch task ended without reporting (panicked or runtime shut down)
fn task_lost() -> DirectoryError {
    DirectoryError::Other { message: None }
}
