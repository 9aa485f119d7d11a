use thiserror::Error;

use crate::detector::{ClassifyError, MonitorStateError};
use crate::journal::StorageError;

#[derive(Debug, Error)]
pub enum WatchError {
    /// Start/stop called in the wrong state.
    #[error(transparent)]
    State(#[from] MonitorStateError),
    /// The provider had no tree or node to inspect.
    #[error("UI tree provider unavailable")]
    ProviderUnavailable,
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to start watch worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker thread is gone; the session was shut down.
    #[error("watch worker is not running")]
    WorkerGone,
}
