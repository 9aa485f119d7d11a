//! Detects transient skip controls in a live UI tree and activates them.
//!
//! The host process owns the UI-tree provider and the input layer and plugs
//! them in through the traits in [`detector::node`]. Everything else (rule
//! chain, monitor loop, decision journal and its persistence) lives here.

pub mod config;
pub mod detector;
pub mod error;
pub mod journal;
pub mod session;

pub use config::WatchConfig;
pub use error::WatchError;
pub use session::{CheckReceiver, WatchHandle, WatchStatus};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the process log sink on stderr. Later calls are no-ops.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
