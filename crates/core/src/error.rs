//! Strategy-level error taxonomy

use thiserror::Error;

/// Failure that aborts a single strategy's run
///
/// Individual deletion failures never surface here: they are logged at the
/// point of the delete and counted in the run statistics, so one bad item
/// cannot stop its siblings.
#[derive(Debug, Error)]
pub enum CleanError {
    /// Missing or invalid required parameter, raised before any mutation
    #[error("configuration error: {0}")]
    Config(String),

    /// A listing or metadata query failed
    #[error("discovery failed: {0}")]
    Discovery(String),
}
