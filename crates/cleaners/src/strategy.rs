//! The contract every backend strategy implements

use chrono::NaiveDate;
use sweep_core::CleanError;

/// Default tag for destructive-action log lines
pub const DEFAULT_ACTION_PREFIX: &str = "=====";

/// Whether a run mutates the backends or only reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Perform the deletions
    Apply,
    /// Log what would be deleted, touch nothing
    Preview,
}

impl ExecutionMode {
    /// True in preview mode
    pub fn is_preview(self) -> bool {
        matches!(self, ExecutionMode::Preview)
    }
}

/// Per-run inputs shared by every strategy
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    /// Apply or preview
    pub mode: ExecutionMode,
    /// Reference date expiry cutoffs are computed from
    pub reference: NaiveDate,
}

impl RunContext {
    /// Context with an explicit reference date
    pub fn new(mode: ExecutionMode, reference: NaiveDate) -> Self {
        Self { mode, reference }
    }

    /// Context for a run starting today
    pub fn today(mode: ExecutionMode) -> Self {
        Self::new(mode, chrono::Local::now().date_naive())
    }
}

/// Counters accumulated over one strategy invocation
///
/// In preview mode `deleted` counts items that would have been deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Items deleted, or previewed for deletion
    pub deleted: u64,
    /// Items examined and retained
    pub skipped: u64,
    /// Individual operations that failed
    pub failed: u64,
}

impl CleanStats {
    /// True when nothing was deleted and nothing failed
    pub fn is_noop(&self) -> bool {
        self.deleted == 0 && self.failed == 0
    }
}

/// One backend's cleaning capability
///
/// Strategies validate lazily: `clean` checks its parameters before
/// touching anything. Preview runs make exactly the same matching
/// decisions as apply runs; only the terminal action differs.
pub trait Cleaner {
    /// Strategy name used in logs and reports
    fn description(&self) -> &str;

    /// Check required parameters without mutating any state
    fn validate(&self) -> Result<(), CleanError>;

    /// Evaluate the retention policy and delete (or preview) expired items
    fn clean(&self, ctx: &RunContext) -> Result<CleanStats, CleanError>;

    /// Tag destructive-action log lines with a prefix
    fn set_action_prefix(&mut self, prefix: &str);
}
