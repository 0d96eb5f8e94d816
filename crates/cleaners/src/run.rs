//! Run orchestration and structured reporting

use tracing::{error, info};

use sweep_core::CleanError;

use crate::strategy::{CleanStats, Cleaner, ExecutionMode, RunContext};

/// Executes configured strategies in order, isolating their failures
pub struct CleanRunner {
    cleaners: Vec<Box<dyn Cleaner>>,
}

impl CleanRunner {
    pub(crate) fn new(cleaners: Vec<Box<dyn Cleaner>>) -> Self {
        Self { cleaners }
    }

    /// Apply the retention policy on every configured backend
    pub fn run(&self) -> RunReport {
        self.run_with(&RunContext::today(ExecutionMode::Apply))
    }

    /// Compute and log every deletion without performing any
    pub fn preview(&self) -> RunReport {
        self.run_with(&RunContext::today(ExecutionMode::Preview))
    }

    /// Run every strategy under an explicit context
    ///
    /// One strategy's failure never stops the ones after it.
    pub fn run_with(&self, ctx: &RunContext) -> RunReport {
        let mut outcomes = Vec::new();

        for cleaner in &self.cleaners {
            info!("begin cleaner: {}", cleaner.description());
            let result = cleaner.clean(ctx);
            match &result {
                Ok(stats) => info!(
                    "cleaner {} finished: {} deleted, {} skipped, {} failed",
                    cleaner.description(),
                    stats.deleted,
                    stats.skipped,
                    stats.failed
                ),
                Err(e) => error!("cleaner {} failed: {}", cleaner.description(), e),
            }
            outcomes.push(StrategyOutcome {
                description: cleaner.description().to_string(),
                result,
            });
        }

        RunReport { outcomes }
    }

    /// Tag every strategy's destructive-action log lines
    pub fn set_action_prefix(&mut self, prefix: &str) {
        for cleaner in &mut self.cleaners {
            cleaner.set_action_prefix(prefix);
        }
    }

    /// Number of configured strategies
    pub fn strategy_count(&self) -> usize {
        self.cleaners.len()
    }
}

/// Outcome of one strategy in a run
#[derive(Debug)]
pub struct StrategyOutcome {
    /// Strategy description
    pub description: String,
    /// Stats on success, the isolating error otherwise
    pub result: Result<CleanStats, CleanError>,
}

/// Structured result of one orchestrator run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per-strategy outcomes in execution order
    pub outcomes: Vec<StrategyOutcome>,
}

impl RunReport {
    /// True when every strategy completed without an isolating error
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    /// Outcomes of the strategies that failed
    pub fn failures(&self) -> Vec<&StrategyOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .collect()
    }

    /// Sum of per-strategy stats; failed strategies contribute nothing
    pub fn totals(&self) -> CleanStats {
        let mut totals = CleanStats::default();
        for outcome in &self.outcomes {
            if let Ok(stats) = &outcome.result {
                totals.deleted += stats.deleted;
                totals.skipped += stats.skipped;
                totals.failed += stats.failed;
            }
        }
        totals
    }
}
