//! Declarative accumulation of backend strategies

use std::sync::Arc;

use sweep_core::{CleanError, CommandRunner, ShellRunner};

use crate::colfam::{ColumnFamilyConfig, ColumnFamilyTableCleaner};
use crate::dfs::{DfsPathCleaner, DfsPathsConfig};
use crate::engine::QueryEngine;
use crate::local::{LocalPathCleaner, LocalPathsConfig};
use crate::run::CleanRunner;
use crate::strategy::Cleaner;
use crate::warehouse::{WarehouseConfig, WarehouseTableCleaner};

/// Accumulates configured backend strategies into a [`CleanRunner`]
///
/// Each `with_*` call appends one strategy; strategies validate their own
/// parameters lazily on the first clean, so building stays cheap.
pub struct CleanerBuilder {
    runner: Arc<dyn CommandRunner>,
    cleaners: Vec<Box<dyn Cleaner>>,
}

impl CleanerBuilder {
    /// Builder whose strategies shell out for real
    pub fn new() -> Self {
        Self {
            runner: Arc::new(ShellRunner),
            cleaners: Vec::new(),
        }
    }

    /// Swap the command runner used by strategies added after this call
    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Add a local filesystem strategy
    pub fn with_local_paths(mut self, config: LocalPathsConfig) -> Self {
        self.cleaners.push(Box::new(LocalPathCleaner::new(config)));
        self
    }

    /// Add a distributed-filesystem strategy
    pub fn with_dfs_paths(mut self, config: DfsPathsConfig) -> Self {
        self.cleaners
            .push(Box::new(DfsPathCleaner::new(config, Arc::clone(&self.runner))));
        self
    }

    /// Add a warehouse-table strategy driven by the given query engine
    pub fn with_warehouse_tables(
        mut self,
        engine: Arc<dyn QueryEngine>,
        config: WarehouseConfig,
    ) -> Self {
        self.cleaners.push(Box::new(WarehouseTableCleaner::new(
            config,
            engine,
            Arc::clone(&self.runner),
        )));
        self
    }

    /// Add a column-family store strategy
    pub fn with_column_family_tables(mut self, config: ColumnFamilyConfig) -> Self {
        self.cleaners.push(Box::new(ColumnFamilyTableCleaner::new(
            config,
            Arc::clone(&self.runner),
        )));
        self
    }

    /// Produce the runner; fails when no backend was configured
    pub fn build(self) -> Result<CleanRunner, CleanError> {
        if self.cleaners.is_empty() {
            return Err(CleanError::Config("no cleaner configured".to_string()));
        }
        Ok(CleanRunner::new(self.cleaners))
    }
}

impl Default for CleanerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_fails() {
        assert!(matches!(
            CleanerBuilder::new().build(),
            Err(CleanError::Config(_))
        ));
    }

    #[test]
    fn test_builder_accumulates_strategies() {
        let runner = CleanerBuilder::new()
            .with_local_paths(LocalPathsConfig::default())
            .with_dfs_paths(DfsPathsConfig::default())
            .build()
            .unwrap();
        assert_eq!(runner.strategy_count(), 2);
    }
}
