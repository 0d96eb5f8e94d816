//! Backend cleaning strategies and run orchestration
//!
//! Four storage backends share one retention policy engine:
//! - Local filesystem paths
//! - Distributed-filesystem paths
//! - Partitioned warehouse tables
//! - Column-family store tables
//!
//! A builder accumulates configured strategies; the runner invokes them in
//! order, isolating per-strategy failures and supporting a preview mode
//! that logs every deletion instead of performing it.

pub mod builder;
pub mod colfam;
pub mod dfs;
pub mod engine;
pub mod local;
pub mod run;
pub mod strategy;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use builder::CleanerBuilder;
pub use colfam::{ColumnFamilyConfig, ColumnFamilyTableCleaner};
pub use dfs::{DfsPathCleaner, DfsPathsConfig};
pub use engine::{QueryEngine, ShellQueryEngine};
pub use local::{LocalPathCleaner, LocalPathsConfig};
pub use run::{CleanRunner, RunReport, StrategyOutcome};
pub use strategy::{CleanStats, Cleaner, ExecutionMode, RunContext};
pub use warehouse::{CheckTimeType, WarehouseConfig, WarehouseTableCleaner};
