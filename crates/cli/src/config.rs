//! Declarative sweep configuration loaded from TOML
//!
//! One repeated table per backend kind; every section deserializes
//! straight into that strategy's config struct, so the file mirrors the
//! builder surface:
//!
//! ```toml
//! action_prefix = "====="
//!
//! [[local]]
//! paths = ["/opt/app/logs"]
//! window = { days = 15 }
//!
//! [[warehouse]]
//! database = "proj"
//! warehouse_root = "/user/hive/warehouse/proj.db"
//! tables = ["tb*"]
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use sweep_cleaners::{
    CleanRunner, CleanerBuilder, ColumnFamilyConfig, DfsPathsConfig, LocalPathsConfig,
    ShellQueryEngine, WarehouseConfig,
};
use sweep_core::ShellRunner;

/// Whole-file configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Tag for destructive-action log lines
    pub action_prefix: Option<String>,
    /// Local filesystem strategies
    pub local: Vec<LocalPathsConfig>,
    /// Distributed-filesystem strategies
    pub dfs: Vec<DfsPathsConfig>,
    /// Warehouse-table strategies
    pub warehouse: Vec<WarehouseConfig>,
    /// Column-family store strategies
    pub column_family: Vec<ColumnFamilyConfig>,
}

impl SweepConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Build the runner described by this configuration
    pub fn into_runner(self) -> Result<CleanRunner> {
        let shell = Arc::new(ShellRunner);
        let mut builder = CleanerBuilder::new();

        for local in self.local {
            builder = builder.with_local_paths(local);
        }
        for dfs in self.dfs {
            builder = builder.with_dfs_paths(dfs);
        }
        for warehouse in self.warehouse {
            let engine = Arc::new(ShellQueryEngine::new(
                shell.clone(),
                warehouse.ddl_command.clone(),
            ));
            builder = builder.with_warehouse_tables(engine, warehouse);
        }
        for column_family in self.column_family {
            builder = builder.with_column_family_tables(column_family);
        }

        let mut runner = builder.build()?;
        if let Some(prefix) = &self.action_prefix {
            runner.set_action_prefix(prefix);
        }
        Ok(runner)
    }
}
