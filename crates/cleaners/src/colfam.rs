//! Column-family store table cleaner
//!
//! Discovers tables through the store's admin shell, judges expiry by each
//! table's data-directory timestamp on the distributed filesystem, then
//! disables (and optionally drops) expired tables. Admin commands run from
//! a run-unique temporary script so concurrent runs cannot clobber each
//! other's command files.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use sweep_core::{
    expiry, pattern, CleanError, CommandRunner, ListingFormat, ListingParser, RetentionWindow,
    TargetPattern,
};

use crate::strategy::{CleanStats, Cleaner, RunContext, DEFAULT_ACTION_PREFIX};

/// Default retention for column-family tables
pub const DEFAULT_WINDOW: RetentionWindow = RetentionWindow::months(4);

/// Declarative parameters for the column-family cleaner
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnFamilyConfig {
    /// Namespace holding the target tables
    pub namespace: String,
    /// Table data directories on the distributed filesystem
    pub data_dir: String,
    /// Table targets: `*`, exact names, or globs
    pub tables: Vec<String>,
    /// Also drop the table definition after disabling it
    pub drop_table: bool,
    /// Delete every target without checking its timestamp
    pub ignore_update_time: bool,
    /// Listing line format for directory timestamps
    pub listing: ListingFormat,
    /// Retention window, default 4 months
    pub window: Option<RetentionWindow>,
    /// Admin shell, default `hbase shell`
    pub admin_command: String,
    /// Filesystem shell, default `hadoop fs`
    pub dfs_command: String,
}

impl Default for ColumnFamilyConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            data_dir: "/hbase/data".to_string(),
            tables: Vec::new(),
            drop_table: false,
            ignore_update_time: false,
            listing: ListingFormat::default(),
            window: None,
            admin_command: "hbase shell".to_string(),
            dfs_command: "hadoop fs".to_string(),
        }
    }
}

/// Disables and drops expired column-family tables
pub struct ColumnFamilyTableCleaner {
    config: ColumnFamilyConfig,
    runner: Arc<dyn CommandRunner>,
    action_prefix: String,
}

impl ColumnFamilyTableCleaner {
    pub fn new(config: ColumnFamilyConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
        }
    }

    /// Run admin commands from a temporary script file
    ///
    /// The handle keeps the file alive for the duration of the command and
    /// removes it on drop, success and failure alike.
    fn run_admin_script(&self, commands: &[String]) -> Result<Vec<String>> {
        let mut script = NamedTempFile::new().context("creating admin command script")?;
        for command in commands {
            writeln!(script, "{}", command).context("writing admin command script")?;
        }
        writeln!(script, "exit").context("writing admin command script")?;
        script.flush().context("flushing admin command script")?;

        let command = format!(
            "{} {}",
            self.config.admin_command,
            script.path().display()
        );
        let lines = self.runner.run(&command)?;
        Ok(lines)
    }

    fn list_namespace_tables(&self) -> Result<Vec<String>> {
        let lines = self.run_admin_script(&["list".to_string()])?;
        let prefix = format!("{}:", self.config.namespace);

        let tables: Vec<String> = lines
            .iter()
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect();

        info!(
            "{}: namespace {} tables: {:?}",
            self.description(),
            self.config.namespace,
            tables
        );
        Ok(tables)
    }

    fn load_table_dir_dates(
        &self,
        parser: &ListingParser,
    ) -> Result<HashMap<String, Option<NaiveDate>>> {
        let namespace_dir = format!(
            "{}/{}/",
            self.config.data_dir.trim_end_matches('/'),
            self.config.namespace
        );
        let lines = self
            .runner
            .run(&format!("{} -ls {}", self.config.dfs_command, namespace_dir))?;
        Ok(parser.parse_directory_map(&lines, &namespace_dir))
    }

    fn resolve_targets(
        &self,
        namespace_tables: &[String],
    ) -> Result<Vec<String>, CleanError> {
        let mut targets = Vec::new();

        for name in &self.config.tables {
            match TargetPattern::classify(name) {
                TargetPattern::All => {
                    info!(
                        "{}: `*` configured, every table in namespace {} is a target",
                        self.description(),
                        self.config.namespace
                    );
                    return Ok(namespace_tables.to_vec());
                }
                TargetPattern::Wildcard(glob) => {
                    let matched = pattern::expand_wildcard(&glob, namespace_tables)?;
                    if matched.is_empty() {
                        warn!("{}: no table matches {}", self.description(), glob);
                    } else {
                        targets.extend(matched);
                    }
                }
                TargetPattern::Exact(exact) => {
                    if namespace_tables.contains(&exact) {
                        targets.push(exact);
                    } else {
                        warn!(
                            "{}: table {} not in namespace {}",
                            self.description(),
                            exact,
                            self.config.namespace
                        );
                    }
                }
            }
        }

        Ok(targets)
    }

    fn table_expired(
        &self,
        table: &str,
        dir_dates: &HashMap<String, Option<NaiveDate>>,
        cutoff: NaiveDate,
    ) -> bool {
        if self.config.ignore_update_time {
            return true;
        }
        match dir_dates.get(table) {
            Some(Some(date)) => expiry::is_expired(*date, cutoff),
            // A table whose data directory has no timestamp left to check
            // is treated as abandoned
            Some(None) | None => {
                warn!(
                    "{}: table {} has no data-directory timestamp, treating as expired",
                    self.description(),
                    table
                );
                true
            }
        }
    }

    fn delete_table(&self, table: &str, ctx: &RunContext, stats: &mut CleanStats) {
        let qualified = format!("{}:{}", self.config.namespace, table);

        if ctx.mode.is_preview() {
            info!(
                "{}{} clear table {} (drop table: {})",
                self.action_prefix,
                self.description(),
                qualified,
                self.config.drop_table
            );
            stats.deleted += 1;
            return;
        }

        let mut commands = vec![format!("disable '{}'", qualified)];
        if self.config.drop_table {
            commands.push(format!("drop '{}'", qualified));
        }

        match self.run_admin_script(&commands) {
            Ok(_) => {
                info!(
                    "{}{} clear table {} success",
                    self.action_prefix,
                    self.description(),
                    qualified
                );
                stats.deleted += 1;
            }
            Err(e) => {
                error!(
                    "{}{} clear table {} failed: {}",
                    self.action_prefix,
                    self.description(),
                    qualified,
                    e
                );
                stats.failed += 1;
            }
        }
    }
}

impl Cleaner for ColumnFamilyTableCleaner {
    fn description(&self) -> &str {
        "column family table cleaner"
    }

    fn validate(&self) -> Result<(), CleanError> {
        if self.config.namespace.is_empty() {
            return Err(CleanError::Config(format!(
                "{}: namespace not specified",
                self.description()
            )));
        }
        if self.config.tables.is_empty() {
            return Err(CleanError::Config(format!(
                "{}: no target table specified",
                self.description()
            )));
        }
        Ok(())
    }

    fn clean(&self, ctx: &RunContext) -> Result<CleanStats, CleanError> {
        self.validate()?;

        let parser = self.config.listing.parser()?;
        let window = self.config.window.unwrap_or(DEFAULT_WINDOW);
        let cutoff = window.cutoff(ctx.reference);
        let mut stats = CleanStats::default();

        let namespace_tables = self.list_namespace_tables().map_err(|e| {
            CleanError::Discovery(format!(
                "listing tables in namespace {} failed: {}",
                self.config.namespace, e
            ))
        })?;

        let dir_dates = if self.config.ignore_update_time {
            HashMap::new()
        } else {
            self.load_table_dir_dates(&parser).map_err(|e| {
                CleanError::Discovery(format!(
                    "listing data dir of namespace {} failed: {}",
                    self.config.namespace, e
                ))
            })?
        };

        for table in self.resolve_targets(&namespace_tables)? {
            if self.table_expired(&table, &dir_dates, cutoff) {
                self.delete_table(&table, ctx, &mut stats);
            } else {
                info!(
                    "{}: table {} not expired, skipped",
                    self.description(),
                    table
                );
                stats.skipped += 1;
            }
        }

        Ok(stats)
    }

    fn set_action_prefix(&mut self, prefix: &str) {
        self.action_prefix = prefix.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ExecutionMode;
    use std::cell::RefCell;
    use sweep_core::CommandError;

    /// Runner that reads admin scripts back to see what was executed
    struct AdminFake {
        list_output: Vec<String>,
        ls_output: Vec<String>,
        scripts: RefCell<Vec<String>>,
    }

    impl AdminFake {
        fn new(list_output: &[&str], ls_output: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                list_output: list_output.iter().map(|s| s.to_string()).collect(),
                ls_output: ls_output.iter().map(|s| s.to_string()).collect(),
                scripts: RefCell::new(Vec::new()),
            })
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.borrow().clone()
        }
    }

    impl CommandRunner for AdminFake {
        fn run(&self, command: &str) -> Result<Vec<String>, CommandError> {
            if command.starts_with("hadoop fs -ls") {
                return Ok(self.ls_output.clone());
            }

            // "hbase shell <script path>": inspect the script content
            let path = command.split_whitespace().last().unwrap();
            let content = std::fs::read_to_string(path).unwrap();
            self.scripts.borrow_mut().push(content.clone());

            if content.starts_with("list") {
                Ok(self.list_output.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn context(mode: ExecutionMode) -> RunContext {
        RunContext::new(mode, NaiveDate::from_ymd_opt(2021, 8, 6).unwrap())
    }

    fn config(tables: &[&str]) -> ColumnFamilyConfig {
        ColumnFamilyConfig {
            namespace: "ns1".to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            window: Some(RetentionWindow::months(4)),
            ..Default::default()
        }
    }

    const LIST: &[&str] = &["TABLE", "ns1:tb1", "ns1:tb2", "other:tb9", "2 row(s)"];

    #[test]
    fn test_expired_table_is_disabled() {
        let runner = AdminFake::new(
            LIST,
            &["drwxr-xr-x - h h 0 2021-01-10 10:00 /hbase/data/ns1/tb1"],
        );

        let cleaner = ColumnFamilyTableCleaner::new(config(&["tb1"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 1);
        let scripts = runner.scripts();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1], "disable 'ns1:tb1'\nexit\n");
    }

    #[test]
    fn test_drop_table_flag_adds_drop_command() {
        let runner = AdminFake::new(
            LIST,
            &["drwxr-xr-x - h h 0 2021-01-10 10:00 /hbase/data/ns1/tb1"],
        );

        let cleaner = ColumnFamilyTableCleaner::new(
            ColumnFamilyConfig {
                drop_table: true,
                ..config(&["tb1"])
            },
            runner.clone(),
        );
        cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(
            runner.scripts()[1],
            "disable 'ns1:tb1'\ndrop 'ns1:tb1'\nexit\n"
        );
    }

    #[test]
    fn test_fresh_table_is_skipped() {
        let runner = AdminFake::new(
            LIST,
            &["drwxr-xr-x - h h 0 2021-07-21 10:00 /hbase/data/ns1/tb1"],
        );

        let cleaner = ColumnFamilyTableCleaner::new(config(&["tb1"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(runner.scripts().len(), 1);
    }

    #[test]
    fn test_table_without_timestamp_is_deleted() {
        // tb2 has no line under the namespace data dir
        let runner = AdminFake::new(
            LIST,
            &["drwxr-xr-x - h h 0 2021-07-21 10:00 /hbase/data/ns1/tb1"],
        );

        let cleaner = ColumnFamilyTableCleaner::new(config(&["tb2"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 1);
    }

    #[test]
    fn test_wildcard_and_namespace_filtering() {
        let runner = AdminFake::new(LIST, &[]);

        let cleaner = ColumnFamilyTableCleaner::new(
            ColumnFamilyConfig {
                ignore_update_time: true,
                ..config(&["tb*"])
            },
            runner.clone(),
        );
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        // tb9 belongs to another namespace and is never a candidate
        assert_eq!(stats.deleted, 2);
    }

    #[test]
    fn test_preview_runs_no_admin_script_beyond_list() {
        let runner = AdminFake::new(
            LIST,
            &["drwxr-xr-x - h h 0 2021-01-10 10:00 /hbase/data/ns1/tb1"],
        );

        let cleaner = ColumnFamilyTableCleaner::new(config(&["tb1"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Preview)).unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(runner.scripts().len(), 1);
    }

    #[test]
    fn test_missing_namespace_is_config_error() {
        let runner = AdminFake::new(&[], &[]);
        let cleaner = ColumnFamilyTableCleaner::new(
            ColumnFamilyConfig {
                namespace: String::new(),
                ..config(&["tb1"])
            },
            runner,
        );
        assert!(matches!(
            cleaner.clean(&context(ExecutionMode::Apply)),
            Err(CleanError::Config(_))
        ));
    }
}
