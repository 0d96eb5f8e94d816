//! Partitioned warehouse-table cleaner
//!
//! Resolves target tables through the query engine, decides expiry per
//! table (whole-table, time-sorted partition range, or per-partition by
//! directory timestamp) and issues drop DDL. External tables get their
//! backing data removed from the distributed filesystem first when trash
//! is skipped, because dropping an external table's definition never
//! removes its data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info, warn};

use sweep_core::{
    expiry, pattern, CleanError, CommandRunner, ListingFormat, ListingParser, RetentionWindow,
    TargetPattern,
};

use crate::engine::QueryEngine;
use crate::strategy::{CleanStats, Cleaner, RunContext, DEFAULT_ACTION_PREFIX};

/// Default retention for warehouse tables
pub const DEFAULT_WINDOW: RetentionWindow = RetentionWindow::months(4);

/// Which timestamp drives partitioned-table expiry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckTimeType {
    /// Parse the partition value itself as a date (time-sorted partitions)
    #[default]
    PartitionField,
    /// Use each partition directory's listing timestamp
    DfsUpdateTime,
}

/// Declarative parameters for the warehouse-table cleaner
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Database holding the target tables
    pub database: String,
    /// Database directory on the distributed filesystem
    pub warehouse_root: String,
    /// Shell template DDL statements are wrapped in
    pub ddl_command: String,
    /// Managed (inner) tables destroy their data on drop; external tables
    /// do not
    pub managed: bool,
    /// Skip the backend trash: `purge` for managed tables, explicit data
    /// removal for external ones
    pub skip_trash: bool,
    /// Table targets: `*`, exact names, or globs
    pub tables: Vec<String>,
    /// Drop every target unconditionally
    pub ignore_update_time: bool,
    /// Expiry source for partitioned tables
    pub check_time_type: CheckTimeType,
    /// strptime format for time-sorted partition values
    pub partition_date_format: String,
    /// Listing line format for directory timestamps
    pub listing: ListingFormat,
    /// Retention window, default 4 months
    pub window: Option<RetentionWindow>,
    /// Filesystem shell, default `hadoop fs`
    pub dfs_command: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            warehouse_root: String::new(),
            ddl_command: "hive -e".to_string(),
            managed: true,
            skip_trash: false,
            tables: Vec::new(),
            ignore_update_time: false,
            check_time_type: CheckTimeType::default(),
            partition_date_format: "%Y%m%d".to_string(),
            listing: ListingFormat::default(),
            window: None,
            dfs_command: "hadoop fs".to_string(),
        }
    }
}

/// Drops expired warehouse tables and partitions
pub struct WarehouseTableCleaner {
    config: WarehouseConfig,
    engine: Arc<dyn QueryEngine>,
    runner: Arc<dyn CommandRunner>,
    action_prefix: String,
}

impl WarehouseTableCleaner {
    pub fn new(
        config: WarehouseConfig,
        engine: Arc<dyn QueryEngine>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            engine,
            runner,
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
        }
    }

    fn resolve_targets(&self, db_tables: &[String]) -> Result<Vec<String>, CleanError> {
        let mut targets = Vec::new();
        let mut seen = HashSet::new();

        for name in &self.config.tables {
            match TargetPattern::classify(name) {
                TargetPattern::All => {
                    info!(
                        "{}: `*` configured, every table in {} is a target",
                        self.description(),
                        self.config.database
                    );
                    return Ok(db_tables.to_vec());
                }
                TargetPattern::Wildcard(glob) => {
                    let matched = pattern::expand_wildcard(&glob, db_tables)?;
                    if matched.is_empty() {
                        warn!("{}: no table matches {}", self.description(), glob);
                    } else {
                        info!("{}: {} matches {:?}", self.description(), glob, matched);
                        targets.extend(matched);
                    }
                }
                TargetPattern::Exact(exact) => {
                    if db_tables.contains(&exact) {
                        targets.push(exact);
                    } else {
                        error!(
                            "{}: table {} not in database {}",
                            self.description(),
                            exact,
                            self.config.database
                        );
                    }
                }
            }
        }

        targets.retain(|table| seen.insert(table.clone()));
        Ok(targets)
    }

    fn handle_table(
        &self,
        table: &str,
        parser: &ListingParser,
        cutoff: NaiveDate,
        dir_dates: &mut Option<HashMap<String, Option<NaiveDate>>>,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        if self.config.ignore_update_time {
            self.drop_table(table, ctx, stats);
            return;
        }

        let partitions = match self.engine.list_partitions(&self.config.database, table) {
            Ok(partitions) if !partitions.is_empty() => partitions,
            Ok(_) | Err(_) => {
                self.handle_unpartitioned(table, parser, cutoff, dir_dates, ctx, stats);
                return;
            }
        };

        match self.config.check_time_type {
            CheckTimeType::PartitionField => {
                if self.first_partition_is_date(&partitions) {
                    self.drop_expired_sorted_partitions(table, &partitions, cutoff, ctx, stats);
                } else {
                    info!(
                        "{}: {}.{} partition values are not dates, skipped",
                        self.description(),
                        self.config.database,
                        table
                    );
                    stats.skipped += 1;
                }
            }
            CheckTimeType::DfsUpdateTime => {
                self.drop_partitions_by_listing_time(table, &partitions, parser, cutoff, ctx, stats);
            }
        }
    }

    /// A table without partitions is judged by its directory's listing
    /// timestamp under the warehouse root. The root listing is fetched at
    /// most once per run.
    fn handle_unpartitioned(
        &self,
        table: &str,
        parser: &ListingParser,
        cutoff: NaiveDate,
        dir_dates: &mut Option<HashMap<String, Option<NaiveDate>>>,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        if dir_dates.is_none() {
            match self.load_root_dir_dates(parser) {
                Ok(dates) => *dir_dates = Some(dates),
                Err(e) => {
                    error!(
                        "{}: listing warehouse root {} failed: {}",
                        self.description(),
                        self.config.warehouse_root,
                        e
                    );
                    stats.failed += 1;
                    return;
                }
            }
        }
        let Some(dates) = dir_dates.as_ref() else {
            return;
        };

        match dates.get(table) {
            None => {
                warn!(
                    "{}: table {} not found under {}",
                    self.description(),
                    table,
                    self.config.warehouse_root
                );
                stats.skipped += 1;
            }
            Some(None) => {
                warn!(
                    "{}: table {} directory has no parseable timestamp",
                    self.description(),
                    table
                );
                stats.skipped += 1;
            }
            Some(Some(date)) if expiry::is_expired(*date, cutoff) => {
                self.drop_table(table, ctx, stats);
            }
            Some(Some(_)) => {
                info!(
                    "{}: {}.{} not expired, retained",
                    self.description(),
                    self.config.database,
                    table
                );
                stats.skipped += 1;
            }
        }
    }

    fn load_root_dir_dates(
        &self,
        parser: &ListingParser,
    ) -> Result<HashMap<String, Option<NaiveDate>>, sweep_core::CommandError> {
        let root = self.root_slashed();
        let lines = self
            .runner
            .run(&format!("{} -ls {}", self.config.dfs_command, root))?;
        Ok(parser.parse_directory_map(&lines, &root))
    }

    fn first_partition_is_date(&self, partitions: &[String]) -> bool {
        partitions.first().is_some_and(|first| {
            NaiveDate::parse_from_str(partition_value(first), &self.config.partition_date_format)
                .is_ok()
        })
    }

    /// Time-sorted partitions allow one range drop covering everything up
    /// to the newest expired value.
    fn drop_expired_sorted_partitions(
        &self,
        table: &str,
        partitions: &[String],
        cutoff: NaiveDate,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        let mut expired: Vec<&String> = Vec::new();
        for partition in partitions {
            let value = partition_value(partition);
            match NaiveDate::parse_from_str(value, &self.config.partition_date_format) {
                Ok(date) if expiry::is_expired(date, cutoff) => expired.push(partition),
                Ok(_) => {}
                Err(_) => warn!(
                    "{}: partition {} of {}.{} is not a date, ignored",
                    self.description(),
                    partition,
                    self.config.database,
                    table
                ),
            }
        }

        if expired.is_empty() {
            info!(
                "{}: {}.{} has no expired partition",
                self.description(),
                self.config.database,
                table
            );
            stats.skipped += 1;
            return;
        }

        info!(
            "{}: {}.{} expired partitions: {:?}",
            self.description(),
            self.config.database,
            table,
            expired
        );

        let max_expired = match expired.iter().max() {
            Some(partition) => partition.as_str(),
            None => return,
        };

        // External tables only lose data through the filesystem
        let data_dirs: Vec<String> = if self.config.skip_trash && !self.config.managed {
            expired
                .iter()
                .map(|partition| self.partition_dir(table, partition.as_str()))
                .collect()
        } else {
            Vec::new()
        };

        if ctx.mode.is_preview() {
            info!(
                "{}{} drop {}.{} partitions <= {} {}",
                self.action_prefix,
                self.description(),
                self.config.database,
                table,
                max_expired,
                self.trash_note()
            );
            stats.deleted += 1;
            return;
        }

        for dir in &data_dirs {
            self.remove_dfs_dir(dir, stats);
        }

        let (field, value) = split_partition(max_expired);
        let mut statement = format!(
            "alter table {}.{} drop partition ({} <= '{}')",
            self.config.database, table, field, value
        );
        if self.config.managed && self.config.skip_trash {
            statement.push_str(" purge");
        }

        match self.engine.execute_ddl(&statement) {
            Ok(()) => {
                info!(
                    "{}{} drop {}.{} partitions <= {} success",
                    self.action_prefix,
                    self.description(),
                    self.config.database,
                    table,
                    max_expired
                );
                stats.deleted += 1;
            }
            Err(e) => {
                error!(
                    "{}{} drop {}.{} partitions <= {} failed: {}",
                    self.action_prefix,
                    self.description(),
                    self.config.database,
                    table,
                    max_expired,
                    e
                );
                stats.failed += 1;
            }
        }
    }

    /// Without time-sorted values each partition directory is judged by
    /// its own listing timestamp and dropped individually.
    fn drop_partitions_by_listing_time(
        &self,
        table: &str,
        partitions: &[String],
        parser: &ListingParser,
        cutoff: NaiveDate,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        let table_dir = self.table_dir(table);
        let lines = match self
            .runner
            .run(&format!("{} -ls {}", self.config.dfs_command, table_dir))
        {
            Ok(lines) => lines,
            Err(e) => {
                error!(
                    "{}: listing {} failed: {}",
                    self.description(),
                    table_dir,
                    e
                );
                stats.failed += 1;
                return;
            }
        };

        let mut expired_dirs: Vec<String> = Vec::new();
        for line in &lines {
            if !line.contains(table_dir.as_str()) {
                continue;
            }
            let Some(entry) = parser.parse_line(line) else {
                continue;
            };
            if entry
                .timestamp
                .is_some_and(|date| expiry::is_expired(date, cutoff))
            {
                expired_dirs.push(entry.path);
            }
        }

        if expired_dirs.is_empty() {
            info!(
                "{}: {}.{} has no expired partition",
                self.description(),
                self.config.database,
                table
            );
            stats.skipped += 1;
            return;
        }

        let expired_partitions: Vec<&String> = partitions
            .iter()
            .filter(|partition| {
                expired_dirs
                    .iter()
                    .any(|dir| dir.ends_with(partition.as_str()))
            })
            .collect();

        if expired_partitions.is_empty() {
            warn!(
                "{}: {}.{} expired directories {:?} match no partition",
                self.description(),
                self.config.database,
                table,
                expired_dirs
            );
            return;
        }

        if ctx.mode.is_preview() {
            info!(
                "{}{} drop {}.{} partitions {:?} {}",
                self.action_prefix,
                self.description(),
                self.config.database,
                table,
                expired_partitions,
                self.trash_note()
            );
            stats.deleted += expired_partitions.len() as u64;
            return;
        }

        if self.config.skip_trash && !self.config.managed {
            for dir in &expired_dirs {
                self.remove_dfs_dir(dir, stats);
            }
        }

        for partition in expired_partitions {
            let (field, value) = split_partition(partition);
            let mut statement = format!(
                "alter table {}.{} drop partition ({} = '{}')",
                self.config.database, table, field, value
            );
            if self.config.managed && self.config.skip_trash {
                statement.push_str(" purge");
            }

            match self.engine.execute_ddl(&statement) {
                Ok(()) => {
                    info!(
                        "{}{} drop {}.{} partition {} success",
                        self.action_prefix,
                        self.description(),
                        self.config.database,
                        table,
                        partition
                    );
                    stats.deleted += 1;
                }
                Err(e) => {
                    error!(
                        "{}{} drop {}.{} partition {} failed: {}",
                        self.action_prefix,
                        self.description(),
                        self.config.database,
                        table,
                        partition,
                        e
                    );
                    stats.failed += 1;
                }
            }
        }
    }

    fn drop_table(&self, table: &str, ctx: &RunContext, stats: &mut CleanStats) {
        if ctx.mode.is_preview() {
            info!(
                "{}{} drop table {}.{} {}",
                self.action_prefix,
                self.description(),
                self.config.database,
                table,
                self.trash_note()
            );
            stats.deleted += 1;
            return;
        }

        if !self.config.managed && self.config.skip_trash {
            // The definition drop below will not touch external data
            self.remove_dfs_dir(&self.table_dir(table), stats);
        }

        let mut statement = format!(
            "drop table if exists {}.{}",
            self.config.database, table
        );
        if self.config.managed && self.config.skip_trash {
            statement.push_str(" purge");
        }

        match self.engine.execute_ddl(&statement) {
            Ok(()) => {
                warn!(
                    "{}{} drop table {}.{} success",
                    self.action_prefix,
                    self.description(),
                    self.config.database,
                    table
                );
                stats.deleted += 1;
            }
            Err(e) => {
                error!(
                    "{}{} drop table {}.{} failed: {}",
                    self.action_prefix,
                    self.description(),
                    self.config.database,
                    table,
                    e
                );
                stats.failed += 1;
            }
        }
    }

    fn remove_dfs_dir(&self, dir: &str, stats: &mut CleanStats) {
        let command = format!("{} -rm -r -skipTrash {}", self.config.dfs_command, dir);
        match self.runner.run(&command) {
            Ok(_) => info!(
                "{}{} removed data dir {}",
                self.action_prefix,
                self.description(),
                dir
            ),
            Err(e) => {
                error!(
                    "{}{} removing data dir {} failed: {}",
                    self.action_prefix,
                    self.description(),
                    dir,
                    e
                );
                stats.failed += 1;
            }
        }
    }

    fn trash_note(&self) -> &'static str {
        match (self.config.managed, self.config.skip_trash) {
            (true, true) => "with purge",
            (true, false) => "without purge",
            (false, true) => "with skip trash",
            (false, false) => "with trash",
        }
    }

    fn root_slashed(&self) -> String {
        let root = self.config.warehouse_root.trim_end_matches('/');
        format!("{}/", root)
    }

    fn table_dir(&self, table: &str) -> String {
        format!("{}{}", self.root_slashed(), table)
    }

    fn partition_dir(&self, table: &str, partition: &str) -> String {
        format!("{}/{}", self.table_dir(table), partition)
    }
}

impl Cleaner for WarehouseTableCleaner {
    fn description(&self) -> &str {
        "warehouse table cleaner"
    }

    fn validate(&self) -> Result<(), CleanError> {
        let describe =
            |what: &str| CleanError::Config(format!("{}: {} not specified", self.description(), what));

        if self.config.database.is_empty() {
            return Err(describe("database"));
        }
        if self.config.warehouse_root.is_empty() {
            return Err(describe("warehouse root"));
        }
        if self.config.tables.is_empty() {
            return Err(describe("target tables"));
        }
        if self.config.ddl_command.is_empty() {
            return Err(describe("ddl command"));
        }
        if self.config.check_time_type == CheckTimeType::PartitionField
            && self.config.partition_date_format.is_empty()
        {
            return Err(describe("partition date format"));
        }
        Ok(())
    }

    fn clean(&self, ctx: &RunContext) -> Result<CleanStats, CleanError> {
        self.validate()?;

        let parser = self.config.listing.parser()?;
        let window = self.config.window.unwrap_or(DEFAULT_WINDOW);
        let cutoff = window.cutoff(ctx.reference);
        let mut stats = CleanStats::default();

        let db_tables = self
            .engine
            .list_tables(&self.config.database)
            .map_err(|e| {
                CleanError::Discovery(format!(
                    "listing tables in {} failed: {}",
                    self.config.database, e
                ))
            })?;

        let targets = self.resolve_targets(&db_tables)?;

        // Warehouse-root listing, shared by every fallback lookup this run
        let mut dir_dates: Option<HashMap<String, Option<NaiveDate>>> = None;

        for table in &targets {
            self.handle_table(table, &parser, cutoff, &mut dir_dates, ctx, &mut stats);
        }

        Ok(stats)
    }

    fn set_action_prefix(&mut self, prefix: &str) {
        self.action_prefix = prefix.to_string();
    }
}

fn partition_value(partition: &str) -> &str {
    partition.rsplit('=').next().unwrap_or(partition)
}

fn split_partition(partition: &str) -> (&str, &str) {
    let field = partition.split('=').next().unwrap_or(partition);
    (field, partition_value(partition))
}
