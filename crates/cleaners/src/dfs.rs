//! Distributed-filesystem path cleaner
//!
//! Works entirely through the filesystem shell (`hadoop fs` by default):
//! listing output is parsed for timestamps, expired paths are removed
//! recursively, optionally skipping the backend trash.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info, warn};

use sweep_core::{
    expiry, CleanError, CommandRunner, ListingFormat, ListingParser, RetentionWindow,
};

use crate::strategy::{CleanStats, Cleaner, RunContext, DEFAULT_ACTION_PREFIX};

/// Default retention for distributed-filesystem paths
pub const DEFAULT_WINDOW: RetentionWindow = RetentionWindow::months(4);

fn default_dfs_command() -> String {
    "hadoop fs".to_string()
}

/// Declarative parameters for the distributed-path cleaner
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DfsPathsConfig {
    /// Paths to clean; an element containing `*` is expanded by the
    /// listing operation itself
    pub paths: Vec<String>,
    /// Remove with `-skipTrash`
    pub skip_trash: bool,
    /// Treat every path as expired
    pub ignore_update_time: bool,
    /// Listing line format
    pub listing: ListingFormat,
    /// Retention window, default 4 months
    pub window: Option<RetentionWindow>,
    /// Filesystem shell, default `hadoop fs`
    pub dfs_command: String,
}

impl Default for DfsPathsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            skip_trash: false,
            ignore_update_time: false,
            listing: ListingFormat::default(),
            window: None,
            dfs_command: default_dfs_command(),
        }
    }
}

/// Removes expired paths from a distributed filesystem
pub struct DfsPathCleaner {
    config: DfsPathsConfig,
    runner: Arc<dyn CommandRunner>,
    action_prefix: String,
}

impl DfsPathCleaner {
    pub fn new(config: DfsPathsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
        }
    }

    /// A literal path cannot be listed for its own metadata (listing a
    /// path lists its contents), so the timestamp comes from the parent's
    /// listing line for it.
    fn handle_literal_path(
        &self,
        path: &str,
        parser: &ListingParser,
        cutoff: NaiveDate,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        let parent = parent_path(path);
        let lines = match self.list(&parent) {
            Ok(lines) => lines,
            Err(e) => {
                error!("{}: listing {} failed: {}", self.description(), parent, e);
                stats.failed += 1;
                return;
            }
        };

        for line in &lines {
            let Some(entry) = parser.parse_line(line) else {
                continue;
            };
            if !paths_match(&entry.path, path) {
                continue;
            }

            if self.entry_expired(entry.timestamp, cutoff) {
                self.remove_path(path, ctx, stats);
            } else {
                info!("{}: {} not expired, retained", self.description(), path);
                stats.skipped += 1;
            }
            return;
        }

        warn!(
            "{}: {} not found in parent listing of {}",
            self.description(),
            path,
            parent
        );
    }

    /// A wildcard listing already yields one line per matched entry with
    /// that entry's own metadata, so every entry is handled independently.
    fn handle_wildcard_path(
        &self,
        pattern: &str,
        parser: &ListingParser,
        cutoff: NaiveDate,
        ctx: &RunContext,
        stats: &mut CleanStats,
    ) {
        let lines = match self.list(pattern) {
            Ok(lines) => lines,
            Err(e) => {
                error!("{}: listing {} failed: {}", self.description(), pattern, e);
                stats.failed += 1;
                return;
            }
        };

        if lines.is_empty() {
            warn!("{}: {} matched nothing", self.description(), pattern);
            return;
        }

        for line in &lines {
            let Some(entry) = parser.parse_line(line) else {
                continue;
            };
            if self.entry_expired(entry.timestamp, cutoff) {
                self.remove_path(&entry.path, ctx, stats);
            } else {
                stats.skipped += 1;
            }
        }
    }

    fn entry_expired(&self, timestamp: Option<NaiveDate>, cutoff: NaiveDate) -> bool {
        if self.config.ignore_update_time {
            return true;
        }
        // Entries without a parseable timestamp are never candidates
        timestamp.is_some_and(|t| expiry::is_expired(t, cutoff))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, sweep_core::CommandError> {
        self.runner
            .run(&format!("{} -ls {}", self.config.dfs_command, path))
    }

    fn remove_path(&self, path: &str, ctx: &RunContext, stats: &mut CleanStats) {
        let trash_note = if self.config.skip_trash {
            "with skip trash"
        } else {
            "with trash"
        };

        if ctx.mode.is_preview() {
            info!(
                "{}{} delete path: {} {}",
                self.action_prefix,
                self.description(),
                path,
                trash_note
            );
            stats.deleted += 1;
            return;
        }

        let flag = if self.config.skip_trash {
            " -skipTrash"
        } else {
            ""
        };
        let command = format!("{} -rm -r{} {}", self.config.dfs_command, flag, path);

        match self.runner.run(&command) {
            Ok(_) => {
                info!(
                    "{}{} remove path: {} success",
                    self.action_prefix,
                    self.description(),
                    path
                );
                stats.deleted += 1;
            }
            Err(e) => {
                error!(
                    "{}{} remove path: {} failed: {}",
                    self.action_prefix,
                    self.description(),
                    path,
                    e
                );
                stats.failed += 1;
            }
        }
    }
}

impl Cleaner for DfsPathCleaner {
    fn description(&self) -> &str {
        "distributed path cleaner"
    }

    fn validate(&self) -> Result<(), CleanError> {
        if self.config.paths.is_empty() {
            return Err(CleanError::Config(format!(
                "{}: no path configured",
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

        for path in &self.config.paths {
            if path.is_empty() {
                error!(
                    "{}: empty path element, deleting a whole user directory is not supported",
                    self.description()
                );
                continue;
            }

            if path.contains('*') {
                self.handle_wildcard_path(path, &parser, cutoff, ctx, &mut stats);
            } else {
                self.handle_literal_path(path, &parser, cutoff, ctx, &mut stats);
            }
        }

        Ok(stats)
    }

    fn set_action_prefix(&mut self, prefix: &str) {
        self.action_prefix = prefix.to_string();
    }
}

/// Parent of a path, string-computed
///
/// `project/tmp` and `project/tmp/` give `project`; a bare `project` gives
/// the empty string; `/user/biz/tmp` gives `/user/biz`; a qualified
/// `scheme://authority/a/b` keeps its prefix.
fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        None => String::new(),
        Some(0) => "/".to_string(),
        Some(index) => trimmed[..index].to_string(),
    }
}

/// Match a listing entry against a requested path
///
/// Exact equality after trailing-slash normalization; listings may print
/// fully-qualified `scheme://authority` paths for a plain absolute
/// request, so the scheme prefix is stripped before a second comparison.
/// Substring containment is deliberately not used: `/a/b` must not match
/// a sibling `/a/b2`.
fn paths_match(entry: &str, requested: &str) -> bool {
    let entry = entry.trim_end_matches('/');
    let requested = requested.trim_end_matches('/');
    entry == requested || strip_scheme(entry) == requested
}

fn strip_scheme(path: &str) -> &str {
    let Some(scheme_end) = path.find("://") else {
        return path;
    };
    let rest = &path[scheme_end + 3..];
    match rest.find('/') {
        Some(slash) => &rest[slash..],
        None => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ExecutionMode;
    use crate::testing::ScriptedRunner;
    use chrono::NaiveDate;

    fn context(mode: ExecutionMode) -> RunContext {
        RunContext::new(mode, NaiveDate::from_ymd_opt(2021, 8, 6).unwrap())
    }

    fn config(paths: &[&str]) -> DfsPathsConfig {
        DfsPathsConfig {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            window: Some(RetentionWindow::months(4)),
            ..Default::default()
        }
    }

    const OLD_TMP: &str = "drwxr-xr-x   - proj hive 0 2021-01-10 18:29 /data/proj/tmp";
    const FRESH_INPUT: &str = "drwxr-xr-x   - proj hive 0 2021-07-21 18:29 /data/proj/input";
    const OLD_SIBLING: &str = "drwxr-xr-x   - proj hive 0 2021-01-10 18:29 /data/proj/tmp2";

    #[test]
    fn test_literal_path_uses_parent_listing() {
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[OLD_TMP, FRESH_INPUT])
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/proj/tmp"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 1);
        assert!(runner
            .calls()
            .contains(&"hadoop fs -rm -r /data/proj/tmp".to_string()));
    }

    #[test]
    fn test_literal_path_not_expired_is_retained() {
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[FRESH_INPUT])
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/proj/input"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_sibling_prefix_does_not_match() {
        // /data/proj/tmp is requested but only tmp2 exists
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[OLD_SIBLING])
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/proj/tmp"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 0);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_scheme_qualified_listing_matches_plain_request() {
        let line = "drwxr-xr-x   - proj hive 0 2021-01-10 18:29 hdfs://ns1/data/proj/tmp";
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[line])
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/proj/tmp"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 1);
    }

    #[test]
    fn test_wildcard_path_expands_via_listing() {
        let runner = ScriptedRunner::new()
            .with_output(
                "hadoop fs -ls /data/*/tmp",
                &[
                    "drwxr-xr-x - p h 0 2021-01-10 10:00 /data/a/tmp",
                    "drwxr-xr-x - p h 0 2021-02-01 10:00 /data/b/tmp",
                    "drwxr-xr-x - p h 0 2021-07-21 10:00 /data/c/tmp",
                ],
            )
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/*/tmp"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.skipped, 1);
        let calls = runner.calls();
        assert!(calls.contains(&"hadoop fs -rm -r /data/a/tmp".to_string()));
        assert!(calls.contains(&"hadoop fs -rm -r /data/b/tmp".to_string()));
    }

    #[test]
    fn test_listing_failure_skips_only_that_path() {
        let runner = ScriptedRunner::new()
            .with_failure("hadoop fs -ls /broken", "ls: `/broken': No such file or directory")
            .with_output("hadoop fs -ls /data/proj", &[OLD_TMP])
            .into_shared();

        let cleaner = DfsPathCleaner::new(
            config(&["/broken/tmp", "/data/proj/tmp"]),
            runner.clone(),
        );
        let stats = cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.deleted, 1);
    }

    #[test]
    fn test_skip_trash_flag() {
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[OLD_TMP])
            .into_shared();

        let cleaner = DfsPathCleaner::new(
            DfsPathsConfig {
                skip_trash: true,
                ..config(&["/data/proj/tmp"])
            },
            runner.clone(),
        );
        cleaner.clean(&context(ExecutionMode::Apply)).unwrap();

        assert!(runner
            .calls()
            .contains(&"hadoop fs -rm -r -skipTrash /data/proj/tmp".to_string()));
    }

    #[test]
    fn test_preview_issues_no_removal() {
        let runner = ScriptedRunner::new()
            .with_output("hadoop fs -ls /data/proj", &[OLD_TMP])
            .into_shared();

        let cleaner = DfsPathCleaner::new(config(&["/data/proj/tmp"]), runner.clone());
        let stats = cleaner.clean(&context(ExecutionMode::Preview)).unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(runner.calls(), vec!["hadoop fs -ls /data/proj".to_string()]);
    }

    #[test]
    fn test_empty_path_list_is_config_error() {
        let runner = ScriptedRunner::new().into_shared();
        let cleaner = DfsPathCleaner::new(DfsPathsConfig::default(), runner);
        assert!(matches!(
            cleaner.clean(&context(ExecutionMode::Apply)),
            Err(CleanError::Config(_))
        ));
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("project/tmp"), "project");
        assert_eq!(parent_path("project/tmp/"), "project");
        assert_eq!(parent_path("project"), "");
        assert_eq!(parent_path("/user/biz/project/tmp"), "/user/biz/project");
        assert_eq!(parent_path("/tmp"), "/");
        assert_eq!(
            parent_path("hdfs://ns1/hive/warehouse/proj.db/tb1"),
            "hdfs://ns1/hive/warehouse/proj.db"
        );
    }

    #[test]
    fn test_paths_match_normalizes_trailing_slash() {
        assert!(paths_match("/a/b/", "/a/b"));
        assert!(paths_match("/a/b", "/a/b/"));
        assert!(!paths_match("/a/b2", "/a/b"));
        assert!(!paths_match("/a/b", "/a/b2"));
    }
}
