//! Local filesystem cleaner
//!
//! Deletes expired log and temp files under configured paths, then removes
//! directories left empty. Traversal is post-order so a directory's files
//! are handled before the directory's own emptiness check runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use sweep_core::{expiry, CleanError, RetentionWindow};

use crate::strategy::{CleanStats, Cleaner, RunContext, DEFAULT_ACTION_PREFIX};

/// Default retention for local files
pub const DEFAULT_WINDOW: RetentionWindow = RetentionWindow::days(15);

fn default_suffixes() -> Vec<String> {
    vec![".log".to_string(), ".out".to_string()]
}

/// Declarative parameters for the local-path cleaner
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalPathsConfig {
    /// Files or directories to clean
    pub paths: Vec<PathBuf>,
    /// Delete every file regardless of suffix and age
    pub delete_all: bool,
    /// Skip the suffix check
    pub ignore_suffix_check: bool,
    /// Suffixes a file name must contain to qualify; `app.log.20210601`
    /// matches `.log`. An empty list disables the check.
    pub suffixes: Vec<String>,
    /// Treat every file as expired
    pub ignore_update_time: bool,
    /// Retention window, default 15 days
    pub window: Option<RetentionWindow>,
}

impl Default for LocalPathsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            delete_all: false,
            ignore_suffix_check: false,
            suffixes: default_suffixes(),
            ignore_update_time: false,
            window: None,
        }
    }
}

enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    fn name(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
        }
    }
}

/// Cleans expired files under configured local paths
pub struct LocalPathCleaner {
    config: LocalPathsConfig,
    action_prefix: String,
}

impl LocalPathCleaner {
    pub fn new(config: LocalPathsConfig) -> Self {
        Self {
            config,
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
        }
    }

    fn handle_file(&self, path: &Path, cutoff: NaiveDate, ctx: &RunContext, stats: &mut CleanStats) {
        if self.can_delete(path, cutoff) {
            self.delete_entry(path, EntryKind::File, ctx, stats);
        } else {
            stats.skipped += 1;
        }
    }

    fn handle_dir(&self, dir: &Path, cutoff: NaiveDate, ctx: &RunContext, stats: &mut CleanStats) {
        // contents_first yields every file and subdirectory before its
        // parent, so emptied directories are seen after their contents
        // were deleted.
        for entry in WalkDir::new(dir).contents_first(true).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{}: walking {} failed: {}", self.description(), dir.display(), e);
                    stats.failed += 1;
                    continue;
                }
            };

            if entry.file_type().is_file() {
                self.handle_file(entry.path(), cutoff, ctx, stats);
            } else if entry.file_type().is_dir() {
                self.remove_dir_if_empty(entry.path(), ctx, stats);
            }
        }
    }

    fn remove_dir_if_empty(&self, dir: &Path, ctx: &RunContext, stats: &mut CleanStats) {
        match dir_is_empty(dir) {
            Ok(true) => self.delete_entry(dir, EntryKind::Dir, ctx, stats),
            Ok(false) => {}
            Err(e) => {
                warn!("{}: reading {} failed: {}", self.description(), dir.display(), e);
                stats.failed += 1;
            }
        }
    }

    fn can_delete(&self, path: &Path, cutoff: NaiveDate) -> bool {
        if self.config.delete_all {
            return true;
        }
        self.suffix_matches(path) && self.is_expired_file(path, cutoff)
    }

    fn suffix_matches(&self, path: &Path) -> bool {
        if self.config.ignore_suffix_check || self.config.suffixes.is_empty() {
            return true;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.config
            .suffixes
            .iter()
            .any(|suffix| name.contains(suffix.as_str()))
    }

    fn is_expired_file(&self, path: &Path, cutoff: NaiveDate) -> bool {
        if self.config.ignore_update_time {
            return true;
        }
        match file_mtime_date(path) {
            Ok(mtime) => expiry::is_expired(mtime, cutoff),
            Err(e) => {
                warn!(
                    "{}: cannot read mtime of {}: {}",
                    self.description(),
                    path.display(),
                    e
                );
                false
            }
        }
    }

    fn delete_entry(&self, path: &Path, kind: EntryKind, ctx: &RunContext, stats: &mut CleanStats) {
        if ctx.mode.is_preview() {
            info!(
                "{}{} delete {}: {}",
                self.action_prefix,
                self.description(),
                kind.name(),
                path.display()
            );
            stats.deleted += 1;
            return;
        }

        let result = match kind {
            EntryKind::File => fs::remove_file(path),
            EntryKind::Dir => fs::remove_dir(path),
        };

        match result {
            Ok(()) => {
                info!(
                    "{}{} remove {}: {} success",
                    self.action_prefix,
                    self.description(),
                    kind.name(),
                    path.display()
                );
                stats.deleted += 1;
            }
            Err(e) => {
                error!(
                    "{}{} remove {}: {} failed: {}",
                    self.action_prefix,
                    self.description(),
                    kind.name(),
                    path.display(),
                    e
                );
                stats.failed += 1;
            }
        }
    }
}

impl Cleaner for LocalPathCleaner {
    fn description(&self) -> &str {
        "local file cleaner"
    }

    fn validate(&self) -> Result<(), CleanError> {
        if self.config.paths.is_empty() {
            return Err(CleanError::Config(format!(
                "{}: no local path configured",
                self.description()
            )));
        }
        Ok(())
    }

    fn clean(&self, ctx: &RunContext) -> Result<CleanStats, CleanError> {
        self.validate()?;

        let window = self.config.window.unwrap_or(DEFAULT_WINDOW);
        let cutoff = window.cutoff(ctx.reference);
        let mut stats = CleanStats::default();

        for path in &self.config.paths {
            if path.is_file() {
                self.handle_file(path, cutoff, ctx, &mut stats);
            } else if path.is_dir() {
                self.handle_dir(path, cutoff, ctx, &mut stats);
            } else {
                warn!("{}: path {} not found", self.description(), path.display());
            }
        }

        Ok(stats)
    }

    fn set_action_prefix(&mut self, prefix: &str) {
        self.action_prefix = prefix.to_string();
    }
}

fn file_mtime_date(path: &Path) -> io::Result<NaiveDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified).date_naive())
}

fn dir_is_empty(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
