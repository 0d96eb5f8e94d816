//! Parsing of directory-listing output lines
//!
//! The distributed-filesystem and warehouse backends both discover item
//! timestamps by scraping `ls`-style output. One line looks like:
//!
//! ```text
//! drwxr-xr-x   - proj hive          0 2021-07-21 18:29 /user/hive/warehouse/proj.db/tb1
//! ```
//!
//! and parses to `2021-07-21` plus the trailing path.

use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::CleanError;

/// One parsed listing line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Date extracted from the line, absent when the matched substring did
    /// not parse under the configured format
    pub timestamp: Option<NaiveDate>,
    /// Path field of the line
    pub path: String,
}

/// Where the path lives in a listing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathField {
    /// Final whitespace-delimited token (`hadoop fs -ls` style)
    LastToken,
    /// Fixed whitespace-delimited column, zero-based
    Column(usize),
}

/// How to pull a timestamp and a path out of one listing line
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingFormat {
    /// Regex matching the date substring
    pub date_pattern: String,
    /// strptime format the matched substring parses under
    pub date_format: String,
    /// Path extraction strategy
    pub path_field: PathField,
}

impl Default for ListingFormat {
    fn default() -> Self {
        Self {
            date_pattern: r"\d{4}-\d{2}-\d{2}".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            path_field: PathField::LastToken,
        }
    }
}

impl ListingFormat {
    /// Compile into a reusable parser
    pub fn parser(&self) -> Result<ListingParser, CleanError> {
        let date_pattern = Regex::new(&self.date_pattern).map_err(|e| {
            CleanError::Config(format!(
                "invalid listing date pattern `{}`: {}",
                self.date_pattern, e
            ))
        })?;

        Ok(ListingParser {
            date_pattern,
            date_format: self.date_format.clone(),
            path_field: self.path_field,
        })
    }
}

/// Compiled listing-line parser
#[derive(Debug)]
pub struct ListingParser {
    date_pattern: Regex,
    date_format: String,
    path_field: PathField,
}

impl ListingParser {
    /// Parse one listing line
    ///
    /// Returns `None` when the date pattern does not appear at all; such
    /// lines are headers or noise and callers skip them. A matched
    /// substring that fails date parsing keeps the entry with an empty
    /// timestamp so the path stays usable for discovery.
    pub fn parse_line(&self, line: &str) -> Option<ListingEntry> {
        let matched = self.date_pattern.find(line)?;
        let timestamp = NaiveDate::parse_from_str(matched.as_str(), &self.date_format).ok();

        let path = match self.path_field {
            PathField::LastToken => line.split_whitespace().last(),
            PathField::Column(index) => line.split_whitespace().nth(index),
        }?
        .to_string();

        debug!(
            "listing line `{}` parsed to ({:?}, {})",
            line, timestamp, path
        );
        Some(ListingEntry { timestamp, path })
    }

    /// Map each child of `dir` in listing output to its timestamp
    ///
    /// `dir` must carry a trailing slash; the child name is whatever
    /// follows it in the entry path. Lines not mentioning `dir` are
    /// ignored, so qualified `scheme://authority` paths still resolve.
    pub fn parse_directory_map(
        &self,
        lines: &[String],
        dir: &str,
    ) -> HashMap<String, Option<NaiveDate>> {
        let mut map = HashMap::new();
        for line in lines {
            if !line.contains(dir) {
                continue;
            }
            let Some(entry) = self.parse_line(line) else {
                continue;
            };
            if let Some(index) = entry.path.find(dir) {
                let name = entry.path[index + dir.len()..].trim_matches('/');
                if !name.is_empty() {
                    map.insert(name.to_string(), entry.timestamp);
                }
            }
        }
        map
    }
}
