//! Wildcard matching for configured target names

use regex::Regex;

use crate::error::CleanError;

/// Classification of one configured target name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPattern {
    /// The bare `*`: select everything
    ///
    /// Handled before the regex path — a word-character wildcard would
    /// fail to match names containing separators.
    All,
    /// A name with an embedded `*`
    Wildcard(String),
    /// A plain name matched verbatim
    Exact(String),
}

impl TargetPattern {
    /// Classify a configured name
    pub fn classify(name: &str) -> Self {
        if name == "*" {
            TargetPattern::All
        } else if name.contains('*') {
            TargetPattern::Wildcard(name.to_string())
        } else {
            TargetPattern::Exact(name.to_string())
        }
    }
}

/// Expand a wildcard name against a candidate list
///
/// The `*` stands for a lazy run of word characters and matching is a
/// substring search, so `tb*` selects `tb1` and `tb2` out of
/// `{tb1, tb2, abc}`.
pub fn expand_wildcard(pattern: &str, candidates: &[String]) -> Result<Vec<String>, CleanError> {
    let translated = pattern.replace('*', r"[\w]*?");
    let regex = Regex::new(&translated).map_err(|e| {
        CleanError::Config(format!("invalid wildcard pattern `{}`: {}", pattern, e))
    })?;

    Ok(candidates
        .iter()
        .filter(|name| regex.is_match(name))
        .cloned()
        .collect())
}
