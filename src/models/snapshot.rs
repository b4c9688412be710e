//! Snapshot data structures: one time-labelled capture of ranked titles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::clean_title;

/// Zero-padded `HH-MM` snapshot label.
///
/// Labels compare as strings; because both fields are zero-padded that order
/// is also the chronological order within a day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeLabel(String);

impl TimeLabel {
    /// Parse and validate a label such as `09-30`.
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        let well_formed = label.len() == 5
            && label.as_bytes()[2] == b'-'
            && label
                .bytes()
                .enumerate()
                .all(|(i, b)| i == 2 || b.is_ascii_digit());
        if !well_formed {
            return Err(AppError::label(label, "expected zero-padded HH-MM"));
        }
        NaiveTime::parse_from_str(label, "%H-%M").map_err(|e| AppError::label(label, e))?;
        Ok(Self(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render a first/last seen pair for display.
    ///
    /// A single observation shows one label; a span shows `[first ~ last]`.
    pub fn display_span(first: &TimeLabel, last: &TimeLabel) -> String {
        if first == last {
            first.0.clone()
        } else {
            format!("[{} ~ {}]", first.0, last.0)
        }
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TimeLabel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeLabel {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TimeLabel> for String {
    fn from(label: TimeLabel) -> Self {
        label.0
    }
}

/// One title as observed in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    /// Ranks observed in this snapshot (a source may list a title twice)
    pub ranks: Vec<u32>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mobile_url: String,
}

impl TitleEntry {
    pub fn new(rank: u32, url: impl Into<String>, mobile_url: impl Into<String>) -> Self {
        Self {
            ranks: vec![rank],
            url: url.into(),
            mobile_url: mobile_url.into(),
        }
    }

    /// Best (lowest) observed rank.
    pub fn best_rank(&self) -> Option<u32> {
        self.ranks.iter().copied().min()
    }
}

/// All titles one source reported in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Display name of the source
    pub name: String,
    /// Title (whitespace-collapsed) -> observation
    pub titles: BTreeMap<String, TitleEntry>,
}

impl SourceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            titles: BTreeMap::new(),
        }
    }

    /// Record one ranked line for this source.
    ///
    /// Repeated titles keep every rank (duplicates included); the first
    /// non-empty URL pair wins.
    pub fn push(&mut self, title: &str, rank: u32, url: &str, mobile_url: &str) {
        let title = clean_title(title);
        if title.is_empty() {
            return;
        }
        let entry = self.titles.entry(title).or_default();
        entry.ranks.push(rank);
        if entry.url.is_empty() {
            entry.url = url.to_string();
        }
        if entry.mobile_url.is_empty() {
            entry.mobile_url = mobile_url.to_string();
        }
    }
}

/// One polling cycle's capture across all sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub label: TimeLabel,
    /// Source id -> titles
    pub sources: BTreeMap<String, SourceSnapshot>,
    /// Sources that failed to fetch during this cycle
    #[serde(default)]
    pub failed_sources: Vec<String>,
}

impl Snapshot {
    pub fn new(label: TimeLabel) -> Self {
        Self {
            label,
            sources: BTreeMap::new(),
            failed_sources: Vec::new(),
        }
    }

    /// Get or create the block for a source.
    pub fn source_mut(&mut self, id: &str, name: &str) -> &mut SourceSnapshot {
        self.sources
            .entry(id.to_string())
            .or_insert_with(|| SourceSnapshot::new(if name.is_empty() { id } else { name }))
    }

    /// Total number of distinct titles across sources.
    pub fn title_count(&self) -> usize {
        self.sources.values().map(|s| s.titles.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse() {
        assert_eq!(TimeLabel::parse("09-05").unwrap().as_str(), "09-05");
        assert!(TimeLabel::parse("9-05").is_err());
        assert!(TimeLabel::parse("24-00").is_err());
        assert!(TimeLabel::parse("12:30").is_err());
        assert!(TimeLabel::parse("ab-cd").is_err());
    }

    #[test]
    fn test_label_order_is_chronological() {
        let a = TimeLabel::parse("09-30").unwrap();
        let b = TimeLabel::parse("10-00").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_display_span() {
        let a = TimeLabel::parse("09-00").unwrap();
        let b = TimeLabel::parse("10-00").unwrap();
        assert_eq!(TimeLabel::display_span(&a, &a), "09-00");
        assert_eq!(TimeLabel::display_span(&a, &b), "[09-00 ~ 10-00]");
    }

    #[test]
    fn test_push_keeps_duplicate_ranks_and_first_url() {
        let mut source = SourceSnapshot::new("Weibo");
        source.push("Big  news", 3, "", "");
        source.push("Big news", 7, "https://a", "https://m.a");
        source.push("Big news\n", 3, "https://b", "");

        let entry = &source.titles["Big news"];
        assert_eq!(entry.ranks, vec![3, 7, 3]);
        assert_eq!(entry.url, "https://a");
        assert_eq!(entry.mobile_url, "https://m.a");
        assert_eq!(entry.best_rank(), Some(3));
    }

    #[test]
    fn test_push_ignores_blank_title() {
        let mut source = SourceSnapshot::new("Weibo");
        source.push("   ", 1, "", "");
        assert!(source.titles.is_empty());
    }

    #[test]
    fn test_label_serde_validates() {
        let ok: TimeLabel = serde_json::from_str("\"23-59\"").unwrap();
        assert_eq!(ok.as_str(), "23-59");
        assert!(serde_json::from_str::<TimeLabel>("\"noon\"").is_err());
    }
}
