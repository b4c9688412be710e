//! Merged per-day history of every title.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{TimeLabel, TitleEntry};

/// Cross-snapshot history of one title within one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    /// Every observed rank, in snapshot order (a multiset)
    pub ranks: Vec<u32>,
    pub url: String,
    pub mobile_url: String,
    pub first_time: TimeLabel,
    pub last_time: TimeLabel,
    /// Number of snapshots the title appeared in
    pub count: u32,
}

impl TitleRecord {
    /// Start a record from its first observation.
    pub fn first_seen(entry: &TitleEntry, label: &TimeLabel) -> Self {
        Self {
            ranks: entry.ranks.clone(),
            url: entry.url.clone(),
            mobile_url: entry.mobile_url.clone(),
            first_time: label.clone(),
            last_time: label.clone(),
            count: 1,
        }
    }

    /// Fold a later observation into the record.
    pub fn observe(&mut self, entry: &TitleEntry, label: &TimeLabel) {
        self.ranks.extend_from_slice(&entry.ranks);
        self.last_time = label.clone();
        self.count += 1;
        if self.url.is_empty() {
            self.url = entry.url.clone();
        }
        if self.mobile_url.is_empty() {
            self.mobile_url = entry.mobile_url.clone();
        }
    }

    /// Best (lowest) rank, if any rank was recorded.
    pub fn best_rank(&self) -> Option<u32> {
        self.ranks.iter().copied().min()
    }
}

/// All merged titles of one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHistory {
    pub name: String,
    pub titles: BTreeMap<String, TitleRecord>,
}

/// Result of merging one day's snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedHistory {
    /// Source id -> merged titles
    pub sources: BTreeMap<String, SourceHistory>,
    /// Labels that contributed, in merge order
    pub labels: Vec<TimeLabel>,
    /// Failed sources reported by the latest snapshot
    pub failed_sources: Vec<String>,
}

impl MergedHistory {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of snapshots merged.
    pub fn snapshot_count(&self) -> usize {
        self.labels.len()
    }

    /// Whether at most one snapshot exists for the day.
    pub fn is_first_snapshot(&self) -> bool {
        self.labels.len() <= 1
    }

    /// Most recent `last_time` across every record.
    pub fn latest_time(&self) -> Option<&TimeLabel> {
        self.sources
            .values()
            .flat_map(|s| s.titles.values())
            .map(|r| &r.last_time)
            .max()
    }

    /// Look up a merged record.
    pub fn record(&self, source_id: &str, title: &str) -> Option<&TitleRecord> {
        self.sources.get(source_id)?.titles.get(title)
    }

    /// Display name of a source, falling back to its id.
    pub fn source_name<'a>(&'a self, source_id: &'a str) -> &'a str {
        self.sources
            .get(source_id)
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(source_id)
    }

    /// Total number of merged titles.
    pub fn title_count(&self) -> usize {
        self.sources.values().map(|s| s.titles.len()).sum()
    }
}
