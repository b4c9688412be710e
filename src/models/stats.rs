//! Per-run statistics and report structures.
//!
//! Built fresh on every run and never persisted.

use serde::Serialize;

use crate::models::ReportMode;

/// A title projected for display inside a group or "new items" section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTitle {
    pub title: String,
    pub source_id: String,
    pub source_name: String,
    /// `09-00` or `[09-00 ~ 10-30]`; empty for novelty listings
    pub time_display: String,
    pub count: u32,
    pub ranks: Vec<u32>,
    pub rank_threshold: u32,
    pub url: String,
    pub mobile_url: String,
    pub is_new: bool,
    pub weight: f64,
}

impl ScoredTitle {
    /// Preferred link target (mobile first).
    pub fn link(&self) -> &str {
        if self.mobile_url.is_empty() {
            &self.url
        } else {
            &self.mobile_url
        }
    }

    pub fn best_rank(&self) -> u32 {
        self.ranks.iter().copied().min().unwrap_or(999)
    }
}

/// Titles assigned to one keyword group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatGroup {
    /// Group key
    pub word: String,
    /// Titles assigned before the display cap is applied
    pub count: usize,
    /// Index in declared rule order
    pub position: usize,
    /// Sorted and capped titles
    pub titles: Vec<ScoredTitle>,
    /// Share of processed titles, in percent (two decimals)
    pub percentage: f64,
}

/// Output of the statistics builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub groups: Vec<StatGroup>,
    /// Titles considered in this run (denominator of `percentage`)
    pub total_titles: usize,
}

/// Newly observed titles of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSection {
    pub source_id: String,
    pub source_name: String,
    pub titles: Vec<ScoredTitle>,
}

/// Everything a channel batch needs to render a digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportData {
    pub stats: Vec<StatGroup>,
    pub new_sections: Vec<NewSection>,
    pub failed_sources: Vec<String>,
    /// Titles listed in `new_sections`
    pub total_new_count: usize,
    /// Whether the latest snapshot brought any new title, before rule filtering
    pub has_novelty: bool,
}

impl ReportData {
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.new_sections.is_empty() && self.failed_sources.is_empty()
    }

    /// Number of titles displayed across statistics groups.
    pub fn displayed_titles(&self) -> usize {
        self.stats.iter().map(|s| s.titles.len()).sum()
    }

    /// Whether the report is worth pushing for the given mode.
    pub fn has_content(&self, mode: ReportMode) -> bool {
        let has_matches = self.stats.iter().any(|s| s.count > 0);
        match mode {
            ReportMode::Incremental | ReportMode::Current => has_matches,
            ReportMode::Daily => has_matches || self.has_novelty,
        }
    }
}
