//! Novelty detection between the latest snapshot and the rest of the day.
//!
//! A title is "new" when the latest snapshot lists it for a source and no
//! earlier snapshot of the day listed it for that same source.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::models::{Snapshot, TitleEntry};

/// Titles first observed in the latest snapshot, grouped by source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewTitles {
    /// Source id -> title -> observation in the latest snapshot
    pub sources: BTreeMap<String, BTreeMap<String, TitleEntry>>,
    /// Source id -> display name, for sources with new titles
    pub source_names: BTreeMap<String, String>,
}

impl NewTitles {
    /// Check if any new title was found.
    pub fn has_changes(&self) -> bool {
        self.sources.values().any(|titles| !titles.is_empty())
    }

    /// Get the total number of new titles.
    pub fn change_count(&self) -> usize {
        self.sources.values().map(|titles| titles.len()).sum()
    }

    /// Whether a (source, title) pair is new.
    pub fn contains(&self, source_id: &str, title: &str) -> bool {
        self.sources
            .get(source_id)
            .is_some_and(|titles| titles.contains_key(title))
    }
}

/// Detector comparing the latest snapshot against earlier ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoveltyDetector<'a> {
    /// Source ids to consider; `None` considers every source
    allowed: Option<&'a HashSet<String>>,
}

impl<'a> NoveltyDetector<'a> {
    /// Create a detector over every source.
    pub fn new() -> Self {
        Self { allowed: None }
    }

    /// Create a detector restricted to an allow-list of source ids.
    pub fn with_sources(allowed: &'a HashSet<String>) -> Self {
        Self {
            allowed: Some(allowed),
        }
    }

    fn accepts(&self, source_id: &str) -> bool {
        self.allowed.is_none_or(|ids| ids.contains(source_id))
    }

    /// Split a day's sorted snapshots into history + latest and compare.
    ///
    /// Fewer than two snapshots means there is nothing to compare against,
    /// which yields an empty result rather than "everything is new".
    pub fn detect_latest(&self, snapshots: &[Snapshot]) -> NewTitles {
        match snapshots.split_last() {
            Some((latest, previous)) => self.calculate(previous, latest),
            None => NewTitles::default(),
        }
    }

    /// Calculate which titles of `latest` are absent from every `previous` snapshot.
    pub fn calculate(&self, previous: &[Snapshot], latest: &Snapshot) -> NewTitles {
        if previous.is_empty() {
            return NewTitles::default();
        }

        let mut historical: HashMap<&str, HashSet<&str>> = HashMap::new();
        for snapshot in previous {
            for (source_id, source) in &snapshot.sources {
                if !self.accepts(source_id) {
                    continue;
                }
                historical
                    .entry(source_id.as_str())
                    .or_default()
                    .extend(source.titles.keys().map(String::as_str));
            }
        }

        let mut result = NewTitles::default();
        for (source_id, source) in &latest.sources {
            if !self.accepts(source_id) {
                continue;
            }
            let seen = historical.get(source_id.as_str());

            let fresh: BTreeMap<String, TitleEntry> = source
                .titles
                .iter()
                .filter(|(title, _)| !seen.is_some_and(|set| set.contains(title.as_str())))
                .map(|(title, entry)| (title.clone(), entry.clone()))
                .collect();

            if !fresh.is_empty() {
                result.sources.insert(source_id.clone(), fresh);
                result
                    .source_names
                    .insert(source_id.clone(), source.name.clone());
            }
        }

        if result.has_changes() {
            log::info!(
                "Novelty: {} new titles across {} sources in {}",
                result.change_count(),
                result.sources.len(),
                latest.label
            );
        }
        result
    }
}

/// Convenience function to detect new titles in a day's sorted snapshots.
pub fn detect_new_titles(snapshots: &[Snapshot], allowed: Option<&HashSet<String>>) -> NewTitles {
    match allowed {
        Some(ids) => NoveltyDetector::with_sources(ids).detect_latest(snapshots),
        None => NoveltyDetector::new().detect_latest(snapshots),
    }
}
