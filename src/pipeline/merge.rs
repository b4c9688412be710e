//! History merging across a day's snapshots.
//!
//! Folds an ordered sequence of snapshots into one [`TitleRecord`] per
//! (source, title). Snapshots must already be sorted by label; merging them
//! out of order corrupts `first_time` / `last_time`.

use std::collections::HashSet;

use crate::models::{MergedHistory, Snapshot, SourceHistory, TitleRecord};

/// Merges snapshots into per-title history.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryMerger<'a> {
    /// Source ids to keep; `None` keeps every source
    allowed: Option<&'a HashSet<String>>,
}

impl<'a> HistoryMerger<'a> {
    /// Create a merger that keeps every source.
    pub fn new() -> Self {
        Self { allowed: None }
    }

    /// Create a merger restricted to an allow-list of source ids.
    pub fn with_sources(allowed: &'a HashSet<String>) -> Self {
        Self {
            allowed: Some(allowed),
        }
    }

    /// Whether a source passes the allow-list.
    pub fn accepts(&self, source_id: &str) -> bool {
        self.allowed.is_none_or(|ids| ids.contains(source_id))
    }

    /// Merge snapshots in the order given.
    ///
    /// A label that was already merged is skipped, so feeding the same
    /// snapshot twice never inflates `count`.
    pub fn merge(&self, snapshots: &[Snapshot]) -> MergedHistory {
        let mut history = MergedHistory::default();
        let mut seen_labels = HashSet::new();

        for snapshot in snapshots {
            if !seen_labels.insert(&snapshot.label) {
                log::warn!(
                    "Snapshot {} supplied more than once; skipping duplicate",
                    snapshot.label
                );
                continue;
            }
            self.fold(&mut history, snapshot);
        }

        if let Some(latest) = snapshots.last() {
            history.failed_sources = latest
                .failed_sources
                .iter()
                .filter(|id| self.accepts(id))
                .cloned()
                .collect();
        }

        log::debug!(
            "Merged {} snapshots into {} titles across {} sources",
            history.snapshot_count(),
            history.title_count(),
            history.sources.len()
        );
        history
    }

    fn fold(&self, history: &mut MergedHistory, snapshot: &Snapshot) {
        let label = &snapshot.label;

        for (source_id, source) in &snapshot.sources {
            if !self.accepts(source_id) {
                continue;
            }

            let merged = history
                .sources
                .entry(source_id.clone())
                .or_insert_with(SourceHistory::default);
            if !source.name.is_empty() {
                merged.name = source.name.clone();
            }

            for (title, entry) in &source.titles {
                match merged.titles.get_mut(title) {
                    Some(record) => record.observe(entry, label),
                    None => {
                        merged
                            .titles
                            .insert(title.clone(), TitleRecord::first_seen(entry, label));
                    }
                }
            }
        }

        history.labels.push(label.clone());
    }
}

/// Convenience function to merge snapshots with an optional allow-list.
pub fn merge_snapshots(
    snapshots: &[Snapshot],
    allowed: Option<&HashSet<String>>,
) -> MergedHistory {
    match allowed {
        Some(ids) => HistoryMerger::with_sources(ids).merge(snapshots),
        None => HistoryMerger::new().merge(snapshots),
    }
}
