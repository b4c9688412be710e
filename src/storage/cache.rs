//! Read-through TTL cache in front of a snapshot store.
//!
//! Entries are advisory: a hit returns exactly what a fresh load would, and a
//! TTL of zero turns caching off.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Snapshot, TimeLabel};
use crate::storage::SnapshotStore;

#[derive(Debug)]
struct Entry {
    loaded_at: Instant,
    snapshots: Vec<Snapshot>,
}

/// Store wrapper memoizing whole days of snapshots.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    days: Mutex<HashMap<NaiveDate, Entry>>,
}

impl<S: SnapshotStore> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            days: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Drop every cached day.
    pub fn clear(&self) {
        self.days().clear();
    }

    fn days(&self) -> MutexGuard<'_, HashMap<NaiveDate, Entry>> {
        // A poisoned cache only ever holds complete entries.
        self.days.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cached(&self, date: NaiveDate) -> Option<Vec<Snapshot>> {
        let mut days = self.days();
        match days.get(&date) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => Some(entry.snapshots.clone()),
            Some(_) => {
                days.remove(&date);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<S: SnapshotStore> SnapshotStore for CachedStore<S> {
    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        self.inner.list_dates().await
    }

    async fn list_labels(&self, date: NaiveDate) -> Result<Vec<TimeLabel>> {
        if let Some(snapshots) = self.cached(date) {
            return Ok(snapshots.into_iter().map(|s| s.label).collect());
        }
        self.inner.list_labels(date).await
    }

    async fn load_snapshot(&self, date: NaiveDate, label: &TimeLabel) -> Result<Option<Snapshot>> {
        if let Some(snapshots) = self.cached(date) {
            return Ok(snapshots.into_iter().find(|s| &s.label == label));
        }
        self.inner.load_snapshot(date, label).await
    }

    async fn write_snapshot(&self, date: NaiveDate, snapshot: &Snapshot) -> Result<()> {
        self.inner.write_snapshot(date, snapshot).await?;
        self.days().remove(&date);
        Ok(())
    }

    async fn load_day(&self, date: NaiveDate) -> Result<Vec<Snapshot>> {
        if let Some(snapshots) = self.cached(date) {
            log::debug!("Snapshot cache hit for {}", date);
            return Ok(snapshots);
        }

        let snapshots = self.inner.load_day(date).await?;
        if self.is_enabled() {
            self.days().insert(
                date,
                Entry {
                    loaded_at: Instant::now(),
                    snapshots: snapshots.clone(),
                },
            );
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn snapshot(label: &str, title: &str) -> Snapshot {
        let mut snap = Snapshot::new(TimeLabel::parse(label).unwrap());
        snap.source_mut("hn", "HN").push(title, 1, "", "");
        snap
    }

    #[tokio::test]
    async fn test_cache_hit_matches_fresh_load() {
        let dir = TempDir::new().unwrap();
        let local = LocalStore::new(dir.path());
        local.write_snapshot(date(), &snapshot("09-00", "A")).await.unwrap();

        let cached = CachedStore::new(local.clone(), Duration::from_secs(60));
        let first = cached.load_day(date()).await.unwrap();
        let second = cached.load_day(date()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, local.load_day(date()).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_invalidates_day() {
        let dir = TempDir::new().unwrap();
        let cached = CachedStore::new(LocalStore::new(dir.path()), Duration::from_secs(60));

        cached.write_snapshot(date(), &snapshot("09-00", "A")).await.unwrap();
        assert_eq!(cached.load_day(date()).await.unwrap().len(), 1);

        cached.write_snapshot(date(), &snapshot("09-30", "B")).await.unwrap();
        assert_eq!(cached.load_day(date()).await.unwrap().len(), 2);
        assert_eq!(cached.list_labels(date()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let dir = TempDir::new().unwrap();
        let local = LocalStore::new(dir.path());
        let cached = CachedStore::new(local.clone(), Duration::ZERO);
        assert!(!cached.is_enabled());

        assert!(cached.load_day(date()).await.unwrap().is_empty());
        // written behind the cache's back
        local.write_snapshot(date(), &snapshot("09-00", "A")).await.unwrap();
        assert_eq!(cached.load_day(date()).await.unwrap().len(), 1);
    }
}
