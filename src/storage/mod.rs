//! Storage abstractions for snapshot files.
//!
//! One snapshot file is written per polling cycle, grouped by day:
//!
//! ```text
//! {root}/
//! └── 2025-03-01/
//!     └── txt/
//!         ├── 09-00.txt
//!         ├── 09-30.txt
//!         └── 10-00.txt
//! ```
//!
//! Files are immutable once written, so any cache in front of a store is
//! purely advisory.

pub mod cache;
pub mod local;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Snapshot, TimeLabel};

// Re-export for convenience
pub use cache::CachedStore;
pub use local::LocalStore;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Days holding a snapshot directory, sorted ascending.
    async fn list_dates(&self) -> Result<Vec<NaiveDate>>;

    /// Labels of every snapshot stored for `date`, sorted ascending.
    async fn list_labels(&self, date: NaiveDate) -> Result<Vec<TimeLabel>>;

    /// Load one snapshot, `None` if it does not exist.
    async fn load_snapshot(&self, date: NaiveDate, label: &TimeLabel) -> Result<Option<Snapshot>>;

    /// Persist a snapshot under its label.
    async fn write_snapshot(&self, date: NaiveDate, snapshot: &Snapshot) -> Result<()>;

    /// Load all snapshots of a day in label order.
    async fn load_day(&self, date: NaiveDate) -> Result<Vec<Snapshot>> {
        let labels = self.list_labels(date).await?;
        let mut snapshots = Vec::with_capacity(labels.len());
        for label in &labels {
            if let Some(snapshot) = self.load_snapshot(date, label).await? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }
}
