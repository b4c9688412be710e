//! Aggregation, scoring and grouping engine.
//!
//! - `merge`: fold a day's snapshots into per-title history
//! - `diff`: titles first seen in the latest snapshot
//! - `rules`: keyword rule parsing and first-match-wins matching
//! - `weight`: composite popularity score
//! - `stats`: per-mode keyword statistics
//! - `report`: renderable report assembly
//! - `query`: day lookups, keyword search and rule-word trends
//! - `run`: end-to-end report run

pub mod diff;
pub mod merge;
pub mod query;
pub mod report;
pub mod rules;
pub mod run;
pub mod stats;
pub mod weight;

pub use diff::{NewTitles, NoveltyDetector, detect_new_titles};
pub use merge::{HistoryMerger, merge_snapshots};
pub use query::{NewsItem, QueryService, SearchResult, TrendingReport, TrendingTopic};
pub use report::assemble_report;
pub use rules::{RuleSet, WordGroup};
pub use run::{ChannelBatches, ReportOutcome, run_report};
pub use stats::{ALL_NEWS_KEY, StatsBuilder, build_stats};
pub use weight::weight;
