// src/models/mod.rs

//! Domain models for the digest engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod snapshot;
mod stats;

// Re-export all public types
pub use config::{
    ChannelKind, Config, LoggingConfig, NotificationConfig, PathsConfig, PlatformInfo,
    ReportConfig, ReportMode, WeightConfig,
};
pub use record::{MergedHistory, SourceHistory, TitleRecord};
pub use snapshot::{Snapshot, SourceSnapshot, TimeLabel, TitleEntry};
pub use stats::{NewSection, ReportData, ScoredTitle, StatGroup, StatsReport};
