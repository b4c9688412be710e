//! End-to-end report run: load, merge, detect, group, pack.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::Result;
use crate::models::{ChannelKind, Config, ReportData, ReportMode, StatsReport};
use crate::pipeline::diff::{NewTitles, detect_new_titles};
use crate::pipeline::merge::merge_snapshots;
use crate::pipeline::report::assemble_report;
use crate::pipeline::rules::RuleSet;
use crate::pipeline::stats::StatsBuilder;
use crate::services::{BatchPacker, ChannelProfile};
use crate::storage::SnapshotStore;
use crate::utils::log;

/// Packed output for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelBatches {
    pub channel: ChannelKind,
    pub max_bytes: usize,
    pub batches: Vec<String>,
}

/// Result of one report run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub date: NaiveDate,
    pub mode: ReportMode,
    pub snapshot_count: usize,
    pub stats: StatsReport,
    pub novelty: NewTitles,
    pub report: ReportData,
    /// Whether the report is worth pushing for `mode`
    pub has_content: bool,
    pub channels: Vec<ChannelBatches>,
}

impl ReportOutcome {
    /// Outcome for a day without snapshots.
    fn empty(date: NaiveDate, mode: ReportMode) -> Self {
        Self {
            date,
            mode,
            snapshot_count: 0,
            stats: StatsReport::default(),
            novelty: NewTitles::default(),
            report: ReportData::default(),
            has_content: false,
            channels: Vec::new(),
        }
    }

    pub fn total_batches(&self) -> usize {
        self.channels.iter().map(|c| c.batches.len()).sum()
    }
}

/// Run the report pipeline for one day.
///
/// Channels come from `config.notification.channels`. A day without
/// snapshots yields an empty outcome rather than an error.
pub async fn run_report<S>(
    config: &Config,
    store: &S,
    rules: &RuleSet,
    date: NaiveDate,
    mode: ReportMode,
    now: NaiveDateTime,
) -> Result<ReportOutcome>
where
    S: SnapshotStore + ?Sized,
{
    log::header(&format!("Trendline Report: {} ({})", date, mode));

    log::step(1, 5, "Loading snapshots");
    let snapshots = store.load_day(date).await?;
    if snapshots.is_empty() {
        log::warn(&format!("No snapshots found for {}", date));
        return Ok(ReportOutcome::empty(date, mode));
    }
    log::sub_item(&format!("{} snapshots", snapshots.len()));

    log::step(2, 5, "Merging history and detecting new titles");
    let allowed = config.allowed_sources();
    let history = merge_snapshots(&snapshots, allowed.as_ref());
    let novelty = detect_new_titles(&snapshots, allowed.as_ref());
    log::sub_item(&format!(
        "{} titles, {} new",
        history.title_count(),
        novelty.change_count()
    ));

    log::step(3, 5, "Building keyword statistics");
    let stats = StatsBuilder::from_config(rules, config).build(mode, &history, &novelty);

    log::step(4, 5, "Assembling report");
    let report = assemble_report(
        &stats,
        &novelty,
        rules,
        &history.failed_sources,
        mode,
        config.report.rank_threshold,
    );
    let has_content = report.has_content(mode);

    log::step(5, 5, "Packing channel batches");
    let total_titles = report.displayed_titles();
    let channels: Vec<ChannelBatches> = config
        .notification
        .channels
        .iter()
        .map(|&kind| {
            let profile = ChannelProfile::for_channel(kind, config, total_titles, &now);
            let max_bytes = profile.max_bytes;
            let batches = BatchPacker::new(profile, mode).pack(&report);
            log::sub_item(&format!("{}: {} batches", kind, batches.len()));
            ChannelBatches {
                channel: kind,
                max_bytes,
                batches,
            }
        })
        .collect();

    let outcome = ReportOutcome {
        date,
        mode,
        snapshot_count: snapshots.len(),
        stats,
        novelty,
        report,
        has_content,
        channels,
    };

    log::success("Report complete");
    log::summary(
        "Report",
        &[
            ("Snapshots", outcome.snapshot_count.to_string()),
            ("Groups", outcome.report.stats.len().to_string()),
            ("Displayed titles", total_titles.to_string()),
            ("New titles", outcome.report.total_new_count.to_string()),
            ("Has content", outcome.has_content.to_string()),
            ("Batches", outcome.total_batches().to_string()),
        ],
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, TimeLabel};
    use crate::storage::LocalStore;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn now() -> NaiveDateTime {
        date().and_hms_opt(10, 5, 0).unwrap()
    }

    #[tokio::test]
    async fn test_missing_history_is_empty_outcome() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let outcome = run_report(
            &Config::default(),
            &store,
            &RuleSet::default(),
            date(),
            ReportMode::Daily,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.snapshot_count, 0);
        assert!(outcome.stats.groups.is_empty());
        assert!(!outcome.has_content);
        assert_eq!(outcome.total_batches(), 0);
    }

    #[tokio::test]
    async fn test_packs_every_configured_channel() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let mut snap = Snapshot::new(TimeLabel::parse("09-00").unwrap());
        snap.source_mut("hn", "Hacker News").push("Rust 1.90 released", 1, "", "");
        store.write_snapshot(date(), &snap).await.unwrap();

        let mut config = Config::default();
        config.notification.channels = vec![ChannelKind::Telegram, ChannelKind::DingTalk];

        let outcome = run_report(&config, &store, &RuleSet::parse("rust"), date(), ReportMode::Daily, now())
            .await
            .unwrap();

        assert!(outcome.has_content);
        assert_eq!(outcome.channels.len(), 2);
        assert_eq!(outcome.channels[1].max_bytes, 20000);
        assert!(outcome.channels[0].batches[0].contains("Rust 1.90 released"));
    }
}
