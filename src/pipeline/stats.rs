//! Grouping and statistics builder.
//!
//! Selects the working subset for a run mode, assigns each title to the first
//! matching rule group, orders titles by weight and applies display caps.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    Config, MergedHistory, ReportConfig, ReportMode, ScoredTitle, StatGroup, StatsReport,
    TimeLabel, TitleEntry, WeightConfig,
};
use crate::pipeline::diff::NewTitles;
use crate::pipeline::rules::RuleSet;
use crate::pipeline::weight::weight;

/// Group key used when no rules are configured.
pub const ALL_NEWS_KEY: &str = "All News";

/// Rank assumed for a title whose rank list is empty.
const DEFAULT_RANK: u32 = 99;

/// A (source, title) pair selected for this run.
struct Candidate<'h> {
    source_id: &'h str,
    title: &'h str,
    /// Observation from the novelty map, used when history has no record
    fallback: Option<&'h TitleEntry>,
}

/// Builds keyword statistics from merged history.
#[derive(Debug, Clone)]
pub struct StatsBuilder<'a> {
    rules: &'a RuleSet,
    weights: WeightConfig,
    rank_threshold: u32,
    /// Global display cap; 0 = unlimited
    max_per_group: usize,
    sort_by_position_first: bool,
}

impl<'a> StatsBuilder<'a> {
    pub fn new(rules: &'a RuleSet, report: &ReportConfig, weights: WeightConfig) -> Self {
        Self {
            rules,
            weights,
            rank_threshold: report.rank_threshold,
            max_per_group: report.max_news_per_keyword,
            sort_by_position_first: report.sort_by_position_first,
        }
    }

    pub fn from_config(rules: &'a RuleSet, config: &Config) -> Self {
        Self::new(rules, &config.report, config.weight)
    }

    /// Build ordered stat groups for `mode`.
    ///
    /// Every declared group is returned, including groups with no titles.
    /// A day without snapshots yields no groups at all.
    pub fn build(&self, mode: ReportMode, history: &MergedHistory, novelty: &NewTitles) -> StatsReport {
        if history.is_empty() {
            log::debug!("{} mode: no snapshots merged, nothing to group", mode);
            return StatsReport::default();
        }

        let (candidates, all_new) = select_candidates(mode, history, novelty);
        let total_titles = candidates.len();

        let slots: Vec<(String, usize)> = if self.rules.is_empty() {
            vec![(ALL_NEWS_KEY.to_string(), 0)]
        } else {
            self.rules
                .groups
                .iter()
                .map(|g| (g.group_key.clone(), g.max_count))
                .collect()
        };
        let mut buckets: Vec<Vec<ScoredTitle>> = vec![Vec::new(); slots.len()];

        let mut processed: HashSet<(&str, &str)> = HashSet::new();
        for candidate in &candidates {
            if !processed.insert((candidate.source_id, candidate.title)) {
                continue;
            }
            let Some(index) = self.assign(candidate.title) else {
                continue;
            };
            let is_new = all_new || novelty.contains(candidate.source_id, candidate.title);
            buckets[index].push(self.score(candidate, history, is_new));
        }

        let mut groups: Vec<StatGroup> = slots
            .into_iter()
            .zip(buckets)
            .enumerate()
            .map(|(position, ((word, group_cap), mut titles))| {
                let count = titles.len();
                titles.sort_by(compare_titles);

                let cap = if group_cap > 0 { group_cap } else { self.max_per_group };
                if cap > 0 {
                    titles.truncate(cap);
                }

                StatGroup {
                    word,
                    count,
                    position,
                    titles,
                    percentage: percentage(count, total_titles),
                }
            })
            .collect();

        if self.sort_by_position_first {
            groups.sort_by(|a, b| a.position.cmp(&b.position).then(b.count.cmp(&a.count)));
        } else {
            groups.sort_by(|a, b| b.count.cmp(&a.count).then(a.position.cmp(&b.position)));
        }

        let matched: usize = groups.iter().map(|g| g.count).sum();
        log::info!(
            "{} mode: {} of {} titles matched {}",
            mode,
            matched,
            total_titles,
            if self.rules.is_empty() { "(show all)" } else { "keyword groups" }
        );

        StatsReport {
            groups,
            total_titles,
        }
    }

    /// Index of the group a title belongs to.
    fn assign(&self, title: &str) -> Option<usize> {
        if self.rules.is_empty() {
            return self.rules.matches(title).then_some(0);
        }
        self.rules.match_group(title).map(|(index, _)| index)
    }

    fn score(&self, candidate: &Candidate<'_>, history: &MergedHistory, is_new: bool) -> ScoredTitle {
        let source_name = history.source_name(candidate.source_id).to_string();

        let (mut ranks, count, time_display, url, mobile_url) =
            match history.record(candidate.source_id, candidate.title) {
                Some(record) => (
                    record.ranks.clone(),
                    record.count,
                    TimeLabel::display_span(&record.first_time, &record.last_time),
                    record.url.clone(),
                    record.mobile_url.clone(),
                ),
                None => {
                    let entry = candidate.fallback.cloned().unwrap_or_default();
                    (entry.ranks, 1, String::new(), entry.url, entry.mobile_url)
                }
            };

        if ranks.is_empty() {
            ranks.push(DEFAULT_RANK);
        }

        let weight = weight(&ranks, count, self.rank_threshold, &self.weights);
        ScoredTitle {
            title: candidate.title.to_string(),
            source_id: candidate.source_id.to_string(),
            source_name,
            time_display,
            count,
            ranks,
            rank_threshold: self.rank_threshold,
            url,
            mobile_url,
            is_new,
            weight,
        }
    }
}

/// Pick the titles a run mode processes, and whether all of them count as new.
fn select_candidates<'h>(
    mode: ReportMode,
    history: &'h MergedHistory,
    novelty: &'h NewTitles,
) -> (Vec<Candidate<'h>>, bool) {
    let all_history = move || {
        history
            .sources
            .iter()
            .flat_map(|(source_id, source)| {
                source.titles.keys().map(move |title| Candidate {
                    source_id: source_id.as_str(),
                    title: title.as_str(),
                    fallback: None,
                })
            })
            .collect::<Vec<_>>()
    };

    match mode {
        ReportMode::Incremental if history.is_first_snapshot() => (all_history(), true),
        ReportMode::Incremental => {
            let fresh = novelty
                .sources
                .iter()
                .flat_map(|(source_id, titles)| {
                    titles.iter().map(move |(title, entry)| Candidate {
                        source_id: source_id.as_str(),
                        title: title.as_str(),
                        fallback: Some(entry),
                    })
                })
                .collect();
            (fresh, true)
        }
        ReportMode::Current => match history.latest_time() {
            Some(latest) => {
                let current = history
                    .sources
                    .iter()
                    .flat_map(|(source_id, source)| {
                        source
                            .titles
                            .iter()
                            .filter(move |(_, record)| &record.last_time == latest)
                            .map(move |(title, _)| Candidate {
                                source_id: source_id.as_str(),
                                title: title.as_str(),
                                fallback: None,
                            })
                    })
                    .collect::<Vec<_>>();
                log::debug!("Current mode: {} titles at {}", current.len(), latest);
                (current, false)
            }
            None => (all_history(), false),
        },
        ReportMode::Daily => (all_history(), false),
    }
}

/// Weight descending, then best rank ascending, then count descending.
fn compare_titles(a: &ScoredTitle, b: &ScoredTitle) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.best_rank().cmp(&b.best_rank()))
        .then_with(|| b.count.cmp(&a.count))
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Convenience function to build statistics straight from a config.
pub fn build_stats(
    config: &Config,
    rules: &RuleSet,
    mode: ReportMode,
    history: &MergedHistory,
    novelty: &NewTitles,
) -> StatsReport {
    StatsBuilder::from_config(rules, config).build(mode, history, novelty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, SourceHistory, TitleRecord};
    use crate::pipeline::diff::detect_new_titles;
    use crate::pipeline::merge::merge_snapshots;

    fn snapshot(label: &str, rows: &[(&str, &str, u32)]) -> Snapshot {
        let mut snap = Snapshot::new(TimeLabel::parse(label).unwrap());
        for (source, title, rank) in rows {
            snap.source_mut(source, "").push(title, *rank, "", "");
        }
        snap
    }

    fn run(mode: ReportMode, rules: &str, report: ReportConfig, snaps: &[Snapshot]) -> StatsReport {
        let rules = RuleSet::parse(rules);
        let history = merge_snapshots(snaps, None);
        let novelty = detect_new_titles(snaps, None);
        StatsBuilder::new(&rules, &report, WeightConfig::default()).build(mode, &history, &novelty)
    }

    fn group<'r>(report: &'r StatsReport, word: &str) -> &'r StatGroup {
        report.groups.iter().find(|g| g.word == word).unwrap()
    }

    #[test]
    fn test_first_match_wins_across_groups() {
        let snaps = vec![snapshot(
            "09-00",
            &[("hn", "AI chip shortage", 1), ("hn", "AI agents", 2), ("hn", "chip fab", 3)],
        )];
        let report = run(ReportMode::Daily, "chip\n\nAI", ReportConfig::default(), &snaps);

        let chip = group(&report, "chip");
        let ai = group(&report, "AI");
        assert_eq!(chip.count, 2);
        assert_eq!(ai.count, 1);
        assert_eq!(ai.titles[0].title, "AI agents");
        let total: usize = report.groups.iter().map(|g| g.titles.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_group_cap_keeps_top_n() {
        let snaps = vec![snapshot(
            "09-00",
            &[
                ("hn", "GPU one", 9),
                ("hn", "GPU two", 1),
                ("hn", "GPU three", 4),
                ("hn", "GPU four", 2),
            ],
        )];
        let report = run(ReportMode::Daily, "GPU\n@2", ReportConfig::default(), &snaps);

        let gpu = group(&report, "GPU");
        assert_eq!(gpu.count, 4);
        let titles: Vec<&str> = gpu.titles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["GPU two", "GPU four"]);
    }

    #[test]
    fn test_global_cap_applies_when_group_has_none() {
        let snaps = vec![snapshot("09-00", &[("hn", "a1", 1), ("hn", "a2", 2), ("hn", "a3", 3)])];
        let report_cfg = ReportConfig {
            max_news_per_keyword: 1,
            ..ReportConfig::default()
        };
        let report = run(ReportMode::Daily, "a", report_cfg, &snaps);
        assert_eq!(group(&report, "a").titles.len(), 1);
        assert_eq!(group(&report, "a").titles[0].title, "a1");
    }

    #[test]
    fn test_sort_key_tiebreaks() {
        let snaps = vec![
            snapshot("09-00", &[("hn", "x same", 3), ("weibo", "x other", 3)]),
            snapshot("09-30", &[("weibo", "x other", 3)]),
        ];
        let report = run(ReportMode::Daily, "x", ReportConfig::default(), &snaps);
        let x = group(&report, "x");
        // more occurrences -> higher frequency score -> first
        assert_eq!(x.titles[0].title, "x other");
        assert_eq!(x.titles[0].time_display, "[09-00 ~ 09-30]");
        assert_eq!(x.titles[1].time_display, "09-00");
    }

    #[test]
    fn test_percentage_and_group_order() {
        let snaps = vec![snapshot(
            "09-00",
            &[("hn", "rust 1", 1), ("hn", "go 1", 2), ("hn", "go 2", 3), ("hn", "other", 4)],
        )];

        let by_count = run(ReportMode::Daily, "rust\n\ngo", ReportConfig::default(), &snaps);
        assert_eq!(by_count.total_titles, 4);
        assert_eq!(by_count.groups[0].word, "go");
        assert_eq!(by_count.groups[0].percentage, 50.0);
        assert_eq!(by_count.groups[1].percentage, 25.0);

        let cfg = ReportConfig {
            sort_by_position_first: true,
            ..ReportConfig::default()
        };
        let by_position = run(ReportMode::Daily, "rust\n\ngo", cfg, &snaps);
        assert_eq!(by_position.groups[0].word, "rust");
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_incremental_first_snapshot_marks_everything_new() {
        let snaps = vec![snapshot("09-00", &[("hn", "A", 1), ("hn", "B", 2)])];
        let report = run(ReportMode::Incremental, "", ReportConfig::default(), &snaps);

        let all = group(&report, ALL_NEWS_KEY);
        assert_eq!(all.count, 2);
        assert!(all.titles.iter().all(|t| t.is_new));
    }

    #[test]
    fn test_incremental_only_processes_new_titles() {
        let snaps = vec![
            snapshot("09-00", &[("hn", "A", 1)]),
            snapshot("09-30", &[("hn", "A", 1), ("hn", "B", 2)]),
        ];
        let report = run(ReportMode::Incremental, "", ReportConfig::default(), &snaps);

        assert_eq!(report.total_titles, 1);
        let all = group(&report, ALL_NEWS_KEY);
        assert_eq!(all.titles.len(), 1);
        assert_eq!(all.titles[0].title, "B");
        assert!(all.titles[0].is_new);
    }

    #[test]
    fn test_current_mode_uses_latest_titles_with_full_history() {
        let snaps = vec![
            snapshot("09-00", &[("hn", "A", 4), ("hn", "Gone", 1)]),
            snapshot("10-00", &[("hn", "A", 2), ("hn", "C", 3)]),
        ];
        let report = run(ReportMode::Current, "", ReportConfig::default(), &snaps);
        let all = group(&report, ALL_NEWS_KEY);

        let titles: HashSet<&str> = all.titles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["A", "C"].into_iter().collect());

        let a = all.titles.iter().find(|t| t.title == "A").unwrap();
        assert_eq!(a.ranks, vec![4, 2]);
        assert_eq!(a.count, 2);
        assert!(!a.is_new);
        let c = all.titles.iter().find(|t| t.title == "C").unwrap();
        assert!(c.is_new);
    }

    #[test]
    fn test_daily_marks_novelty() {
        let snaps = vec![
            snapshot("09-00", &[("hn", "A", 1)]),
            snapshot("09-30", &[("hn", "B", 2)]),
        ];
        let report = run(ReportMode::Daily, "", ReportConfig::default(), &snaps);
        let all = group(&report, ALL_NEWS_KEY);
        assert_eq!(all.count, 2);
        assert!(all.titles.iter().any(|t| t.title == "B" && t.is_new));
        assert!(all.titles.iter().any(|t| t.title == "A" && !t.is_new));
    }

    #[test]
    fn test_empty_rank_list_defaults_to_99() {
        let label = TimeLabel::parse("09-00").unwrap();
        let mut history = MergedHistory::default();
        let mut source = SourceHistory::default();
        source.titles.insert(
            "No rank".to_string(),
            TitleRecord {
                ranks: Vec::new(),
                url: String::new(),
                mobile_url: String::new(),
                first_time: label.clone(),
                last_time: label.clone(),
                count: 1,
            },
        );
        history.sources.insert("hn".to_string(), source);
        history.labels.push(label);

        let rules = RuleSet::default();
        let report = StatsBuilder::new(&rules, &ReportConfig::default(), WeightConfig::default())
            .build(ReportMode::Daily, &history, &NewTitles::default());
        assert_eq!(report.groups[0].titles[0].ranks, vec![99]);
    }

    #[test]
    fn test_no_history_is_empty_not_error() {
        let report = run(ReportMode::Daily, "chip", ReportConfig::default(), &[]);
        assert_eq!(report.total_titles, 0);
        assert!(report.groups.is_empty());

        let rules = RuleSet::default();
        let report = StatsBuilder::new(&rules, &ReportConfig::default(), WeightConfig::default())
            .build(ReportMode::Current, &MergedHistory::default(), &NewTitles::default());
        assert!(report.groups.is_empty());
    }
}
