//! Assembles statistics, novelty and failures into one renderable report.

use crate::models::{NewSection, ReportData, ReportMode, ScoredTitle, StatsReport};
use crate::pipeline::diff::NewTitles;
use crate::pipeline::rules::RuleSet;

/// Build the report a channel batch packer consumes.
///
/// - stat groups without titles are dropped
/// - new-item sections list novelty titles that pass the rule matcher,
///   ordered by best rank; they are hidden in incremental mode, where the
///   statistics already contain only new titles
/// - failed sources are deduplicated, keeping first occurrence order
pub fn assemble_report(
    stats: &StatsReport,
    novelty: &NewTitles,
    rules: &RuleSet,
    failed_sources: &[String],
    mode: ReportMode,
    rank_threshold: u32,
) -> ReportData {
    let groups: Vec<_> = stats
        .groups
        .iter()
        .filter(|group| group.count > 0)
        .cloned()
        .collect();

    let new_sections = if mode == ReportMode::Incremental {
        Vec::new()
    } else {
        new_sections(novelty, rules, rank_threshold)
    };

    let mut failed = Vec::with_capacity(failed_sources.len());
    for id in failed_sources {
        if !failed.contains(id) {
            failed.push(id.clone());
        }
    }

    let total_new_count = new_sections.iter().map(|s| s.titles.len()).sum();
    ReportData {
        stats: groups,
        new_sections,
        failed_sources: failed,
        total_new_count,
        has_novelty: novelty.has_changes(),
    }
}

fn new_sections(novelty: &NewTitles, rules: &RuleSet, rank_threshold: u32) -> Vec<NewSection> {
    let mut sections = Vec::new();

    for (source_id, titles) in &novelty.sources {
        let source_name = novelty
            .source_names
            .get(source_id)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| source_id.clone());

        let mut listed: Vec<ScoredTitle> = titles
            .iter()
            .filter(|(title, _)| rules.matches(title))
            .map(|(title, entry)| {
                let ranks = if entry.ranks.is_empty() {
                    vec![99]
                } else {
                    entry.ranks.clone()
                };
                ScoredTitle {
                    title: title.clone(),
                    source_id: source_id.clone(),
                    source_name: source_name.clone(),
                    time_display: String::new(),
                    count: 1,
                    ranks,
                    rank_threshold,
                    url: entry.url.clone(),
                    mobile_url: entry.mobile_url.clone(),
                    is_new: true,
                    weight: 0.0,
                }
            })
            .collect();

        if listed.is_empty() {
            continue;
        }
        listed.sort_by(|a, b| {
            a.best_rank()
                .cmp(&b.best_rank())
                .then_with(|| a.title.cmp(&b.title))
        });

        sections.push(NewSection {
            source_id: source_id.clone(),
            source_name,
            titles: listed,
        });
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportConfig, Snapshot, TimeLabel, WeightConfig};
    use crate::pipeline::diff::detect_new_titles;
    use crate::pipeline::merge::merge_snapshots;
    use crate::pipeline::stats::StatsBuilder;

    fn snapshot(label: &str, rows: &[(&str, &str, u32)]) -> Snapshot {
        let mut snap = Snapshot::new(TimeLabel::parse(label).unwrap());
        for (source, title, rank) in rows {
            snap.source_mut(source, "Hacker News").push(title, *rank, "", "");
        }
        snap
    }

    fn report(mode: ReportMode, rules: &str, failed: &[String]) -> ReportData {
        let snaps = vec![
            snapshot("09-00", &[("hn", "rust 2024", 1)]),
            snapshot("09-30", &[("hn", "rust 2024", 1), ("hn", "rust async", 5), ("hn", "go generics", 2)]),
        ];
        let rules = RuleSet::parse(rules);
        let history = merge_snapshots(&snaps, None);
        let novelty = detect_new_titles(&snaps, None);
        let stats = StatsBuilder::new(&rules, &ReportConfig::default(), WeightConfig::default())
            .build(mode, &history, &novelty);
        assemble_report(&stats, &novelty, &rules, failed, mode, 5)
    }

    #[test]
    fn test_new_sections_follow_rules() {
        let data = report(ReportMode::Daily, "rust\n\njava", &[]);

        assert_eq!(data.stats.len(), 1);
        assert_eq!(data.stats[0].word, "rust");
        assert_eq!(data.new_sections.len(), 1);
        let section = &data.new_sections[0];
        assert_eq!(section.source_name, "Hacker News");
        assert_eq!(section.titles.len(), 1);
        assert_eq!(section.titles[0].title, "rust async");
        assert_eq!(section.titles[0].count, 1);
        assert!(section.titles[0].time_display.is_empty());
        assert_eq!(data.total_new_count, 1);
    }

    #[test]
    fn test_new_sections_sorted_by_rank() {
        let data = report(ReportMode::Current, "", &[]);
        let titles: Vec<&str> = data.new_sections[0]
            .titles
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, vec!["go generics", "rust async"]);
    }

    #[test]
    fn test_incremental_hides_new_sections() {
        let data = report(ReportMode::Incremental, "", &[]);
        assert!(data.new_sections.is_empty());
        assert_eq!(data.total_new_count, 0);
        assert!(data.has_content(ReportMode::Incremental));
    }

    #[test]
    fn test_failed_sources_deduplicated() {
        let failed = vec!["zhihu".to_string(), "weibo".to_string(), "zhihu".to_string()];
        let data = report(ReportMode::Daily, "", &failed);
        assert_eq!(data.failed_sources, vec!["zhihu", "weibo"]);
    }

    #[test]
    fn test_has_content_by_mode() {
        // Nothing matches, but the latest snapshot still brought new titles
        let data = report(ReportMode::Daily, "java", &[]);
        assert!(data.stats.is_empty());
        assert!(data.new_sections.is_empty());
        assert!(data.has_novelty);
        assert!(data.has_content(ReportMode::Daily));
        assert!(!data.has_content(ReportMode::Current));

        let data = report(ReportMode::Daily, "async", &[]);
        assert!(data.has_content(ReportMode::Daily));
    }

    #[test]
    fn test_daily_without_matches_or_novelty_is_empty() {
        let snaps = vec![snapshot("09-00", &[("hn", "rust 2024", 1)])];
        let rules = RuleSet::parse("java");
        let history = merge_snapshots(&snaps, None);
        let novelty = detect_new_titles(&snaps, None);
        let stats = StatsBuilder::new(&rules, &ReportConfig::default(), WeightConfig::default())
            .build(ReportMode::Daily, &history, &novelty);
        let data = assemble_report(&stats, &novelty, &rules, &[], ReportMode::Daily, 5);

        assert!(!data.has_novelty);
        assert!(!data.has_content(ReportMode::Daily));
    }
}
