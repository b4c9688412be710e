//! Channel batch packer.
//!
//! Splits a rendered report into batches that each fit a channel's byte
//! limit. A group header always travels with its first item, separators are
//! dropped rather than forcing a new batch, and `Part i/n` headers are
//! reserved up front so adding them later never overflows.

use crate::models::{NewSection, ReportData, ReportMode, StatGroup};
use crate::services::channel::ChannelProfile;
use crate::utils::strip_markdown;
use crate::utils::text::truncate_to_bytes;

/// Greedy batch accumulator over a fixed capacity.
#[derive(Debug)]
struct Accumulator<'p> {
    profile: &'p ChannelProfile,
    /// Content budget per batch, footer included, part header excluded
    capacity: usize,
    batches: Vec<String>,
    current: String,
    has_content: bool,
}

impl<'p> Accumulator<'p> {
    fn new(profile: &'p ChannelProfile, capacity: usize) -> Self {
        Self {
            profile,
            capacity,
            batches: Vec::new(),
            current: profile.base_header.clone(),
            has_content: false,
        }
    }

    fn footer_len(&self) -> usize {
        self.profile.base_footer.len()
    }

    fn fits(&self, addition: &str) -> bool {
        self.current.len() + addition.len() + self.footer_len() <= self.capacity
    }

    /// Append `unit`, or flush and re-open the batch with `reopen` + `unit`.
    ///
    /// `reopen` lists the header layers repeated at the top of a fresh batch,
    /// outermost first.
    fn push(&mut self, unit: &str, reopen: &[&str]) {
        if self.fits(unit) {
            self.current.push_str(unit);
            self.has_content = true;
        } else {
            self.flush();
            self.start(reopen, unit);
        }
    }

    /// Append `text` only if it fits; never triggers a flush.
    fn push_elidable(&mut self, text: &str) {
        if self.has_content && self.fits(text) {
            self.current.push_str(text);
        }
    }

    /// Start a fresh batch holding `unit`.
    ///
    /// Header layers are shed innermost first until the unit fits; only then
    /// is the unit itself truncated. Headers never displace the unit.
    fn start(&mut self, reopen: &[&str], unit: &str) {
        let budget = self.capacity.saturating_sub(self.footer_len());
        let base = self.profile.base_header.as_str();

        for depth in (0..=reopen.len()).rev() {
            let layers: usize = reopen[..depth].iter().map(|h| h.len()).sum();
            if base.len() + layers + unit.len() <= budget {
                let mut content = String::with_capacity(budget);
                content.push_str(base);
                reopen[..depth].iter().for_each(|h| content.push_str(h));
                content.push_str(unit);
                if depth < reopen.len() {
                    log::debug!(
                        "{}: dropped {} reopen header(s) to fit a {} byte unit",
                        self.profile.kind,
                        reopen.len() - depth,
                        unit.len()
                    );
                }
                self.current = content;
                self.has_content = true;
                return;
            }
        }

        let room = budget.saturating_sub(base.len());
        log::warn!(
            "{}: unit of {} bytes exceeds batch capacity ({} bytes available), truncating",
            self.profile.kind,
            unit.len(),
            room
        );
        self.current = if room == 0 {
            truncate_to_bytes(unit, budget).to_string()
        } else {
            format!("{base}{}", truncate_to_bytes(unit, room))
        };
        self.has_content = true;
    }

    fn flush(&mut self) {
        if self.has_content {
            let mut batch = std::mem::take(&mut self.current);
            batch.push_str(&self.profile.base_footer);
            self.batches.push(guard(batch, self.capacity, self.profile));
        }
        self.current = self.profile.base_header.clone();
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.batches
    }
}

/// Truncate a finished batch that still exceeds `limit`.
fn guard(batch: String, limit: usize, profile: &ChannelProfile) -> String {
    if batch.len() <= limit {
        return batch;
    }
    log::warn!(
        "{}: batch of {} bytes exceeds limit {}, truncating",
        profile.kind,
        batch.len(),
        limit
    );
    truncate_to_bytes(&batch, limit).to_string()
}

/// Packs reports into byte-bounded batches for one channel.
#[derive(Debug, Clone)]
pub struct BatchPacker {
    profile: ChannelProfile,
    mode: ReportMode,
}

impl BatchPacker {
    pub fn new(profile: ChannelProfile, mode: ReportMode) -> Self {
        Self { profile, mode }
    }

    pub fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    /// Bytes available to packed content once the part header is reserved.
    pub fn capacity(&self) -> usize {
        self.profile
            .max_bytes
            .saturating_sub(self.profile.part_header_reserve())
    }

    /// Pack a report into ordered batches, each within `max_bytes`.
    ///
    /// An empty report produces a single batch carrying the empty notice.
    pub fn pack(&self, report: &ReportData) -> Vec<String> {
        let dialect = self.profile.dialect;
        let mut acc = Accumulator::new(&self.profile, self.capacity());

        if report.is_empty() {
            acc.push(&dialect.empty_notice(self.mode), &[]);
            return self.finalize(acc.finish());
        }

        if !report.stats.is_empty() {
            self.pack_stats(&mut acc, &report.stats);
        }
        if !report.new_sections.is_empty() {
            self.pack_new_sections(&mut acc, &report.new_sections, report.total_new_count);
        }
        if !report.failed_sources.is_empty() {
            self.pack_failed(&mut acc, &report.failed_sources);
        }

        let batches = acc.finish();
        log::debug!(
            "{}: packed report into {} batches (limit {} bytes)",
            self.profile.kind,
            batches.len(),
            self.profile.max_bytes
        );
        self.finalize(batches)
    }

    fn pack_stats(&self, acc: &mut Accumulator<'_>, stats: &[StatGroup]) {
        let stats_header = self.profile.dialect.stats_header();
        acc.push(&stats_header, &[]);

        let total = stats.len();
        for (i, group) in stats.iter().enumerate() {
            let word_header = self.word_header(group, i, total);

            // Header and first item are one unit.
            let first = group
                .titles
                .first()
                .map(|_| self.stat_line(group, 0))
                .unwrap_or_default();
            acc.push(&format!("{word_header}{first}"), &[stats_header.as_str()]);

            for j in 1..group.titles.len() {
                acc.push(&self.stat_line(group, j), &[stats_header.as_str(), word_header.as_str()]);
            }

            if i + 1 < total {
                acc.push_elidable(&self.profile.separator);
            }
        }
    }

    fn pack_new_sections(&self, acc: &mut Accumulator<'_>, sections: &[NewSection], total_new: usize) {
        let new_header = format!(
            "{}{}",
            self.profile.separator,
            self.profile.dialect.new_items_header(total_new)
        );
        acc.push(&new_header, &[]);

        for section in sections {
            let source_header = self
                .profile
                .dialect
                .source_header(&section.source_name, section.titles.len());

            let first = section
                .titles
                .first()
                .map(|_| self.new_line(section, 0))
                .unwrap_or_default();
            acc.push(&format!("{source_header}{first}"), &[new_header.as_str()]);

            for j in 1..section.titles.len() {
                acc.push(&self.new_line(section, j), &[new_header.as_str(), source_header.as_str()]);
            }

            acc.push_elidable("\n");
        }
    }

    fn pack_failed(&self, acc: &mut Accumulator<'_>, failed: &[String]) {
        let failed_header = format!(
            "{}{}",
            self.profile.separator,
            self.profile.dialect.failed_header()
        );
        acc.push(&failed_header, &[]);
        for id in failed {
            acc.push(&self.profile.dialect.failed_line(id), &[failed_header.as_str()]);
        }
    }

    fn word_header(&self, group: &StatGroup, index: usize, total: usize) -> String {
        self.profile
            .dialect
            .word_header(&group.word, group.count, index + 1, total)
    }

    /// Item line of a stat group; all but the last are followed by a blank line.
    fn stat_line(&self, group: &StatGroup, index: usize) -> String {
        let rendered = self
            .profile
            .dialect
            .render_title(&group.titles[index], true, true);
        let mut line = format!("  {}. {rendered}\n", index + 1);
        if index + 1 < group.titles.len() {
            line.push('\n');
        }
        line
    }

    /// Item line of a new-items section; source and new marker are implied.
    fn new_line(&self, section: &NewSection, index: usize) -> String {
        let rendered = self
            .profile
            .dialect
            .render_title(&section.titles[index], false, false);
        format!("  {}. {rendered}\n", index + 1)
    }

    /// Plain-text conversion, then part headers for multi-batch output.
    fn finalize(&self, batches: Vec<String>) -> Vec<String> {
        let batches = if self.profile.plain_text {
            batches.iter().map(|b| strip_markdown(b)).collect()
        } else {
            batches
        };
        add_batch_headers(batches, &self.profile)
    }
}

/// Prefix each batch with its `Part i/n` header when there is more than one.
///
/// Content is truncated if a header longer than the reserved size (more than
/// 99 parts) would push a batch over the limit.
pub fn add_batch_headers(batches: Vec<String>, profile: &ChannelProfile) -> Vec<String> {
    if batches.len() <= 1 {
        return batches;
    }

    let total = batches.len();
    batches
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let header = profile.part_header(i + 1, total);
            let room = profile.max_bytes.saturating_sub(header.len());
            let content = if content.len() > room {
                log::warn!(
                    "{}: part {}/{} content ({} bytes) + header ({} bytes) exceeds limit {}, truncating",
                    profile.kind,
                    i + 1,
                    total,
                    content.len(),
                    header.len(),
                    profile.max_bytes
                );
                truncate_to_bytes(&content, room)
            } else {
                content.as_str()
            };
            let joined = format!("{header}{content}");
            truncate_to_bytes(&joined, profile.max_bytes).to_string()
        })
        .collect()
}

/// Convenience function to pack a report for one profile.
pub fn pack_report(report: &ReportData, profile: ChannelProfile, mode: ReportMode) -> Vec<String> {
    BatchPacker::new(profile, mode).pack(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelKind, Config, ScoredTitle};
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn profile(kind: ChannelKind, max_bytes: usize) -> ChannelProfile {
        ChannelProfile::new(kind, max_bytes, 10, &now(), "━━━━━━")
    }

    fn bare_profile(max_bytes: usize) -> ChannelProfile {
        let mut p = profile(ChannelKind::Ntfy, max_bytes);
        p.base_header.clear();
        p.base_footer.clear();
        p
    }

    fn scored(title: &str, rank: u32) -> ScoredTitle {
        ScoredTitle {
            title: title.to_string(),
            source_id: "hn".to_string(),
            source_name: "HN".to_string(),
            time_display: "09-00".to_string(),
            count: 1,
            ranks: vec![rank],
            rank_threshold: 5,
            url: format!("https://news.example/{rank}"),
            mobile_url: String::new(),
            is_new: false,
            weight: 0.0,
        }
    }

    fn group(word: &str, titles: Vec<ScoredTitle>) -> StatGroup {
        StatGroup {
            word: word.to_string(),
            count: titles.len(),
            position: 0,
            titles,
            percentage: 0.0,
        }
    }

    fn report(groups: Vec<StatGroup>) -> ReportData {
        ReportData {
            stats: groups,
            ..ReportData::default()
        }
    }

    fn sample_report(groups: usize, per_group: usize) -> ReportData {
        let stats = (0..groups)
            .map(|g| {
                let titles = (0..per_group)
                    .map(|t| scored(&format!("芯片 headline {g}-{t} with some padding text"), t as u32 + 1))
                    .collect();
                group(&format!("keyword{g}"), titles)
            })
            .collect();
        let mut data = report(stats);
        data.new_sections = vec![NewSection {
            source_id: "weibo".to_string(),
            source_name: "Weibo".to_string(),
            titles: (0..per_group).map(|t| scored(&format!("新 item {t}"), 3)).collect(),
        }];
        data.total_new_count = per_group;
        data.failed_sources = vec!["zhihu".to_string(), "douyin".to_string()];
        data
    }

    #[test]
    fn test_single_batch_has_no_part_header() {
        let packer = BatchPacker::new(profile(ChannelKind::WeWork, 4000), ReportMode::Daily);
        let batches = packer.pack(&sample_report(2, 2));

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert!(!batch.contains("[Part"));
        assert!(batch.starts_with("**Total news:** 10"));
        assert!(batch.contains("📊 **Hot Keywords Statistics**"));
        assert!(batch.contains("🆕 **New Hot News** (2 total)"));
        assert!(batch.contains("⚠️ **Failed Platforms:**"));
        assert!(batch.contains("  • zhihu\n"));
        assert!(batch.ends_with("> Updated: 2025-03-01 09:30:00"));
    }

    #[test]
    fn test_budget_invariant_across_channels_and_limits() {
        let data = sample_report(6, 5);
        for kind in ChannelKind::ALL {
            for max_bytes in [60, 120, 300, 700, 1500, 4000] {
                let packer = BatchPacker::new(profile(kind, max_bytes), ReportMode::Current);
                for batch in packer.pack(&data) {
                    assert!(
                        batch.len() <= max_bytes,
                        "{kind} batch of {} bytes exceeds {max_bytes}",
                        batch.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_oversize_single_item_is_truncated() {
        let huge = "巨".repeat(2000);
        let data = report(vec![group("big", vec![scored(&huge, 1)])]);

        let packer = BatchPacker::new(profile(ChannelKind::Telegram, 500), ReportMode::Daily);
        let batches = packer.pack(&data);
        assert!(!batches.is_empty());
        assert!(batches.iter().all(|b| b.len() <= 500));
        assert!(batches.iter().any(|b| b.contains('巨')));
    }

    #[test]
    fn test_two_units_exceeding_capacity_make_two_batches() {
        let p = bare_profile(100);
        let mut acc = Accumulator::new(&p, 100 - p.part_header_reserve());
        acc.push(&"a".repeat(60), &[]);
        acc.push(&"b".repeat(70), &[]);
        let batches = add_batch_headers(acc.finish(), &p);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], format!("**[Part 1/2]**\n\n{}", "a".repeat(60)));
        assert_eq!(batches[1], format!("**[Part 2/2]**\n\n{}", "b".repeat(70)));
    }

    #[test]
    fn test_header_stays_with_first_item() {
        let data = sample_report(8, 4);
        let packer = BatchPacker::new(profile(ChannelKind::Slack, 700), ReportMode::Daily);
        let batches = packer.pack(&data);
        assert!(batches.len() > 1);

        let total = data.stats.len();
        for (i, g) in data.stats.iter().enumerate() {
            let unit = format!("{}{}", packer.word_header(g, i, total), packer.stat_line(g, 0));
            assert!(
                batches.iter().any(|b| b.contains(&unit)),
                "group {} split from its first item",
                g.word
            );
        }

        let section = &data.new_sections[0];
        let source_unit = format!(
            "{}{}",
            packer.profile().dialect.source_header(&section.source_name, section.titles.len()),
            packer.new_line(section, 0)
        );
        assert!(batches.iter().any(|b| b.contains(&source_unit)));
    }

    #[test]
    fn test_reopened_batches_are_self_contained() {
        let data = report(vec![group(
            "long",
            (0..30).map(|t| scored(&format!("title number {t}"), 2)).collect(),
        )]);
        let packer = BatchPacker::new(profile(ChannelKind::Ntfy, 600), ReportMode::Daily);
        let batches = packer.pack(&data);

        assert!(batches.len() > 1);
        for batch in &batches {
            assert!(batch.contains("**Total news:**"));
            assert!(batch.contains("Hot Keywords Statistics"));
            assert!(batch.contains("**long** : **30** items"));
        }
    }

    #[test]
    fn test_separator_is_elided_not_flushed() {
        let p = bare_profile(100);
        let capacity = 100 - p.part_header_reserve();
        let mut acc = Accumulator::new(&p, capacity);
        acc.push(&"x".repeat(capacity - 1), &[]);
        acc.push_elidable("\n\n");
        let batches = acc.finish();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), capacity - 1);
    }

    #[test]
    fn test_reopen_headers_shed_before_unit() {
        let p = bare_profile(100);
        let capacity = 100 - p.part_header_reserve();
        let mut acc = Accumulator::new(&p, capacity);
        acc.push(&"a".repeat(capacity), &[]);

        // Both layers fit alongside the unit: kept
        acc.push("item one\n", &["SECTION\n", "GROUP\n"]);
        // Only the outer layer fits
        let long = "b".repeat(capacity - 8);
        acc.push(&long, &["SECTION\n", "GROUP\n"]);
        // No layer fits, the unit is kept whole
        let full = "c".repeat(capacity);
        acc.push(&full, &["SECTION\n", "GROUP\n"]);
        let batches = acc.finish();

        assert_eq!(batches.len(), 4);
        assert_eq!(batches[1], "SECTION\nGROUP\nitem one\n");
        assert_eq!(batches[2], format!("SECTION\n{long}"));
        assert_eq!(batches[3], full);
    }

    #[test]
    fn test_unit_survives_oversized_base_header() {
        let mut p = bare_profile(100);
        let capacity = 100 - p.part_header_reserve();
        p.base_header = "H".repeat(capacity);
        let mut acc = Accumulator::new(&p, capacity);
        acc.push("kept", &["SECTION\n"]);
        let batches = acc.finish();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], "kept");
    }

    #[test]
    fn test_more_than_99_batches_stay_within_limit() {
        let data = report(vec![group(
            "many",
            (0..150).map(|t| scored(&format!("{t:04}"), 1)).collect(),
        )]);
        let limit = 170;
        let packer = BatchPacker::new(bare_profile(limit), ReportMode::Daily);
        let batches = packer.pack(&data);

        assert!(batches.len() > 99, "expected >99 batches, got {}", batches.len());
        assert!(batches.iter().all(|b| b.len() <= limit));
        assert!(batches[100].starts_with(&format!("**[Part 101/{}]**", batches.len())));
    }

    #[test]
    fn test_empty_report_notice() {
        let packer = BatchPacker::new(profile(ChannelKind::Telegram, 4000), ReportMode::Incremental);
        let batches = packer.pack(&ReportData::default());

        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains("📭 No new matching hot keywords in incremental mode"));
    }

    #[test]
    fn test_wework_text_is_plain() {
        let config = Config::default();
        let p = ChannelProfile::for_channel(ChannelKind::WeWorkText, &config, 2, &now());
        let batches = BatchPacker::new(p, ReportMode::Daily).pack(&sample_report(1, 2));

        assert_eq!(batches.len(), 1);
        assert!(!batches[0].contains("**"));
        assert!(batches[0].contains("https://news.example/1"));
    }
}
