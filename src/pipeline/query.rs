//! Read-only queries over stored snapshots.
//!
//! Lookups by day, keyword search across a date range, and frequency of the
//! configured rule words. Every query merges a day's snapshots first, so a
//! title appears once per source and day.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{MergedHistory, ReportMode, TitleRecord};
use crate::pipeline::diff::detect_new_titles;
use crate::pipeline::merge::merge_snapshots;
use crate::pipeline::rules::RuleSet;
use crate::storage::SnapshotStore;
use crate::utils::log;

/// One merged title of one source on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub source_id: String,
    pub source_name: String,
    /// Rank at first sighting
    pub rank: u32,
    pub avg_rank: f64,
    pub ranks: Vec<u32>,
    /// Number of snapshots the title appeared in
    pub count: u32,
    pub url: String,
    pub mobile_url: String,
    pub date: NaiveDate,
}

impl NewsItem {
    fn from_record(
        date: NaiveDate,
        source_id: &str,
        source_name: &str,
        title: &str,
        record: &TitleRecord,
    ) -> Self {
        Self {
            title: title.to_string(),
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            rank: record.ranks.first().copied().unwrap_or(0),
            avg_rank: average(&record.ranks),
            ranks: record.ranks.clone(),
            count: record.count,
            url: record.url.clone(),
            mobile_url: record.mobile_url.clone(),
            date,
        }
    }
}

/// Aggregates over every match of a search, before `limit` is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub keyword: String,
    pub avg_rank: f64,
    /// Matches per source id
    pub source_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub results: Vec<NewsItem>,
    pub total_found: usize,
    pub days_searched: usize,
    pub statistics: SearchStats,
}

/// How often one rule word appears in a day's titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingTopic {
    pub keyword: String,
    /// Matching (source, title) pairs
    pub frequency: usize,
    /// Distinct matching title texts across sources
    pub matched_titles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingReport {
    pub date: NaiveDate,
    pub mode: ReportMode,
    pub topics: Vec<TrendingTopic>,
    /// Rule words that matched at least once
    pub total_keywords: usize,
}

/// Query front end over any snapshot store.
pub struct QueryService<'s, S: ?Sized> {
    store: &'s S,
    allowed: Option<HashSet<String>>,
}

impl<'s, S> QueryService<'s, S>
where
    S: SnapshotStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            allowed: None,
        }
    }

    /// Restrict every query to the given source ids.
    pub fn with_sources(mut self, allowed: Option<HashSet<String>>) -> Self {
        self.allowed = allowed;
        self
    }

    /// Earliest and latest day with stored snapshots.
    pub async fn date_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.store.list_dates().await?;
        Ok(dates.first().copied().zip(dates.last().copied()))
    }

    async fn history(&self, date: NaiveDate) -> Result<MergedHistory> {
        let snapshots = self.store.load_day(date).await?;
        Ok(merge_snapshots(&snapshots, self.allowed.as_ref()))
    }

    /// Every title of a day, ordered by first-seen rank. `limit` 0 is unlimited.
    pub async fn news_by_date(&self, date: NaiveDate, limit: usize) -> Result<Vec<NewsItem>> {
        let history = self.history(date).await?;
        let items = collect_items(date, &history, |_| true);
        Ok(sorted_and_limited(items, limit))
    }

    /// Titles present in the day's most recent snapshot.
    pub async fn latest_news(&self, date: NaiveDate, limit: usize) -> Result<Vec<NewsItem>> {
        let history = self.history(date).await?;
        let Some(latest) = history.latest_time().cloned() else {
            return Ok(Vec::new());
        };
        let items = collect_items(date, &history, |record| record.last_time == latest);
        Ok(sorted_and_limited(items, limit))
    }

    /// Case-insensitive substring search from `from` to `to`, both inclusive.
    ///
    /// Days without snapshots are skipped. `limit` 0 keeps every match.
    pub async fn search(
        &self,
        keyword: &str,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Result<SearchResult> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::validation("search keyword is empty"));
        }
        if from > to {
            return Err(AppError::validation(format!(
                "search range starts after it ends ({from} > {to})"
            )));
        }

        let needle = keyword.to_lowercase();
        let mut results = Vec::new();
        let mut days_searched = 0;
        for date in from.iter_days().take_while(|d| *d <= to) {
            let history = self.history(date).await?;
            if history.is_empty() {
                continue;
            }
            days_searched += 1;
            for (source_id, source) in &history.sources {
                let source_name = history.source_name(source_id);
                for (title, record) in &source.titles {
                    if title.to_lowercase().contains(&needle) {
                        results.push(NewsItem::from_record(
                            date,
                            source_id,
                            source_name,
                            title,
                            record,
                        ));
                    }
                }
            }
        }

        let mut source_distribution = BTreeMap::new();
        for item in &results {
            *source_distribution.entry(item.source_id.clone()).or_insert(0) += 1;
        }
        let all_ranks: Vec<u32> = results.iter().flat_map(|i| i.ranks.iter().copied()).collect();
        let total_found = results.len();

        log::sub_item(&format!(
            "'{}': {} matches over {} days",
            keyword, total_found, days_searched
        ));

        if limit > 0 {
            results.truncate(limit);
        }
        Ok(SearchResult {
            results,
            total_found,
            days_searched,
            statistics: SearchStats {
                keyword: keyword.to_string(),
                avg_rank: average(&all_ranks),
                source_distribution,
            },
        })
    }

    /// Frequency of each required and normal rule word over a day's titles.
    ///
    /// `current` counts titles of the latest snapshot, `incremental` only the
    /// titles new in it, `daily` the whole day. Titles hit by a filter word are
    /// skipped. `top_n` 0 returns every word.
    pub async fn trending(
        &self,
        date: NaiveDate,
        rules: &RuleSet,
        mode: ReportMode,
        top_n: usize,
    ) -> Result<TrendingReport> {
        let snapshots = self.store.load_day(date).await?;
        let history = merge_snapshots(&snapshots, self.allowed.as_ref());
        let titles: Vec<(&str, &str)> = match mode {
            ReportMode::Daily => all_titles(&history, |_| true),
            ReportMode::Current => match history.latest_time() {
                Some(latest) => all_titles(&history, |record| &record.last_time == latest),
                None => Vec::new(),
            },
            ReportMode::Incremental => {
                let novelty = detect_new_titles(&snapshots, self.allowed.as_ref());
                all_titles(&history, |_| true)
                    .into_iter()
                    .filter(|(source_id, title)| novelty.contains(source_id, title))
                    .collect()
            }
        };

        // Rule words in declared order, case-insensitively unique
        let mut words: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for group in &rules.groups {
            for word in group.required.iter().chain(&group.normal) {
                if seen.insert(word.to_lowercase()) {
                    words.push(word.clone());
                }
            }
        }

        let mut counts: HashMap<&str, (usize, HashSet<&str>)> = HashMap::new();
        for &(_, title) in &titles {
            let lower = title.to_lowercase();
            if rules.filters.iter().any(|f| lower.contains(f.as_str())) {
                continue;
            }
            for word in &words {
                if lower.contains(&word.to_lowercase()) {
                    let entry = counts.entry(word.as_str()).or_default();
                    entry.0 += 1;
                    entry.1.insert(title);
                }
            }
        }

        let mut topics: Vec<TrendingTopic> = counts
            .into_iter()
            .map(|(keyword, (frequency, distinct))| TrendingTopic {
                keyword: keyword.to_string(),
                frequency,
                matched_titles: distinct.len(),
            })
            .collect();
        topics.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.keyword.cmp(&b.keyword)));
        let total_keywords = topics.len();
        if top_n > 0 {
            topics.truncate(top_n);
        }

        Ok(TrendingReport {
            date,
            mode,
            topics,
            total_keywords,
        })
    }
}

fn all_titles<'h>(
    history: &'h MergedHistory,
    keep: impl Fn(&TitleRecord) -> bool,
) -> Vec<(&'h str, &'h str)> {
    history
        .sources
        .iter()
        .flat_map(|(source_id, source)| {
            source
                .titles
                .iter()
                .filter(|(_, record)| keep(*record))
                .map(move |(title, _)| (source_id.as_str(), title.as_str()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn collect_items(
    date: NaiveDate,
    history: &MergedHistory,
    keep: impl Fn(&TitleRecord) -> bool,
) -> Vec<NewsItem> {
    let mut items = Vec::new();
    for (source_id, source) in &history.sources {
        let source_name = history.source_name(source_id);
        for (title, record) in &source.titles {
            if keep(record) {
                items.push(NewsItem::from_record(date, source_id, source_name, title, record));
            }
        }
    }
    items
}

fn sorted_and_limited(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.title.cmp(&b.title)));
    if limit > 0 {
        items.truncate(limit);
    }
    items
}

/// Mean rank rounded to two decimals, 0 for no ranks.
fn average(ranks: &[u32]) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let sum: u64 = ranks.iter().map(|&r| u64::from(r)).sum();
    (sum as f64 / ranks.len() as f64 * 100.0).round() / 100.0
}
