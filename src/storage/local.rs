//! Local filesystem snapshot store.
//!
//! ## File format
//!
//! One block per source, blocks separated by a blank line:
//!
//! ```text
//! hackernews | Hacker News
//! 1. Rust 2024 is out [URL:https://a.example] [MOBILE:https://m.a.example]
//! 2. Another title
//!
//! weibo
//! 1. ...
//!
//! ==== Failed IDs ====
//! zhihu
//! ```
//!
//! A line without a `<rank>. ` prefix is rank 1.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Snapshot, TimeLabel};
use crate::storage::SnapshotStore;

/// Marker line opening the failed-sources block.
pub const FAILED_MARKER: &str = "==== Failed IDs ====";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Directory holding one day's snapshot files.
    fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root_dir
            .join(date.format("%Y-%m-%d").to_string())
            .join("txt")
    }

    fn snapshot_path(&self, date: NaiveDate, label: &TimeLabel) -> PathBuf {
        self.day_dir(date).join(format!("{}.txt", label))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read a file, returning None if it doesn't exist.
    async fn read_string(&self, path: &PathBuf) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::storage(path.display().to_string(), e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::storage(self.root_dir.display().to_string(), e)),
        };

        let mut dates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match NaiveDate::parse_from_str(name, "%Y-%m-%d") {
                Ok(date) => dates.push(date),
                Err(_) => log::debug!("Skipping non-date directory {}", name),
            }
        }

        dates.sort();
        Ok(dates)
    }

    async fn list_labels(&self, date: NaiveDate) -> Result<Vec<TimeLabel>> {
        let dir = self.day_dir(date);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No snapshot directory at {}", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(AppError::storage(dir.display().to_string(), e)),
        };

        let mut labels = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match TimeLabel::parse(stem) {
                Ok(label) => labels.push(label),
                Err(e) => log::warn!("Skipping snapshot file {}: {}", path.display(), e),
            }
        }

        labels.sort();
        Ok(labels)
    }

    async fn load_snapshot(&self, date: NaiveDate, label: &TimeLabel) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(date, label);
        Ok(self
            .read_string(&path)
            .await?
            .map(|text| parse_snapshot(label.clone(), &text)))
    }

    async fn write_snapshot(&self, date: NaiveDate, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path(date, &snapshot.label);
        self.write_bytes(&path, format_snapshot(snapshot).as_bytes())
            .await?;
        log::info!(
            "Snapshot {}: {} titles written to {}",
            snapshot.label,
            snapshot.title_count(),
            path.display()
        );
        Ok(())
    }
}

/// Split a line into rank, title, URL and mobile URL.
fn parse_line(line: &str) -> (u32, &str, &str, &str) {
    let (rank, rest) = match line.split_once(". ") {
        Some((digits, rest)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            match digits.parse::<u32>() {
                Ok(rank) => (rank, rest),
                Err(_) => (1, line),
            }
        }
        _ => (1, line),
    };

    let (rest, mobile_url) = split_tag(rest, " [MOBILE:");
    let (title, url) = split_tag(rest, " [URL:");
    (rank, title, url, mobile_url)
}

/// Strip a trailing ` [TAG:value]` suffix.
fn split_tag<'a>(text: &'a str, tag: &str) -> (&'a str, &'a str) {
    match text.rsplit_once(tag) {
        Some((head, value)) if value.ends_with(']') => (head, &value[..value.len() - 1]),
        _ => (text, ""),
    }
}

/// Parse snapshot file text. Malformed lines are skipped with a warning.
pub fn parse_snapshot(label: TimeLabel, text: &str) -> Snapshot {
    let mut snapshot = Snapshot::new(label);
    let mut lines = text.lines().map(str::trim).peekable();

    while lines.peek().is_some() {
        let block: Vec<&str> = lines
            .by_ref()
            .skip_while(|line| line.is_empty())
            .take_while(|line| !line.is_empty())
            .collect();
        let Some((&header, body)) = block.split_first() else {
            break;
        };

        if header == FAILED_MARKER {
            snapshot
                .failed_sources
                .extend(body.iter().map(|id| id.to_string()));
            continue;
        }

        let (id, name) = match header.split_once(" | ") {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (header, header),
        };
        if body.is_empty() {
            log::debug!("Snapshot {}: source '{}' has no titles", snapshot.label, id);
            continue;
        }

        let source = snapshot.source_mut(id, name);
        for line in body {
            let (rank, title, url, mobile_url) = parse_line(line);
            if title.trim().is_empty() {
                log::warn!("Unreadable snapshot line for '{}': {}", id, line);
                continue;
            }
            source.push(title, rank, url, mobile_url);
        }
    }

    snapshot
}

/// Render a snapshot in the text file format.
///
/// Each observed rank gets its own line so repeated ranks survive a round trip.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    for (id, source) in &snapshot.sources {
        if source.name.is_empty() || source.name == *id {
            out.push_str(&format!("{id}\n"));
        } else {
            out.push_str(&format!("{id} | {}\n", source.name));
        }

        let mut lines: Vec<(u32, &str, &str, &str)> = source
            .titles
            .iter()
            .flat_map(|(title, entry)| {
                entry
                    .ranks
                    .iter()
                    .map(move |&rank| (rank, title.as_str(), entry.url.as_str(), entry.mobile_url.as_str()))
            })
            .collect();
        lines.sort_by_key(|&(rank, title, _, _)| (rank, title));

        for (rank, title, url, mobile_url) in lines {
            out.push_str(&format!("{rank}. {title}"));
            if !url.is_empty() {
                out.push_str(&format!(" [URL:{url}]"));
            }
            if !mobile_url.is_empty() {
                out.push_str(&format!(" [MOBILE:{mobile_url}]"));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !snapshot.failed_sources.is_empty() {
        out.push_str(FAILED_MARKER);
        out.push('\n');
        for id in &snapshot.failed_sources {
            out.push_str(id);
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn label(s: &str) -> TimeLabel {
        TimeLabel::parse(s).unwrap()
    }

    #[test]
    fn test_parse_snapshot() {
        let text = "\
hn | Hacker News
1. Rust 2024 [URL:https://a.io] [MOBILE:https://m.a.io]
2. Zig   0.14 [URL:https://z.io]
Untitled rank line

weibo
3. 热搜 标题

==== Failed IDs ====
zhihu
douyin
";
        let snap = parse_snapshot(label("09-00"), text);

        let hn = &snap.sources["hn"];
        assert_eq!(hn.name, "Hacker News");
        assert_eq!(hn.titles["Rust 2024"].url, "https://a.io");
        assert_eq!(hn.titles["Rust 2024"].mobile_url, "https://m.a.io");
        assert_eq!(hn.titles["Zig 0.14"].ranks, vec![2]);
        assert_eq!(hn.titles["Untitled rank line"].ranks, vec![1]);

        let weibo = &snap.sources["weibo"];
        assert_eq!(weibo.name, "weibo");
        assert_eq!(weibo.titles["热搜 标题"].ranks, vec![3]);

        assert_eq!(snap.failed_sources, vec!["zhihu", "douyin"]);
    }

    #[test]
    fn test_parse_skips_empty_and_headerless_blocks() {
        let snap = parse_snapshot(label("09-00"), "\n\nlonely\n\n\nhn\n1. A\n");
        assert!(!snap.sources.contains_key("lonely"));
        assert_eq!(snap.title_count(), 1);
    }

    #[test]
    fn test_format_keeps_repeated_ranks() {
        let mut snap = Snapshot::new(label("09-00"));
        let source = snap.source_mut("hn", "Hacker News");
        source.push("A", 4, "https://a", "");
        source.push("A", 2, "", "");
        source.push("B", 1, "", "");
        snap.failed_sources.push("zhihu".into());

        let text = format_snapshot(&snap);
        assert!(text.starts_with("hn | Hacker News\n1. B\n2. A [URL:https://a]\n4. A [URL:https://a]\n"));
        assert!(text.ends_with("==== Failed IDs ====\nzhihu\n"));

        let parsed = parse_snapshot(label("09-00"), &text);
        assert_eq!(parsed.sources["hn"].titles["A"].ranks, vec![2, 4]);
        assert_eq!(parsed.failed_sources, vec!["zhihu"]);
    }

    #[tokio::test]
    async fn test_write_and_load_day() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        for (l, title) in [("10-00", "late"), ("09-00", "early")] {
            let mut snap = Snapshot::new(label(l));
            snap.source_mut("hn", "HN").push(title, 1, "", "");
            store.write_snapshot(date(), &snap).await.unwrap();
        }

        let labels = store.list_labels(date()).await.unwrap();
        assert_eq!(labels, vec![label("09-00"), label("10-00")]);

        let day = store.load_day(date()).await.unwrap();
        assert_eq!(day.len(), 2);
        assert!(day[0].sources["hn"].titles.contains_key("early"));
        assert!(dir.path().join("2025-03-01/txt/09-00.txt").exists());
        assert!(!dir.path().join("2025-03-01/txt/09-00.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_day_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        assert!(store.list_labels(date()).await.unwrap().is_empty());
        assert!(store.load_day(date()).await.unwrap().is_empty());
        assert!(store
            .load_snapshot(date(), &label("09-00"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_dates() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.list_dates().await.unwrap().is_empty());

        let mut snap = Snapshot::new(label("09-00"));
        snap.source_mut("hn", "HN").push("a", 1, "", "");
        let later = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        store.write_snapshot(later, &snap).await.unwrap();
        store.write_snapshot(date(), &snap).await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("archive")).await.unwrap();
        tokio::fs::write(dir.path().join("2025-03-02"), "not a dir").await.unwrap();

        assert_eq!(store.list_dates().await.unwrap(), vec![date(), later]);
    }

    #[tokio::test]
    async fn test_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let day = dir.path().join("2025-03-01/txt");
        tokio::fs::create_dir_all(&day).await.unwrap();
        tokio::fs::write(day.join("notes.md"), "x").await.unwrap();
        tokio::fs::write(day.join("bad-name.txt"), "x").await.unwrap();
        tokio::fs::write(day.join("08-15.txt"), "hn\n1. A\n").await.unwrap();

        let labels = store.list_labels(date()).await.unwrap();
        assert_eq!(labels, vec![label("08-15")]);
    }
}
