//! Keyword rule engine.
//!
//! Rule text is a list of blocks separated by blank lines. Each non-blank
//! line is one token:
//!
//! - `+word` must appear in the title
//! - `!word` disqualifies the title from every group
//! - `@N` caps how many titles the group displays
//! - anything else is a normal word; at least one must appear
//!
//! Matching is a case-insensitive substring test and the first matching
//! group in declared order wins.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// One parsed rule block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordGroup {
    pub required: Vec<String>,
    pub normal: Vec<String>,
    /// Filter words declared inside this block (also part of the global set)
    pub filters: Vec<String>,
    /// Normal words joined by spaces, else required words joined by spaces
    pub group_key: String,
    /// Display cap; 0 defers to the global default
    pub max_count: usize,
}

impl WordGroup {
    /// Whether the group's required and normal words accept a lowercased title.
    fn accepts(&self, title_lower: &str) -> bool {
        let has_required = self
            .required
            .iter()
            .all(|word| title_lower.contains(&word.to_lowercase()));
        let has_normal = self.normal.is_empty()
            || self
                .normal
                .iter()
                .any(|word| title_lower.contains(&word.to_lowercase()));
        has_required && has_normal
    }
}

/// Ordered rule groups plus the combined filter set.
///
/// Built once per run and passed by reference; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub groups: Vec<WordGroup>,
    pub filters: BTreeSet<String>,
}

impl RuleSet {
    /// Parse rule text. Malformed tokens are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut rules = RuleSet::default();

        for (index, block) in split_blocks(text).into_iter().enumerate() {
            let mut required = Vec::new();
            let mut normal = Vec::new();
            let mut filters = Vec::new();
            let mut max_count = 0;

            for token in block {
                if let Some(cap) = token.strip_prefix('@') {
                    match cap.trim().parse::<usize>() {
                        Ok(n) if n > 0 => max_count = n,
                        _ => log::warn!(
                            "Rule block {}: ignoring invalid cap directive '{}'",
                            index + 1,
                            token
                        ),
                    }
                } else if let Some(word) = token.strip_prefix('!') {
                    push_word(&mut filters, word, index, token);
                } else if let Some(word) = token.strip_prefix('+') {
                    push_word(&mut required, word, index, token);
                } else {
                    normal.push(token.to_string());
                }
            }

            rules
                .filters
                .extend(filters.iter().map(|word| word.to_lowercase()));

            if required.is_empty() && normal.is_empty() {
                log::debug!("Rule block {} has no match words; no group created", index + 1);
                continue;
            }

            let group_key = if normal.is_empty() {
                required.join(" ")
            } else {
                normal.join(" ")
            };
            rules.groups.push(WordGroup {
                required,
                normal,
                filters,
                group_key,
                max_count,
            });
        }

        rules
    }

    /// Read and parse a rule file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let rules = Self::parse(&text);
        log::info!(
            "Loaded {} rule groups and {} filter words from {}",
            rules.groups.len(),
            rules.filters.len(),
            path.display()
        );
        Ok(rules)
    }

    /// No groups means every title matches and filters are ignored.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether a title passes the rule set.
    pub fn matches(&self, title: &str) -> bool {
        if title.trim().is_empty() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.match_group(title).is_some()
    }

    /// Index and group of the first group accepting the title.
    ///
    /// Returns `None` for an empty rule set; callers treat that case as a
    /// single implicit catch-all group.
    pub fn match_group(&self, title: &str) -> Option<(usize, &WordGroup)> {
        let title_lower = title.to_lowercase();
        if self.is_filtered(&title_lower) {
            return None;
        }
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.accepts(&title_lower))
    }

    fn is_filtered(&self, title_lower: &str) -> bool {
        self.filters.iter().any(|word| title_lower.contains(word.as_str()))
    }
}

fn push_word(target: &mut Vec<String>, word: &str, index: usize, token: &str) {
    let word = word.trim();
    if word.is_empty() {
        log::warn!("Rule block {}: ignoring empty token '{}'", index + 1, token);
    } else {
        target.push(word.to_string());
    }
}

/// Split text into blocks of trimmed, non-blank lines.
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}
