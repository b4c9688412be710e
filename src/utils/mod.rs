//! Utility functions and helpers.

pub mod log;
pub mod text;

use std::sync::OnceLock;

use regex::Regex;

/// Collapse all whitespace runs (including newlines) in a title to single spaces.
///
/// # Examples
/// ```
/// use trendline::utils::clean_title;
///
/// assert_eq!(clean_title("  GPU\n prices   fall "), "GPU prices fall");
/// ```
pub fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn markdown_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"\*\*(.+?)\*\*", "$1"),
            (r"__(.+?)__", "$1"),
            (r"\*(.+?)\*", "$1"),
            (r"~~(.+?)~~", "$1"),
            (r"!\[(.+?)\]\(.+?\)", "$1"),
            (r"\[([^\]]+)\]\(([^)]+)\)", "$1 $2"),
            (r"`(.+?)`", "$1"),
            (r"(?m)^>\s*", ""),
            (r"(?m)^#+\s*", ""),
            (r"(?m)^[\-\*]{3,}\s*$", ""),
            (r"<font[^>]*>(.+?)</font>", "$1"),
            (r"<[^>]+>", ""),
            (r"\n{3,}", "\n\n"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Reduce markdown / light HTML markup to plain text.
///
/// Links become `text url` so the target survives in plain-text channels.
pub fn strip_markdown(text: &str) -> String {
    let mut result = text.to_string();
    for (re, replacement) in markdown_rules() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result.trim().to_string()
}
