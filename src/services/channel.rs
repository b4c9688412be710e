//! Channel dialects and profiles.
//!
//! Every push channel speaks a slightly different markup. Instead of one
//! formatting path per channel, a [`Dialect`] renders the pieces and a
//! [`ChannelProfile`] carries the byte limit plus the fixed header, footer and
//! separator strings the packer needs.

use std::borrow::Cow;

use chrono::NaiveDateTime;

use crate::models::{ChannelKind, Config, ReportMode, ScoredTitle};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Markup dialect shared by one or more channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Lark markdown with `<font>` colouring
    Feishu,
    DingTalk,
    /// Plain markdown (WeWork, Bark)
    Markdown,
    /// HTML parse mode
    Telegram,
    Ntfy,
    /// Slack mrkdwn
    Slack,
}

impl Dialect {
    pub fn for_channel(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Feishu => Dialect::Feishu,
            ChannelKind::DingTalk => Dialect::DingTalk,
            ChannelKind::WeWork | ChannelKind::WeWorkText | ChannelKind::Bark => Dialect::Markdown,
            ChannelKind::Telegram => Dialect::Telegram,
            ChannelKind::Ntfy => Dialect::Ntfy,
            ChannelKind::Slack => Dialect::Slack,
        }
    }

    /// Emphasis markers for highlighted ranks.
    fn highlight(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Feishu => ("<font color='red'>**", "**</font>"),
            Dialect::Telegram => ("<b>", "</b>"),
            Dialect::Slack => ("*", "*"),
            Dialect::DingTalk | Dialect::Markdown | Dialect::Ntfy => ("**", "**"),
        }
    }

    /// Escape free text for dialects parsed as HTML.
    fn escape(self, text: &str) -> Cow<'_, str> {
        match self {
            Dialect::Telegram => html_escape::encode_text(text),
            _ => Cow::Borrowed(text),
        }
    }

    /// Wrap text in this dialect's bold markup.
    fn bold(self, text: &str) -> String {
        match self {
            Dialect::Telegram => text.to_string(),
            Dialect::Slack => format!("*{text}*"),
            _ => format!("**{text}**"),
        }
    }

    /// `[min]` or `[min - max]`, highlighted when the best rank is hot.
    pub fn rank_display(self, ranks: &[u32], rank_threshold: u32) -> String {
        let (Some(min), Some(max)) = (ranks.iter().min(), ranks.iter().max()) else {
            return String::new();
        };
        let span = if min == max {
            format!("[{min}]")
        } else {
            format!("[{min} - {max}]")
        };

        if *min <= rank_threshold {
            let (start, end) = self.highlight();
            format!("{start}{span}{end}")
        } else {
            span
        }
    }

    /// Render one title line body.
    ///
    /// `show_source` prefixes the source name; `mark_new` adds the 🆕 marker.
    pub fn render_title(self, title: &ScoredTitle, show_source: bool, mark_new: bool) -> String {
        let link = title.link();
        let text = &title.title;

        let linked = match (self, link.is_empty()) {
            (Dialect::Telegram, true) => self.escape(text).into_owned(),
            (Dialect::Telegram, false) => format!(
                "<a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(link),
                self.escape(text)
            ),
            (Dialect::Slack, false) => format!("<{link}|{text}>"),
            (_, true) => text.clone(),
            (_, false) => format!("[{text}]({link})"),
        };

        let mut out = String::new();
        if show_source {
            match self {
                Dialect::Feishu => {
                    out.push_str(&format!("<font color='grey'>[{}]</font> ", title.source_name))
                }
                _ => out.push_str(&format!("[{}] ", self.escape(&title.source_name))),
            }
        }
        if mark_new && title.is_new {
            out.push_str("🆕 ");
        }
        out.push_str(&linked);

        let rank = self.rank_display(&title.ranks, title.rank_threshold);
        if !rank.is_empty() {
            out.push(' ');
            out.push_str(&rank);
        }

        if !title.time_display.is_empty() {
            let time = &title.time_display;
            out.push_str(&match self {
                Dialect::Feishu => format!(" <font color='grey'>- {time}</font>"),
                Dialect::Telegram => format!(" <code>- {time}</code>"),
                Dialect::Ntfy | Dialect::Slack => format!(" `- {time}`"),
                Dialect::DingTalk | Dialect::Markdown => format!(" - {time}"),
            });
        }

        if title.count > 1 {
            let count = title.count;
            out.push_str(&match self {
                Dialect::Feishu => format!(" <font color='green'>({count} times)</font>"),
                Dialect::Telegram => format!(" <code>({count} times)</code>"),
                Dialect::Ntfy | Dialect::Slack => format!(" `({count} times)`"),
                Dialect::DingTalk | Dialect::Markdown => format!(" ({count} times)"),
            });
        }

        out
    }

    /// Header of one keyword group, `index` is 1-based.
    pub fn word_header(self, word: &str, count: usize, index: usize, total: usize) -> String {
        let icon = match count {
            10.. => "🔥",
            5.. => "📈",
            _ => "📌",
        };
        let sequence = format!("[{index}/{total}]");

        match self {
            Dialect::Feishu => {
                let count_text = match count {
                    10.. => format!("<font color='red'>{count}</font>"),
                    5.. => format!("<font color='orange'>{count}</font>"),
                    _ => count.to_string(),
                };
                format!(
                    "{icon} <font color='grey'>{sequence}</font> **{word}** : {count_text} items\n\n"
                )
            }
            _ => {
                let count_text = if count >= 5 {
                    self.bold(&count.to_string())
                } else {
                    count.to_string()
                };
                format!(
                    "{icon} {sequence} {} : {count_text} items\n\n",
                    self.bold(&self.escape(word))
                )
            }
        }
    }

    pub fn stats_header(self) -> String {
        format!("📊 {}\n\n", self.bold("Hot Keywords Statistics"))
    }

    /// Heading of the new-items section (without the leading separator).
    pub fn new_items_header(self, total_new: usize) -> String {
        format!("🆕 {} ({total_new} total)\n\n", self.bold("New Hot News"))
    }

    pub fn source_header(self, source_name: &str, count: usize) -> String {
        format!("{} ({count} items):\n\n", self.bold(&self.escape(source_name)))
    }

    /// Heading of the failed-sources section (without the leading separator).
    pub fn failed_header(self) -> String {
        format!("⚠️ {}\n\n", self.bold("Failed Platforms:"))
    }

    pub fn failed_line(self, source_id: &str) -> String {
        match self {
            Dialect::Feishu => format!("  • <font color='red'>{source_id}</font>\n"),
            Dialect::DingTalk => format!("  • **{source_id}**\n"),
            _ => format!("  • {}\n", self.escape(source_id)),
        }
    }

    /// Notice sent when a report has nothing to show.
    pub fn empty_notice(self, mode: ReportMode) -> String {
        let text = match mode {
            ReportMode::Incremental => "No new matching hot keywords in incremental mode",
            ReportMode::Current => "No matching hot keywords in current ranking mode",
            ReportMode::Daily => "No matching hot keywords",
        };
        format!("📭 {text}\n\n")
    }

    fn base_header(self, total_titles: usize, now: &NaiveDateTime) -> String {
        match self {
            Dialect::Feishu => String::new(),
            Dialect::Markdown => format!("**Total news:** {total_titles}\n\n\n\n"),
            Dialect::Telegram => format!("Total news: {total_titles}\n\n"),
            Dialect::Ntfy => format!("**Total news:** {total_titles}\n\n"),
            Dialect::Slack => format!("*Total news:* {total_titles}\n\n"),
            Dialect::DingTalk => format!(
                "**Total news:** {total_titles}\n\n**Time:** {}\n\n**Type:** Hot News Report\n\n---\n\n",
                now.format(TIMESTAMP_FORMAT)
            ),
        }
    }

    fn base_footer(self, now: &NaiveDateTime) -> String {
        let stamp = now.format(TIMESTAMP_FORMAT);
        match self {
            Dialect::Feishu => format!("\n\n<font color='grey'>Updated: {stamp}</font>"),
            Dialect::Markdown => format!("\n\n\n> Updated: {stamp}"),
            Dialect::Telegram => format!("\n\nUpdated: {stamp}"),
            Dialect::Slack => format!("\n\n_Updated: {stamp}_"),
            Dialect::DingTalk | Dialect::Ntfy => format!("\n\n> Updated: {stamp}"),
        }
    }

    fn separator(self, feishu_separator: &str) -> String {
        match self {
            Dialect::Feishu => format!("\n{feishu_separator}\n\n"),
            Dialect::DingTalk => "\n---\n\n".to_string(),
            Dialect::Markdown => "\n\n\n\n".to_string(),
            Dialect::Telegram | Dialect::Ntfy | Dialect::Slack => "\n\n".to_string(),
        }
    }
}

/// Byte budget and fixed strings for one delivery target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProfile {
    pub kind: ChannelKind,
    pub dialect: Dialect,
    /// Hard limit for every batch, part header included
    pub max_bytes: usize,
    pub base_header: String,
    pub base_footer: String,
    /// Placed between groups and before the new-items / failed sections
    pub separator: String,
    /// Strip markup from finished batches
    pub plain_text: bool,
}

impl ChannelProfile {
    /// Build a profile with explicit limit and separator.
    pub fn new(
        kind: ChannelKind,
        max_bytes: usize,
        total_titles: usize,
        now: &NaiveDateTime,
        feishu_separator: &str,
    ) -> Self {
        let dialect = Dialect::for_channel(kind);
        Self {
            kind,
            dialect,
            max_bytes,
            base_header: dialect.base_header(total_titles, now),
            base_footer: dialect.base_footer(now),
            separator: dialect.separator(feishu_separator),
            plain_text: kind == ChannelKind::WeWorkText,
        }
    }

    /// Build the profile of a configured channel.
    pub fn for_channel(kind: ChannelKind, config: &Config, total_titles: usize, now: &NaiveDateTime) -> Self {
        Self::new(
            kind,
            config.channel_limit(kind),
            total_titles,
            now,
            &config.notification.feishu_message_separator,
        )
    }

    /// `Part i/n` header prepended to each batch of a multi-batch message.
    pub fn part_header(&self, index: usize, total: usize) -> String {
        let part = format!("[Part {index}/{total}]");
        match self.kind {
            ChannelKind::Telegram => format!("<b>{part}</b>\n\n"),
            ChannelKind::Slack => format!("*{part}*\n\n"),
            ChannelKind::WeWorkText | ChannelKind::Bark => format!("{part}\n\n"),
            _ => format!("**{part}**\n\n"),
        }
    }

    /// Worst-case part header size, assuming at most 99 batches.
    pub fn part_header_reserve(&self) -> usize {
        self.part_header(99, 99).len()
    }
}
