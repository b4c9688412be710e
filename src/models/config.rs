//! Application configuration structures.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Report mode, ranking threshold and display caps
    #[serde(default)]
    pub report: ReportConfig,

    /// Popularity weight coefficients
    #[serde(default)]
    pub weight: WeightConfig,

    /// Push channels and their byte limits
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Monitored sources (empty = accept every source found in snapshots)
    #[serde(default)]
    pub platforms: Vec<PlatformInfo>,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment variable overrides.
    ///
    /// Empty or unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(mode) = get("REPORT_MODE") {
            match mode.parse() {
                Ok(mode) => self.report.mode = mode,
                Err(e) => log::warn!("Ignoring REPORT_MODE override: {}", e),
            }
        }
        if let Some(flag) = get("SORT_BY_POSITION_FIRST") {
            self.report.sort_by_position_first =
                matches!(flag.to_lowercase().as_str(), "true" | "1");
        }
        if let Some(max) = get("MAX_NEWS_PER_KEYWORD").and_then(|v| v.parse().ok()) {
            if max > 0 {
                self.report.max_news_per_keyword = max;
            }
        }
        if let Some(threshold) = get("RANK_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.report.rank_threshold = threshold;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.report.rank_threshold == 0 {
            return Err(AppError::validation("report.rank_threshold must be > 0"));
        }

        let weights = [
            ("weight.rank_weight", self.weight.rank_weight),
            ("weight.frequency_weight", self.weight.frequency_weight),
            ("weight.hotness_weight", self.weight.hotness_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }

        for kind in ChannelKind::ALL {
            if self.channel_limit(kind) == 0 {
                return Err(AppError::validation(format!(
                    "batch size for channel '{kind}' must be > 0"
                )));
            }
        }

        let mut seen = HashSet::new();
        for platform in &self.platforms {
            if platform.id.trim().is_empty() {
                return Err(AppError::validation("platform id is empty"));
            }
            if !seen.insert(platform.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate platform id '{}'",
                    platform.id
                )));
            }
        }
        Ok(())
    }

    /// Byte limit for a push channel.
    pub fn channel_limit(&self, kind: ChannelKind) -> usize {
        let n = &self.notification;
        match kind {
            ChannelKind::Feishu => n.feishu_batch_size,
            ChannelKind::DingTalk => n.dingtalk_batch_size,
            ChannelKind::Bark => n.bark_batch_size,
            ChannelKind::Slack => n.slack_batch_size,
            ChannelKind::Ntfy => n.ntfy_batch_size,
            ChannelKind::WeWork | ChannelKind::WeWorkText | ChannelKind::Telegram => {
                n.message_batch_size
            }
        }
    }

    /// Source ids to restrict merging to, if any platforms are configured.
    pub fn allowed_sources(&self) -> Option<HashSet<String>> {
        if self.platforms.is_empty() {
            None
        } else {
            Some(self.platforms.iter().map(|p| p.id.clone()).collect())
        }
    }
}

/// How the working set of titles is selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Only titles first seen in the latest snapshot
    Incremental,
    /// Titles present in the latest snapshot, with full-day stats
    Current,
    /// Everything seen today
    #[default]
    Daily,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Incremental => "incremental",
            ReportMode::Current => "current",
            ReportMode::Daily => "daily",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(ReportMode::Incremental),
            "current" => Ok(ReportMode::Current),
            "daily" => Ok(ReportMode::Daily),
            other => Err(AppError::config(format!("unknown report mode '{other}'"))),
        }
    }
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub mode: ReportMode,

    /// Ranks at or below this value count as "hot" and are highlighted
    #[serde(default = "defaults::rank_threshold")]
    pub rank_threshold: u32,

    /// Order groups by declared position before match count
    #[serde(default)]
    pub sort_by_position_first: bool,

    /// Global per-group display cap (0 = unlimited)
    #[serde(default)]
    pub max_news_per_keyword: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            mode: ReportMode::default(),
            rank_threshold: defaults::rank_threshold(),
            sort_by_position_first: false,
            max_news_per_keyword: 0,
        }
    }
}

/// Coefficients of the composite popularity weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "defaults::rank_weight")]
    pub rank_weight: f64,
    #[serde(default = "defaults::frequency_weight")]
    pub frequency_weight: f64,
    #[serde(default = "defaults::hotness_weight")]
    pub hotness_weight: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            rank_weight: defaults::rank_weight(),
            frequency_weight: defaults::frequency_weight(),
            hotness_weight: defaults::hotness_weight(),
        }
    }
}

/// Push channel identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Feishu,
    #[serde(rename = "dingtalk")]
    DingTalk,
    #[serde(rename = "wework")]
    WeWork,
    #[serde(rename = "wework_text")]
    WeWorkText,
    Telegram,
    Ntfy,
    Bark,
    Slack,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 8] = [
        ChannelKind::Feishu,
        ChannelKind::DingTalk,
        ChannelKind::WeWork,
        ChannelKind::WeWorkText,
        ChannelKind::Telegram,
        ChannelKind::Ntfy,
        ChannelKind::Bark,
        ChannelKind::Slack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Feishu => "feishu",
            ChannelKind::DingTalk => "dingtalk",
            ChannelKind::WeWork => "wework",
            ChannelKind::WeWorkText => "wework_text",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Ntfy => "ntfy",
            ChannelKind::Bark => "bark",
            ChannelKind::Slack => "slack",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        ChannelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| AppError::config(format!("unknown channel '{wanted}'")))
    }
}

/// Push channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Channels to produce batches for
    #[serde(default)]
    pub channels: Vec<ChannelKind>,

    /// Default limit for channels without a dedicated size
    #[serde(default = "defaults::message_batch_size")]
    pub message_batch_size: usize,
    #[serde(default = "defaults::dingtalk_batch_size")]
    pub dingtalk_batch_size: usize,
    #[serde(default = "defaults::feishu_batch_size")]
    pub feishu_batch_size: usize,
    #[serde(default = "defaults::bark_batch_size")]
    pub bark_batch_size: usize,
    #[serde(default = "defaults::slack_batch_size")]
    pub slack_batch_size: usize,
    #[serde(default = "defaults::ntfy_batch_size")]
    pub ntfy_batch_size: usize,

    /// Divider line used between sections in Feishu messages
    #[serde(default = "defaults::feishu_message_separator")]
    pub feishu_message_separator: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            message_batch_size: defaults::message_batch_size(),
            dingtalk_batch_size: defaults::dingtalk_batch_size(),
            feishu_batch_size: defaults::feishu_batch_size(),
            bark_batch_size: defaults::bark_batch_size(),
            slack_batch_size: defaults::slack_batch_size(),
            ntfy_batch_size: defaults::ntfy_batch_size(),
            feishu_message_separator: defaults::feishu_message_separator(),
        }
    }
}

/// A monitored source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Stable source id as written in snapshot files
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the per-day snapshot folders
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,

    /// Keyword rule file
    #[serde(default = "defaults::rules_file")]
    pub rules_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            rules_file: defaults::rules_file(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Report defaults
    pub fn rank_threshold() -> u32 {
        5
    }

    // Weight defaults
    pub fn rank_weight() -> f64 {
        0.6
    }
    pub fn frequency_weight() -> f64 {
        0.3
    }
    pub fn hotness_weight() -> f64 {
        0.1
    }

    // Channel limits (bytes)
    pub fn message_batch_size() -> usize {
        4000
    }
    pub fn dingtalk_batch_size() -> usize {
        20000
    }
    pub fn feishu_batch_size() -> usize {
        29000
    }
    pub fn bark_batch_size() -> usize {
        3600
    }
    pub fn slack_batch_size() -> usize {
        4000
    }
    pub fn ntfy_batch_size() -> usize {
        3800
    }
    pub fn feishu_message_separator() -> String {
        "━━━━━━━━━━━━━━━━━━━".into()
    }

    // Paths
    pub fn data_dir() -> String {
        "output".into()
    }
    pub fn rules_file() -> String {
        "config/frequency_words.txt".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
