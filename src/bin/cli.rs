//! Trendline CLI
//!
//! Local execution entry point: builds a report from stored snapshots and
//! prints the packed batches for each channel, or queries the stored days.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use trendline::{
    config::{CONFIG_FILE, load_config, load_rules, resolve},
    error::Result,
    models::{ChannelKind, Config, ReportMode},
    pipeline::{self, NewsItem, QueryService, RuleSet},
    storage::{CachedStore, LocalStore, SnapshotStore},
};

/// Trendline - hot-list digest builder
#[derive(Parser, Debug)]
#[command(
    name = "trendline",
    version,
    about = "Merge ranked snapshots, group them by keyword rules and pack channel digests"
)]
struct Cli {
    /// Base directory holding config/ and the default data directory
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    /// Snapshot data directory (default: paths.data_dir from config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Config file (default: {base_dir}/config/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a report and print the batches of each channel
    Report {
        /// Day to report on (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Report mode: incremental, current or daily (default: from config)
        #[arg(long)]
        mode: Option<ReportMode>,

        /// Keyword rule file (default: paths.rules_file from config)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Channels to pack for (default: notification.channels from config)
        #[arg(long = "channel")]
        channels: Vec<ChannelKind>,

        /// Print the whole outcome as JSON instead of batches
        #[arg(long)]
        json: bool,

        /// Seconds to cache loaded snapshot days (0 disables)
        #[arg(long, default_value_t = 0)]
        cache_ttl: u64,
    },

    /// Validate the configuration and rule file
    Validate,

    /// Search titles containing a keyword over a range of days
    Search {
        /// Case-insensitive keyword
        keyword: String,

        /// First day searched (default: --to)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day searched (default: today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Maximum results listed (0 = all)
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank the configured rule words by how often they appear
    Trending {
        /// Day to inspect (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Title set: incremental, current or daily
        #[arg(long, default_value = "current")]
        mode: ReportMode,

        /// Keyword rule file (default: paths.rules_file from config)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Number of words listed (0 = all)
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// List a day's titles ordered by rank
    News {
        /// Day to inspect (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only titles of the most recent snapshot
        #[arg(long)]
        latest: bool,

        /// Maximum titles listed (0 = all)
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// List stored snapshots for a day
    Info {
        /// Day to inspect (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Initialize logging based on verbosity flag and the configured level.
fn init_logging(verbose: bool, configured: Option<String>) {
    let level = if verbose {
        "debug".to_string()
    } else {
        configured.unwrap_or_else(|| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_news(items: &[NewsItem]) {
    for (i, item) in items.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} (rank {}, avg {:.2}, seen {}x) {}",
            i + 1,
            item.source_name,
            item.title,
            item.rank,
            item.avg_rank,
            item.count,
            item.date
        );
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.base_dir.join(CONFIG_FILE));

    // Peek at [logging] before the logger exists; load_config reports failures
    let configured = Config::load(&config_path).ok().map(|c| c.logging.level);
    init_logging(cli.verbose, configured);

    let mut config = load_config(&config_path)?;
    log::info!("Loaded configuration from {}", config_path.display());

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| resolve(&cli.base_dir, &config.paths.data_dir));
    let store = LocalStore::new(&data_dir);
    let today = Local::now().date_naive();

    match cli.command {
        Command::Report {
            date,
            mode,
            rules,
            channels,
            json,
            cache_ttl,
        } => {
            let rules_path = rules.unwrap_or_else(|| resolve(&cli.base_dir, &config.paths.rules_file));
            let rules: RuleSet = load_rules(&rules_path).await?;
            if !channels.is_empty() {
                config.notification.channels = channels;
            }
            let mode = mode.unwrap_or(config.report.mode);
            let date = date.unwrap_or(today);
            let store = CachedStore::new(store, Duration::from_secs(cache_ttl));

            let outcome = pipeline::run_report(
                &config,
                &store,
                &rules,
                date,
                mode,
                Local::now().naive_local(),
            )
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            if !outcome.has_content {
                log::warn!("Nothing worth pushing for {} in {} mode", date, mode);
            }
            for channel in &outcome.channels {
                let count = channel.batches.len();
                for (i, batch) in channel.batches.iter().enumerate() {
                    println!(
                        "===== {} batch {}/{} ({} of {} bytes) =====",
                        channel.channel,
                        i + 1,
                        count,
                        batch.len(),
                        channel.max_bytes
                    );
                    println!("{batch}");
                }
            }
            if outcome.channels.is_empty() {
                for group in &outcome.report.stats {
                    println!("{} : {} items ({:.2}%)", group.word, group.count, group.percentage);
                    for (j, title) in group.titles.iter().enumerate() {
                        println!("  {}. [{}] {}", j + 1, title.source_name, title.title);
                    }
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!(
                "✓ Config OK ({} platforms, {} channels)",
                config.platforms.len(),
                config.notification.channels.len()
            );

            let rules_path = resolve(&cli.base_dir, &config.paths.rules_file);
            let rules = load_rules(&rules_path).await?;
            log::info!(
                "✓ Rules OK ({} groups, {} filter words)",
                rules.groups.len(),
                rules.filters.len()
            );
            for (i, group) in rules.groups.iter().enumerate() {
                let cap = match group.max_count {
                    0 => "unlimited".to_string(),
                    n => n.to_string(),
                };
                log::info!("    {}. {} (cap: {})", i + 1, group.group_key, cap);
            }

            log::info!("All validations passed!");
        }

        Command::Search {
            keyword,
            from,
            to,
            limit,
            json,
        } => {
            let to = to.unwrap_or(today);
            let from = from.unwrap_or(to);
            let query = QueryService::new(&store).with_sources(config.allowed_sources());
            let result = query.search(&keyword, from, to, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            if result.total_found == 0 {
                log::warn!("No titles containing '{}' between {} and {}", keyword, from, to);
            } else {
                print_news(&result.results);
                println!(
                    "{} of {} matches over {} days, average rank {:.2}",
                    result.results.len(),
                    result.total_found,
                    result.days_searched,
                    result.statistics.avg_rank
                );
                for (source, count) in &result.statistics.source_distribution {
                    println!("    {source}: {count}");
                }
            }
        }

        Command::Trending {
            date,
            mode,
            rules,
            top,
        } => {
            let rules_path = rules.unwrap_or_else(|| resolve(&cli.base_dir, &config.paths.rules_file));
            let rules = load_rules(&rules_path).await?;
            if rules.groups.is_empty() {
                log::warn!("No rule words configured in {}", rules_path.display());
            }
            let date = date.unwrap_or(today);
            let query = QueryService::new(&store).with_sources(config.allowed_sources());
            let report = query.trending(date, &rules, mode, top).await?;

            for (i, topic) in report.topics.iter().enumerate() {
                println!(
                    "{:>3}. {} : {} hits, {} titles",
                    i + 1,
                    topic.keyword,
                    topic.frequency,
                    topic.matched_titles
                );
            }
            log::info!(
                "{} of {} matching words shown ({} mode, {})",
                report.topics.len(),
                report.total_keywords,
                report.mode,
                report.date
            );
        }

        Command::News {
            date,
            latest,
            limit,
        } => {
            let date = date.unwrap_or(today);
            let query = QueryService::new(&store).with_sources(config.allowed_sources());
            let items = if latest {
                query.latest_news(date, limit).await?
            } else {
                query.news_by_date(date, limit).await?
            };
            if items.is_empty() {
                log::info!("No titles stored for {}", date);
            }
            print_news(&items);
        }

        Command::Info { date } => {
            let date = date.unwrap_or(today);
            log::info!("Data directory: {}", data_dir.display());
            match QueryService::new(&store).date_range().await? {
                Some((first, last)) => log::info!("Stored days: {} to {}", first, last),
                None => log::info!("No stored days"),
            }

            let labels = store.list_labels(date).await?;
            if labels.is_empty() {
                log::info!("No snapshots found for {}", date);
            } else {
                log::info!("{} snapshots for {}:", labels.len(), date);
                for snapshot in store.load_day(date).await? {
                    log::info!(
                        "    {} - {} sources, {} titles, {} failed",
                        snapshot.label,
                        snapshot.sources.len(),
                        snapshot.title_count(),
                        snapshot.failed_sources.len()
                    );
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
