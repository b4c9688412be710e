// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the TOML configuration and the keyword
//! rule file from disk.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::RuleSet;
use crate::utils::log;

/// Default config location relative to the base directory.
pub const CONFIG_FILE: &str = "config/config.toml";

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable, then applies
/// environment overrides and validates the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration in {path:?}: {e}")))?;
    Ok(config)
}

/// Load the keyword rule file.
///
/// A missing file yields an empty rule set, which reports every title.
pub async fn load_rules(path: &Path) -> Result<RuleSet> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => RuleSet::load(path).await,
        Ok(false) => {
            log::warn(&format!(
                "Rule file {path:?} not found; reporting all titles"
            ));
            Ok(RuleSet::default())
        }
        Err(e) => Err(AppError::storage(path.display().to_string(), e)),
    }
}

/// Resolve a configured path against the base directory.
pub fn resolve(base_path: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_path.join(path)
    }
}

/// Load both config and rules from a base directory.
pub async fn load_all(base_path: &Path) -> Result<(Config, RuleSet)> {
    let config = load_config(&base_path.join(CONFIG_FILE))?;
    let rules = load_rules(&resolve(base_path, &config.paths.rules_file)).await?;
    Ok((config, rules))
}
