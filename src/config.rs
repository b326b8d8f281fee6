use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

/// Root configuration structure, deserialized from `.supplychain-audit/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Import paths containing any of these substrings are skipped.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

/// Concurrency and timeout bounds for subprocess and HTTP work.
#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    /// Packages processed concurrently in the survey and enrichment stages.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct LinksConfig {
    /// Branch used in links when no commit is known.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Fetch `?go-get=1` metadata for hosts without a built-in template.
    #[serde(default = "default_true")]
    pub discovery: bool,
}

fn default_jobs() -> usize {
    8
}

fn default_command_timeout() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    10
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            jobs: default_jobs(),
            command_timeout_secs: default_command_timeout(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        LinksConfig {
            default_branch: default_branch(),
            discovery: true,
        }
    }
}

impl LimitsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.supplychain-audit/config.toml`
/// 3. `~/.config/supplychain-audit/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".supplychain-audit").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("supplychain-audit")
            .join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}
