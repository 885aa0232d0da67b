//! Client configuration.
//!
//! Resolution order, highest first: command-line flags, environment
//! variables (a `.env` file is loaded into the environment first), the TOML
//! file, compiled defaults. The default file lives at
//! `<config dir>/taskio/config.toml`; it may be missing. A file passed with
//! `--config` must exist.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1/";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Parser)]
#[command(name = "taskio", version, about = "Manage Taskio tasks from the terminal")]
pub struct CliArgs {
    /// Base URL of the task service, e.g. http://localhost:3000/api/v1/
    #[arg(long, env = "TASKIO_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (no timeout when unset)
    #[arg(long, env = "TASKIO_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file (defaults to taskio.log in the temp directory)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// Everything optional so a file can override a single key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    poll_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub poll_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => read_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Ok(Self::resolve(cli, file))
    }

    fn resolve(cli: &CliArgs, file: ConfigFile) -> Self {
        let defaults = Config::default();
        Config {
            base_url: cli
                .base_url
                .clone()
                .or(file.base_url)
                .unwrap_or(defaults.base_url),
            timeout: cli
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs),
            poll_timeout: file
                .poll_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_timeout),
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskio").join("config.toml"))
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
