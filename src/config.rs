//! Runtime configuration.
//!
//! An explicit [`Config`] value travels from `main` into every crawl
//! session; there is no ambient global state. Every field has a default,
//! a YAML file can replace any subset of them, and CLI flags win over
//! both.

use crate::cli::Cli;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Crawl configuration shared by every task in one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Task list file, one `<url> <alias>` per line.
    pub tasks_file: PathBuf,
    /// Root directory receiving one archive per alias.
    pub result_dir: PathBuf,
    /// Retries after the first failed attempt of any network operation.
    pub retry_times: u32,
    /// Re-fetch media even when the target file already exists.
    pub force_redownload: bool,
    /// Proxy URLs by scheme: `http`, `https`, or `all`.
    pub proxies: HashMap<String, String>,
    /// Optional per-request timeout in seconds; absent means transport
    /// defaults.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_file: PathBuf::from("./tasks.txt"),
            result_dir: PathBuf::from("./result"),
            retry_times: 3,
            force_redownload: false,
            proxies: HashMap::new(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&text)?)
    }

    /// Parse configuration from YAML text; missing fields keep defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Apply command-line overrides on top of file/default values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(tasks) = &cli.tasks {
            self.tasks_file = tasks.clone();
        }
        if let Some(dir) = &cli.result_dir {
            self.result_dir = dir.clone();
        }
        if let Some(n) = cli.retry_times {
            self.retry_times = n;
        }
        if cli.force {
            self.force_redownload = true;
        }
        if let Some(proxy) = &cli.proxy {
            self.proxies.insert("all".to_string(), proxy.clone());
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = Some(secs);
        }
    }
}
