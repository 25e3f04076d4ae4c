//! Configuration management module

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{Result, SyncError};
use crate::registry::TransferOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "IMAGE_SYNC_";
/// Local socket first, the plain TCP port as a fallback
pub const DEFAULT_ENGINE_HOSTS: [&str; 2] = ["unix:///var/run/docker.sock", "tcp://127.0.0.1:2375"];
pub const DEFAULT_LOG_FILE: &str = "logs.txt";
pub const DEFAULT_JOB_TIMEOUT: u64 = 7200;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine hosts probed in order; the first one answering a ping is used
    pub engine_hosts: Vec<String>,
    /// Seconds a single push or pull job may run
    pub job_timeout: u64,
    /// `None` disables the log file
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_hosts: DEFAULT_ENGINE_HOSTS.iter().map(|host| host.to_string()).collect(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            verbose: false,
            quiet: false,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.engine_hosts.iter().all(|host| host.trim().is_empty()) {
            return Err(SyncError::Validation(
                "At least one engine host must be configured".to_string(),
            ));
        }
        ValidationErrorHandler::validate_timeout(self.job_timeout)?;
        if self.verbose && self.quiet {
            return Err(SyncError::Validation(
                "verbose and quiet cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(val) = var("ENGINE_HOSTS") {
            let hosts = split_hosts(&val);
            if !hosts.is_empty() {
                config.engine_hosts = hosts;
            }
        } else if let Some(docker_host) = lookup("DOCKER_HOST") {
            // DOCKER_HOST goes first, the default stays as a fallback
            if !docker_host.trim().is_empty() {
                config.engine_hosts.insert(0, docker_host.trim().to_string());
            }
        }
        if let Some(val) = var("JOB_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                config.job_timeout = timeout;
            }
        }
        if let Some(val) = var("LOG_FILE") {
            config.log_file = if val.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
        if let Some(val) = var("VERBOSE") {
            config.verbose = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            job_timeout: Duration::from_secs(self.job_timeout),
        }
    }
}

fn split_hosts(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}
