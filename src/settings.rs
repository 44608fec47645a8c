// Runtime settings read from the environment (after `.env` is loaded).

use crate::core::ledger::RetryPolicy;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PERSIST_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_PERSIST_RETRY_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// Holds cases.json, warns.json and config.json.
    pub data_dir: PathBuf,
    pub persist_max_attempts: u32,
    pub persist_retry_delay: Duration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .context("DISCORD_TOKEN environment variable not set. Create a .env file with your bot token.")?;

        let data_dir = env::var("DATA_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let persist_max_attempts = env::var("PERSIST_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PERSIST_MAX_ATTEMPTS);

        let persist_retry_delay_ms = env::var("PERSIST_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PERSIST_RETRY_DELAY_MS);

        Ok(Self {
            discord_token,
            data_dir,
            persist_max_attempts,
            persist_retry_delay: Duration::from_millis(persist_retry_delay_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.persist_max_attempts, self.persist_retry_delay)
    }
}
