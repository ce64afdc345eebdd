use std::time::Duration;

use crate::poll::PollConfig;
use crate::{Error, Result};

/// Deadlines and poll pacing for lifecycle operations.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub create_timeout: Duration,
    pub update_timeout: Duration,
    pub delete_timeout: Duration,
    pub read_timeout: Duration,
    pub poll: PollConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(600),
            update_timeout: Duration::from_secs(600),
            delete_timeout: Duration::from_secs(300),
            read_timeout: Duration::from_secs(60),
            poll: PollConfig::default(),
        }
    }
}

impl LifecycleConfig {
    /// Load from env vars (all optional, values in whole seconds):
    ///
    /// - `DROPLET_CREATE_TIMEOUT_SECS` (default: 600)
    /// - `DROPLET_UPDATE_TIMEOUT_SECS` (default: 600)
    /// - `DROPLET_DELETE_TIMEOUT_SECS` (default: 300)
    /// - `DROPLET_READ_TIMEOUT_SECS` (default: 60)
    /// - `DROPLET_POLL_INTERVAL_SECS` (default: 3)
    /// - `DROPLET_POLL_MAX_INTERVAL_SECS` (default: 10)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| Error::InvalidConfig(format!("{key}={raw}"))),
            }
        };

        let poll = PollConfig {
            initial_interval: secs("DROPLET_POLL_INTERVAL_SECS", defaults.poll.initial_interval)?,
            max_interval: secs("DROPLET_POLL_MAX_INTERVAL_SECS", defaults.poll.max_interval)?,
            ..defaults.poll.clone()
        };

        if poll.initial_interval.is_zero() || poll.max_interval < poll.initial_interval {
            return Err(Error::InvalidConfig(format!(
                "poll interval {:?} must be non-zero and at most the max interval {:?}",
                poll.initial_interval, poll.max_interval
            )));
        }

        Ok(Self {
            create_timeout: secs("DROPLET_CREATE_TIMEOUT_SECS", defaults.create_timeout)?,
            update_timeout: secs("DROPLET_UPDATE_TIMEOUT_SECS", defaults.update_timeout)?,
            delete_timeout: secs("DROPLET_DELETE_TIMEOUT_SECS", defaults.delete_timeout)?,
            read_timeout: secs("DROPLET_READ_TIMEOUT_SECS", defaults.read_timeout)?,
            poll,
        })
    }
}
