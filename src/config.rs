use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::{clog_debug, Error, Result};

fn default_plan_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_assignment_retry_limit() -> u32 {
    3
}

fn default_recency_window_secs() -> u64 {
    60
}

fn default_max_parallel_tasks() -> usize {
    5
}

/// Scheduling knobs for the orchestrator, loaded from
/// `~/.conductor/conductor.toml` when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Overall deadline for a single plan execution, in seconds.
    #[serde(default = "default_plan_timeout_secs")]
    pub plan_timeout_secs: u64,
    /// Back-off sleep between readiness cycles when nothing can proceed.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How many readiness cycles a ready task may go unassigned before it
    /// is failed as agent-unavailable.
    #[serde(default = "default_assignment_retry_limit")]
    pub assignment_retry_limit: u32,
    /// Window within which an agent's last activity earns a scoring bonus.
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
    /// Cap on how many ready tasks are dispatched in one readiness
    /// cycle. Zero disables the cap.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_timeout_secs: default_plan_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            assignment_retry_limit: default_assignment_retry_limit(),
            recency_window_secs: default_recency_window_secs(),
            max_parallel_tasks: default_max_parallel_tasks(),
        }
    }
}

impl Config {
    pub fn conductor_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".conductor"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::conductor_dir()?.join("conductor.toml"))
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        clog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            clog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        clog_debug!(
            "Config loaded: plan_timeout_secs={}, poll_interval_ms={}, assignment_retry_limit={}",
            config.plan_timeout_secs,
            config.poll_interval_ms,
            config.assignment_retry_limit
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::conductor_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        clog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
