//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Global policy used until one is stored
    #[serde(default)]
    pub default_policy: Option<RawPolicy>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Seconds between expired-override sweeps in `run` mode
    pub cleanup_interval_seconds: Option<u64>,

    /// Default log filter, e.g. "info" or "worktime_core=debug"
    pub log_level: Option<String>,
}

/// Default global policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Start time (HH:MM format)
    pub start_time: String,

    /// End time (HH:MM format)
    pub end_time: String,

    /// Days of week: "weekdays", "weekends", "all", a list like
    /// ["mon", "tue"], or the raw bitmask
    pub days: RawDays,

    /// "*" or comma-separated application identifiers
    #[serde(default)]
    pub allowed_apps_during_work: String,

    #[serde(default = "all_apps")]
    pub allowed_apps_outside_work: String,
}

/// Days specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Mask(i64),
    Preset(String),
    List(Vec<String>),
}

fn default_true() -> bool {
    true
}

fn all_apps() -> String {
    "*".to_string()
}
