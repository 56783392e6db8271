//! Validated configuration structures

use crate::schema::{RawConfig, RawPolicy, RawServiceConfig};
use crate::validation::{parse_days, parse_time};
use std::path::PathBuf;
use std::time::Duration;
use worktime_api::GlobalPolicyRecord;
use worktime_util::{default_data_dir, DB_FILENAME, WORKTIME_DATA_DIR_ENV};

/// Default seconds between expired-override sweeps
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Validated configuration ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct WorkTimeConfig {
    pub service: ServiceConfig,

    /// Global policy written on first read when the store has none
    pub default_policy: GlobalPolicyRecord,
}

impl WorkTimeConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            default_policy: raw
                .default_policy
                .map(convert_policy)
                .unwrap_or_default(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub cleanup_interval: Duration,
    pub log_level: Option<String>,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        // Environment beats the file
        let data_dir = match std::env::var_os(WORKTIME_DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => raw.data_dir.unwrap_or_else(default_data_dir),
        };

        Self {
            data_dir,
            cleanup_interval: Duration::from_secs(
                raw.cleanup_interval_seconds
                    .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
            ),
            log_level: raw.log_level,
        }
    }

    /// Path of the SQLite database inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILENAME)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            log_level: None,
        }
    }
}

fn convert_policy(raw: RawPolicy) -> GlobalPolicyRecord {
    let defaults = GlobalPolicyRecord::default();

    // Already validated, fallbacks are unreachable in practice
    GlobalPolicyRecord {
        enabled: raw.enabled,
        start_time: parse_time(&raw.start_time).unwrap_or(defaults.start_time),
        end_time: parse_time(&raw.end_time).unwrap_or(defaults.end_time),
        days_of_week: parse_days(&raw.days).unwrap_or(defaults.days_of_week),
        allowed_apps_during_work: raw.allowed_apps_during_work,
        allowed_apps_outside_work: raw.allowed_apps_outside_work,
    }
}
