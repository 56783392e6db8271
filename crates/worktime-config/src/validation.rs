//! Configuration validation

use crate::schema::{RawConfig, RawDays, RawPolicy};
use thiserror::Error;
use worktime_util::{DaysOfWeek, TimeOfDay};

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format for {field} '{value}': {message}")]
    InvalidTimeFormat {
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("Default policy: {0}")]
    PolicyError(String),

    #[error("Service config error: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.cleanup_interval_seconds == Some(0) {
        errors.push(ValidationError::ServiceError(
            "cleanup_interval_seconds must be greater than 0".into(),
        ));
    }

    if let Some(policy) = &config.default_policy {
        errors.extend(validate_policy(policy));
    }

    errors
}

fn validate_policy(policy: &RawPolicy) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, value) in [("start_time", &policy.start_time), ("end_time", &policy.end_time)] {
        if let Err(message) = parse_time(value) {
            errors.push(ValidationError::InvalidTimeFormat {
                field,
                value: value.clone(),
                message,
            });
        }
    }

    match parse_days(&policy.days) {
        Ok(days) if policy.enabled && days.is_empty() => {
            errors.push(ValidationError::PolicyError(
                "enabled policy must cover at least one day".into(),
            ));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidDaySpec(e)),
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<TimeOfDay, String> {
    if s.split(':').count() != 2 {
        return Err("Expected HH:MM format".into());
    }
    TimeOfDay::parse(s).map_err(|e| e.to_string())
}

/// Parse days specification
pub fn parse_days(days: &RawDays) -> Result<DaysOfWeek, String> {
    match days {
        RawDays::Mask(mask) => {
            if (0..=0x7F).contains(mask) {
                Ok(DaysOfWeek::from_mask(*mask))
            } else {
                Err(format!("Day mask out of range: {}", mask))
            }
        }
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(DaysOfWeek::ALL_DAYS),
            "weekdays" => Ok(DaysOfWeek::WEEKDAYS),
            "weekends" => Ok(DaysOfWeek::WEEKENDS),
            "none" => Ok(DaysOfWeek::NONE),
            other => Err(format!("Unknown day preset: {}", other)),
        },
        RawDays::List(list) => {
            let mut days = DaysOfWeek::NONE;
            for day in list {
                match DaysOfWeek::parse_day(day) {
                    Some(weekday) => days.add(weekday),
                    None => return Err(format!("Unknown day: {}", day)),
                }
            }
            Ok(days)
        }
    }
}
