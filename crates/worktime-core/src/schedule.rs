//! The global weekly schedule

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;
use worktime_api::{EntityRecord, GlobalPolicyRecord};
use worktime_util::{DaysOfWeek, TimeOfDay};

/// Recurring weekly enforcement window shared by all entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub enabled: bool,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub days: DaysOfWeek,
}

impl WeeklySchedule {
    pub fn new(enabled: bool, start_time: TimeOfDay, end_time: TimeOfDay, days: DaysOfWeek) -> Self {
        Self {
            enabled,
            start_time,
            end_time,
            days,
        }
    }

    /// Check if the given local instant falls inside the window.
    pub fn is_within_window(&self, at: &NaiveDateTime) -> bool {
        self.is_within_window_on(at.weekday(), at.time())
    }

    /// Same as [`Self::is_within_window`] with the local weekday supplied
    /// by the caller.
    ///
    /// The window is `[start, end)` on a single day. There is no wrap
    /// across midnight: `end <= start` never matches.
    pub fn is_within_window_on(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if !self.enabled || !self.days.has(weekday) {
            return false;
        }

        time >= self.start_time.to_naive_time() && time < self.end_time.to_naive_time()
    }

    /// True when the window is empty (`end <= start`)
    pub fn is_degenerate(&self) -> bool {
        self.end_time <= self.start_time
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self::from(&GlobalPolicyRecord::default())
    }
}

impl From<&GlobalPolicyRecord> for WeeklySchedule {
    fn from(record: &GlobalPolicyRecord) -> Self {
        Self {
            enabled: record.enabled,
            start_time: record.start_time,
            end_time: record.end_time,
            days: record.days_of_week,
        }
    }
}

/// An entity's own schedule. Fields left unset, or stored in a form that
/// can't be read, take the global value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOverride {
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub days: Option<DaysOfWeek>,
    pub allowed_apps_during_work: Option<String>,
    pub allowed_apps_outside_work: Option<String>,
}

impl ScheduleOverride {
    /// Only an explicitly enabled override carries a schedule
    pub fn from_record(record: &EntityRecord) -> Option<Self> {
        if record.enabled != Some(true) {
            return None;
        }

        let days = record.days_of_week.as_deref().and_then(|spec| {
            let days = DaysOfWeek::parse_spec(spec);
            if days.is_none() && !spec.trim().is_empty() {
                warn!(entity_id = %record.entity_id, days = %spec, "No usable days in override");
            }
            days
        });

        Some(Self {
            start_time: override_time(record, record.start_time.as_deref()),
            end_time: override_time(record, record.end_time.as_deref()),
            days,
            allowed_apps_during_work: record.allowed_apps_during_work.clone(),
            allowed_apps_outside_work: record.allowed_apps_outside_work.clone(),
        })
    }

    /// Times and days laid over `global`; enforcement follows the entity
    pub fn apply(&self, global: &WeeklySchedule) -> WeeklySchedule {
        WeeklySchedule {
            enabled: true,
            start_time: self.start_time.unwrap_or(global.start_time),
            end_time: self.end_time.unwrap_or(global.end_time),
            days: self.days.unwrap_or(global.days),
        }
    }
}

fn override_time(record: &EntityRecord, value: Option<&str>) -> Option<TimeOfDay> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match TimeOfDay::parse(value) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!(entity_id = %record.entity_id, error = %e, "Ignoring override time");
            None
        }
    }
}
