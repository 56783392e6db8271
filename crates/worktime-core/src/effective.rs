//! Policy as seen by one device: global schedule with per-entity overrides
//! folded in

use chrono::{Datelike, NaiveDateTime};
use tracing::debug;
use worktime_api::{AppDecision, GlobalPolicyRecord, WorkTimeStatus};
use worktime_util::{DaysOfWeek, TimeOfDay};

use crate::{is_overridden_at, parse_apps_string, AppSelection, EntitySnapshot, WeeklySchedule};

/// Why enforcement ended up on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// No global policy has been stored
    Unconfigured,
    GlobalDisabled,
    /// The entity is exempted right now
    Exception,
    /// The entity runs on a schedule of its own
    EntitySchedule,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePolicy {
    /// `schedule.enabled` doubles as the enforcement flag
    pub schedule: WeeklySchedule,
    pub allowed_during_work: AppSelection,
    pub allowed_outside_work: AppSelection,
    pub source: PolicySource,
}

/// Whether `now` falls inside the window a device enforces.
///
/// This is looser than [`WeeklySchedule::is_within_window`]: the end
/// minute is inclusive, `start > end` runs past midnight with the early
/// hours counted toward the previous day, and `start == end` covers the
/// whole day. Only days and times are consulted.
pub fn is_within_device_window(schedule: &WeeklySchedule, now: &NaiveDateTime) -> bool {
    let time = now.time();
    let start = schedule.start_time.to_naive_time();
    let end = schedule.end_time.to_naive_time();
    let today = now.weekday();

    let work_day = if start == end {
        Some(today)
    } else if start < end {
        (start <= time && time <= end).then_some(today)
    } else if time >= start {
        Some(today)
    } else {
        (time <= end).then(|| today.pred())
    };

    work_day.is_some_and(|day| schedule.days.has(day))
}

impl EffectivePolicy {
    pub fn enforcement_enabled(&self) -> bool {
        self.schedule.enabled
    }

    /// Always false while enforcement is off
    pub fn is_within_work_time(&self, now: &NaiveDateTime) -> bool {
        self.enforcement_enabled() && is_within_device_window(&self.schedule, now)
    }

    /// Decide whether `package` may run at `now`.
    pub fn is_app_allowed(&self, package: &str, now: &NaiveDateTime) -> AppDecision {
        let within_work_time = self.is_within_work_time(now);

        let allowed = if !self.enforcement_enabled() {
            true
        } else if within_work_time {
            self.allowed_during_work.allows(package)
        } else {
            self.allowed_outside_work.allows(package)
        };

        AppDecision {
            package: package.to_string(),
            allowed,
            within_work_time,
            enforcement_enabled: self.enforcement_enabled(),
        }
    }

    pub fn status(&self, now: &NaiveDateTime) -> WorkTimeStatus {
        WorkTimeStatus {
            enabled: self.enforcement_enabled(),
            currently_in_work_time: self.is_within_work_time(now),
            start_time: self.schedule.start_time,
            end_time: self.schedule.end_time,
            days_of_week: self.schedule.days,
        }
    }
}

/// Fold the global policy and one entity's overrides into what that
/// entity should enforce at `now`.
///
/// An active exception beats the entity's own schedule, which in turn
/// beats the global one.
pub fn resolve_effective_policy(
    global: Option<&GlobalPolicyRecord>,
    entity: Option<&EntitySnapshot>,
    now: &NaiveDateTime,
) -> EffectivePolicy {
    let Some(global) = global else {
        return EffectivePolicy {
            schedule: WeeklySchedule::new(
                false,
                TimeOfDay::MIDNIGHT,
                TimeOfDay::MIDNIGHT,
                DaysOfWeek::ALL_DAYS,
            ),
            allowed_during_work: AppSelection::all(),
            allowed_outside_work: AppSelection::all(),
            source: PolicySource::Unconfigured,
        };
    };

    let mut policy = EffectivePolicy {
        schedule: WeeklySchedule::from(global),
        allowed_during_work: parse_apps_string(&global.allowed_apps_during_work),
        allowed_outside_work: parse_apps_string(&global.allowed_apps_outside_work),
        source: PolicySource::Global,
    };

    if !global.enabled {
        policy.source = PolicySource::GlobalDisabled;
        return policy;
    }

    let Some(entity) = entity else {
        return policy;
    };

    if is_overridden_at(entity, now) {
        debug!(entity_id = %entity.entity_id, "Enforcement lifted by exception");
        policy.schedule.enabled = false;
        policy.source = PolicySource::Exception;
    } else if let Some(own) = &entity.own_schedule {
        debug!(entity_id = %entity.entity_id, "Using entity schedule");
        policy.schedule = own.apply(&policy.schedule);
        if let Some(apps) = &own.allowed_apps_during_work {
            policy.allowed_during_work = parse_apps_string(apps);
        }
        if let Some(apps) = &own.allowed_apps_outside_work {
            policy.allowed_outside_work = parse_apps_string(apps);
        }
        policy.source = PolicySource::EntitySchedule;
    }

    policy
}
