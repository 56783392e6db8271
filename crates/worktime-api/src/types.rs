//! Shared record types for the work-time API
//!
//! Field names are camelCase on the wire to match the console and the
//! device-side clients.

use serde::{Deserialize, Serialize};
use worktime_util::{DaysOfWeek, EntityId, TimeOfDay};

/// The installation-wide work-time policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPolicyRecord {
    pub enabled: bool,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub days_of_week: DaysOfWeek,
    /// `*` or a comma-separated list of application identifiers
    #[serde(default)]
    pub allowed_apps_during_work: String,
    #[serde(default)]
    pub allowed_apps_outside_work: String,
}

impl Default for GlobalPolicyRecord {
    fn default() -> Self {
        Self {
            enabled: true,
            start_time: TimeOfDay { hour: 9, minute: 0 },
            end_time: TimeOfDay { hour: 18, minute: 0 },
            days_of_week: DaysOfWeek::WEEKDAYS,
            allowed_apps_during_work: String::new(),
            allowed_apps_outside_work: "*".into(),
        }
    }
}

/// One stored exception in list shape.
///
/// Values are kept exactly as upstream sent them; a record whose dates do
/// not parse is still carried so its `active` flag can be honoured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Per-entity record as read from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Legacy single-range start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<String>,
    /// Legacy single-range end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<Vec<ExceptionRecord>>,

    // Own schedule, honoured while `enabled` is true. Absent fields fall
    // back to the global policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Bitmask, or comma-separated day names and bit values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_apps_during_work: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_apps_outside_work: Option<String>,
}

impl EntityRecord {
    /// A record with no override data at all
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_name: None,
            enabled: None,
            start_date_time: None,
            end_date_time: None,
            exceptions: None,
            start_time: None,
            end_time: None,
            days_of_week: None,
            allowed_apps_during_work: None,
            allowed_apps_outside_work: None,
        }
    }

    /// Display name, falling back to the ID
    pub fn display_name(&self) -> String {
        self.entity_name
            .clone()
            .unwrap_or_else(|| format!("Device {}", self.entity_id))
    }
}

/// Write request produced by a validated exception
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionWriteRequest {
    pub entity_id: EntityId,
    /// Always `false`: the override is in force
    pub enabled: bool,
    pub start_date_time: String,
    pub end_date_time: String,
}

/// Per-entity schedule to store. `None` fields use the global value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverrideRequest {
    pub entity_id: EntityId,
    #[serde(default)]
    pub start_time: Option<TimeOfDay>,
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
    #[serde(default)]
    pub days_of_week: Option<String>,
    #[serde(default)]
    pub allowed_apps_during_work: Option<String>,
    #[serde(default)]
    pub allowed_apps_outside_work: Option<String>,
}

impl ScheduleOverrideRequest {
    /// A request that only switches the entity onto its own schedule
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            start_time: None,
            end_time: None,
            days_of_week: None,
            allowed_apps_during_work: None,
            allowed_apps_outside_work: None,
        }
    }
}

/// Evaluated entity, as shown in the console list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub toggle_on: bool,
    pub has_active_exception: bool,
}

/// Fleet-wide override counts, recomputed on every request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub total_entities: usize,
    /// Entities with an exception covering now (weekly window ignored)
    pub active_exceptions: usize,
    pub has_active_exceptions: bool,
    /// Entities with an active exception while the weekly window is open
    pub overridden_during_work: usize,
}

/// Enforcement status reported to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkTimeStatus {
    pub enabled: bool,
    pub currently_in_work_time: bool,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub days_of_week: DaysOfWeek,
}

/// Answer to "may this application run now"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDecision {
    pub package: String,
    pub allowed: bool,
    pub within_work_time: bool,
    pub enforcement_enabled: bool,
}
