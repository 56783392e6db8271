//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use worktime_util::EntityId;

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Daemon started
    ServiceStarted,

    /// Daemon stopped
    ServiceStopped,

    /// Global policy replaced
    GlobalPolicyUpdated {
        enabled: bool,
        start_time: String,
        end_time: String,
        days_of_week: u8,
    },

    /// Entity registered or renamed
    EntityRegistered {
        entity_id: EntityId,
        name: Option<String>,
    },

    /// Exception written
    ExceptionSaved {
        entity_id: EntityId,
        start_date_time: String,
        end_date_time: String,
    },

    /// Exception refused by validation
    ExceptionRejected { entity_id: EntityId, reason: String },

    /// Override data removed on request
    ExceptionRemoved { entity_id: EntityId },

    /// Entity moved onto its own schedule
    ScheduleOverrideSaved {
        entity_id: EntityId,
        start_time: Option<String>,
        end_time: Option<String>,
        days_of_week: Option<String>,
    },

    /// Legacy override past its end, removed
    ExpiredOverrideDeleted {
        entity_id: EntityId,
        end_date_time: String,
    },

    /// Cleanup pass finished
    CleanupCompleted { removed: usize },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: worktime_util::now(),
            event,
        }
    }
}
