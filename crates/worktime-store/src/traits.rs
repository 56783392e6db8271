//! Store trait definitions

use worktime_api::{
    EntityRecord, ExceptionRecord, ExceptionWriteRequest, GlobalPolicyRecord, ScheduleOverrideRequest,
};
use worktime_util::EntityId;

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Global policy

    /// Load the global policy, if one was ever saved
    fn load_global_policy(&self) -> StoreResult<Option<GlobalPolicyRecord>>;

    /// Replace the global policy
    fn save_global_policy(&self, policy: &GlobalPolicyRecord) -> StoreResult<()>;

    // Entities

    /// Register an entity, or rename it if already known
    fn upsert_entity(&self, entity_id: &EntityId, name: Option<&str>) -> StoreResult<()>;

    /// Get one entity with its override data
    fn get_entity(&self, entity_id: &EntityId) -> StoreResult<Option<EntityRecord>>;

    /// All entities with their override data, ordered by ID
    fn list_entities(&self) -> StoreResult<Vec<EntityRecord>>;

    // Overrides

    /// Write the legacy range carried by a validated exception together
    /// with the entity's new exception list. Both land or neither does.
    fn save_exception(
        &self,
        request: &ExceptionWriteRequest,
        exceptions: &[ExceptionRecord],
    ) -> StoreResult<()>;

    /// Put an entity on its own schedule. Clears any legacy range; the
    /// exception list is left alone.
    fn save_schedule_override(&self, request: &ScheduleOverrideRequest) -> StoreResult<()>;

    /// Remove all override data for an entity. Returns whether anything
    /// was deleted.
    fn delete_override(&self, entity_id: &EntityId) -> StoreResult<bool>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
