//! Work-time service: the store-backed facade over the evaluator

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info, warn};
use worktime_api::{
    AppDecision, EntityRecord, EntityView, ExceptionWriteRequest, FleetSummary,
    GlobalPolicyRecord, ScheduleOverrideRequest,
};
use worktime_store::{AuditEvent, AuditEventType, Store};
use worktime_util::{DateValue, DaysOfWeek, EntityId, Result, WorkTimeError};

use crate::{
    legacy_end, resolve_effective_policy, EffectivePolicy, EntitySnapshot, ExceptionCandidate,
    ExceptionValidator, PolicyEvaluator, WeeklySchedule,
};

/// Store-backed work-time service
pub struct WorkTimeService {
    store: Arc<dyn Store>,
    default_policy: GlobalPolicyRecord,
}

impl WorkTimeService {
    /// Create a new service. `default_policy` is stored the first time the
    /// global policy is read and none exists.
    pub fn new(store: Arc<dyn Store>, default_policy: GlobalPolicyRecord) -> Self {
        info!(
            enabled = default_policy.enabled,
            start = %default_policy.start_time,
            end = %default_policy.end_time,
            "Work-time service initialized"
        );

        Self {
            store,
            default_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    fn require_entity(&self, entity_id: &EntityId) -> Result<EntityRecord> {
        self.store
            .get_entity(entity_id)?
            .ok_or_else(|| WorkTimeError::EntityNotFound(entity_id.clone()))
    }

    /// Current global policy, creating the default one on first read
    pub fn global_policy(&self) -> Result<GlobalPolicyRecord> {
        if let Some(policy) = self.store.load_global_policy()? {
            return Ok(policy);
        }

        info!("No global policy stored, writing defaults");
        self.store.save_global_policy(&self.default_policy)?;
        Ok(self.default_policy.clone())
    }

    /// Replace the global policy
    pub fn save_global_policy(&self, policy: GlobalPolicyRecord) -> Result<GlobalPolicyRecord> {
        if policy.enabled && policy.days_of_week.is_empty() {
            return Err(WorkTimeError::validation(
                "An enabled policy must cover at least one day",
            ));
        }

        if WeeklySchedule::from(&policy).is_degenerate() {
            warn!(
                start = %policy.start_time,
                end = %policy.end_time,
                "End time is not after start time, the weekly window will never match"
            );
        }

        self.store.save_global_policy(&policy)?;
        self.audit(AuditEventType::GlobalPolicyUpdated {
            enabled: policy.enabled,
            start_time: policy.start_time.to_string(),
            end_time: policy.end_time.to_string(),
            days_of_week: policy.days_of_week.mask(),
        });

        info!(
            enabled = policy.enabled,
            start = %policy.start_time,
            end = %policy.end_time,
            days = policy.days_of_week.mask(),
            "Global policy updated"
        );

        Ok(policy)
    }

    fn evaluator(&self) -> Result<PolicyEvaluator> {
        Ok(PolicyEvaluator::new(WeeklySchedule::from(&self.global_policy()?)))
    }

    /// Register an entity, or rename a known one
    pub fn register_entity(&self, entity_id: &EntityId, name: Option<&str>) -> Result<EntityRecord> {
        self.store.upsert_entity(entity_id, name)?;
        self.audit(AuditEventType::EntityRegistered {
            entity_id: entity_id.clone(),
            name: name.map(str::to_string),
        });

        info!(entity_id = %entity_id, "Entity registered");
        self.require_entity(entity_id)
    }

    /// Evaluate every entity at `now`.
    ///
    /// Legacy overrides that ended before `now` are deleted as they are
    /// read.
    pub fn list_entities(&self, now: &NaiveDateTime) -> Result<Vec<EntityView>> {
        let evaluator = self.evaluator()?;
        let mut views = Vec::new();

        for record in self.store.list_entities()? {
            let record = self.drop_if_expired(record, now)?;
            let snapshot = EntitySnapshot::from_record(&record);
            views.push(evaluator.evaluate(&snapshot, now).into_view());
        }

        debug!(count = views.len(), "Listed entities");
        Ok(views)
    }

    /// Evaluate one entity at `now`
    pub fn evaluate_entity(&self, entity_id: &EntityId, now: &NaiveDateTime) -> Result<EntityView> {
        let record = self.require_entity(entity_id)?;
        let snapshot = EntitySnapshot::from_record(&record);
        Ok(self.evaluator()?.evaluate(&snapshot, now).into_view())
    }

    fn drop_if_expired(&self, record: EntityRecord, now: &NaiveDateTime) -> Result<EntityRecord> {
        let Some(end) = expired_legacy_end(&record, now) else {
            return Ok(record);
        };

        self.delete_expired(&record.entity_id, end)?;
        Ok(EntityRecord {
            entity_name: record.entity_name,
            ..EntityRecord::new(record.entity_id)
        })
    }

    fn delete_expired(&self, entity_id: &EntityId, end: &str) -> Result<()> {
        self.store.delete_override(entity_id)?;
        self.audit(AuditEventType::ExpiredOverrideDeleted {
            entity_id: entity_id.clone(),
            end_date_time: end.to_string(),
        });
        info!(entity_id = %entity_id, end = %end, "Deleted expired override");
        Ok(())
    }

    /// Validate and store an exception for an entity.
    ///
    /// On success the legacy range is written and the validated window
    /// replaces the first entry of the exception list. Nothing is written
    /// when validation fails.
    pub fn save_exception(
        &self,
        entity_id: &EntityId,
        candidate: &ExceptionCandidate,
        now: &NaiveDateTime,
    ) -> Result<ExceptionWriteRequest> {
        let record = self.require_entity(entity_id)?;

        let validated = match ExceptionValidator::validate(candidate, now) {
            Ok(v) => v,
            Err(e) => {
                self.audit(AuditEventType::ExceptionRejected {
                    entity_id: entity_id.clone(),
                    reason: e.to_string(),
                });
                debug!(entity_id = %entity_id, error = %e, "Exception rejected");
                return Err(e.into());
            }
        };

        let request = validated.write_request(entity_id.clone());

        let mut exceptions = record.exceptions.unwrap_or_default();
        let written = validated.to_exception(now).to_record();
        match exceptions.first_mut() {
            Some(first) => *first = written,
            None => exceptions.push(written),
        }
        self.store.save_exception(&request, &exceptions)?;

        self.audit(AuditEventType::ExceptionSaved {
            entity_id: entity_id.clone(),
            start_date_time: request.start_date_time.clone(),
            end_date_time: request.end_date_time.clone(),
        });

        info!(
            entity_id = %entity_id,
            start = %request.start_date_time,
            end = %request.end_date_time,
            "Exception saved"
        );

        Ok(request)
    }

    /// Put an entity on a schedule of its own. Replaces any legacy
    /// exception range; unset fields follow the global policy.
    pub fn save_schedule_override(&self, request: &ScheduleOverrideRequest) -> Result<EntityRecord> {
        self.require_entity(&request.entity_id)?;

        let unusable_days = request
            .days_of_week
            .as_deref()
            .filter(|spec| !spec.trim().is_empty() && DaysOfWeek::parse_spec(spec).is_none());
        if let Some(spec) = unusable_days {
            return Err(WorkTimeError::validation(format!(
                "Days of week '{spec}' select no day"
            )));
        }

        self.store.save_schedule_override(request)?;
        self.audit(AuditEventType::ScheduleOverrideSaved {
            entity_id: request.entity_id.clone(),
            start_time: request.start_time.map(|t| t.to_string()),
            end_time: request.end_time.map(|t| t.to_string()),
            days_of_week: request.days_of_week.clone(),
        });

        info!(entity_id = %request.entity_id, "Schedule override saved");
        self.require_entity(&request.entity_id)
    }

    /// Remove all override data for an entity
    pub fn remove_exception(&self, entity_id: &EntityId) -> Result<bool> {
        self.require_entity(entity_id)?;

        let removed = self.store.delete_override(entity_id)?;
        if removed {
            self.audit(AuditEventType::ExceptionRemoved {
                entity_id: entity_id.clone(),
            });
            info!(entity_id = %entity_id, "Exception removed");
        }

        Ok(removed)
    }

    /// Fleet-wide override counts at `now`
    pub fn fleet_summary(&self, now: &NaiveDateTime) -> Result<FleetSummary> {
        let evaluator = self.evaluator()?;
        let snapshots: Vec<EntitySnapshot> = self
            .store
            .list_entities()?
            .iter()
            .map(EntitySnapshot::from_record)
            .collect();

        Ok(evaluator.fleet_summary(&snapshots, now))
    }

    /// Delete every explicitly disabled override whose legacy range ended
    /// before `now`. Returns the affected entities.
    pub fn cleanup_expired(&self, now: &NaiveDateTime) -> Result<Vec<EntityId>> {
        let mut removed = Vec::new();

        for record in self.store.list_entities()? {
            if let Some(end) = expired_legacy_end(&record, now) {
                self.delete_expired(&record.entity_id, end)?;
                removed.push(record.entity_id.clone());
            }
        }

        if !removed.is_empty() {
            self.audit(AuditEventType::CleanupCompleted {
                removed: removed.len(),
            });
        }
        info!(removed = removed.len(), "Expired override cleanup finished");

        Ok(removed)
    }

    /// Policy an entity should enforce at `now`. Unknown or absent
    /// entities get the global policy. An expired legacy override found
    /// on the way is deleted.
    pub fn effective_policy(
        &self,
        entity_id: Option<&EntityId>,
        now: &NaiveDateTime,
    ) -> Result<EffectivePolicy> {
        let global = self.store.load_global_policy()?;

        let entity = match entity_id {
            Some(id) => {
                match self.store.get_entity(id)? {
                    Some(record) => {
                        let record = self.drop_if_expired(record, now)?;
                        Some(EntitySnapshot::from_record(&record))
                    }
                    None => {
                        debug!(entity_id = %id, "Unknown entity, using global policy");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(resolve_effective_policy(global.as_ref(), entity.as_ref(), now))
    }

    /// Whether `package` may run on an entity at `now`
    pub fn is_app_allowed(
        &self,
        entity_id: Option<&EntityId>,
        package: &str,
        now: &NaiveDateTime,
    ) -> Result<AppDecision> {
        let decision = self.effective_policy(entity_id, now)?.is_app_allowed(package, now);
        debug!(
            package = %package,
            allowed = decision.allowed,
            within_work_time = decision.within_work_time,
            "App decision"
        );
        Ok(decision)
    }
}

/// End of an explicitly disabled legacy override that is already over
fn expired_legacy_end<'a>(record: &'a EntityRecord, now: &NaiveDateTime) -> Option<&'a str> {
    if record.enabled != Some(false) {
        return None;
    }

    let end = record.end_date_time.as_deref()?;
    match DateValue::parse(end) {
        Ok(value) if legacy_end(value) < *now => Some(end),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use worktime_store::SqliteStore;
    use worktime_util::TimeOfDay;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn make_service() -> WorkTimeService {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        WorkTimeService::new(store, GlobalPolicyRecord::default())
    }

    fn audit_types(service: &WorkTimeService) -> Vec<AuditEventType> {
        service
            .store()
            .get_recent_audits(100)
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    #[test]
    fn test_global_policy_created_on_first_read() {
        let service = make_service();
        assert!(service.store().load_global_policy().unwrap().is_none());

        let policy = service.global_policy().unwrap();
        assert_eq!(policy, GlobalPolicyRecord::default());
        assert!(service.store().load_global_policy().unwrap().is_some());
    }

    #[test]
    fn test_save_global_policy() {
        let service = make_service();
        let policy = GlobalPolicyRecord {
            start_time: TimeOfDay::new(8, 0).unwrap(),
            days_of_week: DaysOfWeek::ALL_DAYS,
            ..GlobalPolicyRecord::default()
        };

        service.save_global_policy(policy.clone()).unwrap();
        assert_eq!(service.global_policy().unwrap(), policy);
        assert!(matches!(
            audit_types(&service)[0],
            AuditEventType::GlobalPolicyUpdated { days_of_week: 127, .. }
        ));
    }

    #[test]
    fn test_enabled_policy_without_days_is_rejected() {
        let service = make_service();
        let policy = GlobalPolicyRecord {
            days_of_week: DaysOfWeek::NONE,
            ..GlobalPolicyRecord::default()
        };

        assert!(matches!(
            service.save_global_policy(policy),
            Err(WorkTimeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_list_entities_end_to_end() {
        let service = make_service();
        service.register_entity(&EntityId::new("dev-1"), Some("Laptop")).unwrap();

        // Wednesday 10:00, inside the default window
        let views = service.list_entities(&at(2024, 1, 3, 10, 0)).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].record.display_name(), "Laptop");
        assert!(views[0].toggle_on);
        assert!(!views[0].has_active_exception);
    }

    #[test]
    fn test_save_exception_round_trip() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, None).unwrap();

        let now = at(2024, 1, 3, 8, 0);
        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        let request = service.save_exception(&id, &candidate, &now).unwrap();
        assert_eq!(request.start_date_time, "2024-01-03T09:00:00");
        assert!(!request.enabled);

        // Before the window: scheduled override reads as off, not yet active
        let before = service.evaluate_entity(&id, &now).unwrap();
        assert!(!before.toggle_on);
        assert!(!before.has_active_exception);

        let during = service.evaluate_entity(&id, &at(2024, 1, 3, 10, 0)).unwrap();
        assert!(during.has_active_exception);

        let summary = service.fleet_summary(&at(2024, 1, 3, 10, 0)).unwrap();
        assert_eq!(summary.active_exceptions, 1);
        assert_eq!(summary.overridden_during_work, 1);
    }

    #[test]
    fn test_save_exception_replaces_first_entry() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, None).unwrap();
        let now = at(2024, 1, 3, 8, 0);

        for day in ["2024-01-04", "2024-01-05"] {
            let candidate = ExceptionCandidate::new(day, "09:00", day, "12:00");
            service.save_exception(&id, &candidate, &now).unwrap();
        }

        let stored = service.store().get_entity(&id).unwrap().unwrap();
        let exceptions = stored.exceptions.unwrap();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].date_from.as_deref(), Some("2024-01-05"));
        assert_eq!(stored.end_date_time.as_deref(), Some("2024-01-05T12:00:00"));
    }

    #[test]
    fn test_rejected_exception_writes_nothing() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, None).unwrap();

        let candidate = ExceptionCandidate::new("2023-12-31", "09:00", "2023-12-31", "23:59");
        let result = service.save_exception(&id, &candidate, &at(2024, 1, 1, 8, 0));
        assert!(matches!(result, Err(WorkTimeError::WindowNotInFuture)));

        let stored = service.store().get_entity(&id).unwrap().unwrap();
        assert!(stored.enabled.is_none());
        assert!(stored.exceptions.is_none());
        assert!(matches!(
            audit_types(&service)[0],
            AuditEventType::ExceptionRejected { .. }
        ));
    }

    #[test]
    fn test_unknown_entity() {
        let service = make_service();
        let id = EntityId::new("ghost");
        let now = at(2024, 1, 3, 8, 0);

        assert!(matches!(
            service.evaluate_entity(&id, &now),
            Err(WorkTimeError::EntityNotFound(_))
        ));
        assert!(matches!(
            service.remove_exception(&id),
            Err(WorkTimeError::EntityNotFound(_))
        ));
        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        assert!(matches!(
            service.save_exception(&id, &candidate, &now),
            Err(WorkTimeError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_remove_exception() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, None).unwrap();
        let now = at(2024, 1, 3, 8, 0);

        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        service.save_exception(&id, &candidate, &now).unwrap();

        assert!(service.remove_exception(&id).unwrap());
        assert!(!service.remove_exception(&id).unwrap());
        assert!(service.evaluate_entity(&id, &now).unwrap().toggle_on);
    }

    #[test]
    fn test_list_entities_deletes_expired_legacy_override() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, Some("Phone")).unwrap();

        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        service.save_exception(&id, &candidate, &at(2024, 1, 3, 8, 0)).unwrap();

        let views = service.list_entities(&at(2024, 1, 3, 13, 0)).unwrap();
        assert!(views[0].toggle_on);
        assert!(views[0].record.end_date_time.is_none());
        assert_eq!(views[0].record.entity_name.as_deref(), Some("Phone"));

        let stored = service.store().get_entity(&id).unwrap().unwrap();
        assert!(stored.enabled.is_none());
    }

    #[test]
    fn test_cleanup_expired() {
        let service = make_service();
        let now = at(2024, 1, 3, 8, 0);
        for (id, day) in [("a", "2024-01-03"), ("b", "2024-01-05")] {
            let id = EntityId::new(id);
            service.register_entity(&id, None).unwrap();
            let candidate = ExceptionCandidate::new(day, "09:00", day, "12:00");
            service.save_exception(&id, &candidate, &now).unwrap();
        }
        service.register_entity(&EntityId::new("c"), None).unwrap();

        let removed = service.cleanup_expired(&at(2024, 1, 4, 0, 0)).unwrap();
        assert_eq!(removed, vec![EntityId::new("a")]);
        assert!(matches!(
            audit_types(&service)[0],
            AuditEventType::CleanupCompleted { removed: 1 }
        ));

        // Nothing left to do
        assert!(service.cleanup_expired(&at(2024, 1, 4, 0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_effective_policy_and_app_decisions() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        let wednesday = at(2024, 1, 3, 10, 0);

        // Nothing stored yet: no enforcement at all
        let policy = service.effective_policy(Some(&id), &wednesday).unwrap();
        assert!(!policy.enforcement_enabled());

        service
            .save_global_policy(GlobalPolicyRecord {
                allowed_apps_during_work: "com.mail".into(),
                ..GlobalPolicyRecord::default()
            })
            .unwrap();
        service.register_entity(&id, None).unwrap();

        assert!(service.is_app_allowed(Some(&id), "com.mail", &wednesday).unwrap().allowed);
        assert!(!service.is_app_allowed(Some(&id), "com.game", &wednesday).unwrap().allowed);
        assert!(!service.is_app_allowed(None, "com.game", &wednesday).unwrap().allowed);

        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        service.save_exception(&id, &candidate, &at(2024, 1, 3, 8, 0)).unwrap();
        assert!(service.is_app_allowed(Some(&id), "com.game", &wednesday).unwrap().allowed);
    }

    #[test]
    fn test_exception_last_minute_survives_listing() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.register_entity(&id, None).unwrap();
        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        service.save_exception(&id, &candidate, &at(2024, 1, 3, 8, 0)).unwrap();

        let last_minute = at(2024, 1, 3, 12, 0).with_second(30).unwrap();
        let views = service.list_entities(&last_minute).unwrap();
        assert!(views[0].has_active_exception);
        assert_eq!(views[0].record.end_date_time.as_deref(), Some("2024-01-03T12:00:00"));

        let summary = service.fleet_summary(&last_minute).unwrap();
        assert_eq!(summary.active_exceptions, 1);
        assert!(service.is_app_allowed(Some(&id), "com.game", &last_minute).unwrap().allowed);
        assert!(service.cleanup_expired(&last_minute).unwrap().is_empty());
    }

    #[test]
    fn test_schedule_override_drives_app_decisions() {
        let service = make_service();
        let id = EntityId::new("kiosk");
        service.register_entity(&id, None).unwrap();
        service.global_policy().unwrap();

        let request = ScheduleOverrideRequest {
            start_time: TimeOfDay::new(6, 0),
            end_time: TimeOfDay::new(8, 0),
            allowed_apps_during_work: Some("com.kiosk".into()),
            allowed_apps_outside_work: Some("com.kiosk, com.news".into()),
            ..ScheduleOverrideRequest::new("kiosk")
        };
        let record = service.save_schedule_override(&request).unwrap();
        assert_eq!(record.enabled, Some(true));

        // Wednesday 07:00: the entity's window, not the global one
        let early = at(2024, 1, 3, 7, 0);
        let policy = service.effective_policy(Some(&id), &early).unwrap();
        assert_eq!(policy.source, crate::PolicySource::EntitySchedule);
        assert!(service.is_app_allowed(Some(&id), "com.kiosk", &early).unwrap().allowed);
        assert!(!service.is_app_allowed(Some(&id), "com.news", &early).unwrap().allowed);

        let morning = at(2024, 1, 3, 10, 0);
        assert!(service.is_app_allowed(Some(&id), "com.news", &morning).unwrap().allowed);

        assert!(matches!(
            audit_types(&service)[0],
            AuditEventType::ScheduleOverrideSaved { .. }
        ));
    }

    #[test]
    fn test_schedule_override_rejects_unusable_days() {
        let service = make_service();
        let id = EntityId::new("kiosk");
        service.register_entity(&id, None).unwrap();

        let request = ScheduleOverrideRequest {
            days_of_week: Some("someday".into()),
            ..ScheduleOverrideRequest::new("kiosk")
        };
        assert!(matches!(
            service.save_schedule_override(&request),
            Err(WorkTimeError::ValidationError(_))
        ));
        assert!(service.store().get_entity(&id).unwrap().unwrap().enabled.is_none());

        assert!(matches!(
            service.save_schedule_override(&ScheduleOverrideRequest::new("ghost")),
            Err(WorkTimeError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_effective_policy_deletes_expired_override() {
        let service = make_service();
        let id = EntityId::new("dev-1");
        service.global_policy().unwrap();
        service.register_entity(&id, None).unwrap();
        let candidate = ExceptionCandidate::new("2024-01-03", "09:00", "2024-01-03", "12:00");
        service.save_exception(&id, &candidate, &at(2024, 1, 3, 8, 0)).unwrap();

        let policy = service.effective_policy(Some(&id), &at(2024, 1, 3, 13, 0)).unwrap();
        assert_eq!(policy.source, crate::PolicySource::Global);

        let stored = service.store().get_entity(&id).unwrap().unwrap();
        assert!(stored.enabled.is_none());
        assert!(stored.exceptions.is_none());
    }

    #[test]
    fn test_store_errors_map_to_upstream_unavailable() {
        let err: WorkTimeError = worktime_store::StoreError::Database("locked".into()).into();
        assert!(matches!(err, WorkTimeError::UpstreamUnavailable(_)));
    }
}
