//! Per-entity policy evaluation and fleet aggregates

use chrono::NaiveDateTime;
use tracing::trace;
use worktime_api::{EntityView, FleetSummary};

use crate::{EntitySnapshot, WeeklySchedule};

/// Derived per-entity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPolicyState {
    /// UI toggle: whether the entity currently follows the schedule
    pub effective_toggle: bool,
    pub has_active_exception: bool,
}

/// Result of evaluating one entity
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: EntityPolicyState,
    /// Pruned, backfilled and annotated copy of the input
    pub entity: EntitySnapshot,
}

impl Evaluation {
    pub fn into_view(self) -> EntityView {
        EntityView {
            record: self.entity.to_record(),
            toggle_on: self.state.effective_toggle,
            has_active_exception: self.state.has_active_exception,
        }
    }
}

/// Toggle precedence: a scheduled override always reads as off, even
/// when it has not started or can't be parsed. Otherwise the entity is on
/// when enforcement is enabled globally and nothing exempts it right now.
///
/// The weekly window plays no part here.
pub fn derive_toggle(global_enabled: bool, has_scheduled_exception: bool, has_active: bool) -> bool {
    if has_scheduled_exception {
        return false;
    }
    global_enabled && !has_active
}

/// Whether an entity is exempted at `now`, weekly window ignored.
///
/// A legacy range covering `now` is enough; otherwise the stored list
/// decides.
pub fn is_overridden_at(entity: &EntitySnapshot, now: &NaiveDateTime) -> bool {
    let legacy_active = entity
        .scheduled
        .and_then(|range| range.window())
        .is_some_and(|window| window.contains(now));

    legacy_active || entity.exceptions.has_active(now)
}

/// Evaluates entities against the global schedule
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    schedule: WeeklySchedule,
}

impl PolicyEvaluator {
    pub fn new(schedule: WeeklySchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    /// Evaluate a single entity at `now`.
    ///
    /// The input is left as is; the returned snapshot carries the pruned
    /// exception list with refreshed `active` flags.
    pub fn evaluate(&self, entity: &EntitySnapshot, now: &NaiveDateTime) -> Evaluation {
        let mut normalized = entity.normalized(now);
        let has_active_exception = normalized.exceptions.has_active(now);
        normalized.exceptions = normalized.exceptions.annotate(now);

        let effective_toggle = derive_toggle(
            self.schedule.enabled,
            normalized.has_scheduled_exception(),
            has_active_exception,
        );

        trace!(
            entity_id = %entity.entity_id,
            effective_toggle,
            has_active_exception,
            "Evaluated entity"
        );

        Evaluation {
            state: EntityPolicyState {
                effective_toggle,
                has_active_exception,
            },
            entity: normalized,
        }
    }

    pub fn evaluate_all(&self, entities: &[EntitySnapshot], now: &NaiveDateTime) -> Vec<Evaluation> {
        entities.iter().map(|e| self.evaluate(e, now)).collect()
    }

    /// Aggregate (a): entities exempted at `now`, regardless of the
    /// weekly window.
    pub fn count_active_exceptions(entities: &[EntitySnapshot], now: &NaiveDateTime) -> usize {
        entities.iter().filter(|e| is_overridden_at(e, now)).count()
    }

    /// Aggregate (b): entities exempted at `now` while the weekly window
    /// is open.
    pub fn count_overridden_during_work(&self, entities: &[EntitySnapshot], now: &NaiveDateTime) -> usize {
        if !self.schedule.is_within_window(now) {
            return 0;
        }
        Self::count_active_exceptions(entities, now)
    }

    pub fn fleet_summary(&self, entities: &[EntitySnapshot], now: &NaiveDateTime) -> FleetSummary {
        let active_exceptions = Self::count_active_exceptions(entities, now);

        FleetSummary {
            total_entities: entities.len(),
            active_exceptions,
            has_active_exceptions: active_exceptions > 0,
            overridden_during_work: self.count_overridden_during_work(entities, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use worktime_api::{EntityRecord, ExceptionRecord};
    use worktime_util::{DaysOfWeek, TimeOfDay};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn office_hours(enabled: bool) -> WeeklySchedule {
        WeeklySchedule::new(
            enabled,
            TimeOfDay::new(9, 0).unwrap(),
            TimeOfDay::new(18, 0).unwrap(),
            DaysOfWeek::WEEKDAYS,
        )
    }

    fn exception(date: &str, from: &str, to: &str) -> ExceptionRecord {
        ExceptionRecord {
            date_from: Some(date.into()),
            date_to: Some(date.into()),
            time_from: Some(from.into()),
            time_to: Some(to.into()),
            active: false,
        }
    }

    fn entity(id: &str) -> EntityRecord {
        EntityRecord::new(id)
    }

    fn snapshot(record: EntityRecord) -> EntitySnapshot {
        EntitySnapshot::from_record(&record)
    }

    #[test]
    fn test_toggle_truth_table() {
        for global_enabled in [false, true] {
            for scheduled in [false, true] {
                for active in [false, true] {
                    let expected = !scheduled && global_enabled && !active;
                    assert_eq!(
                        derive_toggle(global_enabled, scheduled, active),
                        expected,
                        "enabled={global_enabled} scheduled={scheduled} active={active}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_wednesday_morning_without_exceptions_toggles_on() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        // 2024-01-03 is a Wednesday
        let now = at(2024, 1, 3, 10, 0);
        assert!(evaluator.schedule().is_within_window(&now));

        let result = evaluator.evaluate(&snapshot(entity("dev-1")), &now);
        assert!(result.state.effective_toggle);
        assert!(!result.state.has_active_exception);
    }

    #[test]
    fn test_toggle_ignores_weekly_window() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        // Sunday, outside the window
        let result = evaluator.evaluate(&snapshot(entity("dev-1")), &at(2024, 1, 7, 22, 0));
        assert!(result.state.effective_toggle);
    }

    #[test]
    fn test_active_exception_turns_toggle_off() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let mut record = entity("dev-1");
        record.exceptions = Some(vec![exception("2024-01-03", "09:30", "11:00")]);

        let result = evaluator.evaluate(&snapshot(record), &at(2024, 1, 3, 10, 0));
        assert!(!result.state.effective_toggle);
        assert!(result.state.has_active_exception);

        let view = result.into_view();
        assert!(view.record.exceptions.unwrap()[0].active);
    }

    #[test]
    fn test_future_scheduled_override_reads_as_off() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let record = EntityRecord {
            enabled: Some(false),
            start_date_time: Some("2024-02-01T09:00:00".into()),
            end_date_time: Some("2024-02-01T17:00:00".into()),
            ..entity("dev-1")
        };

        let result = evaluator.evaluate(&snapshot(record), &at(2024, 1, 3, 10, 0));
        assert!(!result.state.effective_toggle);
        assert!(!result.state.has_active_exception);
        assert_eq!(result.entity.exceptions.len(), 1);
    }

    #[test]
    fn test_unparsable_legacy_range_still_reads_as_off() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let record = EntityRecord {
            start_date_time: Some("soon".into()),
            end_date_time: Some("later".into()),
            ..entity("dev-1")
        };

        let result = evaluator.evaluate(&snapshot(record), &at(2024, 1, 3, 10, 0));
        assert!(!result.state.effective_toggle);
    }

    #[test]
    fn test_expired_exceptions_are_pruned_from_result() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let mut record = entity("dev-1");
        record.exceptions = Some(vec![
            exception("2024-01-01", "09:00", "10:00"),
            exception("2024-01-05", "09:00", "10:00"),
        ]);
        let input = snapshot(record);

        let result = evaluator.evaluate(&input, &at(2024, 1, 3, 10, 0));
        assert_eq!(result.entity.exceptions.len(), 1);
        assert!(result.state.effective_toggle);
        // input untouched
        assert_eq!(input.exceptions.len(), 2);
    }

    #[test]
    fn test_malformed_exception_falls_back_to_stored_flag() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let mut record = entity("dev-1");
        record.exceptions = Some(vec![ExceptionRecord {
            date_from: Some("??".into()),
            active: true,
            ..Default::default()
        }]);

        let result = evaluator.evaluate(&snapshot(record), &at(2024, 1, 3, 10, 0));
        assert!(result.state.has_active_exception);
        assert!(!result.state.effective_toggle);
    }

    #[test]
    fn test_disabled_global_policy_turns_everyone_off() {
        let evaluator = PolicyEvaluator::new(office_hours(false));
        let result = evaluator.evaluate(&snapshot(entity("dev-1")), &at(2024, 1, 3, 10, 0));
        assert!(!result.state.effective_toggle);
    }

    fn fleet() -> Vec<EntitySnapshot> {
        let legacy = EntityRecord {
            enabled: Some(false),
            start_date_time: Some("2024-01-06T08:00:00".into()),
            end_date_time: Some("2024-01-06T20:00:00".into()),
            ..entity("legacy")
        };
        let mut listed = entity("listed");
        listed.exceptions = Some(vec![
            exception("2024-01-03", "09:00", "12:00"),
            exception("2024-01-06", "09:00", "12:00"),
        ]);
        let mut late = entity("late");
        late.exceptions = Some(vec![exception("2024-01-03", "19:00", "21:00")]);

        vec![
            snapshot(legacy),
            snapshot(listed),
            snapshot(late),
            snapshot(entity("plain")),
        ]
    }

    #[test]
    fn test_fleet_aggregates_inside_window() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        // Wednesday 10:00: only "listed" is exempted
        let summary = evaluator.fleet_summary(&fleet(), &at(2024, 1, 3, 10, 0));

        assert_eq!(summary.total_entities, 4);
        assert_eq!(summary.active_exceptions, 1);
        assert!(summary.has_active_exceptions);
        assert_eq!(summary.overridden_during_work, 1);
    }

    #[test]
    fn test_fleet_aggregates_diverge_outside_window() {
        let evaluator = PolicyEvaluator::new(office_hours(true));

        // Wednesday 20:00: "late" is exempted but the window is closed
        let evening = evaluator.fleet_summary(&fleet(), &at(2024, 1, 3, 20, 0));
        assert_eq!(evening.active_exceptions, 1);
        assert_eq!(evening.overridden_during_work, 0);

        // Saturday 10:00: "legacy" and "listed" both exempted, weekend
        let saturday = evaluator.fleet_summary(&fleet(), &at(2024, 1, 6, 10, 0));
        assert_eq!(saturday.active_exceptions, 2);
        assert_eq!(saturday.overridden_during_work, 0);
    }

    #[test]
    fn test_list_exception_counts_when_legacy_range_is_elsewhere() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let mut record = EntityRecord {
            enabled: Some(false),
            start_date_time: Some("2024-01-10T09:00:00".into()),
            end_date_time: Some("2024-01-10T17:00:00".into()),
            ..entity("mixed")
        };
        record.exceptions = Some(vec![exception("2024-01-03", "09:00", "12:00")]);
        let fleet = vec![snapshot(record)];
        let now = at(2024, 1, 3, 10, 0);

        assert!(is_overridden_at(&fleet[0], &now));
        assert!(evaluator.evaluate(&fleet[0], &now).state.has_active_exception);

        let summary = evaluator.fleet_summary(&fleet, &now);
        assert_eq!(summary.active_exceptions, 1);
        assert_eq!(summary.overridden_during_work, 1);
    }

    #[test]
    fn test_legacy_range_covers_its_last_minute() {
        let record = EntityRecord {
            enabled: Some(false),
            start_date_time: Some("2024-01-03T09:00:00".into()),
            end_date_time: Some("2024-01-03T12:00:00".into()),
            ..entity("dev-1")
        };
        let entity = snapshot(record);
        let last_minute = at(2024, 1, 3, 12, 0).with_second(30).unwrap();

        assert!(is_overridden_at(&entity, &last_minute));
        assert!(!is_overridden_at(&entity, &at(2024, 1, 3, 12, 1)));
    }

    #[test]
    fn test_empty_fleet() {
        let evaluator = PolicyEvaluator::new(office_hours(true));
        let summary = evaluator.fleet_summary(&[], &at(2024, 1, 3, 10, 0));
        assert_eq!(summary, FleetSummary::default());
    }
}
