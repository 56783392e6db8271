//! Per-entity exceptions and their normalization
//!
//! Upstream storage has two shapes for an override: the legacy single
//! `startDateTime`/`endDateTime` pair on the entity, and a list of
//! `(date, time)` exceptions. Both are folded into an [`EntitySnapshot`]
//! on ingestion; evaluation only ever sees the canonical [`ExceptionSet`].

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use worktime_api::{EntityRecord, ExceptionRecord};
use worktime_util::{format_date, DateValue, EntityId, TimeOfDay};

use crate::ScheduleOverride;

/// Concrete local-time bounds of an exception, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl ExceptionWindow {
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        self.from <= *at && *at <= self.to
    }

    pub fn is_expired(&self, now: &NaiveDateTime) -> bool {
        self.to < *now
    }
}

/// A single time-bounded override for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub date_from: Option<DateValue>,
    pub date_to: Option<DateValue>,
    pub time_from: Option<TimeOfDay>,
    pub time_to: Option<TimeOfDay>,
    /// Read-time cache; only authoritative when the dates are unusable
    pub active: bool,
    raw: ExceptionRecord,
}

impl Exception {
    /// Ingest a stored exception. Never fails: unusable dates leave the
    /// exception malformed and it falls back to its stored `active` flag.
    pub fn from_record(record: &ExceptionRecord) -> Self {
        let date_from = parse_date_field(record.date_from.as_deref());
        let date_to = parse_date_field(record.date_to.as_deref());

        if date_from.is_none() || date_to.is_none() {
            warn!(
                date_from = ?record.date_from,
                date_to = ?record.date_to,
                stored_active = record.active,
                "Malformed exception dates, using stored active flag"
            );
        }

        Self {
            date_from,
            date_to,
            time_from: parse_time_field(record.time_from.as_deref()),
            time_to: parse_time_field(record.time_to.as_deref()),
            active: record.active,
            raw: record.clone(),
        }
    }

    /// Build an exception from a legacy start/end pair.
    pub fn from_legacy_range(start: NaiveDateTime, end: NaiveDateTime, now: &NaiveDateTime) -> Self {
        let start_tod = TimeOfDay::from_naive_time(start.time());
        let end_tod = TimeOfDay::from_naive_time(end.time());
        let active = start <= *now && *now <= end;

        Self {
            date_from: Some(DateValue::new(start)),
            date_to: Some(DateValue::new(end)),
            time_from: Some(start_tod),
            time_to: Some(end_tod),
            active,
            raw: ExceptionRecord {
                date_from: Some(format_date(start.date())),
                date_to: Some(format_date(end.date())),
                time_from: Some(start_tod.to_string()),
                time_to: Some(end_tod.to_string()),
                active,
            },
        }
    }

    /// Compose the concrete window.
    ///
    /// Only the calendar date of `date_from`/`date_to` is used when a time
    /// is present; `from` starts at second 0 and `to` runs to 59.999 of its
    /// minute. Without a time the date value's own time-of-day is kept.
    pub fn window(&self) -> Option<ExceptionWindow> {
        let date_from = self.date_from?;
        let date_to = self.date_to?;

        let from = match self.time_from {
            Some(t) => t.start_on(date_from.date()),
            None => date_from.as_datetime(),
        };
        let to = match self.time_to {
            Some(t) => t.end_on(date_to.date()),
            None => date_to.as_datetime(),
        };

        Some(ExceptionWindow { from, to })
    }

    pub fn is_malformed(&self) -> bool {
        self.date_from.is_none() || self.date_to.is_none()
    }

    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        self.window().is_some_and(|w| w.contains(at))
    }

    /// Malformed exceptions can't be dated and never expire
    pub fn is_expired(&self, now: &NaiveDateTime) -> bool {
        self.window().is_some_and(|w| w.is_expired(now))
    }

    /// Active state at `now`, falling back to the stored flag for
    /// malformed data
    pub fn is_active_at(&self, now: &NaiveDateTime) -> bool {
        match self.window() {
            Some(window) => window.contains(now),
            None => self.active,
        }
    }

    /// Copy with the `active` cache refreshed for `now`
    pub fn annotated(&self, now: &NaiveDateTime) -> Self {
        let mut copy = self.clone();
        copy.active = self.is_active_at(now);
        copy
    }

    /// Render back to the list shape. Dated exceptions come out in
    /// canonical `YYYY-MM-DD` / `HH:MM` form; malformed ones are passed
    /// through untouched apart from `active`.
    pub fn to_record(&self) -> ExceptionRecord {
        match self.window() {
            Some(window) => ExceptionRecord {
                date_from: Some(format_date(window.from.date())),
                date_to: Some(format_date(window.to.date())),
                time_from: Some(TimeOfDay::from_naive_time(window.from.time()).to_string()),
                time_to: Some(TimeOfDay::from_naive_time(window.to.time()).to_string()),
                active: self.active,
            },
            None => ExceptionRecord {
                active: self.active,
                ..self.raw.clone()
            },
        }
    }
}

fn parse_date_field(value: Option<&str>) -> Option<DateValue> {
    DateValue::parse(value?).ok()
}

fn parse_time_field(value: Option<&str>) -> Option<TimeOfDay> {
    let value = value?;
    match TimeOfDay::parse(value) {
        Ok(t) => Some(t),
        Err(e) => {
            debug!(error = %e, "Ignoring unparsable exception time");
            None
        }
    }
}

/// Ordered exceptions of one entity. Order carries no meaning for
/// evaluation; index 0 is what the console edits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionSet {
    exceptions: Vec<Exception>,
}

impl ExceptionSet {
    pub fn new(exceptions: Vec<Exception>) -> Self {
        Self { exceptions }
    }

    pub fn from_records(records: &[ExceptionRecord]) -> Self {
        Self::new(records.iter().map(Exception::from_record).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exception> {
        self.exceptions.iter()
    }

    pub fn len(&self) -> usize {
        self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exceptions.is_empty()
    }

    /// The exception the console treats as canonical
    pub fn first(&self) -> Option<&Exception> {
        self.exceptions.first()
    }

    pub fn push(&mut self, exception: Exception) {
        self.exceptions.push(exception);
    }

    /// Drop every exception that ended strictly before `now`.
    pub fn prune(&self, now: &NaiveDateTime) -> Self {
        Self {
            exceptions: self
                .exceptions
                .iter()
                .filter(|e| !e.is_expired(now))
                .cloned()
                .collect(),
        }
    }

    pub fn has_active(&self, now: &NaiveDateTime) -> bool {
        self.exceptions.iter().any(|e| e.is_active_at(now))
    }

    /// Copy with each exception's `active` cache refreshed
    pub fn annotate(&self, now: &NaiveDateTime) -> Self {
        Self {
            exceptions: self.exceptions.iter().map(|e| e.annotated(now)).collect(),
        }
    }

    pub fn to_records(&self) -> Vec<ExceptionRecord> {
        self.exceptions.iter().map(Exception::to_record).collect()
    }
}

impl FromIterator<Exception> for ExceptionSet {
    fn from_iter<I: IntoIterator<Item = Exception>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Legacy single-range override carried on the entity itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyRange {
    pub start: Option<DateValue>,
    pub end: Option<DateValue>,
}

impl LegacyRange {
    /// Present when both fields are non-empty, whether or not they parse
    fn from_fields(start: Option<&str>, end: Option<&str>) -> Option<Self> {
        let start = start.filter(|s| !s.is_empty())?;
        let end = end.filter(|s| !s.is_empty())?;

        Some(Self {
            start: DateValue::parse(start).ok(),
            end: DateValue::parse(end).ok(),
        })
    }

    /// Start as stored; the end runs to the last millisecond of its
    /// minute, like a list exception's `timeTo`.
    pub fn window(&self) -> Option<ExceptionWindow> {
        Some(ExceptionWindow {
            from: self.start?.as_datetime(),
            to: legacy_end(self.end?),
        })
    }
}

/// Last instant covered by a stored legacy end
pub fn legacy_end(end: DateValue) -> NaiveDateTime {
    end.time_of_day().end_on(end.date())
}

/// One entity's override data, normalized from either storage shape
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub entity_name: Option<String>,
    pub enabled: Option<bool>,
    /// Legacy range, if the record carries one
    pub scheduled: Option<LegacyRange>,
    pub exceptions: ExceptionSet,
    /// The entity's own schedule, when its override is enabled
    pub own_schedule: Option<ScheduleOverride>,
    source: EntityRecord,
}

impl EntitySnapshot {
    pub fn from_record(record: &EntityRecord) -> Self {
        let scheduled = LegacyRange::from_fields(
            record.start_date_time.as_deref(),
            record.end_date_time.as_deref(),
        );

        if scheduled.is_some_and(|range| range.window().is_none()) {
            warn!(
                entity_id = %record.entity_id,
                start = ?record.start_date_time,
                end = ?record.end_date_time,
                "Unparsable legacy exception range"
            );
        }

        Self {
            entity_id: record.entity_id.clone(),
            entity_name: record.entity_name.clone(),
            enabled: record.enabled,
            scheduled,
            exceptions: record
                .exceptions
                .as_deref()
                .map(ExceptionSet::from_records)
                .unwrap_or_default(),
            own_schedule: ScheduleOverride::from_record(record),
            source: record.clone(),
        }
    }

    /// Whether an explicit time-bounded override governs this entity
    pub fn has_scheduled_exception(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Synthesize an exception from the legacy range when the list is
    /// empty, the entity is explicitly disabled and the range is not over.
    pub fn backfill_from_legacy_range(&self, now: &NaiveDateTime) -> Option<Exception> {
        if !self.exceptions.is_empty() || self.enabled != Some(false) {
            return None;
        }

        let window = self.scheduled?.window()?;
        if *now > window.to {
            return None;
        }

        Some(Exception::from_legacy_range(window.from, window.to, now))
    }

    /// Pruned and backfilled copy, ready for evaluation
    pub fn normalized(&self, now: &NaiveDateTime) -> Self {
        let mut normalized = self.clone();
        normalized.exceptions = self.exceptions.prune(now);

        if let Some(fallback) = normalized.backfill_from_legacy_range(now) {
            debug!(entity_id = %self.entity_id, "Backfilled exception from legacy range");
            normalized.exceptions.push(fallback);
        }

        normalized
    }

    /// Render back to a record, replacing the list with this snapshot's
    /// exceptions
    pub fn to_record(&self) -> EntityRecord {
        EntityRecord {
            exceptions: Some(self.exceptions.to_records()),
            ..self.source.clone()
        }
    }
}
