//! Gate for exception writes

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;
use worktime_api::ExceptionWriteRequest;
use worktime_util::{
    format_api_datetime, format_date, format_time, DateValue, EntityId, TimeOfDay, WorkTimeError,
};

use crate::Exception;

/// Why a candidate exception was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExceptionError {
    #[error("Start and end date/time are required")]
    IncompleteWindow,

    #[error("End time must be after start time")]
    InvertedWindow,

    #[error("End time must be in the future")]
    WindowNotInFuture,
}

impl From<ExceptionError> for WorkTimeError {
    fn from(e: ExceptionError) -> Self {
        match e {
            ExceptionError::IncompleteWindow => WorkTimeError::IncompleteWindow,
            ExceptionError::InvertedWindow => WorkTimeError::InvertedWindow,
            ExceptionError::WindowNotInFuture => WorkTimeError::WindowNotInFuture,
        }
    }
}

/// Raw form input for a new or edited exception
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionCandidate {
    pub date_from: Option<String>,
    pub time_from: Option<String>,
    pub date_to: Option<String>,
    pub time_to: Option<String>,
}

impl ExceptionCandidate {
    pub fn new(
        date_from: impl Into<String>,
        time_from: impl Into<String>,
        date_to: impl Into<String>,
        time_to: impl Into<String>,
    ) -> Self {
        Self {
            date_from: Some(date_from.into()),
            time_from: Some(time_from.into()),
            date_to: Some(date_to.into()),
            time_to: Some(time_to.into()),
        }
    }
}

/// A window that passed validation, at minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedException {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl ValidatedException {
    /// Render the write that puts this override in force
    pub fn write_request(&self, entity_id: EntityId) -> ExceptionWriteRequest {
        ExceptionWriteRequest {
            entity_id,
            enabled: false,
            start_date_time: format_api_datetime(&self.from),
            end_date_time: format_api_datetime(&self.to),
        }
    }

    pub fn to_exception(&self, now: &NaiveDateTime) -> Exception {
        Exception::from_legacy_range(self.from, self.to, now)
    }
}

pub struct ExceptionValidator;

impl ExceptionValidator {
    /// Check a candidate against `now`.
    pub fn validate(
        candidate: &ExceptionCandidate,
        now: &NaiveDateTime,
    ) -> Result<ValidatedException, ExceptionError> {
        let from = compose(candidate.date_from.as_deref(), candidate.time_from.as_deref())
            .ok_or(ExceptionError::IncompleteWindow)?;
        let to = compose(candidate.date_to.as_deref(), candidate.time_to.as_deref())
            .ok_or(ExceptionError::IncompleteWindow)?;

        if to < from {
            return Err(ExceptionError::InvertedWindow);
        }

        // Day first, then HH:MM, both as zero-padded strings
        let end_date = format_date(to.date());
        let now_date = format_date(now.date());
        let ends_in_future = end_date > now_date
            || (end_date == now_date && format_time(&to) > format_time(now));
        if !ends_in_future {
            return Err(ExceptionError::WindowNotInFuture);
        }

        debug!(from = %from, to = %to, "Exception window accepted");
        Ok(ValidatedException { from, to })
    }
}

fn compose(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = DateValue::parse(date?).ok()?;
    let time = TimeOfDay::parse(time?).ok()?;
    Some(time.start_on(date.date()))
}
