//! Time primitives for the work-time engine
//!
//! All policy evaluation happens on local wall-clock values
//! (`NaiveDateTime`), never on UTC arithmetic. The caller decides which
//! wall clock is "local"; inside the engine nothing consults the ambient
//! time zone except [`now`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WORKTIME_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising schedules and exception expiry by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! WORKTIME_MOCK_TIME="2025-12-25 14:30:00" worktimed summary
//! ```

use chrono::{
    DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::ParseError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WORKTIME_MOCK_TIME";

/// Canonical date format on the wire
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical time-of-day format on the wire
pub const TIME_FORMAT: &str = "%H:%M";

/// Datetime format used for exception write requests
pub const API_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        ),
                    },
                    Err(_) => tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    ),
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Current local wall-clock instant, as used by every evaluation.
pub fn local_now() -> NaiveDateTime {
    now().naive_local()
}

/// Wall-clock time of day at minute resolution ("HH:MM")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `H:MM`, `HH:MM` or `HH:MM:SS` (seconds are dropped).
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = |reason: &str| ParseError::InvalidTime {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid("expected HH:MM"));
        }

        let hour: u8 = parts[0].parse().map_err(|_| invalid("invalid hour"))?;
        let minute: u8 = parts[1].parse().map_err(|_| invalid("invalid minute"))?;
        if let Some(secs) = parts.get(2) {
            let secs: u8 = secs.parse().map_err(|_| invalid("invalid second"))?;
            if secs >= 60 {
                return Err(invalid("second must be 0-59"));
            }
        }

        if hour >= 24 {
            return Err(invalid("hour must be 0-23"));
        }
        if minute >= 60 {
            return Err(invalid("minute must be 0-59"));
        }

        Ok(Self { hour, minute })
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Returns minutes since midnight
    pub fn minutes_from_midnight(&self) -> u16 {
        (self.hour as u16) * 60 + self.minute as u16
    }

    /// First instant of this minute on `date`.
    pub fn start_on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }

    /// Last millisecond of this minute on `date` (HH:MM:59.999).
    pub fn end_on(self, date: NaiveDate) -> NaiveDateTime {
        let time = NaiveTime::from_hms_milli_opt(self.hour as u32, self.minute as u32, 59, 999)
            .unwrap_or_else(|| self.to_naive_time());
        date.and_time(time)
    }
}

impl PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeOfDay {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeOfDay::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A calendar date as supplied by upstream storage.
///
/// Upstream sends either a bare `YYYY-MM-DD` or a full datetime; both are
/// kept as a local `NaiveDateTime` so the time portion survives when no
/// explicit time-of-day is overlaid later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateValue(NaiveDateTime);

impl DateValue {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Parse a date or datetime string.
    ///
    /// Accepted shapes, in order: `YYYY-MM-DD`, ISO local datetimes with
    /// or without seconds/fractions (`T` or space separated), RFC 3339 and
    /// `...SSS+HHMM` offsets. Offset values are converted to the local
    /// wall clock.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::InvalidDate { value: String::new() });
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Ok(Self(date.and_time(NaiveTime::MIN)));
        }

        const LOCAL_FORMATS: [&str; 4] = [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
        ];
        for format in LOCAL_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(dt));
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Local).naive_local()));
        }
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%#z") {
            return Ok(Self(dt.with_timezone(&Local).naive_local()));
        }

        Err(ParseError::InvalidDate {
            value: s.to_string(),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Time-of-day portion of the stored value
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_naive_time(self.0.time())
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DateValue {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format the time portion of a datetime as `HH:MM`.
pub fn format_time(dt: &NaiveDateTime) -> String {
    dt.format(TIME_FORMAT).to_string()
}

/// Format a datetime the way exception writes carry it (`YYYY-MM-DDTHH:MM:SS`).
pub fn format_api_datetime(dt: &NaiveDateTime) -> String {
    dt.format(API_DATETIME_FORMAT).to_string()
}
