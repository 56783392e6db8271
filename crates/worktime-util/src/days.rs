//! Days-of-week set
//!
//! The bit values cross the wire (`daysOfWeek` is a plain integer in every
//! record), so they must stay Mon=1 through Sun=64.

use bitflags::bitflags;
use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Set of weekdays backed by a 7-bit mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaysOfWeek: u8 {
        const MONDAY = 1 << 0;
        const TUESDAY = 1 << 1;
        const WEDNESDAY = 1 << 2;
        const THURSDAY = 1 << 3;
        const FRIDAY = 1 << 4;
        const SATURDAY = 1 << 5;
        const SUNDAY = 1 << 6;

        const WEEKDAYS = Self::MONDAY.bits()
            | Self::TUESDAY.bits()
            | Self::WEDNESDAY.bits()
            | Self::THURSDAY.bits()
            | Self::FRIDAY.bits();
        const WEEKENDS = Self::SATURDAY.bits() | Self::SUNDAY.bits();
    }
}

impl DaysOfWeek {
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek::all();
    pub const NONE: DaysOfWeek = DaysOfWeek::empty();

    /// Build from a raw wire mask. Bits above Sunday are dropped.
    pub fn from_mask(mask: i64) -> Self {
        Self::from_bits_truncate((mask & 0x7F) as u8)
    }

    pub fn mask(&self) -> u8 {
        self.bits()
    }

    /// The single-day flag for a chrono weekday
    pub fn day(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::MONDAY,
            Weekday::Tue => Self::TUESDAY,
            Weekday::Wed => Self::WEDNESDAY,
            Weekday::Thu => Self::THURSDAY,
            Weekday::Fri => Self::FRIDAY,
            Weekday::Sat => Self::SATURDAY,
            Weekday::Sun => Self::SUNDAY,
        }
    }

    pub fn has(&self, weekday: Weekday) -> bool {
        self.contains(Self::day(weekday))
    }

    pub fn add(&mut self, weekday: Weekday) {
        self.insert(Self::day(weekday));
    }

    pub fn remove_day(&mut self, weekday: Weekday) {
        self.remove(Self::day(weekday));
    }

    pub fn toggle_day(&mut self, weekday: Weekday) {
        self.toggle(Self::day(weekday));
    }

    /// Selected days, Monday first
    pub fn days(&self) -> Vec<Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|d| self.has(*d))
        .collect()
    }

    /// Parse a day name or abbreviation ("mon", "Monday", ...)
    pub fn parse_day(name: &str) -> Option<Weekday> {
        match name.trim().to_lowercase().as_str() {
            "mon" | "monday" => Some(Weekday::Mon),
            "tue" | "tuesday" => Some(Weekday::Tue),
            "wed" | "wednesday" => Some(Weekday::Wed),
            "thu" | "thursday" => Some(Weekday::Thu),
            "fri" | "friday" => Some(Weekday::Fri),
            "sat" | "saturday" => Some(Weekday::Sat),
            "sun" | "sunday" => Some(Weekday::Sun),
            _ => None,
        }
    }

    /// Parse a stored per-entity day spec.
    ///
    /// A plain integer is taken as the mask. Otherwise the value is a
    /// comma-separated list of day names and bit values; unknown tokens
    /// are skipped. Returns `None` for a blank spec or a list that selects
    /// no day, so the caller can fall back to the global days.
    pub fn parse_spec(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        if let Ok(mask) = spec.parse::<i64>() {
            return Some(Self::from_mask(mask));
        }

        let mut days = Self::NONE;
        for token in spec.split(',') {
            if let Some(day) = Self::parse_day(token) {
                days.add(day);
            } else if let Ok(mask) = token.trim().parse::<i64>() {
                days |= Self::from_mask(mask);
            }
        }

        (!days.is_empty()).then_some(days)
    }
}

impl Serialize for DaysOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for DaysOfWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(DaysOfWeek::from_mask(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bits() {
        assert_eq!(DaysOfWeek::MONDAY.bits(), 1);
        assert_eq!(DaysOfWeek::WEDNESDAY.bits(), 4);
        assert_eq!(DaysOfWeek::SUNDAY.bits(), 64);
        assert_eq!(DaysOfWeek::WEEKDAYS.bits(), 31);
        assert_eq!(DaysOfWeek::WEEKENDS.bits(), 96);
        assert_eq!(DaysOfWeek::ALL_DAYS.bits(), 127);
    }

    #[test]
    fn test_has() {
        let weekdays = DaysOfWeek::WEEKDAYS;
        assert!(weekdays.has(Weekday::Mon));
        assert!(weekdays.has(Weekday::Fri));
        assert!(!weekdays.has(Weekday::Sat));
        assert!(!weekdays.has(Weekday::Sun));
    }

    #[test]
    fn test_add_remove_toggle() {
        let mut days = DaysOfWeek::NONE;
        days.add(Weekday::Tue);
        assert_eq!(days.mask(), 2);

        days.toggle_day(Weekday::Sun);
        assert_eq!(days.mask(), 66);

        days.toggle_day(Weekday::Sun);
        assert_eq!(days.mask(), 2);

        days.remove_day(Weekday::Tue);
        assert!(days.is_empty());
    }

    #[test]
    fn test_from_mask_truncates() {
        assert_eq!(DaysOfWeek::from_mask(0xFF).mask(), 0x7F);
        assert_eq!(DaysOfWeek::from_mask(31), DaysOfWeek::WEEKDAYS);
    }

    #[test]
    fn test_serde_as_integer() {
        let json = serde_json::to_string(&DaysOfWeek::WEEKDAYS).unwrap();
        assert_eq!(json, "31");
        let parsed: DaysOfWeek = serde_json::from_str("96").unwrap();
        assert_eq!(parsed, DaysOfWeek::WEEKENDS);
    }

    #[test]
    fn test_days_listing() {
        let days = DaysOfWeek::from_mask(0b1000001);
        assert_eq!(days.days(), vec![Weekday::Mon, Weekday::Sun]);
    }

    #[test]
    fn test_parse_spec() {
        assert_eq!(DaysOfWeek::parse_spec("31"), Some(DaysOfWeek::WEEKDAYS));
        assert_eq!(DaysOfWeek::parse_spec(" mon, Wednesday ").map(|d| d.mask()), Some(5));
        assert_eq!(DaysOfWeek::parse_spec("sat,64").map(|d| d.mask()), Some(96));
        assert_eq!(DaysOfWeek::parse_spec("mon,someday").map(|d| d.mask()), Some(1));

        assert_eq!(DaysOfWeek::parse_spec(""), None);
        assert_eq!(DaysOfWeek::parse_spec("someday, never"), None);
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(DaysOfWeek::parse_day("Mon"), Some(Weekday::Mon));
        assert_eq!(DaysOfWeek::parse_day("sunday"), Some(Weekday::Sun));
        assert_eq!(DaysOfWeek::parse_day("someday"), None);
    }
}
