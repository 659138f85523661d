use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::BookingError;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Wall-clock time with minute precision, written `HH:mm` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: i32) -> Self {
        TimeOfDay(minutes.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    pub fn minutes(self) -> i32 {
        self.0 as i32
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt((self.0 / 60) as u32, (self.0 % 60) as u32, 0).unwrap_or_default()
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        TimeOfDay((time.hour() * 60 + time.minute()) as u16)
    }
}

impl FromStr for TimeOfDay {
    type Err = BookingError;

    /// Accepts `HH:mm` and `HH:mm:ss`; seconds are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BookingError::Validation(format!("Invalid time format: {}. Expected HH:mm or HH:mm:ss", s));
        let parts: Vec<&str> = s.split(':').collect();
        if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.len() != 2) {
            return Err(invalid());
        }
        let mut numbers = parts.iter().map(|p| p.parse::<u16>());
        let hours = numbers.next().and_then(Result::ok).ok_or_else(invalid)?;
        let minutes = numbers.next().and_then(Result::ok).ok_or_else(invalid)?;
        let seconds = match numbers.next() {
            Some(r) => r.map_err(|_| invalid())?,
            None => 0,
        };
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(BookingError::Validation(format!("Invalid time values: {}", s)));
        }
        Ok(TimeOfDay(hours * 60 + minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
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
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Length of `start..end` in minutes; an end at or before the start runs past midnight.
pub fn span_minutes(start: TimeOfDay, end: TimeOfDay) -> i32 {
    let (s, e) = (start.minutes(), end.minutes());
    if e <= s {
        e + MINUTES_PER_DAY - s
    } else {
        e - s
    }
}

/// A concrete stretch of time, used for every overlap check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn on(date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Self {
        let start_at = date.and_time(start.to_naive());
        Interval {
            start: start_at,
            end: start_at + Duration::minutes(span_minutes(start, end) as i64),
        }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, BookingError> {
    let well_formed = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !well_formed {
        return Err(BookingError::Validation("Date must be in YYYY-MM-DD format".into()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| BookingError::Validation("Date must be in YYYY-MM-DD format".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(t("07:05").minutes(), 425);
        assert_eq!(t("18:30:00").to_string(), "18:30");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("7:00".parse::<TimeOfDay>().is_err());
        assert!("ab:cd".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_span_wraps_midnight() {
        assert_eq!(span_minutes(t("14:00"), t("15:30")), 90);
        assert_eq!(span_minutes(t("23:00"), t("00:15")), 75);
    }

    #[test]
    fn test_interval_overlap_across_midnight() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 24).unwrap();
        let next = day.succ_opt().unwrap();
        let late = Interval::on(day, t("23:30"), t("01:00"));
        let early = Interval::on(next, t("00:30"), t("02:00"));
        let after = Interval::on(next, t("01:00"), t("02:30"));
        assert!(late.overlaps(&early));
        assert!(!late.overlaps(&after));
        assert_eq!(late.minutes(), 90);
    }

    #[test]
    fn test_date_format() {
        assert!(parse_date("2025-05-24").is_ok());
        assert!(parse_date("24/05/2025").is_err());
        assert!(parse_date("2025-02-30").is_err());
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let json = serde_json::to_string(&t("09:00")).unwrap();
        assert_eq!(json, "\"09:00\"");
    }
}
