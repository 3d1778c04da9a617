// Quiet-hours gate.
//
// `is_quiet_time` answers "must proactive delivery be suppressed right now".
// Sending is allowed exactly when it returns false.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::ClockParseError;

/// Wall-clock `HH:MM`, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub fn new(hour: u16, minute: u16) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self {
            minutes: hour * 60 + minute,
        })
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        // hour() < 24 and minute() < 60 always hold for NaiveTime
        Self {
            minutes: (time.hour() * 60 + time.minute()) as u16,
        }
    }

    pub fn hour(&self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(&self) -> u16 {
        self.minutes % 60
    }
}

fn clock_regex() -> &'static Regex {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    CLOCK.get_or_init(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*$").expect("Invalid clock regex"))
}

impl FromStr for ClockTime {
    type Err = ClockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockParseError(s.to_string());
        let caps = clock_regex().captures(s).ok_or_else(err)?;
        let hour: u16 = caps[1].parse().map_err(|_| err())?;
        let minute: u16 = caps[2].parse().map_err(|_| err())?;
        Self::new(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Do-not-disturb window, possibly wrapping midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: ClockTime { minutes: 22 * 60 },
            end: ClockTime { minutes: 8 * 60 },
        }
    }
}

impl QuietHours {
    pub fn window(start: ClockTime, end: ClockTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }
}

/// True when `now` falls inside the enabled quiet window.
///
/// Non-wrapping windows are `[start, end)`. A window that wraps midnight
/// (`start > end`) covers `now >= start || now <= end`. `start == end` is empty.
pub fn is_quiet_time(now: NaiveTime, quiet_hours: &QuietHours) -> bool {
    if !quiet_hours.enabled {
        return false;
    }

    let now = ClockTime::from_naive(now);
    let (start, end) = (quiet_hours.start, quiet_hours.end);

    if start < end {
        now >= start && now < end
    } else if start > end {
        now >= start || now <= end
    } else {
        false
    }
}

/// True when proactive delivery may go out at `now`.
pub fn sending_allowed(now: NaiveTime, quiet_hours: &QuietHours) -> bool {
    !is_quiet_time(now, quiet_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn window(start: &str, end: &str) -> QuietHours {
        QuietHours::window(start.parse().unwrap(), end.parse().unwrap())
    }

    #[test]
    fn test_overnight_window() {
        let qh = window("20:00", "08:00");

        assert!(is_quiet_time(at(23, 0), &qh));
        assert!(is_quiet_time(at(2, 0), &qh));
        assert!(is_quiet_time(at(8, 0), &qh));
        assert!(!is_quiet_time(at(12, 0), &qh));
        assert!(sending_allowed(at(12, 0), &qh));
    }

    #[test]
    fn test_daytime_window_excludes_end() {
        let qh = window("12:00", "14:00");

        assert!(!is_quiet_time(at(11, 59), &qh));
        assert!(is_quiet_time(at(12, 0), &qh));
        assert!(is_quiet_time(at(13, 59), &qh));
        assert!(!is_quiet_time(at(14, 0), &qh));
    }

    #[test]
    fn test_disabled_window_never_quiet() {
        let mut qh = window("00:00", "23:59");
        qh.enabled = false;

        assert!(!is_quiet_time(at(10, 0), &qh));
    }

    #[test]
    fn test_empty_window_never_quiet() {
        let qh = window("09:00", "09:00");
        assert!(!is_quiet_time(at(9, 0), &qh));
    }

    #[test]
    fn test_clock_time_parsing() {
        assert_eq!("7:05".parse::<ClockTime>().unwrap().to_string(), "07:05");
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("12:60".parse::<ClockTime>().is_err());
        assert!("noon".parse::<ClockTime>().is_err());
    }

    #[test]
    fn test_quiet_hours_serialize_as_strings() {
        let json = serde_json::to_string(&window("20:00", "08:00")).unwrap();
        assert_eq!(json, r#"{"enabled":true,"start":"20:00","end":"08:00"}"#);

        let bad: Result<QuietHours, _> =
            serde_json::from_str(r#"{"enabled":true,"start":"25:00","end":"08:00"}"#);
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn prop_wrapping_window_partitions_the_day(
            start in 1u16..1440,
            end_offset in 1u16..1439,
            probe in 0u32..1440,
        ) {
            // start > end guaranteed: end is strictly before start
            let end = (start + 1440 - end_offset.min(start)) % 1440;
            prop_assume!(start > end);
            let qh = QuietHours::window(
                ClockTime::new(start / 60, start % 60).unwrap(),
                ClockTime::new(end / 60, end % 60).unwrap(),
            );
            let now = at(probe / 60, probe % 60);
            let expected = probe as u16 >= start || probe as u16 <= end;
            prop_assert_eq!(is_quiet_time(now, &qh), expected);
            prop_assert_eq!(sending_allowed(now, &qh), !expected);
        }
    }
}
