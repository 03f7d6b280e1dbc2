//! Time-of-day and weekday windows during which a strategy may fire.
//!
//! Times are wall-clock `HH:MM` values compared against the host's local
//! time. The timezone is carried as a label for display; it does not shift
//! the comparison.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::types::StrategyError;

pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// Activation window for a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// A disabled schedule never restricts the strategy.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, with = "hhmm")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm")]
    pub end_time: Option<NaiveTime>,
    /// ISO weekday numbers, Monday = 1 … Sunday = 7. Empty means every day.
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: None,
            end_time: None,
            days_of_week: BTreeSet::new(),
            timezone: default_timezone(),
        }
    }
}

impl Schedule {
    /// Schedule enabled between two times on the given weekdays.
    pub fn window(start: NaiveTime, end: NaiveTime, days: &[u8]) -> Self {
        Self {
            enabled: true,
            start_time: Some(start),
            end_time: Some(end),
            days_of_week: days.iter().copied().collect(),
            timezone: default_timezone(),
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if let Some(bad) = self.days_of_week.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(StrategyError::InvalidConfig(format!(
                "day of week must be 1-7, got {bad}"
            )));
        }
        if self.timezone.trim().is_empty() {
            return Err(StrategyError::InvalidConfig(
                "timezone must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the window admits the given local date-time.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        if !self.enabled {
            return true;
        }

        let weekday = now.weekday().number_from_monday() as u8;
        if !self.days_of_week.is_empty() && !self.days_of_week.contains(&weekday) {
            return false;
        }

        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                let t = now.time();
                if start <= end {
                    start <= t && t <= end
                } else {
                    // Window crosses midnight
                    t >= start || t <= end
                }
            }
            _ => true,
        }
    }

    /// Apply a partial update, leaving absent fields untouched.
    pub fn apply(&mut self, update: &ScheduleUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(start) = update.start_time {
            self.start_time = start;
        }
        if let Some(end) = update.end_time {
            self.end_time = end;
        }
        if let Some(days) = &update.days_of_week {
            self.days_of_week = days.clone();
        }
        if let Some(tz) = &update.timezone {
            self.timezone = tz.clone();
        }
    }
}

/// Partial schedule change used by bulk updates.
///
/// A time field that is absent is left alone; an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "hhmm::deserialize_patch")]
    pub start_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "hhmm::deserialize_patch")]
    pub end_time: Option<Option<NaiveTime>>,
    #[serde(default)]
    pub days_of_week: Option<BTreeSet<u8>>,
    #[serde(default)]
    pub timezone: Option<String>,
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// A named, ready-made schedule.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulePreset {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(flatten)]
    pub schedule: Schedule,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

const WEEKDAYS: &[u8] = &[1, 2, 3, 4, 5];
const ALL_DAYS: &[u8] = &[1, 2, 3, 4, 5, 6, 7];

pub fn presets() -> Vec<SchedulePreset> {
    vec![
        SchedulePreset {
            key: "business_hours",
            name: "Business hours",
            description: "Monday to Friday, 09:00 to 18:00",
            schedule: Schedule::window(hm(9, 0), hm(18, 0), WEEKDAYS),
        },
        SchedulePreset {
            key: "evening_only",
            name: "Evenings only",
            description: "Every day, 19:00 to 23:00",
            schedule: Schedule::window(hm(19, 0), hm(23, 0), ALL_DAYS),
        },
        SchedulePreset {
            key: "weekends_only",
            name: "Weekends only",
            description: "Saturday and Sunday, all day",
            schedule: Schedule::window(hm(0, 0), hm(23, 59), &[6, 7]),
        },
        SchedulePreset {
            key: "always_active",
            name: "Always active",
            description: "No time restrictions",
            schedule: Schedule::default(),
        },
        SchedulePreset {
            key: "custom_morning",
            name: "Mornings",
            description: "Monday to Friday, 06:00 to 12:00",
            schedule: Schedule::window(hm(6, 0), hm(12, 0), WEEKDAYS),
        },
        SchedulePreset {
            key: "night_shift",
            name: "Night shift",
            description: "Every day, 22:00 to 06:00",
            schedule: Schedule::window(hm(22, 0), hm(6, 0), ALL_DAYS),
        },
    ]
}

/// Look up a preset by key.
pub fn preset(key: &str) -> Option<SchedulePreset> {
    presets().into_iter().find(|p| p.key == key)
}

// ---------------------------------------------------------------------------
// HH:MM serde
// ---------------------------------------------------------------------------

mod hhmm {
    use super::*;
    use serde::Serializer;

    const FORMAT: &str = "%H:%M";

    fn parse<E: serde::de::Error>(s: &str) -> Result<NaiveTime, E> {
        NaiveTime::parse_from_str(s, FORMAT)
            .map_err(|e| E::custom(format!("invalid time '{s}' (expected HH:MM): {e}")))
    }

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&t.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) if !s.is_empty() => parse(&s).map(Some),
            _ => Ok(None),
        }
    }

    /// Present field maps to `Some`, so `null` becomes `Some(None)`.
    pub fn deserialize_patch<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Option<NaiveTime>>, D::Error> {
        deserialize(d).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    /// 2026-10-19 is a Monday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_disabled_is_always_active() {
        let mut schedule = Schedule::window(hm(9, 0), hm(10, 0), &[3]);
        schedule.enabled = false;
        assert!(schedule.is_active_at(at(19, 23, 0)));
    }

    #[test]
    fn test_business_hours() {
        let schedule = preset("business_hours").unwrap().schedule;
        assert!(schedule.is_active_at(at(19, 9, 0)));
        assert!(schedule.is_active_at(at(19, 18, 0)));
        assert!(!schedule.is_active_at(at(19, 18, 1)));
        assert!(!schedule.is_active_at(at(19, 8, 59)));
        // Saturday
        assert!(!schedule.is_active_at(at(24, 12, 0)));
    }

    #[test]
    fn test_window_crossing_midnight() {
        let schedule = preset("night_shift").unwrap().schedule;
        assert!(schedule.is_active_at(at(19, 23, 30)));
        assert!(schedule.is_active_at(at(20, 5, 59)));
        assert!(!schedule.is_active_at(at(20, 12, 0)));
    }

    #[test]
    fn test_weekdays_without_times() {
        let schedule = Schedule {
            enabled: true,
            days_of_week: [6, 7].into_iter().collect(),
            ..Schedule::default()
        };
        assert!(schedule.is_active_at(at(25, 3, 0)));
        assert!(!schedule.is_active_at(at(21, 3, 0)));
    }

    #[test]
    fn test_presets_complete() {
        let keys: Vec<&str> = presets().iter().map(|p| p.key).collect();
        assert_eq!(
            keys,
            vec![
                "business_hours",
                "evening_only",
                "weekends_only",
                "always_active",
                "custom_morning",
                "night_shift"
            ]
        );
        assert!(preset("lunch_break").is_none());
        assert!(!preset("always_active").unwrap().schedule.enabled);
    }

    #[test]
    fn test_serde_hhmm() {
        let schedule = Schedule::window(hm(9, 30), hm(18, 0), &[1]);
        let value = serde_json::to_value(&schedule).unwrap();
        assert_eq!(value["start_time"], "09:30");
        assert_eq!(value["end_time"], "18:00");
        assert_eq!(value["timezone"], DEFAULT_TIMEZONE);

        let back: Schedule = serde_json::from_value(value).unwrap();
        assert_eq!(back, schedule);
    }

    #[test]
    fn test_serde_rejects_bad_time() {
        let result: Result<Schedule, _> =
            serde_json::from_value(json!({ "enabled": true, "start_time": "25:99" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_days() {
        let mut schedule = Schedule::default();
        schedule.days_of_week.insert(8);
        assert!(matches!(
            schedule.validate(),
            Err(StrategyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_update() {
        let mut schedule = Schedule::window(hm(9, 0), hm(18, 0), WEEKDAYS);
        let update: ScheduleUpdate =
            serde_json::from_value(json!({ "end_time": null, "timezone": "UTC" })).unwrap();
        schedule.apply(&update);
        assert_eq!(schedule.start_time, Some(hm(9, 0)));
        assert_eq!(schedule.end_time, None);
        assert_eq!(schedule.timezone, "UTC");
        assert!(schedule.enabled);
    }
}
