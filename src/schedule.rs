//! When to surface a tip automatically. Everything here is a pure function of
//! the persisted timestamps, the settings and the current time.
//!
//! Calendar days are always computed in local time.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Configured frequency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    EveryStartup,
    TwiceDaily,
    #[default]
    Daily,
    #[serde(rename = "every2days")]
    Every2Days,
    #[serde(rename = "every3days")]
    Every3Days,
    Weekly,
    /// At most once per local calendar day, however early.
    CalendarDay,
}

/// How a frequency class is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRule {
    Always,
    ElapsedHours(i64),
    SameDayGate,
}

impl Frequency {
    pub fn rule(self) -> TriggerRule {
        match self {
            Self::EveryStartup => TriggerRule::Always,
            Self::TwiceDaily => TriggerRule::ElapsedHours(12),
            Self::Daily => TriggerRule::ElapsedHours(24),
            Self::Every2Days => TriggerRule::ElapsedHours(48),
            Self::Every3Days => TriggerRule::ElapsedHours(72),
            Self::Weekly => TriggerRule::ElapsedHours(168),
            Self::CalendarDay => TriggerRule::SameDayGate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EveryStartup => "every startup",
            Self::TwiceDaily => "twice a day",
            Self::Daily => "daily",
            Self::Every2Days => "every 2 days",
            Self::Every3Days => "every 3 days",
            Self::Weekly => "weekly",
            Self::CalendarDay => "once per calendar day",
        }
    }
}

/// Inputs to the trigger decision, gathered from settings and preferences.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInput {
    pub frequency: Frequency,
    pub disabled: bool,
    pub not_before_hour: Option<u32>,
    pub last_shown_date: Option<NaiveDate>,
    pub last_shown_at: Option<DateTime<Utc>>,
}

/// Decides whether a tip should be shown at `now`. The disabled flag wins over
/// everything, then the hour gate, then the frequency rule.
pub fn should_trigger<Tz: TimeZone>(input: &TriggerInput, now: &DateTime<Tz>) -> bool {
    if input.disabled {
        return false;
    }
    if let Some(hour) = input.not_before_hour
        && now.hour() < hour
    {
        return false;
    }
    match input.frequency.rule() {
        TriggerRule::Always => true,
        TriggerRule::ElapsedHours(hours) => match input.last_shown_at {
            None => true,
            Some(last) => now.with_timezone(&Utc) - last >= chrono::Duration::hours(hours),
        },
        TriggerRule::SameDayGate => input.last_shown_date != Some(now.date_naive()),
    }
}

/// True when the calendar day has turned over since `last_shown`.
pub fn is_new_period(last_shown: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_shown != Some(today)
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 5, day, hour, 0, 0)
            .unwrap()
    }

    fn input(frequency: Frequency) -> TriggerInput {
        TriggerInput {
            frequency,
            disabled: false,
            not_before_hour: None,
            last_shown_date: None,
            last_shown_at: None,
        }
    }

    #[test]
    fn first_run_always_triggers() {
        for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::CalendarDay] {
            assert!(should_trigger(&input(frequency), &at(10, 8)));
        }
    }

    #[test]
    fn elapsed_hours_threshold() {
        let mut daily = input(Frequency::Daily);
        daily.last_shown_at = Some(at(10, 8).with_timezone(&Utc));
        assert!(!should_trigger(&daily, &at(11, 7)));
        assert!(should_trigger(&daily, &at(11, 8)));

        let mut twice = input(Frequency::TwiceDaily);
        twice.last_shown_at = Some(at(10, 8).with_timezone(&Utc));
        assert!(should_trigger(&twice, &at(10, 20)));
    }

    #[test]
    fn same_day_gate_uses_calendar_date() {
        let mut gate = input(Frequency::CalendarDay);
        gate.last_shown_date = Some(at(10, 23).date_naive());
        assert!(!should_trigger(&gate, &at(10, 23)));
        assert!(should_trigger(&gate, &at(11, 0)));
    }

    #[test]
    fn disabled_overrides_frequency() {
        let mut gate = input(Frequency::CalendarDay);
        gate.disabled = true;
        gate.last_shown_date = Some(at(10, 9).date_naive());
        assert!(!should_trigger(&gate, &at(10, 9)));

        let mut always = input(Frequency::EveryStartup);
        always.disabled = true;
        assert!(!should_trigger(&always, &at(10, 9)));
    }

    #[test]
    fn hour_gate_suppresses_early_starts() {
        let mut always = input(Frequency::EveryStartup);
        always.not_before_hour = Some(9);
        assert!(!should_trigger(&always, &at(10, 8)));
        assert!(should_trigger(&always, &at(10, 9)));
    }

    #[test]
    fn new_period_on_date_change() {
        let today = at(10, 12).date_naive();
        assert!(is_new_period(None, today));
        assert!(!is_new_period(Some(today), today));
        assert!(is_new_period(today.pred_opt(), today));
    }

    #[test]
    fn frequency_names_match_config_values() {
        let parsed: Frequency = serde_json::from_str("\"every2days\"").unwrap();
        assert_eq!(parsed, Frequency::Every2Days);
        let parsed: Frequency = serde_json::from_str("\"calendar-day\"").unwrap();
        assert_eq!(parsed.rule(), TriggerRule::SameDayGate);
        assert_eq!(serde_json::to_string(&Frequency::EveryStartup).unwrap(), "\"every-startup\"");
    }
}
