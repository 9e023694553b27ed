//! Calendar date to storage key conversion.
//!
//! Day records live under a `YYYYMMDD` key. Keys are built from a naive
//! calendar date, so navigation is calendar-day arithmetic and never drifts
//! across DST transitions the way shifting by 86 400 seconds does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const KEY_LEN: usize = 8;

/// Canonical key identifying one calendar day in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Wrap a calendar date. Only years representable in four digits are accepted.
    pub fn new(date: NaiveDate) -> Result<Self> {
        if (0..=9999).contains(&date.year()) {
            Ok(Self(date))
        } else {
            Err(Error::InvalidInput(format!(
                "year {} does not fit a YYYYMMDD key",
                date.year()
            )))
        }
    }

    /// Build a key from year, month and day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            Error::InvalidInput(format!("{year:04}-{month:02}-{day:02} is not a calendar date"))
        })?;
        Self::new(date)
    }

    /// Resolve "the day" of a zoned instant using its own local calendar date.
    pub fn from_local<Tz: TimeZone>(instant: &DateTime<Tz>) -> Result<Self> {
        Self::new(instant.date_naive())
    }

    /// Today in the host's local time zone.
    pub fn today() -> Result<Self> {
        Self::from_local(&Local::now())
    }

    /// Parse a `YYYYMMDD` storage key.
    pub fn parse(key: &str) -> Result<Self> {
        if key.len() != KEY_LEN || !key.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "date key must be {KEY_LEN} digits (YYYYMMDD), got '{key}'"
            )));
        }

        let year = key[0..4]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid year in '{key}'")))?;
        let month = key[4..6]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid month in '{key}'")))?;
        let day = key[6..8]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid day in '{key}'")))?;
        Self::from_ymd(year, month, day)
    }

    /// The calendar date this key names.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// The `YYYYMMDD` storage key.
    #[must_use]
    pub fn as_storage_key(&self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }

    /// Header label shown above the day view, e.g. `2024 / 01 / 05`.
    #[must_use]
    pub fn display_label(&self) -> String {
        format!(
            "{:04} / {:02} / {:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }

    /// Shift by whole calendar days. `None` when the result leaves the key range.
    #[must_use]
    pub fn checked_add_days(&self, days: i64) -> Option<Self> {
        let magnitude = Days::new(days.unsigned_abs());
        let shifted = if days >= 0 {
            self.0.checked_add_days(magnitude)
        } else {
            self.0.checked_sub_days(magnitude)
        }?;
        Self::new(shifted).ok()
    }

    /// The following day, or `self` at the end of the key range.
    #[must_use]
    pub fn next(&self) -> Self {
        self.checked_add_days(1).unwrap_or(*self)
    }

    /// The preceding day, or `self` at the start of the key range.
    #[must_use]
    pub fn previous(&self) -> Self {
        self.checked_add_days(-1).unwrap_or(*self)
    }
}

impl TryFrom<NaiveDate> for DateKey {
    type Error = Error;

    fn try_from(date: NaiveDate) -> Result<Self> {
        Self::new(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_storage_key())
    }
}

impl FromStr for DateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_storage_key())
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Encode a calendar date as its `YYYYMMDD` storage key.
pub fn to_storage_key(date: NaiveDate) -> Result<String> {
    DateKey::new(date).map(|key| key.as_storage_key())
}

/// Shift a calendar date by `days`, rolling over months and years.
#[must_use]
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDateTime};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn storage_key_is_zero_padded() {
        assert_eq!(to_storage_key(date(2024, 1, 5)).unwrap(), "20240105");
        assert_eq!(to_storage_key(date(987, 12, 31)).unwrap(), "09871231");
    }

    #[test]
    fn storage_key_round_trips_for_every_day_of_a_leap_cycle() {
        let mut day = date(2023, 1, 1);
        while day < date(2025, 1, 1) {
            let key = DateKey::new(day).unwrap();
            let parsed = DateKey::parse(&key.as_storage_key()).unwrap();
            assert_eq!(parsed.date(), day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn storage_key_is_stable_across_calls() {
        let key = DateKey::from_ymd(2022, 2, 5).unwrap();
        assert_eq!(key.as_storage_key(), key.as_storage_key());
        assert_eq!(key.to_string(), "20220205");
    }

    #[test]
    fn parse_rejects_bad_keys() {
        assert!(DateKey::parse("2024015").is_err());
        assert!(DateKey::parse("2024-1-05").is_err());
        assert!(DateKey::parse("20240230").is_err());
        assert!(DateKey::parse("20241301").is_err());
        assert!(DateKey::parse("").is_err());
    }

    #[test]
    fn display_label_uses_calendar_year() {
        // 2024-12-30 already belongs to ISO week-year 2025.
        let key = DateKey::from_ymd(2024, 12, 30).unwrap();
        assert_eq!(key.display_label(), "2024 / 12 / 30");
        assert_eq!(key.as_storage_key(), "20241230");
    }

    #[test]
    fn add_days_rolls_over_month_and_year() {
        assert_eq!(add_days(date(2023, 12, 31), 1), Some(date(2024, 1, 1)));
        assert_eq!(add_days(date(2024, 3, 1), -1), Some(date(2024, 2, 29)));
        assert_eq!(add_days(date(2023, 3, 1), -1), Some(date(2023, 2, 28)));
        assert_eq!(add_days(date(2024, 1, 31), 30), Some(date(2024, 3, 1)));
    }

    #[test]
    fn navigation_across_dst_transitions_never_skips_a_day() {
        // US spring-forward and fall-back dates.
        let spring = DateKey::from_ymd(2024, 3, 10).unwrap();
        assert_eq!(spring.next(), DateKey::from_ymd(2024, 3, 11).unwrap());
        assert_eq!(spring.next().previous(), spring);

        let fall = DateKey::from_ymd(2024, 11, 3).unwrap();
        assert_eq!(fall.next(), DateKey::from_ymd(2024, 11, 4).unwrap());
        assert_eq!(fall.previous(), DateKey::from_ymd(2024, 11, 2).unwrap());
    }

    #[test]
    fn from_local_resolves_the_day_on_both_sides_of_new_york_transitions() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let edt = FixedOffset::west_opt(4 * 3600).unwrap();
        let utc = |raw: &str| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .unwrap()
                .and_utc()
        };

        // Spring forward: 02:00 EST jumps to 03:00 EDT on 2024-03-10.
        let before_jump = utc("2024-03-10 06:59:00").with_timezone(&est);
        let after_jump = utc("2024-03-10 07:01:00").with_timezone(&edt);
        let late_evening = utc("2024-03-10 04:30:00").with_timezone(&est);
        assert_eq!(DateKey::from_local(&before_jump).unwrap().to_string(), "20240310");
        assert_eq!(DateKey::from_local(&after_jump).unwrap().to_string(), "20240310");
        assert_eq!(DateKey::from_local(&late_evening).unwrap().to_string(), "20240309");

        // Fall back: 01:30 happens twice on 2024-11-03.
        let first_pass = utc("2024-11-03 05:30:00").with_timezone(&edt);
        let second_pass = utc("2024-11-03 06:30:00").with_timezone(&est);
        assert_eq!(first_pass.naive_local(), second_pass.naive_local());
        assert_eq!(DateKey::from_local(&first_pass).unwrap().to_string(), "20241103");
        assert_eq!(DateKey::from_local(&second_pass).unwrap().to_string(), "20241103");

        // Midnight of the 25-hour day plus 86 400 s is still that day on the
        // wall clock; calendar navigation moves to the next one.
        let midnight = utc("2024-11-03 04:00:00").with_timezone(&edt);
        let shifted = (midnight + chrono::Duration::seconds(86_400)).with_timezone(&est);
        let day = DateKey::from_local(&midnight).unwrap();
        assert_eq!(DateKey::from_local(&shifted).unwrap(), day);
        assert_eq!(day.next().to_string(), "20241104");
    }

    #[test]
    fn from_local_uses_the_zone_calendar_day() {
        let naive = NaiveDateTime::parse_from_str("2024-01-01 23:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        let instant = seoul.from_local_datetime(&naive).unwrap();
        assert_eq!(DateKey::from_local(&instant).unwrap().to_string(), "20240101");

        let utc_view = instant.with_timezone(&FixedOffset::east_opt(0).unwrap());
        assert_eq!(DateKey::from_local(&utc_view).unwrap().to_string(), "20240101");

        let late = seoul
            .from_local_datetime(
                &NaiveDateTime::parse_from_str("2024-01-02 08:30:00", "%Y-%m-%d %H:%M:%S")
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(DateKey::from_local(&late).unwrap().to_string(), "20240102");
        assert_eq!(
            DateKey::from_local(&late.with_timezone(&FixedOffset::east_opt(0).unwrap()))
                .unwrap()
                .to_string(),
            "20240101"
        );
    }

    #[test]
    fn serde_uses_the_storage_key() {
        let key = DateKey::from_ymd(2024, 7, 9).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"20240709\"");
        let back: DateKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
