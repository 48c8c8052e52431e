// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Human time specifications ("now", "+2 hours", "2024-05-01 10:00").
//!
//! Every parse is anchored to a reference time. The public `to_*` helpers use
//! the current local time; the `*_at` variants take it explicitly so relative
//! specs stay deterministic under test.

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dt%H:%M:%S",
    "%Y-%m-%dt%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

pub fn to_timestamp(spec: &str) -> ApiResult<DateTime<Local>> {
    to_timestamp_at(spec, Local::now())
}

pub fn to_duration(spec: &str) -> ApiResult<TimeDelta> {
    to_duration_at(spec, Local::now())
}

pub fn to_timestamp_at(spec: &str, reference: DateTime<Local>) -> ApiResult<DateTime<Local>> {
    parse(spec, reference).ok_or_else(|| ApiError::InvalidTimespec(spec.to_string()))
}

/// The span between `reference` and the point `spec` names.
pub fn to_duration_at(spec: &str, reference: DateTime<Local>) -> ApiResult<TimeDelta> {
    Ok(to_timestamp_at(spec, reference)? - reference)
}

fn parse(spec: &str, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    let trimmed = spec.trim();
    let normalized = trimmed.to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }

    match normalized.as_str() {
        "now" => return Some(reference),
        "today" => return midnight(reference.date_naive()),
        "tomorrow" => return midnight(reference.date_naive().succ_opt()?),
        "yesterday" => return midnight(reference.date_naive().pred_opt()?),
        _ => {}
    }

    if let Some(epoch) = normalized.strip_prefix('@') {
        let secs: i64 = epoch.parse().ok()?;
        return Local.timestamp_opt(secs, 0).single();
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Local));
    }

    if let Some(absolute) = absolute(&normalized, reference) {
        return Some(absolute);
    }

    relative(&normalized).and_then(|offset| reference.checked_add_signed(offset))
}

fn absolute(spec: &str, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(spec, format) {
            return local(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(spec, "%Y-%m-%d") {
        return midnight(date);
    }
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(spec, format) {
            return local(reference.date_naive().and_time(time));
        }
    }
    None
}

fn relative(spec: &str) -> Option<TimeDelta> {
    let (negative, rest) = if let Some(rest) = spec.strip_prefix('+') {
        (false, rest)
    } else if let Some(rest) = spec.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = spec.strip_prefix("in ") {
        (false, rest)
    } else {
        (false, spec)
    };

    let (negative, rest) = if let Some(rest) = rest.strip_suffix(" ago") {
        (!negative, rest)
    } else if let Some(rest) = rest.strip_suffix(" from now") {
        (negative, rest)
    } else {
        (negative, rest)
    };

    let tokens = tokenize(rest);
    if tokens.is_empty() {
        return None;
    }

    let mut total = TimeDelta::zero();
    let mut iter = tokens.iter();
    while let Some(amount) = iter.next() {
        let amount: i64 = match amount.as_str() {
            "a" | "an" => 1,
            digits => digits.parse().ok()?,
        };
        let unit = unit_seconds(iter.next()?)?;
        let term = TimeDelta::try_seconds(amount.checked_mul(unit)?)?;
        total = total.checked_add(&term)?;
    }

    Some(if negative { -total } else { total })
}

/// Splits "1 day, 2h30m" into ["1", "day", "2", "h", "30", "m"].
fn tokenize(spec: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in spec.split(|c: char| c.is_whitespace() || c == ',') {
        if word.is_empty() || word == "and" {
            continue;
        }
        let mut current = String::new();
        let mut in_digits: Option<bool> = None;
        for ch in word.chars() {
            let digit = ch.is_ascii_digit();
            if in_digits.is_some_and(|prev| prev != digit) {
                tokens.push(std::mem::take(&mut current));
            }
            in_digits = Some(digit);
            current.push(ch);
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(3_600),
        "d" | "day" | "days" => Some(86_400),
        "w" | "week" | "weeks" => Some(604_800),
        _ => None,
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    local(date.and_time(NaiveTime::MIN))
}

// Nonexistent local times (DST gaps) are rejected; ambiguous ones take the
// earlier instant.
fn local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    in_zone(&Local, naive)
}

fn in_zone<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    zone.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult};

    fn reference() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn now_is_the_reference() {
        assert_eq!(to_timestamp_at("now", reference()).unwrap(), reference());
        assert_eq!(to_timestamp_at("  NOW ", reference()).unwrap(), reference());
        assert_eq!(to_duration_at("now", reference()).unwrap(), TimeDelta::zero());
    }

    #[test]
    fn relative_offsets() {
        let r = reference();
        assert_eq!(
            to_timestamp_at("+2 hours", r).unwrap(),
            r + TimeDelta::hours(2)
        );
        assert_eq!(
            to_timestamp_at("-30 min", r).unwrap(),
            r - TimeDelta::minutes(30)
        );
        assert_eq!(
            to_timestamp_at("in 3 days", r).unwrap(),
            r + TimeDelta::days(3)
        );
        assert_eq!(
            to_timestamp_at("1 week ago", r).unwrap(),
            r - TimeDelta::weeks(1)
        );
        assert_eq!(
            to_timestamp_at("an hour from now", r).unwrap(),
            r + TimeDelta::hours(1)
        );
    }

    #[test]
    fn compound_and_compact_offsets() {
        let r = reference();
        assert_eq!(
            to_duration_at("1 day, 2 hours and 5 minutes", r).unwrap(),
            TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::minutes(5)
        );
        assert_eq!(
            to_duration_at("2h30m", r).unwrap(),
            TimeDelta::minutes(150)
        );
        assert_eq!(to_duration_at("90s", r).unwrap().num_seconds(), 90);
    }

    #[test]
    fn ten_minutes_is_six_hundred_seconds() {
        assert_eq!(
            to_duration_at("+10 minutes", reference())
                .unwrap()
                .num_seconds(),
            600
        );
    }

    #[test]
    fn named_days_resolve_to_midnight() {
        let r = reference();
        assert_eq!(to_timestamp_at("today", r).unwrap(), at(2024, 3, 14, 0, 0, 0));
        assert_eq!(
            to_timestamp_at("Tomorrow", r).unwrap(),
            at(2024, 3, 15, 0, 0, 0)
        );
        assert_eq!(
            to_timestamp_at("yesterday", r).unwrap(),
            at(2024, 3, 13, 0, 0, 0)
        );
    }

    #[test]
    fn calendar_dates_and_times() {
        let r = reference();
        assert_eq!(
            to_timestamp_at("2024-05-01 10:00", r).unwrap(),
            at(2024, 5, 1, 10, 0, 0)
        );
        assert_eq!(
            to_timestamp_at("2024-05-01T10:00:30", r).unwrap(),
            at(2024, 5, 1, 10, 0, 30)
        );
        assert_eq!(
            to_timestamp_at("2024-05-01", r).unwrap(),
            at(2024, 5, 1, 0, 0, 0)
        );
        assert_eq!(
            to_timestamp_at("18:30", r).unwrap(),
            at(2024, 3, 14, 18, 30, 0)
        );
    }

    #[test]
    fn rfc3339_and_epoch() {
        let r = reference();
        assert_eq!(
            to_timestamp_at("2024-05-01T10:00:00Z", r)
                .unwrap()
                .timestamp(),
            1_714_557_600
        );
        assert_eq!(
            to_timestamp_at("@1714557600", r).unwrap().timestamp(),
            1_714_557_600
        );
    }

    #[test]
    fn rejects_gibberish() {
        let r = reference();
        for spec in ["", "soon", "30", "+2 fortnights", "2 hours hours", "@abc"] {
            let err = to_timestamp_at(spec, r).unwrap_err();
            assert!(
                matches!(err, ApiError::InvalidTimespec(ref s) if s == spec),
                "unexpected result for {spec:?}: {err}"
            );
        }
    }

    /// CET/CEST with a single switch: clocks jump from 02:00 to 03:00 on
    /// 2024-03-31 and fall back from 03:00 to 02:00 on 2024-10-27.
    #[derive(Clone, Copy, Debug)]
    struct Berlin2024;

    impl Berlin2024 {
        fn cet() -> FixedOffset {
            FixedOffset::east_opt(3_600).unwrap()
        }

        fn cest() -> FixedOffset {
            FixedOffset::east_opt(7_200).unwrap()
        }

        fn on(date: NaiveDate, hour: u32) -> NaiveDateTime {
            date.and_hms_opt(hour, 0, 0).unwrap()
        }
    }

    impl TimeZone for Berlin2024 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Berlin2024
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let spring = Self::on(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 2);
            let autumn = Self::on(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap(), 2);
            let hour = TimeDelta::hours(1);
            if *local < spring || *local >= autumn + hour {
                LocalResult::Single(Self::cet())
            } else if *local < spring + hour {
                LocalResult::None
            } else if *local < autumn {
                LocalResult::Single(Self::cest())
            } else {
                LocalResult::Ambiguous(Self::cest(), Self::cet())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let spring = Self::on(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 1);
            let autumn = Self::on(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap(), 1);
            if *utc >= spring && *utc < autumn {
                Self::cest()
            } else {
                Self::cet()
            }
        }
    }

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn times_inside_a_dst_gap_do_not_exist() {
        assert!(in_zone(&Berlin2024, naive("2024-03-31 02:30")).is_none());
        assert_eq!(
            in_zone(&Berlin2024, naive("2024-03-31 03:30"))
                .unwrap()
                .timestamp(),
            1_711_848_600
        );
    }

    #[test]
    fn repeated_times_take_the_earlier_instant() {
        let resolved = in_zone(&Berlin2024, naive("2024-10-27 02:30")).unwrap();
        assert_eq!(resolved.offset(), &Berlin2024::cest());
        assert_eq!(resolved.timestamp(), 1_729_989_000);
    }

    #[test]
    fn overflowing_offsets_are_invalid() {
        let err = to_duration_at("+99999999999999999 weeks", reference()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidTimespec(_)));
    }
}
