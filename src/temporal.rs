//! Parsing for the temporal literal constructors (§4.3's "temporal literal
//! parsing errors produce Null silently — the constructor itself is total").
//!
//! Grounded on the teacher's `temporal_parse.rs`: lenient, hand-rolled
//! parsing of ISO-8601-shaped strings rather than a general-purpose ISO
//! library, since FEEL's temporal literals are a narrow, fixed subset.

use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::value::Value;

pub fn parse_date(input: &str) -> Option<Value> {
    let s = input.trim();
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Value::Date(date))
}

pub fn parse_time(input: &str) -> Option<Value> {
    let s = input.trim();
    let (time_part, offset) = split_timezone(s);
    let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M:%S"))
        .ok()?;
    match offset {
        Some(off) => Some(Value::ZonedTime(time, off)),
        None => Some(Value::LocalTime(time)),
    }
}

pub fn parse_date_and_time(input: &str) -> Option<Value> {
    let s = input.trim();
    let (date_part, rest) = s.split_once('T')?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    let (time_part, offset) = split_timezone(rest);
    let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M:%S"))
        .ok()?;
    let naive = NaiveDateTime::new(date, time);
    match offset {
        Some(off) => {
            let dt = off.from_local_datetime(&naive).single()?;
            Some(Value::ZonedDateTime(dt))
        }
        None => Some(Value::LocalDateTime(naive)),
    }
}

fn split_timezone(rest: &str) -> (&str, Option<FixedOffset>) {
    if let Some(stripped) = rest.strip_suffix('Z') {
        return (stripped, Some(FixedOffset::east_opt(0).unwrap()));
    }
    if let Some(pos) = rest.rfind(['+', '-']) {
        // Guard against matching the '-' in a date-only remainder; a
        // timezone suffix always looks like [+-]HH:MM.
        let (time, tz) = rest.split_at(pos);
        if tz.len() >= 5 {
            let sign = if tz.starts_with('-') { -1 } else { 1 };
            let digits: String = tz.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() >= 4 {
                let hours: i32 = digits[0..2].parse().ok().unwrap_or(0);
                let minutes: i32 = digits[2..4].parse().ok().unwrap_or(0);
                let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60));
                if let Some(offset) = offset {
                    return (time, Some(offset));
                }
            }
        }
    }
    (rest, None)
}

/// Parse an ISO-8601 duration string as either a year-month or a
/// day-time duration, per which components are present (§3.1 distinguishes
/// the two families for comparison purposes).
pub fn parse_duration(input: &str) -> Option<Value> {
    let s = input.trim();
    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s),
    };
    let s = s.strip_prefix('P')?;
    let (date_part, time_part) = match s.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (s, None),
    };

    let (years, months, days) = parse_date_components(date_part)?;
    let (hours, minutes, seconds) = match time_part {
        Some(t) => parse_time_components(t)?,
        None => (0, 0, 0.0),
    };

    let is_year_month = years != 0 || months != 0;
    let is_day_time = days != 0 || hours != 0 || minutes != 0 || seconds != 0.0;

    if is_year_month && is_day_time {
        return None;
    }
    if is_year_month {
        let total_months = sign * (years * 12 + months);
        Some(Value::YearMonthDuration(total_months))
    } else {
        let nanos = (seconds.fract() * 1_000_000_000.0).round() as i64;
        let whole_secs = seconds.trunc() as i64;
        let total = ChronoDuration::days(days)
            + ChronoDuration::hours(hours)
            + ChronoDuration::minutes(minutes)
            + ChronoDuration::seconds(whole_secs)
            + ChronoDuration::nanoseconds(nanos);
        Some(Value::DayTimeDuration(total * sign as i32))
    }
}

fn parse_date_components(s: &str) -> Option<(i64, i64, i64)> {
    let mut years = 0i64;
    let mut months = 0i64;
    let mut days = 0i64;
    let mut num = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let n: i64 = if num.is_empty() { 0 } else { num.parse().ok()? };
        num.clear();
        match c {
            'Y' => years = n,
            'M' => months = n,
            'D' => days = n,
            _ => return None,
        }
    }
    if !num.is_empty() {
        return None;
    }
    Some((years, months, days))
}

fn parse_time_components(s: &str) -> Option<(i64, i64, f64)> {
    let mut hours = 0i64;
    let mut minutes = 0i64;
    let mut seconds = 0f64;
    let mut num = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            num.push(c);
            continue;
        }
        match c {
            'H' => {
                hours = num.parse().ok()?;
                num.clear();
            }
            'M' => {
                minutes = num.parse().ok()?;
                num.clear();
            }
            'S' => {
                seconds = num.parse().ok()?;
                num.clear();
            }
            _ => return None,
        }
    }
    if !num.is_empty() {
        return None;
    }
    Some((hours, minutes, seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_date() {
        assert!(matches!(parse_date("2012-12-25"), Some(Value::Date(_))));
    }

    #[test]
    fn parses_zoned_and_local_date_time() {
        assert!(matches!(parse_date_and_time("2023-10-06T10:00:00"), Some(Value::LocalDateTime(_))));
        assert!(matches!(parse_date_and_time("2023-10-06T10:00:00+02:00"), Some(Value::ZonedDateTime(_))));
        assert!(matches!(parse_date_and_time("2023-10-06T10:00:00Z"), Some(Value::ZonedDateTime(_))));
    }

    #[test]
    fn distinguishes_duration_families() {
        match parse_duration("P1D") {
            Some(Value::DayTimeDuration(d)) => assert_eq!(d.num_days(), 1),
            other => panic!("unexpected: {other:?}"),
        }
        match parse_duration("P1M") {
            Some(Value::YearMonthDuration(m)) => assert_eq!(m, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date("not-a-date").is_none());
        assert!(parse_duration("garbage").is_none());
    }
}
