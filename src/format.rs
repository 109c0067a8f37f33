//! Human-readable size and date formatting.
//!
//! Sizes use binary-prefix tiers with the unit labels taken from the server
//! configuration. Dates go through a PHP-`date()`-compatible token formatter
//! so the two configurable format strings look the way operators of the
//! classic PHP indexers expect.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

const FALLBACK_UNIT: &str = " B";

/// Formats a byte count using the configured unit labels.
///
/// The value is divided by 1024 while it remains >= 1024; the number of
/// divisions selects the unit. The first two tiers print without decimals,
/// higher tiers with two, and nonzero values are floored at 0.1 so tiny
/// amounts never display as "0.00". Zero is special-cased.
pub fn readable_size(units: &[String], bytes: u64) -> String {
    let unit_at = |tier: usize| units.get(tier).map(String::as_str).unwrap_or(FALLBACK_UNIT);

    if bytes == 0 {
        return format!("0.00{}", unit_at(0));
    }

    let mut value = bytes as f64;
    let mut tier = 0;

    while value >= 1024.0 && tier + 1 < units.len().max(1) {
        value /= 1024.0;
        tier += 1;
    }

    let value = value.max(0.1);

    if tier < 2 {
        format!("{:.0}{}", value, unit_at(tier))
    } else {
        format!("{:.2}{}", value, unit_at(tier))
    }
}

/// Applies a client timezone offset to a unix timestamp.
///
/// The sign convention follows `Date.getTimezoneOffset()`: a positive offset
/// lies west of UTC and is subtracted, a negative offset is added.
pub fn offset_timestamp(offset_seconds: i64, timestamp: i64) -> i64 {
    if offset_seconds > 0 {
        timestamp - offset_seconds.abs()
    } else {
        timestamp + offset_seconds.abs()
    }
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1);
    match (first, next) {
        (Some(a), Some(b)) => b.signed_duration_since(a).num_days() as u32,
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Formats a unix timestamp (UTC) through a PHP-`date()`-style format string.
///
/// Supported tokens: `d j D l N w z W F m M n t L Y y a A g G h H i s U`.
/// A backslash escapes the following character; anything else passes through
/// literally.
pub fn format_date(format: &str, timestamp: i64) -> String {
    let dt: DateTime<Utc> =
        DateTime::from_timestamp(timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH);

    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();

    while let Some(token) = chars.next() {
        match token {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            'd' => out.push_str(&format!("{:02}", dt.day())),
            'j' => out.push_str(&dt.day().to_string()),
            'D' => out.push_str(&DAYS[dt.weekday().num_days_from_monday() as usize][..3]),
            'l' => out.push_str(DAYS[dt.weekday().num_days_from_monday() as usize]),
            'N' => out.push_str(&dt.weekday().number_from_monday().to_string()),
            'w' => out.push_str(&dt.weekday().num_days_from_sunday().to_string()),
            'z' => out.push_str(&dt.ordinal0().to_string()),
            'W' => out.push_str(&format!("{:02}", dt.iso_week().week())),
            'F' => out.push_str(MONTHS[dt.month0() as usize]),
            'm' => out.push_str(&format!("{:02}", dt.month())),
            'M' => out.push_str(&MONTHS[dt.month0() as usize][..3]),
            'n' => out.push_str(&dt.month().to_string()),
            't' => out.push_str(&days_in_month(dt.year(), dt.month()).to_string()),
            'L' => out.push(if is_leap_year(dt.year()) { '1' } else { '0' }),
            'Y' => out.push_str(&dt.year().to_string()),
            'y' => out.push_str(&format!("{:02}", dt.year().rem_euclid(100))),
            'a' => out.push_str(if dt.hour() < 12 { "am" } else { "pm" }),
            'A' => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            'g' => out.push_str(&dt.hour12().1.to_string()),
            'G' => out.push_str(&dt.hour().to_string()),
            'h' => out.push_str(&format!("{:02}", dt.hour12().1)),
            'H' => out.push_str(&format!("{:02}", dt.hour())),
            'i' => out.push_str(&format!("{:02}", dt.minute())),
            's' => out.push_str(&format!("{:02}", dt.second())),
            'U' => out.push_str(&dt.timestamp().to_string()),
            other => out.push(other),
        }
    }

    out
}
