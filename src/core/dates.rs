//! Calendar date helpers.
//!
//! Dates are stored as `YYYY-MM-DD` strings so that range filters can compare
//! them lexicographically without any timezone handling. These helpers convert
//! to `chrono::NaiveDate` only when arithmetic or formatting is needed.
//! Functions that depend on "today" take it as a parameter.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;

/// Storage format of calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Display formats for [`format_date`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDisplay {
    /// `dd/mm/yyyy`
    DayMonthYear,
    /// `dd/mm`
    DayMonth,
    /// `mm/yyyy`
    MonthYear,
    /// `yyyy-mm-dd`
    Iso,
}

/// Current UTC calendar date.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Current UTC calendar date as `YYYY-MM-DD`.
#[must_use]
pub fn today_string() -> String {
    to_date_string(today())
}

/// Formats a date in storage format.
#[must_use]
pub fn to_date_string(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a strict `YYYY-MM-DD` string, an RFC 3339 timestamp (reduced to its
/// UTC date) or a naive `YYYY-MM-DDTHH:MM:SS` timestamp.
#[must_use]
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.len() == 10 {
        if let Ok(date) = NaiveDate::parse_from_str(input, DATE_FORMAT) {
            return Some(date);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.date())
}

/// Parses an instant for ordering purposes. Plain dates are treated as
/// midnight UTC.
#[must_use]
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    parse_date(input).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|ts| ts.and_utc())
}

/// Normalizes any supported input to `YYYY-MM-DD`.
#[must_use]
pub fn normalize_date(input: &str) -> Option<String> {
    parse_date(input).map(to_date_string)
}

/// Whether the input can be understood as a date.
#[must_use]
pub fn is_valid_date(input: &str) -> bool {
    parse_date(input).is_some()
}

/// Formats a stored date for display.
#[must_use]
pub fn format_date(input: &str, display: DateDisplay) -> String {
    if input.trim().is_empty() {
        return "N/A".to_string();
    }
    let Some(date) = parse_date(input) else {
        return "Invalid date".to_string();
    };

    match display {
        DateDisplay::DayMonthYear => date.format("%d/%m/%Y").to_string(),
        DateDisplay::DayMonth => date.format("%d/%m").to_string(),
        DateDisplay::MonthYear => date.format("%m/%Y").to_string(),
        DateDisplay::Iso => to_date_string(date),
    }
}

/// Whole months from `from` to `to`; a month only counts once the day of
/// month has been reached. Negative when `to` is earlier.
#[must_use]
pub fn months_between(from: &str, to: NaiveDate) -> Option<i32> {
    let from = parse_date(from)?;
    let years = to.year() - from.year();
    let mut months = years * 12 + month_index(to) - month_index(from);
    if to.day() < from.day() {
        months -= 1;
    }
    Some(months)
}

fn month_index(date: NaiveDate) -> i32 {
    i32::try_from(date.month()).unwrap_or(0)
}

/// Age in whole months, never negative.
#[must_use]
pub fn age_in_months(birth_date: &str, today: NaiveDate) -> Option<u32> {
    months_between(birth_date, today).map(|m| u32::try_from(m.max(0)).unwrap_or(0))
}

/// Human-readable age, e.g. `"1 year and 2 months"`.
#[must_use]
pub fn describe_age(birth_date: &str, today: NaiveDate) -> String {
    if birth_date.trim().is_empty() {
        return "Unknown age".to_string();
    }
    let Some(months) = age_in_months(birth_date, today) else {
        return "Invalid birth date".to_string();
    };

    let plural = |n: u32, one: &str, many: &str| {
        if n == 1 {
            format!("{n} {one}")
        } else {
            format!("{n} {many}")
        }
    };

    if months < 12 {
        return plural(months, "month", "months");
    }

    let years = months / 12;
    let rest = months % 12;
    let mut result = plural(years, "year", "years");
    if rest > 0 {
        result.push_str(" and ");
        result.push_str(&plural(rest, "month", "months"));
    }
    result
}

/// Adds (or with a negative count, subtracts) days.
#[must_use]
pub fn add_days(date: &str, days: i64) -> Option<String> {
    let date = parse_date(date)?;
    let shifted = if days >= 0 {
        date.checked_add_days(chrono::Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(chrono::Days::new(days.unsigned_abs()))
    }?;
    Some(to_date_string(shifted))
}

/// Subtracts days.
#[must_use]
pub fn subtract_days(date: &str, days: i64) -> Option<String> {
    add_days(date, -days)
}

/// Days elapsed since `date` (negative for future dates).
#[must_use]
pub fn days_ago(date: &str, today: NaiveDate) -> Option<i64> {
    parse_date(date).map(|d| (today - d).num_days())
}

/// Days remaining until `date` (negative for past dates).
#[must_use]
pub fn days_until(date: &str, today: NaiveDate) -> Option<i64> {
    parse_date(date).map(|d| (d - today).num_days())
}

/// Whether the date is `today`.
#[must_use]
pub fn is_today(date: &str, today: NaiveDate) -> bool {
    parse_date(date) == Some(today)
}

/// Whether the date is before `today`.
#[must_use]
pub fn is_past(date: &str, today: NaiveDate) -> bool {
    days_ago(date, today).is_some_and(|d| d > 0)
}

/// Whether the date is after `today`.
#[must_use]
pub fn is_future(date: &str, today: NaiveDate) -> bool {
    days_until(date, today).is_some_and(|d| d > 0)
}

/// Orders two dates; unparseable input compares equal.
#[must_use]
pub fn compare_dates(a: &str, b: &str) -> Ordering {
    match (parse_date(a), parse_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

/// First and last day of a calendar month as `YYYY-MM-DD`.
#[must_use]
pub fn month_bounds(year: i32, month: u32) -> Option<(String, String)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((to_date_string(first), to_date_string(last)))
}
