// src/thai_date.rs

//! Thai display formatting for dates and ages.
//!
//! Display helpers never fail: unparseable input comes back unchanged and a
//! missing value renders as `-`.

use chrono::{Datelike, NaiveDate};

pub const THAI_SHORT_MONTHS: [&str; 12] = [
    "ม.ค.", "ก.พ.", "มี.ค.", "เม.ย.", "พ.ค.", "มิ.ย.", "ก.ค.", "ส.ค.", "ก.ย.", "ต.ค.", "พ.ย.", "ธ.ค.",
];

const BUDDHIST_ERA_OFFSET: i32 = 543;

pub const PLACEHOLDER: &str = "-";

/// Parse `YYYY-MM-DD`, optionally followed by a time part (`T..` or ` ..`).
pub fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    let head = s.get(..10)?;
    match s.as_bytes().get(10) {
        None | Some(b'T') | Some(b' ') => {}
        Some(_) => return None,
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// `2025-12-04` -> `4 ธ.ค. 68`.
pub fn thai_short_date(date: NaiveDate) -> String {
    let month = THAI_SHORT_MONTHS[date.month0() as usize];
    let be_year = date.year() + BUDDHIST_ERA_OFFSET;
    format!("{} {} {:02}", date.day(), month, be_year.rem_euclid(100))
}

pub fn format_thai_date(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return PLACEHOLDER.to_string();
    }

    if let Some(date) = parse_iso_date(s) {
        return thai_short_date(date);
    }

    if let Some(shortened) = shorten_thai_year(s) {
        return shortened;
    }

    input.to_string()
}

pub fn format_thai_date_opt(input: Option<&str>) -> String {
    input.map(format_thai_date).unwrap_or_else(|| PLACEHOLDER.to_string())
}

// Already formatted as `D <month> YYYY|YY`; only the 4-digit year changes.
fn shorten_thai_year(s: &str) -> Option<String> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    let day_ok = !day.is_empty() && day.len() <= 2 && day.chars().all(|c| c.is_ascii_digit());
    if !day_ok || !THAI_SHORT_MONTHS.contains(month) {
        return None;
    }
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match year.len() {
        2 => Some(s.to_string()),
        4 => Some(format!("{day} {month} {}", &year[2..])),
        _ => None,
    }
}

/// Age as displayed on patient cards: whole years, or whole months under a year.
pub fn calculate_age(dob: &str, reference: NaiveDate) -> String {
    let Some(dob) = parse_iso_date(dob) else {
        return PLACEHOLDER.to_string();
    };

    match reference.years_since(dob) {
        None => "0 เดือน".to_string(),
        Some(years) if years > 0 => format!("{years} ปี"),
        Some(_) => format!("{} เดือน", months_between(dob, reference)),
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}
