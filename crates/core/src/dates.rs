use chrono::{NaiveDate, NaiveDateTime};

pub const ISO_FORMAT: &str = "%Y-%m-%d";
pub const BR_FORMAT: &str = "%d/%m/%Y";

// Two-digit years first: `%Y` would otherwise read `26` as year 26.
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%y", BR_FORMAT, "%d-%m-%Y", "%d.%m.%Y", ISO_FORMAT];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

/// Parses a spreadsheet date, reading ambiguous forms day-first.
pub fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for fmt in DAY_FIRST_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parses strict `dd/mm/yyyy`.
pub fn parse_br(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), BR_FORMAT).ok()
}

/// Parses strict `yyyy-mm-dd`.
pub fn parse_iso(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), ISO_FORMAT).ok()
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

pub fn to_br(date: NaiveDate) -> String {
    date.format(BR_FORMAT).to_string()
}

/// `dd/mm/yyyy` becomes `yyyy-mm-dd`; an ISO date passes through.
pub fn canonicalize(text: &str) -> Option<NaiveDate> {
    if text.contains('/') {
        parse_br(text)
    } else {
        parse_iso(text)
    }
}
