use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single non-null cell. Null cells are represented as `Option::None` by
/// the surrounding column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn display_cell(cell: Option<&Value>) -> String {
    cell.map(Value::as_display).unwrap_or_default()
}

/// ISO-style layouts that carry no day/month ambiguity.
pub const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

pub const MONTH_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
];

pub const MONTH_FIRST_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m/%d/%y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

pub const DAY_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

pub const DAY_FIRST_DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Parses `value` with one strftime layout, accepting both date-only and
/// date-time layouts. Date-only results land at midnight.
pub fn parse_with_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if format.contains("%H") {
        NaiveDateTime::parse_from_str(trimmed, format).ok()
    } else {
        NaiveDate::parse_from_str(trimmed, format)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    }
}

fn parse_rfc3339(value: &str) -> Option<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.naive_utc())
}

fn parse_any(value: &str, groups: &[&[&str]]) -> Option<NaiveDateTime> {
    groups
        .iter()
        .flat_map(|group| group.iter())
        .find_map(|format| parse_with_format(value, format))
}

pub fn parse_month_first(value: &str) -> Option<NaiveDateTime> {
    parse_rfc3339(value).or_else(|| {
        parse_any(
            value,
            &[
                ISO_DATETIME_FORMATS,
                ISO_DATE_FORMATS,
                MONTH_FIRST_DATETIME_FORMATS,
                MONTH_FIRST_DATE_FORMATS,
            ],
        )
    })
}

pub fn parse_day_first(value: &str) -> Option<NaiveDateTime> {
    parse_rfc3339(value).or_else(|| {
        parse_any(
            value,
            &[
                ISO_DATETIME_FORMATS,
                ISO_DATE_FORMATS,
                DAY_FIRST_DATETIME_FORMATS,
                DAY_FIRST_DATE_FORMATS,
            ],
        )
    })
}
