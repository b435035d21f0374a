use std::{cmp::Ordering, fmt};

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

/// A typed scalar cell. Missing cells are represented as `None` by the
/// containers holding values, never as a variant here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Numeric view of the value. Booleans and text are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Date-time view of the value; text is parsed with the accepted formats.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => parse_temporal(s).ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|dt| dt.date())
    }

    /// Key used for equality-based grouping (duplicate detection, distinct
    /// counts). Integral floats collapse onto the matching integer.
    pub fn group_key(&self) -> String {
        match self {
            Value::Text(s) => format!("s:{s}"),
            Value::Boolean(b) => format!("b:{b}"),
            Value::Integer(_) | Value::Float(_) => format!("n:{}", self.as_display()),
            Value::Date(_) | Value::DateTime(_) => match self.as_datetime() {
                Some(dt) => format!("t:{}", dt.format("%Y-%m-%dT%H:%M:%S")),
                None => format!("t:{}", self.as_display()),
            },
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            other => Some(Value::Text(other.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Orders two optional cells for sorting; missing sorts first, temporal
/// values compare chronologically, numbers numerically, everything else by
/// display text.
pub fn compare_cells(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a.total_cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_datetime(), right.as_datetime()) {
        return a.cmp(&b);
    }
    left.as_display().cmp(&right.as_display())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    // Offsets as emitted by PostgREST (`2023-06-01T00:00:00+00:00`).
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_utc());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Accepts either a bare date or a date-time.
pub fn parse_temporal(value: &str) -> Result<NaiveDateTime> {
    if let Ok(date) = parse_naive_date(value) {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid midnight for '{value}'"));
    }
    parse_naive_datetime(value)
}

/// Snake-cases a column name (`"Total Unidades"` -> `total_unidades`).
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_snake_case()
}
