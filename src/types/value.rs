//! Typed values and text parsing
//!
//! Converts the textual form of a value into a [`DbValue`] according to its
//! [`TypeCategory`]. `Display` on [`DbValue`] renders a form the parser
//! accepts back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{RuntimeType, TypeCategory};
use crate::error::{DbMetaError, Result};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const SECONDS_PER_DAY: i64 = 86_400;

/// A value parsed from text
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL or empty input
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    /// Character data and opaque passthrough (json, xml, enum, set, UDT)
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    /// Timestamp without time zone
    DateTime(NaiveDateTime),
    /// Timestamp with offset
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time of day or interval
    Time(TimeDelta),
    Array(Vec<DbValue>),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Runtime type of this value, `None` for NULL and empty arrays
    pub fn runtime_type(&self) -> Option<RuntimeType> {
        let runtime_type = match self {
            DbValue::Null => return None,
            DbValue::Bool(_) => RuntimeType::Bool,
            DbValue::I16(_) => RuntimeType::I16,
            DbValue::I32(_) => RuntimeType::I32,
            DbValue::I64(_) => RuntimeType::I64,
            DbValue::F32(_) => RuntimeType::F32,
            DbValue::F64(_) => RuntimeType::F64,
            DbValue::Decimal(_) => RuntimeType::Decimal,
            DbValue::Text(_) => RuntimeType::String,
            DbValue::Bytes(_) => RuntimeType::Bytes,
            DbValue::Uuid(_) => RuntimeType::Uuid,
            DbValue::Date(_) => RuntimeType::Date,
            DbValue::DateTime(_) => RuntimeType::DateTime,
            DbValue::DateTimeOffset(_) => RuntimeType::DateTimeOffset,
            DbValue::Time(_) => RuntimeType::Duration,
            DbValue::Array(items) => {
                let element = items.iter().find_map(DbValue::runtime_type)?;
                RuntimeType::Array(Box::new(element))
            }
        };
        Some(runtime_type)
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbValue::Null => Ok(()),
            DbValue::Bool(v) => write!(f, "{}", v),
            DbValue::I16(v) => write!(f, "{}", v),
            DbValue::I32(v) => write!(f, "{}", v),
            DbValue::I64(v) => write!(f, "{}", v),
            DbValue::F32(v) => write!(f, "{}", v),
            DbValue::F64(v) => write!(f, "{}", v),
            DbValue::Decimal(v) => write!(f, "{}", v),
            DbValue::Text(v) => write!(f, "{}", v),
            DbValue::Bytes(v) => write!(f, "{}", hex::encode_upper(v)),
            DbValue::Uuid(v) => write!(f, "{}", v),
            DbValue::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            DbValue::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMATS[0])),
            DbValue::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            DbValue::Time(v) => write!(f, "{}", format_duration(*v)),
            DbValue::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Parse text for a category; `None` and `""` yield [`DbValue::Null`]
pub fn parse_value(category: TypeCategory, text: Option<&str>) -> Result<DbValue> {
    parse_text(category, &category.to_string(), text)
}

/// Parse text for a raw type name, failing on unrecognized types
pub fn parse_raw_value(raw_type: &str, text: Option<&str>) -> Result<DbValue> {
    let category = TypeCategory::from_raw(raw_type)?;
    parse_text(category, raw_type, text)
}

/// Parse an array literal such as `{1,2,3}` element by element
///
/// Quoted or escaped separators inside elements are not supported.
pub fn parse_array(element_type: &str, text: &str, separator: char) -> Result<Vec<DbValue>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(trimmed);

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(separator)
        .map(|element| parse_raw_value(element_type, Some(element)))
        .collect()
}

/// Decode a hexadecimal string into bytes
pub fn parse_hexadecimal(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(DbMetaError::MalformedHex(format!(
            "'{}' must have an even number of characters",
            text
        )));
    }
    hex::decode(text).map_err(|e| DbMetaError::MalformedHex(format!("'{}': {}", text, e)))
}

fn parse_text(category: TypeCategory, type_name: &str, text: Option<&str>) -> Result<DbValue> {
    let raw = match text {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(DbValue::Null),
    };
    let value = raw.trim();
    let err = |reason: &dyn fmt::Display| DbMetaError::parse(type_name, raw, reason);

    let parsed = match category {
        TypeCategory::SmallInteger => DbValue::I16(value.parse::<i16>().map_err(|e| err(&e))?),
        TypeCategory::StandardInteger => DbValue::I32(value.parse::<i32>().map_err(|e| err(&e))?),
        TypeCategory::LargeInteger => DbValue::I64(value.parse::<i64>().map_err(|e| err(&e))?),
        TypeCategory::SinglePrecisionFloat => DbValue::F32(value.parse::<f32>().map_err(|e| err(&e))?),
        TypeCategory::DoublePrecisionFloat => DbValue::F64(value.parse::<f64>().map_err(|e| err(&e))?),
        TypeCategory::Decimal => DbValue::Decimal(
            Decimal::from_str(value)
                .or_else(|_| Decimal::from_scientific(value))
                .map_err(|e| err(&e))?,
        ),
        TypeCategory::Date => DbValue::Date(
            NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| err(&e))?,
        ),
        TypeCategory::DateTime => DbValue::DateTime(parse_datetime(value).ok_or_else(|| {
            err(&"expected YYYY-MM-DD[ HH:MM:SS[.f]]")
        })?),
        TypeCategory::DateTimeOffset => {
            DbValue::DateTimeOffset(parse_datetime_offset(value).ok_or_else(|| {
                err(&"expected an RFC 3339 timestamp or YYYY-MM-DD HH:MM:SS[.f]+HH[:MM]")
            })?)
        }
        TypeCategory::Time => DbValue::Time(
            parse_duration(value).ok_or_else(|| err(&"expected [-][N days ]HH:MM[:SS[.f]]"))?,
        ),
        TypeCategory::Boolean => DbValue::Bool(parse_bool(value).ok_or_else(|| {
            err(&"expected true/false, t/f, 1/0 or yes/no")
        })?),
        TypeCategory::UniqueIdentifier => {
            DbValue::Uuid(Uuid::parse_str(value).map_err(|e| err(&e))?)
        }
        TypeCategory::Binary => {
            let digits = value
                .strip_prefix("\\x")
                .or_else(|| value.strip_prefix("0x"))
                .or_else(|| value.strip_prefix("0X"))
                .unwrap_or(value);
            DbValue::Bytes(parse_hexadecimal(digits)?)
        }
        TypeCategory::Character
        | TypeCategory::Json
        | TypeCategory::Xml
        | TypeCategory::Enumerated
        | TypeCategory::Set
        | TypeCategory::UserDefined => DbValue::Text(raw.to_string()),
    };
    Ok(parsed)
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_datetime_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z").ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// `[-][N day[s] ]HH:MM[:SS[.f]]`, a bare `N day[s]` is also accepted
fn parse_duration(value: &str) -> Option<TimeDelta> {
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, value),
    };

    let mut total = TimeDelta::zero();
    let mut clock = rest;

    if let Some((count, tail)) = rest.split_once(' ') {
        let tail = tail.trim_start();
        let after_unit = tail
            .strip_prefix("days")
            .or_else(|| tail.strip_prefix("day"));
        if let Some(after_unit) = after_unit {
            total = TimeDelta::try_days(count.parse::<i64>().ok()?)?;
            clock = after_unit.trim();
        }
    }

    if !clock.is_empty() {
        let clock = strip_zone_offset(clock)?;
        let mut parts = clock.split(':');
        let hours: i64 = parts.next()?.parse().ok()?;
        let minutes: i64 = parts.next()?.parse().ok()?;
        let (seconds, nanos) = match parts.next() {
            Some(seconds) => parse_seconds(seconds)?,
            None => (0, 0),
        };
        if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
            return None;
        }
        total = total
            .checked_add(&TimeDelta::try_hours(hours)?)?
            .checked_add(&TimeDelta::try_minutes(minutes)?)?
            .checked_add(&TimeDelta::try_seconds(seconds)?)?
            .checked_add(&TimeDelta::nanoseconds(nanos))?;
    }

    Some(if negative { -total } else { total })
}

/// Drop a trailing `Z` or `[+-]HH[:MM]` offset from `time with time zone` text
fn strip_zone_offset(clock: &str) -> Option<&str> {
    let clock = clock.strip_suffix(['Z', 'z']).unwrap_or(clock);
    let Some(index) = clock.rfind(['+', '-']) else {
        return Some(clock);
    };
    // the offset may only follow a complete HH:MM
    let (time, offset) = clock.split_at(index);
    if !time.contains(':') {
        return None;
    }
    let offset = &offset[1..];
    let (hours, minutes) = offset.split_once(':').unwrap_or((offset, "00"));
    let valid = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !valid(hours) || !valid(minutes) {
        return None;
    }
    Some(time)
}

fn parse_seconds(text: &str) -> Option<(i64, i64)> {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty()
                || fraction.len() > 9
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let padded = format!("{:0<9}", fraction);
            Some((whole.parse().ok()?, padded.parse().ok()?))
        }
        None => Some((text.parse().ok()?, 0)),
    }
}

fn format_duration(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let delta = delta.abs();
    let total_seconds = delta.num_seconds();
    let nanos = delta.subsec_nanos();

    let days = total_seconds / SECONDS_PER_DAY;
    let remainder = total_seconds % SECONDS_PER_DAY;
    let clock = format!(
        "{:02}:{:02}:{:02}",
        remainder / 3600,
        (remainder % 3600) / 60,
        remainder % 60
    );

    let mut text = String::new();
    if negative {
        text.push('-');
    }
    if days > 0 {
        text.push_str(&format!("{} days ", days));
    }
    text.push_str(&clock);
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}
