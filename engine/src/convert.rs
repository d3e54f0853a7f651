//! Built-in scalar, enum and flags-enum conversion.
//!
//! Every converter takes the raw text and returns the typed value or a
//! human-readable reason. The binder wraps the reason in
//! [`BindError::ValueConversion`](crate::BindError::ValueConversion) together
//! with the parameter name and raw value.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use command_dispatch_core::{EnumSpec, ScalarType};
use regex::Regex;
use uuid::Uuid;

use crate::value::{EnumValue, FlagsValue, TypedValue};

static URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S*$").expect("static regex must compile")
});

static DURATION_UNITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")
        .expect("static regex must compile")
});

static DURATION_CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):([0-5]\d):([0-5]\d)$").expect("static regex must compile")
});

/// Converts raw text to a built-in scalar.
///
/// # Examples
///
/// ```
/// use command_dispatch::{TypedValue, convert_scalar};
/// use command_dispatch_core::ScalarType;
///
/// assert_eq!(convert_scalar(ScalarType::U16, "8080"), Ok(TypedValue::UInt(8080)));
/// assert_eq!(convert_scalar(ScalarType::Bool, "yes"), Ok(TypedValue::Bool(true)));
/// assert!(convert_scalar(ScalarType::U8, "300").is_err());
/// ```
pub fn convert_scalar(ty: ScalarType, raw: &str) -> Result<TypedValue, String> {
    match ty {
        ScalarType::Bool => parse_bool(raw).map(TypedValue::Bool),
        ScalarType::I8 => parse_int::<i8>(raw).map(|n| TypedValue::Int(n.into())),
        ScalarType::I16 => parse_int::<i16>(raw).map(|n| TypedValue::Int(n.into())),
        ScalarType::I32 => parse_int::<i32>(raw).map(|n| TypedValue::Int(n.into())),
        ScalarType::I64 => parse_int::<i64>(raw).map(TypedValue::Int),
        ScalarType::U8 => parse_int::<u8>(raw).map(|n| TypedValue::UInt(n.into())),
        ScalarType::U16 => parse_int::<u16>(raw).map(|n| TypedValue::UInt(n.into())),
        ScalarType::U32 => parse_int::<u32>(raw).map(|n| TypedValue::UInt(n.into())),
        ScalarType::U64 => parse_int::<u64>(raw).map(TypedValue::UInt),
        ScalarType::F32 => parse_float(raw)
            .and_then(|n| {
                if n.is_finite() && n.abs() > f64::from(f32::MAX) {
                    Err("number is out of range".to_string())
                } else {
                    Ok(n)
                }
            })
            .map(TypedValue::Float),
        ScalarType::F64 => parse_float(raw).map(TypedValue::Float),
        ScalarType::Char => parse_char(raw).map(TypedValue::Char),
        ScalarType::String => Ok(TypedValue::Str(raw.to_string())),
        ScalarType::Path => {
            if raw.is_empty() {
                Err("path cannot be empty".to_string())
            } else {
                Ok(TypedValue::Path(PathBuf::from(raw)))
            }
        }
        ScalarType::Uri => {
            if URI_RE.is_match(raw) {
                Ok(TypedValue::Uri(raw.to_string()))
            } else {
                Err("expected an absolute URI such as 'https://host/path'".to_string())
            }
        }
        ScalarType::DateTime => parse_datetime(raw).map(TypedValue::DateTime),
        ScalarType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(TypedValue::Date)
            .map_err(|_| "expected a date as YYYY-MM-DD".to_string()),
        ScalarType::Duration => parse_duration(raw).map(TypedValue::Duration),
        ScalarType::Uuid => Uuid::parse_str(raw)
            .map(TypedValue::Uuid)
            .map_err(|e| e.to_string()),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_int<T>(raw: &str) -> Result<T, String>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    raw.trim().parse::<T>().map_err(|e| e.to_string())
}

fn parse_float(raw: &str) -> Result<f64, String> {
    raw.trim().parse::<f64>().map_err(|e| e.to_string())
}

fn parse_char(raw: &str) -> Result<char, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("expected a single character".to_string()),
    }
}

/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
fn parse_datetime(raw: &str) -> Result<DateTime<chrono::FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| "expected an RFC 3339 timestamp".to_string())
}

/// Accepts unit form (`1h30m`, `250ms`, `2d`), clock form (`01:30:00`) or a
/// bare number of seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let invalid = || "expected a duration such as '90s', '1h30m' or '01:30:00'".to_string();

    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    if let Some(caps) = DURATION_CLOCK_RE.captures(raw) {
        let field = |i: usize| caps[i].parse::<u64>().map_err(|_| invalid());
        let secs = scaled_sum(&[(field(1)?, 3600), (field(2)?, 60), (field(3)?, 1)])
            .ok_or_else(out_of_range)?;
        return Ok(Duration::from_secs(secs));
    }

    let caps = DURATION_UNITS_RE
        .captures(raw)
        .filter(|_| !raw.is_empty())
        .ok_or_else(invalid)?;
    let unit = |i: usize| -> Result<u64, String> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>().map_err(|_| invalid()))
    };
    let secs = scaled_sum(&[
        (unit(1)?, 86_400),
        (unit(2)?, 3600),
        (unit(3)?, 60),
        (unit(4)?, 1),
    ])
    .ok_or_else(out_of_range)?;
    Duration::from_secs(secs)
        .checked_add(Duration::from_millis(unit(5)?))
        .ok_or_else(out_of_range)
}

fn out_of_range() -> String {
    "duration is out of range".to_string()
}

/// Sums `amount * scale` pairs, or `None` on overflow.
fn scaled_sum(parts: &[(u64, u64)]) -> Option<u64> {
    parts.iter().try_fold(0u64, |total, &(amount, scale)| {
        amount.checked_mul(scale).and_then(|n| total.checked_add(n))
    })
}

/// Matches one enum member by case-insensitive name or integer value.
pub fn convert_enum(spec: &EnumSpec, raw: &str) -> Result<TypedValue, String> {
    spec.find(raw)
        .map(|member| {
            TypedValue::Enum(EnumValue {
                member: member.name.clone(),
                value: member.value,
            })
        })
        .ok_or_else(|| unknown_member(spec))
}

/// Splits `raw` on `separator` and ORs the matched members together.
///
/// # Examples
///
/// ```
/// use command_dispatch::{TypedValue, convert_flags};
/// use command_dispatch_core::EnumSpec;
///
/// let perms = EnumSpec::new("Perm", [("Read", 1), ("Write", 2), ("Exec", 4)]);
/// let TypedValue::Flags(flags) = convert_flags(&perms, "read,EXEC", ',').unwrap() else {
///     panic!("expected flags");
/// };
/// assert_eq!(flags.bits, 5);
/// assert_eq!(flags.members, vec!["Read", "Exec"]);
/// ```
pub fn convert_flags(spec: &EnumSpec, raw: &str, separator: char) -> Result<TypedValue, String> {
    let mut flags = FlagsValue {
        members: Vec::new(),
        bits: 0,
    };
    for part in split_list(raw, separator) {
        let member = spec.find(&part).ok_or_else(|| unknown_member(spec))?;
        flags.bits |= member.value;
        if !flags.members.contains(&member.name) {
            flags.members.push(member.name.clone());
        }
    }
    if flags.members.is_empty() {
        return Err(unknown_member(spec));
    }
    Ok(TypedValue::Flags(flags))
}

fn unknown_member(spec: &EnumSpec) -> String {
    format!(
        "expected one of {} ({})",
        spec.member_names().join(", "),
        spec.name
    )
}

/// Splits a list value, trimming whitespace and dropping empty parts.
pub fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
