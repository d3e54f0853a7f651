//! Bound values and their provenance.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Path(PathBuf),
    Uri(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Duration(Duration),
    Uuid(Uuid),
    Enum(EnumValue),
    Flags(FlagsValue),
    List(Vec<TypedValue>),
    /// Members of a container parameter, keyed by binding name.
    Object(BTreeMap<String, BoundValue>),
}

/// A matched enum member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub member: String,
    pub value: i64,
}

/// Combined flags-enum members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagsValue {
    /// Matched member names in first-seen order, without duplicates.
    pub members: Vec<String>,
    /// Bitwise OR of the members' values.
    pub bits: i64,
}

impl TypedValue {
    /// Numeric view used by range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Int(n) => Some(*n as f64),
            TypedValue::UInt(n) => Some(*n as f64),
            TypedValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int(n) => Some(*n),
            TypedValue::UInt(n) => i64::try_from(*n).ok(),
            TypedValue::Enum(member) => Some(member.value),
            TypedValue::Flags(flags) => Some(flags.bits),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TypedValue::UInt(n) => Some(*n),
            TypedValue::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Text of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(s) | TypedValue::Uri(s) => Some(s),
            TypedValue::Enum(member) => Some(&member.member),
            _ => None,
        }
    }

    /// Path view of path and string values.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            TypedValue::Path(p) => Some(p),
            TypedValue::Str(s) => Some(Path::new(s)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, BoundValue>> {
        match self {
            TypedValue::Object(members) => Some(members),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::Int(n) => write!(f, "{n}"),
            TypedValue::UInt(n) => write!(f, "{n}"),
            TypedValue::Float(n) => write!(f, "{n}"),
            TypedValue::Char(c) => write!(f, "{c}"),
            TypedValue::Str(s) | TypedValue::Uri(s) => f.write_str(s),
            TypedValue::Path(p) => write!(f, "{}", p.display()),
            TypedValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            TypedValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TypedValue::Duration(d) => write!(f, "{d:?}"),
            TypedValue::Uuid(id) => write!(f, "{id}"),
            TypedValue::Enum(member) => f.write_str(&member.member),
            TypedValue::Flags(flags) => f.write_str(&flags.members.join(",")),
            TypedValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
            TypedValue::Object(members) => {
                let parts: Vec<String> = members
                    .iter()
                    .map(|(name, bound)| format!("{name}={}", bound.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Argv,
    Environment,
    Prompt,
    Default,
}

/// A value together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundValue {
    pub value: TypedValue,
    pub source: ValueSource,
}

impl BoundValue {
    pub fn new(value: TypedValue, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Values bound for one invocation, keyed by parameter name.
///
/// Lookups descend into container objects, so a member can be read by its
/// own name.
///
/// # Examples
///
/// ```
/// use command_dispatch::{BoundArguments, BoundValue, TypedValue, ValueSource};
///
/// let mut args = BoundArguments::default();
/// args.insert("name", BoundValue::new(TypedValue::Str("origin".into()), ValueSource::Argv));
/// args.insert("verbose", BoundValue::new(TypedValue::Bool(true), ValueSource::Environment));
///
/// assert_eq!(args.str("name"), Some("origin"));
/// assert!(args.flag("verbose"));
/// assert!(!args.flag("quiet"));
/// assert_eq!(args.source("verbose"), Some(ValueSource::Environment));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundArguments {
    values: BTreeMap<String, BoundValue>,
}

impl BoundArguments {
    pub fn insert(&mut self, name: impl Into<String>, value: BoundValue) {
        self.values.insert(name.into(), value);
    }

    /// Finds a bound value by name, searching container members too.
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        find_in(&self.values, name)
    }

    pub fn value(&self, name: &str) -> Option<&TypedValue> {
        self.get(name).map(|bound| &bound.value)
    }

    pub fn source(&self, name: &str) -> Option<ValueSource> {
        self.get(name).map(|bound| bound.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Boolean switch value; unset reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.value(name).and_then(TypedValue::as_bool).unwrap_or(false)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(TypedValue::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(TypedValue::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(TypedValue::as_f64)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.value(name).and_then(TypedValue::as_path)
    }

    pub fn list(&self, name: &str) -> Option<&[TypedValue]> {
        self.value(name).and_then(TypedValue::as_list)
    }

    /// Top-level entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(name, bound)| (name.as_str(), bound))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn find_in<'a>(values: &'a BTreeMap<String, BoundValue>, name: &str) -> Option<&'a BoundValue> {
    if let Some(bound) = values.get(name) {
        return Some(bound);
    }
    values
        .values()
        .filter_map(|bound| bound.value.as_object())
        .find_map(|members| find_in(members, name))
}
