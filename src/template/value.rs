//! Typed placeholder values and the classes that format them

use std::fmt;

use chrono::NaiveDateTime;
use serde::Deserialize;

/// A value bound to a placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    /// Enumerated bare word such as `KEPLER` or `RISE_SET`
    Token(String),
    List(Vec<String>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn token(s: impl Into<String>) -> Self {
        Value::Token(s.into())
    }

    /// Parse a `2024-01-01T00:00:00` or day-of-year `2024-001T00:00:00`
    /// timestamp
    pub fn timestamp(s: &str) -> Result<Self, chrono::ParseError> {
        parse_request_timestamp(s).map(Value::Timestamp)
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Timestamp(_) => "timestamp",
            Value::Token(_) => "token",
            Value::List(_) => "list",
        }
    }

    /// The value as an entry name, used for keys and cross-references.
    ///
    /// Lists yield one name per element.
    pub fn names(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            Value::Text(s) | Value::Token(s) => vec![s.clone()],
            Value::Integer(i) => vec![i.to_string()],
            Value::Float(f) => vec![f.to_string()],
            Value::Bool(b) => vec![b.to_string()],
            Value::Timestamp(t) => vec![t.to_string()],
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

/// Values as they appear in TOML scenario requests.
///
/// Plain scalars map directly; timestamps and tokens need a tagged table
/// since TOML has no way to tell them apart from text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Tagged(TaggedValue),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedValue {
    Timestamp(String),
    Token(String),
}

/// Layouts accepted for `{ timestamp = "..." }` bindings, tried in order
pub const REQUEST_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%jT%H:%M:%S"];

fn parse_request_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let first = NaiveDateTime::parse_from_str(s, REQUEST_TIMESTAMP_FORMATS[0]);
    REQUEST_TIMESTAMP_FORMATS[1..].iter().fold(first, |result, format| {
        result.or_else(|_| NaiveDateTime::parse_from_str(s, format))
    })
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawValue::deserialize(deserializer)?;
        Ok(match raw {
            RawValue::Bool(b) => Value::Bool(b),
            RawValue::Integer(i) => Value::Integer(i),
            RawValue::Float(f) => Value::Float(f),
            RawValue::Text(s) => Value::Text(s),
            RawValue::List(items) => Value::List(items),
            RawValue::Tagged(TaggedValue::Token(s)) => Value::Token(s),
            RawValue::Tagged(TaggedValue::Timestamp(s)) => Value::Timestamp(
                parse_request_timestamp(&s).map_err(serde::de::Error::custom)?,
            ),
        })
    }
}

/// Formatting class declared for a placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderClass {
    /// Verbatim text
    Text,
    /// Entry name; rendered verbatim but may not break out of its quotes
    Name,
    Integer,
    /// Fixed precision decimal
    Float,
    Timestamp,
    /// Bare upper-case word, optionally restricted to an allowed set
    Token { allowed: Vec<String> },
    /// `ON` / `OFF`
    Switch,
    /// Space separated quoted names on one line
    QuotedList,
    /// One tab-indented quoted name per line
    QuotedLines,
}

impl PlaceholderClass {
    pub fn name(&self) -> &'static str {
        match self {
            PlaceholderClass::Text => "text",
            PlaceholderClass::Name => "name",
            PlaceholderClass::Integer => "integer",
            PlaceholderClass::Float => "float",
            PlaceholderClass::Timestamp => "timestamp",
            PlaceholderClass::Token { .. } => "token",
            PlaceholderClass::Switch => "switch",
            PlaceholderClass::QuotedList => "quoted_list",
            PlaceholderClass::QuotedLines => "quoted_lines",
        }
    }

    /// Parse a class name as written in a library manifest
    pub fn from_name(name: &str, allowed: Vec<String>) -> Option<Self> {
        Some(match name {
            "text" => PlaceholderClass::Text,
            "name" => PlaceholderClass::Name,
            "integer" => PlaceholderClass::Integer,
            "float" => PlaceholderClass::Float,
            "timestamp" => PlaceholderClass::Timestamp,
            "token" => PlaceholderClass::Token { allowed },
            "switch" => PlaceholderClass::Switch,
            "quoted_list" => PlaceholderClass::QuotedList,
            "quoted_lines" => PlaceholderClass::QuotedLines,
            _ => return None,
        })
    }

    /// Whether a value of this type can be bound to this class
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PlaceholderClass::Text, Value::Text(_))
                | (PlaceholderClass::Name, Value::Text(_))
                | (PlaceholderClass::Integer, Value::Integer(_))
                | (PlaceholderClass::Float, Value::Float(_) | Value::Integer(_))
                | (PlaceholderClass::Timestamp, Value::Timestamp(_))
                | (PlaceholderClass::Token { .. }, Value::Token(_))
                | (PlaceholderClass::Switch, Value::Bool(_))
                | (PlaceholderClass::QuotedList, Value::List(_))
                | (PlaceholderClass::QuotedLines, Value::List(_))
        )
    }
}

impl fmt::Display for PlaceholderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
