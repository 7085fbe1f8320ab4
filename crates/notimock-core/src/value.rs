//! Wire value codec: the typed values exchanged over the bus, and the
//! decoding of `TYPE:NAME:VALUE` hint literals supplied on a command line.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

// ─── Value ────────────────────────────────────────────────────────

/// A typed bus value. Tagged on the wire so that, say, `Byte(1)` and
/// `U32(1)` stay distinguishable through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    U32(u32),
    I32(i32),
    F64(f64),
    Byte(u8),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Build an `Array` of strings.
    pub fn str_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    /// Build a `Dict` from `(key, value)` pairs.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Dict(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

// ─── Hint literals ────────────────────────────────────────────────

/// The type tag of a `TYPE:NAME:VALUE` hint argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    String,
    Int,
    Double,
    Byte,
    Boolean,
    Variant,
}

impl HintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Double => "double",
            Self::Byte => "byte",
            Self::Boolean => "boolean",
            Self::Variant => "variant",
        }
    }
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HintKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "double" => Ok(Self::Double),
            "byte" => Ok(Self::Byte),
            "boolean" => Ok(Self::Boolean),
            "variant" => Ok(Self::Variant),
            _ => Err(ValueError::UnknownHintKind {
                kind: s.to_string(),
            }),
        }
    }
}

fn leading_digit(raw: &str) -> bool {
    raw.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn malformed(kind: HintKind, value: &str) -> ValueError {
    ValueError::MalformedHint {
        kind,
        value: value.to_string(),
    }
}

impl Value {
    /// Decode a hint literal of the given kind.
    ///
    /// Boundary semantics that callers depend on:
    /// - `byte` accepts decimal and `0x` hex, and saturates above 255;
    /// - `boolean` is true for case-insensitive `true` or a non-zero
    ///   numeric token, and **false for anything else** (`not-true` is
    ///   false, not an error);
    /// - `int`/`double` must start with an ASCII digit.
    pub fn from_hint_literal(kind: HintKind, raw: &str) -> Result<Self, ValueError> {
        match kind {
            HintKind::String => Ok(Self::Str(raw.to_string())),
            HintKind::Int => {
                if !leading_digit(raw) {
                    return Err(malformed(kind, raw));
                }
                raw.parse::<i32>()
                    .map(Self::I32)
                    .map_err(|_| malformed(kind, raw))
            }
            HintKind::Double => {
                if !leading_digit(raw) {
                    return Err(malformed(kind, raw));
                }
                raw.parse::<f64>()
                    .map(Self::F64)
                    .map_err(|_| malformed(kind, raw))
            }
            HintKind::Byte => {
                let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
                    u64::from_str_radix(hex, 16)
                } else {
                    raw.parse::<u64>()
                };
                parsed
                    .map(|v| Self::Byte(v.min(u8::MAX as u64) as u8))
                    .map_err(|_| malformed(kind, raw))
            }
            HintKind::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    return Ok(Self::Bool(true));
                }
                if leading_digit(raw) {
                    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
                    return Ok(Self::Bool(digits.parse::<u64>().is_ok_and(|v| v != 0)));
                }
                Ok(Self::Bool(false))
            }
            HintKind::Variant => parse_variant_literal(raw).ok_or_else(|| malformed(kind, raw)),
        }
    }
}

/// Parse a restricted variant literal such as `{'a': 1, 'b': 2}` or
/// `['x', 'y']`. Single quotes are normalized to JSON double quotes.
fn parse_variant_literal(raw: &str) -> Option<Value> {
    let normalized = raw.replace('\'', "\"");
    let json: serde_json::Value = serde_json::from_str(&normalized).ok()?;
    from_json(&json)
}

fn from_json(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok().map(Value::I32)
            } else {
                n.as_f64().map(Value::F64)
            }
        }
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| from_json(v).map(|v| (k.clone(), v)))
            .collect::<Option<BTreeMap<_, _>>>()
            .map(Value::Dict),
    }
}

/// Parse a full `TYPE:NAME:VALUE` hint argument into `(name, value)`.
pub fn parse_hint_arg(raw: &str) -> Result<(String, Value), ValueError> {
    let mut parts = raw.splitn(3, ':');
    let (kind, name, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(name), Some(value)) if !name.is_empty() => (kind, name, value),
        _ => {
            return Err(ValueError::HintSyntax {
                raw: raw.to_string(),
            });
        }
    };
    let kind: HintKind = kind.parse()?;
    Ok((name.to_string(), Value::from_hint_literal(kind, value)?))
}

// ─── Urgency & close reasons ──────────────────────────────────────

/// Notification urgency level (hint `urgency`, byte-valued on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::Critical => 2,
        }
    }

    /// Portal `priority` string. Normal urgency maps to `normal`, i.e. no
    /// explicit elevation.
    pub fn priority(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Critical => "urgent",
        }
    }
}

impl FromStr for Urgency {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "critical" => Ok(Self::Critical),
            _ => Err(ValueError::UnknownUrgency {
                value: s.to_string(),
            }),
        }
    }
}

/// Reason code carried by `NotificationClosed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired,
    Dismissed,
    ClosedByCaller,
    Undefined,
}

impl CloseReason {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Expired => 1,
            Self::Dismissed => 2,
            Self::ClosedByCaller => 3,
            Self::Undefined => 4,
        }
    }
}
