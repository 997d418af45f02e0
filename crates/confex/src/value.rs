//! value representation
//!
//! The store holds the following data types
//! - boolean (true/false)
//! - integer (signed i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally:
//! - there is no `null`/`None` value; documents containing `null` are rejected on load.
//! - the only valid **implicit** conversion: every `integer` is also a `decimal`
//! - projections (`as_*`) never modify the value, they either borrow/convert or fail with
//!   [Error::TypeMismatch]
//!
use crate::error::{Error, Result};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::time::Duration;

pub type Map = indexmap::IndexMap<String, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// Name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_map(&self) -> Result<&Map> {
        match self {
            Value::Object(map) => Ok(map),
            other => Err(other.mismatch("object")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::Array(list) => Ok(list),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("boolean")),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("integer")),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::Integer(i) => Ok(*i as f64),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("decimal")),
            other => Err(other.mismatch("decimal")),
        }
    }

    /// Integers are seconds, strings are `<number><unit>` groups such as `1h30m` or `250ms`
    pub fn as_duration(&self) -> Result<Duration> {
        match self {
            Value::Integer(secs) if *secs >= 0 => Ok(Duration::from_secs(*secs as u64)),
            Value::String(s) => parse_duration(s.trim()).ok_or_else(|| self.mismatch("duration")),
            other => Err(other.mismatch("duration")),
        }
    }
}

fn parse_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total += number * nanos_per_unit;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total.round() as u64))
}

/// Stringification used when a value is spliced into surrounding text
///
/// Scalars are written plainly, arrays and objects as compact JSON.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = Error;

    fn try_from(value: serde_yaml::Value) -> Result<Value> {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Bool(b) => Ok(b.into()),
            Yaml::Number(n) => {
                if let Some(int) = n.as_i64() {
                    return Ok(Value::Integer(int));
                }
                n.as_f64()
                    .map(Value::Decimal)
                    .ok_or_else(|| Error::Document(format!("number out of range: {n}")))
            }
            Yaml::String(s) => Ok(s.into()),
            Yaml::Sequence(seq) => seq
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Yaml::Mapping(mapping) => {
                let mut map = Map::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let key = match key {
                        Yaml::String(s) => s,
                        Yaml::Bool(b) => b.to_string(),
                        Yaml::Number(n) => n.to_string(),
                        other => {
                            return Err(Error::Document(format!("unsupported key {other:?}")))
                        }
                    };
                    map.insert(key, value.try_into()?);
                }
                Ok(Value::Object(map))
            }
            Yaml::Tagged(tagged) => Value::try_from(tagged.value),
            Yaml::Null => Err(Error::Document("null".to_string())),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
