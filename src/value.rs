//! Detached JSON values.
//!
//! A [`SerializedValue`] is an owned copy of a piece of a JSON document. The
//! streaming reader hands out borrowed views; [`SerializedValueView::to_value`]
//! turns one into a `SerializedValue` that outlives the reader. Adapters and
//! migrations use it to inspect members they do not map directly.
//!
//! ```rust
//! use propbag::{Number, SerializedValue};
//!
//! let value = SerializedValue::from(42);
//! assert!(value.is_number());
//! assert_eq!(value.as_i64(), Some(42));
//! assert_eq!(SerializedValue::from("hi").as_str(), Some("hi"));
//! ```
//!
//! [`SerializedValueView::to_value`]: crate::SerializedValueView::to_value

use crate::SerializedMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Default)]
pub enum SerializedValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<SerializedValue>),
    Object(SerializedMap),
}

/// A JSON number, including the special floating point values the JSON
/// writer emits as strings.
///
/// ```rust
/// use propbag::Number;
///
/// assert_eq!(Number::parse("-12"), Some(Number::Integer(-12)));
/// assert_eq!(Number::parse("2.5e1"), Some(Number::Float(25.0)));
/// assert_eq!(Number::parse("Infinity"), Some(Number::Infinity));
/// assert_eq!(Number::parse("abc"), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
    Infinity,
    NegativeInfinity,
    NaN,
}

impl Number {
    #[inline]
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Returns `true` for Infinity, -Infinity and NaN.
    #[inline]
    #[must_use]
    pub const fn is_special(&self) -> bool {
        matches!(
            self,
            Number::Infinity | Number::NegativeInfinity | Number::NaN
        )
    }

    /// Integers, and floats without a fractional part that fit.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
            Number::Infinity => f64::INFINITY,
            Number::NegativeInfinity => f64::NEG_INFINITY,
            Number::NaN => f64::NAN,
        }
    }

    /// Parses JSON number text, or one of the special value names.
    #[must_use]
    pub fn parse(text: &str) -> Option<Number> {
        match text {
            "NaN" => return Some(Number::NaN),
            "Infinity" => return Some(Number::Infinity),
            "-Infinity" => return Some(Number::NegativeInfinity),
            _ => {}
        }
        let first = text.bytes().next()?;
        if first != b'-' && !first.is_ascii_digit() {
            return None;
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Integer(i));
        }
        text.parse::<f64>().ok().map(Number::from)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(fl) => write!(f, "{}", fl),
            Number::Infinity => write!(f, "Infinity"),
            Number::NegativeInfinity => write!(f, "-Infinity"),
            Number::NaN => write!(f, "NaN"),
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Number::NaN
        } else if value == f64::INFINITY {
            Number::Infinity
        } else if value == f64::NEG_INFINITY {
            Number::NegativeInfinity
        } else {
            Number::Float(value)
        }
    }
}

impl SerializedValue {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, SerializedValue::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, SerializedValue::Bool(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, SerializedValue::Number(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, SerializedValue::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, SerializedValue::Array(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, SerializedValue::Object(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SerializedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SerializedValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SerializedValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SerializedValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<SerializedValue>> {
        match self {
            SerializedValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&SerializedMap> {
        match self {
            SerializedValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Member lookup; `None` for non-objects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SerializedValue> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Short name of the JSON kind, used in type mismatch errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SerializedValue::Null => "null",
            SerializedValue::Bool(_) => "boolean",
            SerializedValue::Number(_) => "number",
            SerializedValue::String(_) => "string",
            SerializedValue::Array(_) => "array",
            SerializedValue::Object(_) => "object",
        }
    }
}

impl fmt::Display for SerializedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializedValue::Null => write!(f, "null"),
            SerializedValue::Bool(b) => write!(f, "{}", b),
            SerializedValue::Number(n) if n.is_special() => write!(f, "\"{}\"", n),
            SerializedValue::Number(n) => write!(f, "{}", n),
            SerializedValue::String(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                crate::json::write_escaped(&mut out, s);
                f.write_str(&out)
            }
            SerializedValue::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            SerializedValue::Object(obj) => {
                write!(f, "{{")?;
                for (i, (key, value)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    let mut out = String::with_capacity(key.len() + 2);
                    crate::json::write_escaped(&mut out, key);
                    write!(f, "{}:{}", out, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Serialize for SerializedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SerializedValue::Null => serializer.serialize_unit(),
            SerializedValue::Bool(b) => serializer.serialize_bool(*b),
            SerializedValue::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            SerializedValue::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            SerializedValue::Number(n) => serializer.serialize_str(&n.to_string()),
            SerializedValue::String(s) => serializer.serialize_str(s),
            SerializedValue::Array(arr) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for element in arr {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            SerializedValue::Object(obj) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SerializedValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SerializedValueVisitor;

        impl<'de> Visitor<'de> for SerializedValueVisitor {
            type Value = SerializedValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any JSON value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(SerializedValue::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                Ok(SerializedValue::Number(Number::Integer(value)))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                if value <= i64::MAX as u64 {
                    Ok(SerializedValue::Number(Number::Integer(value as i64)))
                } else {
                    Ok(SerializedValue::Number(Number::Float(value as f64)))
                }
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(SerializedValue::Number(Number::from(value)))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
                Ok(SerializedValue::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E> {
                Ok(SerializedValue::String(value))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(SerializedValue::Null)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(SerializedValue::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(SerializedValue::Array(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut obj = SerializedMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry()? {
                    obj.insert(key, value);
                }
                Ok(SerializedValue::Object(obj))
            }
        }

        deserializer.deserialize_any(SerializedValueVisitor)
    }
}

impl From<bool> for SerializedValue {
    fn from(value: bool) -> Self {
        SerializedValue::Bool(value)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SerializedValue {
                fn from(value: $ty) -> Self {
                    SerializedValue::Number(Number::Integer(value as i64))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for SerializedValue {
    fn from(value: f32) -> Self {
        SerializedValue::Number(Number::from(value as f64))
    }
}

impl From<f64> for SerializedValue {
    fn from(value: f64) -> Self {
        SerializedValue::Number(Number::from(value))
    }
}

impl From<String> for SerializedValue {
    fn from(value: String) -> Self {
        SerializedValue::String(value)
    }
}

impl From<&str> for SerializedValue {
    fn from(value: &str) -> Self {
        SerializedValue::String(value.to_string())
    }
}

impl From<Vec<SerializedValue>> for SerializedValue {
    fn from(value: Vec<SerializedValue>) -> Self {
        SerializedValue::Array(value)
    }
}

impl From<SerializedMap> for SerializedValue {
    fn from(value: SerializedMap) -> Self {
        SerializedValue::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_parse() {
        assert_eq!(Number::parse("0"), Some(Number::Integer(0)));
        assert_eq!(Number::parse("-0.5"), Some(Number::Float(-0.5)));
        assert_eq!(Number::parse("1e400"), Some(Number::Infinity));
        assert_eq!(Number::parse("-Infinity"), Some(Number::NegativeInfinity));
        assert_eq!(Number::parse("true"), None);
        assert_eq!(Number::parse(""), None);
    }

    #[test]
    fn test_display_is_compact_json() {
        let mut obj = SerializedMap::new();
        obj.insert("a\"b".to_string(), SerializedValue::from(1));
        obj.insert(
            "list".to_string(),
            SerializedValue::from(vec![SerializedValue::Null, SerializedValue::from(f64::NAN)]),
        );
        assert_eq!(
            SerializedValue::Object(obj).to_string(),
            r#"{"a\"b":1,"list":[null,"NaN"]}"#
        );
    }

    #[test]
    fn test_serde_json_interop() {
        let value: SerializedValue = serde_json::from_str(r#"{"x":[1,2.5,"s",null,true]}"#).unwrap();
        let list = value.get("x").and_then(SerializedValue::as_array).unwrap();
        assert_eq!(list[0], SerializedValue::from(1));
        assert_eq!(list[1].as_f64(), Some(2.5));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"x":[1,2.5,"s",null,true]}"#);
    }

    #[test]
    fn test_accessors_reject_other_kinds() {
        let value = SerializedValue::from("text");
        assert_eq!(value.as_i64(), None);
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.get("x"), None);
        assert_eq!(value.kind_name(), "string");
    }
}
