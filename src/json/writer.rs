//! Streaming JSON text writer.

use crate::{JsonWriterOptions, Number, SerializedValue};
use std::fmt::Write as _;

/// Appends `s` to `out` as a quoted JSON string.
///
/// ```rust
/// let mut out = String::new();
/// propbag::json::write_escaped(&mut out, "a\"b\n");
/// assert_eq!(out, r#""a\"b\n""#);
/// ```
pub fn write_escaped(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[derive(Clone, Copy)]
struct Scope {
    first: bool,
}

/// Writes JSON tokens into a `String`, handling separators and indentation.
///
/// Adapters receive the writer through
/// [`JsonSerializationContext::writer`](crate::json::JsonSerializationContext::writer)
/// and must write exactly one value.
///
/// ```rust
/// use propbag::json::JsonWriter;
/// use propbag::JsonWriterOptions;
///
/// let mut writer = JsonWriter::new(JsonWriterOptions::new());
/// writer.begin_object();
/// writer.write_key("x");
/// writer.write_i64(1);
/// writer.write_key("tags");
/// writer.begin_array();
/// writer.write_str("a");
/// writer.end_array();
/// writer.end_object();
/// assert_eq!(writer.into_string(), r#"{"x":1,"tags":["a"]}"#);
/// ```
pub struct JsonWriter {
    output: String,
    options: JsonWriterOptions,
    stack: Vec<Scope>,
    after_key: bool,
}

impl JsonWriter {
    pub fn new(options: JsonWriterOptions) -> Self {
        JsonWriter {
            output: String::with_capacity(256),
            options,
            stack: Vec::new(),
            after_key: false,
        }
    }

    pub fn into_string(self) -> String {
        self.output
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.output
    }

    fn newline(&mut self) {
        if self.options.pretty {
            self.output.push('\n');
            let width = self.stack.len() * self.options.indent;
            self.output.extend(std::iter::repeat(' ').take(width));
        }
    }

    fn before_value(&mut self) {
        if self.after_key {
            self.after_key = false;
            return;
        }
        if let Some(scope) = self.stack.last_mut() {
            if !scope.first {
                self.output.push(',');
            }
            scope.first = false;
            self.newline();
        }
    }

    fn end_scope(&mut self, close: char) {
        let scope = self.stack.pop();
        if scope.is_some_and(|s| !s.first) {
            self.newline();
        }
        self.output.push(close);
    }

    pub fn begin_object(&mut self) {
        self.before_value();
        self.output.push('{');
        self.stack.push(Scope { first: true });
    }

    pub fn end_object(&mut self) {
        self.end_scope('}');
    }

    pub fn begin_array(&mut self) {
        self.before_value();
        self.output.push('[');
        self.stack.push(Scope { first: true });
    }

    pub fn end_array(&mut self) {
        self.end_scope(']');
    }

    /// Writes a member name; the next write is its value.
    pub fn write_key(&mut self, name: &str) {
        self.before_value();
        write_escaped(&mut self.output, name);
        self.output.push(':');
        if self.options.pretty {
            self.output.push(' ');
        }
        self.after_key = true;
    }

    pub fn write_null(&mut self) {
        self.before_value();
        self.output.push_str("null");
    }

    pub fn write_bool(&mut self, value: bool) {
        self.before_value();
        self.output.push_str(if value { "true" } else { "false" });
    }

    pub fn write_i64(&mut self, value: i64) {
        self.before_value();
        let _ = write!(self.output, "{value}");
    }

    pub fn write_u64(&mut self, value: u64) {
        self.before_value();
        let _ = write!(self.output, "{value}");
    }

    /// Writes a float; NaN and the infinities become quoted names.
    pub fn write_f64(&mut self, value: f64) {
        self.write_number(&Number::from(value));
    }

    /// Writes an `f32` with its own shortest representation.
    pub fn write_f32(&mut self, value: f32) {
        if value.is_finite() {
            self.before_value();
            let _ = write!(self.output, "{value}");
        } else {
            self.write_f64(f64::from(value));
        }
    }

    pub fn write_number(&mut self, value: &Number) {
        self.before_value();
        if value.is_special() {
            let _ = write!(self.output, "\"{value}\"");
        } else {
            let _ = write!(self.output, "{value}");
        }
    }

    pub fn write_str(&mut self, value: &str) {
        self.before_value();
        write_escaped(&mut self.output, value);
    }

    /// Writes pre-formatted JSON text as one value.
    pub fn write_raw(&mut self, text: &str) {
        self.before_value();
        self.output.push_str(text);
    }

    /// Writes a materialized value.
    pub fn write_value(&mut self, value: &SerializedValue) {
        match value {
            SerializedValue::Null => self.write_null(),
            SerializedValue::Bool(b) => self.write_bool(*b),
            SerializedValue::Number(n) => self.write_number(n),
            SerializedValue::String(s) => self.write_str(s),
            SerializedValue::Array(items) => {
                self.begin_array();
                for item in items {
                    self.write_value(item);
                }
                self.end_array();
            }
            SerializedValue::Object(map) => {
                self.begin_object();
                for (key, item) in map {
                    self.write_key(key);
                    self.write_value(item);
                }
                self.end_object();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialized;

    #[test]
    fn test_escape_control_characters() {
        let mut out = String::new();
        write_escaped(&mut out, "tab\there\u{1}");
        assert_eq!(out, r#""tab\there\u0001""#);
    }

    #[test]
    fn test_pretty_nesting() {
        let mut writer = JsonWriter::new(JsonWriterOptions::pretty());
        writer.write_value(&serialized!({ "a": [1, 2], "b": {} }));
        assert_eq!(
            writer.into_string(),
            "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}"
        );
    }

    #[test]
    fn test_special_floats_are_quoted() {
        let mut writer = JsonWriter::new(JsonWriterOptions::new());
        writer.begin_array();
        writer.write_f64(f64::NAN);
        writer.write_f32(f32::NEG_INFINITY);
        writer.write_f32(0.1);
        writer.write_f64(2.5);
        writer.end_array();
        assert_eq!(writer.into_string(), r#"["NaN","-Infinity",0.1,2.5]"#);
    }

    #[test]
    fn test_output_is_valid_json() {
        let mut writer = JsonWriter::new(JsonWriterOptions::pretty().with_indent(4));
        writer.write_value(&serialized!({ "s": "q\"uote", "n": null, "list": [true, 1.5] }));
        let parsed: serde_json::Value = serde_json::from_str(writer.as_str()).unwrap();
        assert_eq!(parsed["s"], "q\"uote");
        assert_eq!(parsed["list"][1], 1.5);
    }
}
