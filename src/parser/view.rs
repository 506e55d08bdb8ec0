//! Borrowed views over tokens in the packed stream.
//!
//! Views are cheap `Copy` handles. They borrow the reader, so they cannot
//! outlive the next read call; use [`SerializedValueView::to_value`] to keep
//! a value around.

use super::packed::{PackedBinaryStream, PackedToken};
use super::tokenizer::TokenType;
use crate::{Error, Number, Result, SerializedMap, SerializedValue};
use std::borrow::Cow;

/// A JSON value at some position of the stream.
#[derive(Clone, Copy)]
pub struct SerializedValueView<'a> {
    stream: &'a PackedBinaryStream,
    index: usize,
}

impl<'a> SerializedValueView<'a> {
    pub(crate) fn new(stream: &'a PackedBinaryStream, index: usize) -> Self {
        SerializedValueView { stream, index }
    }

    fn token(&self) -> &'a PackedToken {
        self.stream.token(self.index)
    }

    #[must_use]
    pub fn token_type(&self) -> TokenType {
        self.token().token_type
    }

    /// Name of the JSON kind, used in type mismatch errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.token_type() {
            TokenType::Object => "object",
            TokenType::Array => "array",
            TokenType::Member => "member",
            TokenType::String => "string",
            TokenType::Primitive => {
                if self.is_null() {
                    "null"
                } else {
                    "primitive"
                }
            }
        }
    }

    /// Raw token bytes: escaped string content, primitive text or key.
    #[must_use]
    pub fn raw(&self) -> &'a [u8] {
        self.stream.data(self.index)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.token_type() == TokenType::Primitive && self.raw() == b"null"
    }

    #[must_use]
    pub fn as_object(&self) -> Option<SerializedObjectView<'a>> {
        (self.token_type() == TokenType::Object).then_some(SerializedObjectView { value: *self })
    }

    #[must_use]
    pub fn as_array(&self) -> Option<SerializedArrayView<'a>> {
        (self.token_type() == TokenType::Array).then_some(SerializedArrayView { value: *self })
    }

    #[must_use]
    pub fn as_member(&self) -> Option<SerializedMemberView<'a>> {
        (self.token_type() == TokenType::Member).then_some(SerializedMemberView { value: *self })
    }

    #[must_use]
    pub fn as_string(&self) -> Option<SerializedStringView<'a>> {
        (self.token_type() == TokenType::String).then_some(SerializedStringView { value: *self })
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<SerializedPrimitiveView<'a>> {
        (self.token_type() == TokenType::Primitive)
            .then_some(SerializedPrimitiveView { value: *self })
    }

    /// Text of a string or primitive token.
    pub fn to_text(&self) -> Result<Cow<'a, str>> {
        match self.token_type() {
            TokenType::String | TokenType::Member => unescape(self.raw()),
            TokenType::Primitive => utf8(self.raw()).map(Cow::Borrowed),
            _ => Err(Error::type_mismatch("string", self.kind_name())),
        }
    }

    fn children(&self) -> Children<'a> {
        let token = self.token();
        let end = if token.subtree_end >= 0 {
            token.subtree_end as usize
        } else {
            self.stream.len()
        };
        Children {
            stream: self.stream,
            parent: self.index,
            next: self.index + 1,
            end,
        }
    }

    /// Copies the value out of the stream.
    ///
    /// Unquoted primitives that are neither literals nor numbers (relaxed
    /// validation modes) become strings.
    pub fn to_value(&self) -> Result<SerializedValue> {
        if !self.token().is_complete() {
            return Err(Error::custom("value is not fully buffered"));
        }
        match self.token_type() {
            TokenType::Object => {
                let mut map = SerializedMap::new();
                for member in self.children() {
                    let member = SerializedMemberView { value: member };
                    let value = match member.value() {
                        Some(value) => value.to_value()?,
                        None => SerializedValue::Null,
                    };
                    map.insert(member.name()?.into_owned(), value);
                }
                Ok(SerializedValue::Object(map))
            }
            TokenType::Array => self
                .children()
                .map(|child| child.to_value())
                .collect::<Result<Vec<_>>>()
                .map(SerializedValue::Array),
            TokenType::Member => match (SerializedMemberView { value: *self }).value() {
                Some(value) => value.to_value(),
                None => Ok(SerializedValue::Null),
            },
            TokenType::String => Ok(SerializedValue::String(unescape(self.raw())?.into_owned())),
            TokenType::Primitive => {
                let text = utf8(self.raw())?;
                Ok(match text {
                    "null" => SerializedValue::Null,
                    "true" => SerializedValue::Bool(true),
                    "false" => SerializedValue::Bool(false),
                    _ => match Number::parse(text) {
                        Some(n) => SerializedValue::Number(n),
                        None => SerializedValue::String(text.to_string()),
                    },
                })
            }
        }
    }
}

impl std::fmt::Debug for SerializedValueView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedValueView")
            .field("index", &self.index)
            .field("type", &self.token_type())
            .finish()
    }
}

struct Children<'a> {
    stream: &'a PackedBinaryStream,
    parent: usize,
    next: usize,
    end: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = SerializedValueView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let token = self.stream.token(self.next);
        if token.parent != self.parent as i32 {
            return None;
        }
        let view = SerializedValueView::new(self.stream, self.next);
        self.next = if token.subtree_end >= 0 {
            token.subtree_end as usize
        } else {
            self.end
        };
        Some(view)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SerializedObjectView<'a> {
    value: SerializedValueView<'a>,
}

impl<'a> SerializedObjectView<'a> {
    /// Buffered members in document order.
    pub fn members(&self) -> impl Iterator<Item = SerializedMemberView<'a>> {
        self.value
            .children()
            .map(|value| SerializedMemberView { value })
    }

    /// First member named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SerializedValueView<'a>> {
        self.members()
            .find(|m| m.name().map(|n| n == name).unwrap_or(false))
            .and_then(|m| m.value())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members().next().is_none()
    }

    #[must_use]
    pub fn as_value(&self) -> SerializedValueView<'a> {
        self.value
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SerializedMemberView<'a> {
    value: SerializedValueView<'a>,
}

impl<'a> SerializedMemberView<'a> {
    pub fn name(&self) -> Result<Cow<'a, str>> {
        unescape(self.value.raw())
    }

    /// The member's value, `None` while it is not buffered yet.
    #[must_use]
    pub fn value(&self) -> Option<SerializedValueView<'a>> {
        self.value.children().next()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SerializedArrayView<'a> {
    value: SerializedValueView<'a>,
}

impl<'a> SerializedArrayView<'a> {
    /// Buffered elements in order.
    pub fn iter(&self) -> impl Iterator<Item = SerializedValueView<'a>> {
        self.value.children()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    #[must_use]
    pub fn as_value(&self) -> SerializedValueView<'a> {
        self.value
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SerializedStringView<'a> {
    value: SerializedValueView<'a>,
}

impl<'a> SerializedStringView<'a> {
    /// Unescaped content; borrowed when the source had no escapes.
    pub fn to_str(&self) -> Result<Cow<'a, str>> {
        unescape(self.value.raw())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SerializedPrimitiveView<'a> {
    value: SerializedValueView<'a>,
}

impl<'a> SerializedPrimitiveView<'a> {
    pub fn as_str(&self) -> Result<&'a str> {
        utf8(self.value.raw())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.raw() == b"null"
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.value.raw() {
            b"true" => Ok(true),
            b"false" => Ok(false),
            _ => Err(Error::type_mismatch("boolean", self.as_str()?)),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        let text = self.as_str()?;
        text.parse::<i64>()
            .map_err(|_| Error::type_mismatch("integer", text))
    }

    pub fn as_u64(&self) -> Result<u64> {
        let text = self.as_str()?;
        text.parse::<u64>()
            .map_err(|_| Error::type_mismatch("unsigned integer", text))
    }

    pub fn as_f64(&self) -> Result<f64> {
        let text = self.as_str()?;
        match Number::parse(text) {
            Some(n) => Ok(n.as_f64()),
            None => Err(Error::type_mismatch("number", text)),
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::custom(format!("invalid UTF-8: {e}")))
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(bytes.get(..4)?).ok()?;
    u32::from_str_radix(text, 16).ok()
}

/// Decodes JSON string escapes. Unknown escapes keep the escaped character.
pub(crate) fn unescape(raw: &[u8]) -> Result<Cow<'_, str>> {
    if !raw.contains(&b'\\') {
        return utf8(raw).map(Cow::Borrowed);
    }
    let text = utf8(raw)?;
    let mut result = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            return Err(Error::custom("unterminated escape sequence"));
        };
        match escaped {
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            't' => result.push('\t'),
            'b' => result.push('\u{0008}'),
            'f' => result.push('\u{000C}'),
            'u' => {
                let start = i + 2;
                let code = hex4(&raw[start..])
                    .ok_or_else(|| Error::custom("invalid unicode escape"))?;
                let mut consumed = 4;
                let ch = if (0xD800..0xDC00).contains(&code)
                    && raw.get(start + 4..start + 6) == Some(b"\\u")
                {
                    match hex4(&raw[start + 6..]) {
                        Some(low) if (0xDC00..0xE000).contains(&low) => {
                            consumed = 10;
                            char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00))
                        }
                        _ => None,
                    }
                } else {
                    char::from_u32(code)
                };
                result.push(ch.unwrap_or('\u{FFFD}'));
                for _ in 0..consumed {
                    chars.next();
                }
            }
            other => result.push(other),
        }
    }
    Ok(Cow::Owned(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert!(matches!(unescape(b"plain").unwrap(), Cow::Borrowed("plain")));
        assert_eq!(unescape(br#"a\"b\\c\nd"#).unwrap(), "a\"b\\c\nd");
        assert_eq!(unescape(b"\\u00e9").unwrap(), "\u{e9}");
        assert_eq!(unescape(b"\\ud83d\\ude00!").unwrap(), "\u{1F600}!");
        assert_eq!(unescape(br#"\/"#).unwrap(), "/");
    }
}
