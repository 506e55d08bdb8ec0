//! Incremental JSON tokenizer.
//!
//! The tokenizer consumes one block at a time and appends [`Token`]s to a
//! bounded buffer. Positions are relative to the block being written:
//!
//! - `start == -1`: the token's data began in an earlier block
//! - `end == -1`: the token's data has not been terminated yet
//! - `next == -1`: the token's subtree is still open; otherwise `next` is the
//!   buffer index following its last descendant
//!
//! Once the caller has mirrored the buffer (see
//! [`PackedBinaryWriter`](super::PackedBinaryWriter)),
//! [`Tokenizer::discard_completed`] drops every closed token, leaving only
//! the chain of open ancestors. Live token memory is therefore bounded by
//! nesting depth rather than document size.

use super::config::JsonValidationType;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    Object,
    Array,
    /// An object member; its data is the key, its only child the value.
    Member,
    String,
    Primitive,
}

impl TokenType {
    /// Whether the token carries data bytes.
    #[inline]
    #[must_use]
    pub fn has_data(self) -> bool {
        matches!(self, TokenType::Member | TokenType::String | TokenType::Primitive)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub parent: i32,
    pub start: i32,
    pub end: i32,
    pub next: i32,
}

impl Token {
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.next != -1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Between top-level values.
    Root,
    /// A value is required.
    Value,
    /// Just after `[`.
    ArrayFirst,
    /// A key is required; `first` is set right after `{`.
    Key { first: bool },
    /// After a key, before `:`.
    AfterKey,
    /// After a value inside a container.
    AfterValue,
    String { escape: bool, unicode: u8 },
    UnquotedKey,
    Primitive,
}

/// Progress through a bare literal under standard validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Literal {
    Word { word: &'static [u8], matched: usize },
    Number(NumberPart),
}

/// Last part of `-?(0|[1-9][0-9]*)(.[0-9]+)?([eE][+-]?[0-9]+)?` consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NumberPart {
    Sign,
    Zero,
    Int,
    Dot,
    Fraction,
    Exponent,
    ExponentSign,
    ExponentDigits,
}

impl Literal {
    fn start(b: u8) -> Option<Self> {
        let literal = match b {
            b't' => Literal::Word { word: b"true", matched: 1 },
            b'f' => Literal::Word { word: b"false", matched: 1 },
            b'n' => Literal::Word { word: b"null", matched: 1 },
            b'-' => Literal::Number(NumberPart::Sign),
            b'0' => Literal::Number(NumberPart::Zero),
            b'1'..=b'9' => Literal::Number(NumberPart::Int),
            _ => return None,
        };
        Some(literal)
    }

    fn next(self, b: u8) -> Option<Self> {
        use NumberPart::*;
        match self {
            Literal::Word { word, matched } => (word.get(matched) == Some(&b)).then_some(
                Literal::Word {
                    word,
                    matched: matched + 1,
                },
            ),
            Literal::Number(part) => {
                let part = match (part, b) {
                    (Sign, b'0') => Zero,
                    (Sign | Int, b'0'..=b'9') => Int,
                    (Zero | Int, b'.') => Dot,
                    (Dot | Fraction, b'0'..=b'9') => Fraction,
                    (Zero | Int | Fraction, b'e' | b'E') => Exponent,
                    (Exponent, b'+' | b'-') => ExponentSign,
                    (Exponent | ExponentSign | ExponentDigits, b'0'..=b'9') => ExponentDigits,
                    _ => return None,
                };
                Some(Literal::Number(part))
            }
        }
    }

    fn is_complete(self) -> bool {
        match self {
            Literal::Word { word, matched } => matched == word.len(),
            Literal::Number(part) => matches!(
                part,
                NumberPart::Zero | NumberPart::Int | NumberPart::Fraction | NumberPart::ExponentDigits
            ),
        }
    }
}

pub struct Tokenizer {
    tokens: Vec<Token>,
    capacity: usize,
    validation: JsonValidationType,
    state: State,
    /// Innermost open container or member.
    parent: i32,
    /// Data token currently being filled.
    current: i32,
    /// Set while a primitive is checked against the JSON grammar.
    literal: Option<Literal>,
    line: usize,
    col: usize,
}

impl Tokenizer {
    pub fn new(capacity: usize, validation: JsonValidationType) -> Self {
        Tokenizer {
            tokens: Vec::with_capacity(capacity),
            capacity,
            validation,
            state: State::Root,
            parent: -1,
            current: -1,
            literal: None,
            line: 1,
            col: 1,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tokens.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current input position, 1-based.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.col)
    }

    /// Tokenizes `block[start..]`.
    ///
    /// Returns the offset where tokenizing stopped: `block.len()` when the
    /// whole block was consumed, or an earlier offset when the token buffer
    /// filled up. In the latter case the caller mirrors and discards, then
    /// calls again from the returned offset.
    pub fn write(&mut self, block: &[u8], start: usize) -> Result<usize> {
        let mut i = start;
        while i < block.len() {
            let b = block[i];
            match self.state {
                State::String { escape, unicode } => {
                    self.string_byte(b, i, escape, unicode)?;
                    self.advance(b);
                    i += 1;
                    continue;
                }
                State::Primitive | State::UnquotedKey => {
                    if self.is_delimiter(b) {
                        self.end_literal()?;
                        self.end_data(i);
                    } else {
                        self.feed_literal(b)?;
                        self.advance(b);
                        i += 1;
                    }
                    continue;
                }
                _ => {}
            }

            if b.is_ascii_whitespace() {
                self.advance(b);
                i += 1;
                continue;
            }

            let consumed = match self.state {
                State::Root | State::Value | State::ArrayFirst => self.value_byte(b, i)?,
                State::Key { first } => self.key_byte(b, i, first)?,
                State::AfterKey => self.after_key_byte(b)?,
                State::AfterValue => self.after_value_byte(b)?,
                State::String { .. } | State::Primitive | State::UnquotedKey => Some(true),
            };
            match consumed {
                // Token buffer full.
                None => return Ok(i),
                Some(true) => {
                    self.advance(b);
                    i += 1;
                }
                Some(false) => {}
            }
        }
        Ok(i)
    }

    /// Terminates the input: closes a trailing primitive and verifies that
    /// no value is left open.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            State::Primitive => {
                self.end_literal()?;
                let cur = self.current as usize;
                self.tokens[cur].start = -1;
                self.tokens[cur].end = 0;
                self.close_value(self.current);
            }
            State::String { .. } => {
                return Err(Error::unexpected_eof(self.line, self.col, "closing '\"'"));
            }
            State::UnquotedKey | State::AfterKey => {
                return Err(Error::unexpected_eof(self.line, self.col, "':' and a value"));
            }
            _ => {}
        }
        if self.parent != -1 || self.state != State::Root {
            let expected = match self.parent_type() {
                Some(TokenType::Array) => "']'",
                Some(TokenType::Object) => "'}'",
                _ => "a value",
            };
            return Err(Error::unexpected_eof(self.line, self.col, expected));
        }
        Ok(())
    }

    /// Drops closed tokens and returns the old-to-new index table
    /// (`-1` for dropped tokens).
    pub fn discard_completed(&mut self) -> Vec<i32> {
        let mut remap = vec![-1; self.tokens.len()];
        let mut kept = 0usize;
        for i in 0..self.tokens.len() {
            let mut token = self.tokens[i];
            if token.is_closed() {
                continue;
            }
            if token.parent >= 0 {
                token.parent = remap[token.parent as usize];
            }
            if token.token_type.has_data() && token.end == -1 {
                token.start = -1;
            }
            remap[i] = kept as i32;
            self.tokens[kept] = token;
            kept += 1;
        }
        self.tokens.truncate(kept);
        if self.parent >= 0 {
            self.parent = remap[self.parent as usize];
        }
        if self.current >= 0 {
            self.current = remap[self.current as usize];
        }
        remap
    }

    fn advance(&mut self, b: u8) {
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::syntax(self.line, self.col, msg)
    }

    fn feed_literal(&mut self, b: u8) -> Result<()> {
        if let Some(literal) = self.literal {
            match literal.next(b) {
                Some(next) => self.literal = Some(next),
                None => {
                    return Err(self.error(&format!("unexpected character '{}' in literal", b as char)))
                }
            }
        }
        Ok(())
    }

    fn end_literal(&mut self) -> Result<()> {
        match self.literal.take() {
            Some(literal) if !literal.is_complete() => Err(self.error("incomplete literal")),
            _ => Ok(()),
        }
    }

    fn parent_type(&self) -> Option<TokenType> {
        if self.parent < 0 {
            None
        } else {
            Some(self.tokens[self.parent as usize].token_type)
        }
    }

    fn is_delimiter(&self, b: u8) -> bool {
        match self.state {
            State::UnquotedKey => b.is_ascii_whitespace() || b == b':' || b == b'=',
            _ => {
                b.is_ascii_whitespace()
                    || matches!(b, b',' | b']' | b'}' | b':')
                    || (self.validation.is_relaxed() && b == b'=')
            }
        }
    }

    fn push(&mut self, token_type: TokenType, start: usize) -> i32 {
        let index = self.tokens.len() as i32;
        self.tokens.push(Token {
            token_type,
            parent: self.parent,
            start: start as i32,
            end: -1,
            next: -1,
        });
        index
    }

    /// Closes a value token and, through it, a member that owned it.
    fn close_value(&mut self, index: i32) {
        let next = self.tokens.len() as i32;
        let token = &mut self.tokens[index as usize];
        token.next = next;
        let mut parent = token.parent;
        if parent >= 0 && self.tokens[parent as usize].token_type == TokenType::Member {
            self.tokens[parent as usize].next = next;
            parent = self.tokens[parent as usize].parent;
        }
        self.parent = parent;
        self.current = -1;
        self.state = if parent < 0 { State::Root } else { State::AfterValue };
    }

    fn string_byte(&mut self, b: u8, i: usize, escape: bool, unicode: u8) -> Result<()> {
        let strict = self.validation == JsonValidationType::Standard;
        self.state = if unicode > 0 {
            if strict && !b.is_ascii_hexdigit() {
                return Err(self.error("invalid unicode escape (expected 4 hex digits)"));
            }
            State::String {
                escape: false,
                unicode: unicode - 1,
            }
        } else if escape {
            if b == b'u' {
                State::String {
                    escape: false,
                    unicode: 4,
                }
            } else {
                if strict && !matches!(b, b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') {
                    return Err(self.error("invalid escape sequence"));
                }
                State::String {
                    escape: false,
                    unicode: 0,
                }
            }
        } else if b == b'\\' {
            State::String {
                escape: true,
                unicode: 0,
            }
        } else if b == b'"' {
            self.end_data(i);
            return Ok(());
        } else {
            if strict && b < 0x20 {
                return Err(self.error("control character in string"));
            }
            State::String {
                escape: false,
                unicode: 0,
            }
        };
        Ok(())
    }

    /// Terminates the current string, member key or primitive at `end`.
    fn end_data(&mut self, end: usize) {
        let cur = self.current;
        self.tokens[cur as usize].end = end as i32;
        if self.tokens[cur as usize].token_type == TokenType::Member {
            self.parent = cur;
            self.current = -1;
            self.state = State::AfterKey;
        } else {
            self.close_value(cur);
        }
    }

    /// Returns `None` when the token buffer is full, `Some(consumed)` otherwise.
    fn value_byte(&mut self, b: u8, i: usize) -> Result<Option<bool>> {
        if b == b']' {
            let trailing_allowed = self.state == State::Value
                && self.validation.is_relaxed()
                && self.parent_type() == Some(TokenType::Array);
            if self.state == State::ArrayFirst || trailing_allowed {
                self.close_container(b)?;
                return Ok(Some(true));
            }
            return Err(self.error("unexpected ']'"));
        }
        if self.state == State::Root && b == b',' && self.validation.is_relaxed() {
            return Ok(Some(true));
        }
        if matches!(b, b'}' | b',' | b':' | b']') {
            return Err(self.error(&format!("unexpected '{}'", b as char)));
        }
        if self.is_full() {
            return Ok(None);
        }
        match b {
            b'{' => {
                self.parent = self.push(TokenType::Object, i);
                self.state = State::Key { first: true };
            }
            b'[' => {
                self.parent = self.push(TokenType::Array, i);
                self.state = State::ArrayFirst;
            }
            b'"' => {
                self.current = self.push(TokenType::String, i + 1);
                self.state = State::String {
                    escape: false,
                    unicode: 0,
                };
            }
            _ => {
                if self.validation == JsonValidationType::Standard {
                    match Literal::start(b) {
                        Some(literal) => self.literal = Some(literal),
                        None => {
                            return Err(self.error(&format!("unexpected character '{}'", b as char)))
                        }
                    }
                }
                self.current = self.push(TokenType::Primitive, i);
                self.state = State::Primitive;
            }
        }
        Ok(Some(true))
    }

    fn key_byte(&mut self, b: u8, i: usize, first: bool) -> Result<Option<bool>> {
        match b {
            b'}' => {
                if !first && !self.validation.is_relaxed() {
                    return Err(self.error("trailing comma before '}'"));
                }
                self.close_container(b)?;
                Ok(Some(true))
            }
            b'"' => {
                if self.is_full() {
                    return Ok(None);
                }
                self.current = self.push(TokenType::Member, i + 1);
                self.state = State::String {
                    escape: false,
                    unicode: 0,
                };
                Ok(Some(true))
            }
            b',' | b':' | b'=' | b'[' | b']' | b'{' => {
                Err(self.error(&format!("unexpected '{}', expected a key", b as char)))
            }
            _ if self.validation.is_relaxed() => {
                if self.is_full() {
                    return Ok(None);
                }
                self.current = self.push(TokenType::Member, i);
                self.state = State::UnquotedKey;
                Ok(Some(true))
            }
            _ => Err(self.error("expected '\"' or '}'")),
        }
    }

    fn after_key_byte(&mut self, b: u8) -> Result<Option<bool>> {
        match (b, self.validation) {
            (b':', _) => {}
            (b'=', v) if v.is_relaxed() => {}
            (_, JsonValidationType::None) => {
                // Missing separator; reprocess the byte as the value.
                self.state = State::Value;
                return Ok(Some(false));
            }
            _ => return Err(self.error("expected ':' after key")),
        }
        self.state = State::Value;
        Ok(Some(true))
    }

    fn after_value_byte(&mut self, b: u8) -> Result<Option<bool>> {
        let in_object = self.parent_type() == Some(TokenType::Object);
        match b {
            b',' => {
                self.state = if in_object {
                    State::Key { first: false }
                } else {
                    State::Value
                };
                Ok(Some(true))
            }
            b'}' | b']' => {
                self.close_container(b)?;
                Ok(Some(true))
            }
            _ if self.validation.is_relaxed() => {
                // Optional comma.
                self.state = if in_object {
                    State::Key { first: false }
                } else {
                    State::Value
                };
                Ok(Some(false))
            }
            _ => Err(self.error(if in_object {
                "expected ',' or '}'"
            } else {
                "expected ',' or ']'"
            })),
        }
    }

    fn close_container(&mut self, b: u8) -> Result<()> {
        let expected = if b == b'}' {
            TokenType::Object
        } else {
            TokenType::Array
        };
        if self.parent_type() != Some(expected) {
            return Err(self.error(&format!("unexpected '{}'", b as char)));
        }
        self.close_value(self.parent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str, validation: JsonValidationType) -> Result<Vec<Token>> {
        let mut tokenizer = Tokenizer::new(1024, validation);
        let end = tokenizer.write(input.as_bytes(), 0)?;
        assert_eq!(end, input.len());
        tokenizer.finish()?;
        Ok(tokenizer.tokens().to_vec())
    }

    #[test]
    fn test_object_structure() {
        let tokens = tokenize(r#"{"a": [1, "x"], "b": true}"#, JsonValidationType::Standard).unwrap();
        let types: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(
            types,
            [
                TokenType::Object,
                TokenType::Member,
                TokenType::Array,
                TokenType::Primitive,
                TokenType::String,
                TokenType::Member,
                TokenType::Primitive,
            ]
        );
        // Member "a" owns the array; the array owns both elements.
        assert_eq!(tokens[2].parent, 1);
        assert_eq!(tokens[3].parent, 2);
        assert_eq!(tokens[1].next, 5);
        assert_eq!(tokens[0].next, 7);
        // Key data excludes the quotes.
        assert_eq!((tokens[1].start, tokens[1].end), (2, 3));
    }

    #[test]
    fn test_trailing_primitive_closed_by_finish() {
        let tokens = tokenize("42", JsonValidationType::Standard).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_closed());
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        let err = tokenize("{\n  \"a\" 1}", JsonValidationType::Standard).unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, col: 7, .. }), "{err}");

        assert!(tokenize("[1,]", JsonValidationType::Standard).is_err());
        assert!(tokenize("{\"a\":1,}", JsonValidationType::Standard).is_err());
        assert!(tokenize("[1 2]", JsonValidationType::Standard).is_err());
        assert!(tokenize("{a:1}", JsonValidationType::Standard).is_err());
        assert!(tokenize("]", JsonValidationType::Standard).is_err());
    }

    #[test]
    fn test_literals_are_checked_whole() {
        let bad_inputs = [
            "[tru]", "[01]", "[1.]", "[-]", "[nulll]", "[1e]", "[1e+]", "[.5]", "[truex]", "-1-",
            "fals",
        ];
        for bad in bad_inputs {
            assert!(
                matches!(tokenize(bad, JsonValidationType::Standard), Err(Error::Syntax { .. })),
                "{bad}"
            );
        }
        let valid = "[0, -0.25, -4.5e3, 1E+9, 7e-2, true, false, null]";
        let tokens = tokenize(valid, JsonValidationType::Standard).unwrap();
        assert_eq!(tokens.len(), 9);
        assert!(tokens.iter().all(Token::is_closed));
    }

    #[test]
    fn test_literal_split_across_blocks() {
        let mut tokenizer = Tokenizer::new(16, JsonValidationType::Standard);
        tokenizer.write(b"[-12.", 0).unwrap();
        tokenizer.write(b"5e1", 0).unwrap();
        tokenizer.write(b"0,fa", 0).unwrap();
        tokenizer.write(b"lse]", 0).unwrap();
        tokenizer.finish().unwrap();

        let mut tokenizer = Tokenizer::new(16, JsonValidationType::Standard);
        tokenizer.write(b"[12.", 0).unwrap();
        assert!(tokenizer.write(b"]", 0).is_err());
    }

    #[test]
    fn test_raw_control_characters_in_strings() {
        assert!(tokenize("[\"a\nb\"]", JsonValidationType::Standard).is_err());
        assert!(tokenize("\"tab\there\"", JsonValidationType::Standard).is_err());
        // Escaped forms are fine.
        assert!(tokenize(r#"["a\nb\t"]"#, JsonValidationType::Standard).is_ok());
        // Simple mode keeps bare words and raw control characters.
        assert!(tokenize("[\"a\nb\", widget, 01]", JsonValidationType::Simple).is_ok());
    }

    #[test]
    fn test_unterminated_input() {
        let err = tokenize("[1, 2", JsonValidationType::Standard).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
        let err = tokenize("\"abc", JsonValidationType::Standard).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
    }

    #[test]
    fn test_simple_mode_relaxations() {
        let tokens = tokenize("{a = 1 b: hello, c: [1 2,],}", JsonValidationType::Simple).unwrap();
        let members = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Member)
            .count();
        assert_eq!(members, 3);
        assert!(tokens.iter().all(Token::is_closed));
    }

    #[test]
    fn test_discard_keeps_open_chain() {
        let mut tokenizer = Tokenizer::new(64, JsonValidationType::Standard);
        let input = br#"{"a":[1,2,{"b":"par"#;
        tokenizer.write(input, 0).unwrap();
        let remap = tokenizer.discard_completed();
        let kept: Vec<_> = tokenizer.tokens().iter().map(|t| t.token_type).collect();
        assert_eq!(
            kept,
            [
                TokenType::Object,
                TokenType::Member,
                TokenType::Array,
                TokenType::Object,
                TokenType::Member,
                TokenType::String,
            ]
        );
        assert_eq!(remap[3], -1);
        // The partial string continues in the next block.
        assert_eq!(tokenizer.tokens()[5].start, -1);

        tokenizer.write(br#"tial"}]}"#, 0).unwrap();
        tokenizer.finish().unwrap();
        assert!(tokenizer.tokens().iter().all(Token::is_closed));
    }

    #[test]
    fn test_full_buffer_stops_early() {
        let mut tokenizer = Tokenizer::new(16, JsonValidationType::Standard);
        let input = b"[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20]";
        let stop = tokenizer.write(input, 0).unwrap();
        assert!(stop < input.len());
        assert!(tokenizer.is_full());

        tokenizer.discard_completed();
        assert_eq!(tokenizer.tokens().len(), 1);
        let end = tokenizer.write(input, stop).unwrap();
        assert_eq!(end, input.len());
    }
}
