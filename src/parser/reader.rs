//! The streaming object reader.
//!
//! ```rust
//! use propbag::{SerializedObjectReader, SerializedObjectReaderConfig};
//!
//! let json = r#"{"name": "sensor", "readings": [1, 2, 3]}"#;
//! let mut reader = SerializedObjectReader::from_str(json, SerializedObjectReaderConfig::new()).unwrap();
//!
//! let root = reader.read_object().unwrap().unwrap();
//! let name = root.get("name").unwrap().to_text().unwrap();
//! assert_eq!(name, "sensor");
//! let count = root.get("readings").and_then(|v| v.as_array()).map(|a| a.len());
//! assert_eq!(count, Some(3));
//! ```

use super::block::{BlockSource, PrefetchSource, ReadSource, SliceSource};
use super::config::SerializedObjectReaderConfig;
use super::node::{Node, NodeEvent, NodeParser, NodeType};
use super::packed::{PackedBinaryStream, PackedBinaryWriter};
use super::tokenizer::{TokenType, Tokenizer};
use super::view::{SerializedMemberView, SerializedObjectView, SerializedValueView};
use crate::{Error, Result};
use std::io::Read;
use tracing::trace;

/// Pull reader over a JSON document.
///
/// Input is tokenized block by block into a packed token stream. Read calls
/// hand out views into that stream; consumed tokens are discarded as the
/// reader advances, so memory stays proportional to nesting depth plus the
/// largest value requested at once.
///
/// A `read_*` call returns the next value *within the current scope*: the
/// innermost object or array the reader has entered. Values that do not
/// match are skipped without being buffered whole.
pub struct SerializedObjectReader<'a> {
    config: SerializedObjectReaderConfig,
    source: Box<dyn BlockSource + 'a>,
    block: Vec<u8>,
    block_pos: usize,
    finished: bool,
    tokenizer: Tokenizer,
    writer: PackedBinaryWriter,
    stream: PackedBinaryStream,
    parser: NodeParser,
    retained: usize,
}

impl<'a> SerializedObjectReader<'a> {
    fn new(source: Box<dyn BlockSource + 'a>, config: SerializedObjectReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(SerializedObjectReader {
            tokenizer: Tokenizer::new(config.token_buffer_size, config.validation_type),
            writer: PackedBinaryWriter::new(),
            stream: PackedBinaryStream::with_capacity(config.output_buffer_size),
            parser: NodeParser::with_capacity(config.node_buffer_size),
            block: Vec::with_capacity(config.block_size),
            block_pos: 0,
            finished: false,
            retained: 0,
            source,
            config,
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &'a str, config: SerializedObjectReaderConfig) -> Result<Self> {
        Self::from_slice(json.as_bytes(), config)
    }

    pub fn from_slice(json: &'a [u8], config: SerializedObjectReaderConfig) -> Result<Self> {
        let block_size = config.block_size;
        Self::new(Box::new(SliceSource::new(json, block_size)), config)
    }

    /// Reads blocks synchronously from a borrowed reader.
    pub fn from_reader<R: Read + 'a>(reader: R, config: SerializedObjectReaderConfig) -> Result<Self> {
        let block_size = config.block_size;
        Self::new(Box::new(ReadSource::new(reader, block_size)), config)
    }

    /// Reads blocks from an owned reader, on a background thread when
    /// [`use_read_async`](SerializedObjectReaderConfig::use_read_async) is set.
    pub fn from_owned_reader<R: Read + Send + 'static>(
        reader: R,
        config: SerializedObjectReaderConfig,
    ) -> Result<Self> {
        let block_size = config.block_size;
        let source: Box<dyn BlockSource + 'a> = if config.use_read_async {
            Box::new(PrefetchSource::new(reader, block_size))
        } else {
            Box::new(ReadSource::new(reader, block_size))
        };
        Self::new(source, config)
    }

    #[must_use]
    pub fn config(&self) -> &SerializedObjectReaderConfig {
        &self.config
    }

    /// Tokenizes more input. Returns `false` once the input is exhausted.
    fn fill(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        if self.block_pos >= self.block.len() {
            if !self.source.next_block(&mut self.block)? {
                self.tokenizer.finish()?;
                self.writer
                    .write(&mut self.stream, self.tokenizer.tokens(), &[], 0, 0);
                let remap = self.tokenizer.discard_completed();
                self.writer.remap_tokens(&remap);
                self.finished = true;
                return Ok(true);
            }
            self.block_pos = 0;
            trace!(len = self.block.len(), "tokenizing block");
        }

        let from = self.block_pos;
        let to = self.tokenizer.write(&self.block, from)?;
        self.writer
            .write(&mut self.stream, self.tokenizer.tokens(), &self.block, from, to);
        let remap = self.tokenizer.discard_completed();
        self.writer.remap_tokens(&remap);
        if to < self.block.len() && self.tokenizer.is_full() {
            return Err(Error::TokenBufferOverflow {
                capacity: self.tokenizer.capacity(),
            });
        }
        self.block_pos = to;
        Ok(true)
    }

    fn step_node(&mut self) -> Result<Option<Node>> {
        loop {
            match self.parser.next_node(&self.stream) {
                NodeEvent::Node(node) => return Ok(Some(node)),
                NodeEvent::NeedInput => {
                    if !self.fill()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn eof(&self) -> Error {
        let (line, col) = self.tokenizer.position();
        Error::unexpected_eof(line, col, "end of value")
    }

    /// Buffers the subtree of the stack entry at `depth - 1` completely.
    fn complete(&mut self, depth: usize) -> Result<usize> {
        let index = self.parser.stack()[depth - 1];
        while !self.stream.token(index).is_complete() {
            if !self.fill()? {
                return Err(self.eof());
            }
        }
        self.parser.skip_to(&self.stream, depth);
        Ok(index)
    }

    /// Moves past the subtree of the stack entry at `depth - 1` without
    /// buffering it whole.
    fn skip(&mut self, depth: usize, discard: bool) -> Result<()> {
        loop {
            if self.parser.skip_to(&self.stream, depth) {
                return Ok(());
            }
            match self.parser.next_node(&self.stream) {
                NodeEvent::Node(_) => {}
                NodeEvent::NeedInput => {
                    if discard {
                        self.discard_if_needed();
                    }
                    if !self.fill()? {
                        return Err(self.eof());
                    }
                }
            }
        }
    }

    /// Nearest enclosing object or array of a token, looking through members.
    fn owner(&self, index: usize) -> i32 {
        let parent = self.stream.token(index).parent;
        if parent >= 0 && self.stream.token(parent as usize).token_type == TokenType::Member {
            self.stream.token(parent as usize).parent
        } else {
            parent
        }
    }

    fn scope(&self) -> i32 {
        self.parser
            .scope(&self.stream)
            .map(|i| i as i32)
            .unwrap_or(-1)
    }

    fn next_index(&mut self, mask: NodeType, discard: bool) -> Result<Option<usize>> {
        let mut scope = self.scope();
        loop {
            let Some(node) = self.step_node()? else {
                return Ok(None);
            };
            if node.node_type.is_end() {
                if node.index as i32 == scope {
                    return Ok(None);
                }
                continue;
            }
            let owned = self.owner(node.index) == scope;
            let pushed = self.parser.stack().last() == Some(&node.index);
            if owned && mask.contains(node.node_type) {
                if pushed {
                    let depth = self.parser.stack().len();
                    return self.complete(depth).map(Some);
                }
                return Ok(Some(node.index));
            }
            if owned && node.node_type == NodeType::MEMBER {
                // Look at the member's value.
                continue;
            }
            if pushed {
                let depth = self.parser.stack().len();
                self.skip(depth, discard)?;
                // Skipping may have compacted the stream.
                scope = self.scope();
            }
        }
    }

    fn discard_if_needed(&mut self) {
        let tokens = self.stream.len();
        if tokens > self.config.token_buffer_size.max(2 * self.retained)
            || self.stream.data_len() > self.config.output_buffer_size
        {
            self.discard_completed();
        }
    }

    /// Drops every buffered token the reader has moved past, except the
    /// chain of open scopes.
    ///
    /// Called automatically as reads advance; views handed out earlier are
    /// already invalid by then.
    pub fn discard_completed(&mut self) {
        let n = self.stream.len();
        let cursor = self.parser.cursor();
        let mut keep = vec![false; n];
        for (i, slot) in keep.iter_mut().enumerate() {
            *slot = i >= cursor || self.stream.token(i).subtree_end < 0;
        }
        for &i in self.parser.stack() {
            keep[i] = true;
        }
        for i in (0..n).rev() {
            let parent = self.stream.token(i).parent;
            if keep[i] && parent >= 0 {
                keep[parent as usize] = true;
            }
        }
        let before = self.stream.data_len();
        let remap = self.stream.retain(&keep);
        self.parser.remap(&remap);
        self.writer.remap_packed(&remap);
        self.retained = self.stream.len();
        trace!(
            tokens_before = n,
            tokens_after = self.retained,
            bytes_before = before,
            bytes_after = self.stream.data_len(),
            "discarded consumed tokens"
        );
    }

    /// Advances by one node of any kind, entering objects and arrays.
    pub fn step(&mut self) -> Result<Option<NodeType>> {
        self.discard_if_needed();
        Ok(self.step_node()?.map(|node| node.node_type))
    }

    /// Kind of the next node without consuming it.
    pub fn peek(&mut self) -> Result<Option<NodeType>> {
        loop {
            let mut parser = self.parser.clone();
            match parser.next_node(&self.stream) {
                NodeEvent::Node(node) => return Ok(Some(node.node_type)),
                NodeEvent::NeedInput => {
                    if !self.fill()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Steps until a node matching `mask` has been consumed.
    ///
    /// Use with [`NodeType::BEGIN_ARRAY`] or [`NodeType::BEGIN_OBJECT`] to
    /// enter a scope and stream its contents with the `read_*` methods.
    pub fn step_until(&mut self, mask: NodeType) -> Result<Option<NodeType>> {
        loop {
            match self.step()? {
                Some(node_type) if mask.contains(node_type) => return Ok(Some(node_type)),
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    /// Next node in the current scope whose kind matches `mask`, fully
    /// buffered. `None` at the end of the scope.
    pub fn read(&mut self, mask: NodeType) -> Result<Option<SerializedValueView<'_>>> {
        self.discard_if_needed();
        let index = self.next_index(mask, true)?;
        Ok(index.map(|i| SerializedValueView::new(&self.stream, i)))
    }

    /// Next value in the current scope; member values inside objects.
    pub fn read_value(&mut self) -> Result<Option<SerializedValueView<'_>>> {
        self.read(NodeType::VALUE)
    }

    /// Next value, which must be an object.
    pub fn read_object(&mut self) -> Result<Option<SerializedObjectView<'_>>> {
        match self.read_value()? {
            None => Ok(None),
            Some(value) => match value.as_object() {
                Some(object) => Ok(Some(object)),
                None => Err(Error::type_mismatch("object", value.kind_name())),
            },
        }
    }

    /// Next member of the object being read.
    pub fn read_member(&mut self) -> Result<Option<SerializedMemberView<'_>>> {
        self.require_scope(TokenType::Object)?;
        Ok(self
            .read(NodeType::MEMBER)?
            .and_then(|value| value.as_member()))
    }

    /// Next element of the array being read.
    pub fn read_array_element(&mut self) -> Result<Option<SerializedValueView<'_>>> {
        self.require_scope(TokenType::Array)?;
        self.read(NodeType::VALUE)
    }

    /// Up to `max` further elements of the array being read. An empty batch
    /// marks the end of the array.
    pub fn read_array_element_batch(&mut self, max: usize) -> Result<Vec<SerializedValueView<'_>>> {
        self.require_scope(TokenType::Array)?;
        self.discard_if_needed();
        let mut indices = Vec::with_capacity(max.min(self.config.node_buffer_size));
        while indices.len() < max {
            match self.next_index(NodeType::VALUE, false)? {
                Some(index) => indices.push(index),
                None => break,
            }
        }
        let stream = &self.stream;
        Ok(indices
            .into_iter()
            .map(|i| SerializedValueView::new(stream, i))
            .collect())
    }

    fn require_scope(&self, token_type: TokenType) -> Result<()> {
        let found = self
            .parser
            .scope(&self.stream)
            .map(|i| self.stream.token(i).token_type);
        if found == Some(token_type) {
            return Ok(());
        }
        let name = |t: Option<TokenType>| match t {
            Some(TokenType::Object) => "object",
            Some(TokenType::Array) => "array",
            _ => "document root",
        };
        Err(Error::type_mismatch(name(Some(token_type)), name(found)))
    }

    /// Tokens currently buffered.
    #[must_use]
    pub fn buffered_tokens(&self) -> usize {
        self.stream.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonValidationType, SerializedValue};

    fn small() -> SerializedObjectReaderConfig {
        SerializedObjectReaderConfig::new()
            .with_block_size(16)
            .with_token_buffer_size(16)
            .with_output_buffer_size(16)
    }

    #[test]
    fn test_read_root_values() {
        let mut reader = SerializedObjectReader::from_str("1 \"two\" [3]", small()).unwrap();
        assert_eq!(reader.read_value().unwrap().unwrap().to_value().unwrap(), SerializedValue::from(1));
        assert_eq!(
            reader.read_value().unwrap().unwrap().to_value().unwrap(),
            SerializedValue::from("two")
        );
        let third = reader.read_value().unwrap().unwrap();
        assert_eq!(third.as_array().map(|a| a.len()), Some(1));
        assert!(reader.read_value().unwrap().is_none());
    }

    #[test]
    fn test_members_in_order() {
        let json = r#"{"a": 1, "b": {"c": [true]}, "d": "x"}"#;
        let mut reader = SerializedObjectReader::from_str(json, small()).unwrap();
        assert_eq!(reader.step_until(NodeType::BEGIN_OBJECT).unwrap(), Some(NodeType::BEGIN_OBJECT));
        let mut names = Vec::new();
        while let Some(member) = reader.read_member().unwrap() {
            names.push(member.name().unwrap().into_owned());
            assert!(member.value().is_some());
        }
        assert_eq!(names, ["a", "b", "d"]);
        assert!(reader.read_value().unwrap().is_none());
    }

    #[test]
    fn test_stream_large_array_with_bounded_buffer() {
        let items: Vec<String> = (0..2000).map(|i| format!(r#"{{"id":{i},"tag":"item-{i}"}}"#)).collect();
        let json = format!("[{}]", items.join(","));
        let mut reader = SerializedObjectReader::from_str(&json, small()).unwrap();
        reader.step_until(NodeType::BEGIN_ARRAY).unwrap();

        let mut count = 0i64;
        let mut peak = 0;
        while let Some(element) = reader.read_array_element().unwrap() {
            let id = element.as_object().and_then(|o| o.get("id")).unwrap();
            assert_eq!(id.to_value().unwrap().as_i64(), Some(count));
            count += 1;
            peak = peak.max(reader.buffered_tokens());
        }
        assert_eq!(count, 2000);
        assert!(peak < 64, "peak buffered tokens {peak}");
    }

    #[test]
    fn test_batch_reads() {
        let mut reader = SerializedObjectReader::from_str("[1,2,3,4,5]", small()).unwrap();
        reader.step_until(NodeType::BEGIN_ARRAY).unwrap();
        let first: Vec<_> = reader
            .read_array_element_batch(3)
            .unwrap()
            .iter()
            .map(|v| v.to_value().unwrap())
            .collect();
        assert_eq!(first, [1, 2, 3].map(SerializedValue::from));
        assert_eq!(reader.read_array_element_batch(2).unwrap().len(), 2);
        assert!(reader.read_array_element_batch(2).unwrap().is_empty());
    }

    #[test]
    fn test_read_filters_by_mask() {
        let json = r#"[1, {"skip": [1, 2, 3]}, "s", [4], "t"]"#;
        let mut reader = SerializedObjectReader::from_str(json, small()).unwrap();
        reader.step_until(NodeType::BEGIN_ARRAY).unwrap();
        let mut strings = Vec::new();
        while let Some(v) = reader.read(NodeType::STRING).unwrap() {
            strings.push(v.to_text().unwrap().into_owned());
        }
        assert_eq!(strings, ["s", "t"]);
    }

    #[test]
    fn test_skipping_large_subtree_keeps_scope() {
        let zeros = vec!["0"; 20].join(",");
        let big: Vec<String> = (0..500).map(|i| i.to_string()).collect();
        let json = format!(r#"[{zeros}, ["s0", [{}], "s1"], "outside"]"#, big.join(","));
        let config = small().with_output_buffer_size(64);
        let mut reader = SerializedObjectReader::from_str(&json, config).unwrap();
        reader.step_until(NodeType::BEGIN_ARRAY).unwrap();
        reader.step_until(NodeType::BEGIN_ARRAY).unwrap();

        let mut strings = Vec::new();
        while let Some(v) = reader.read(NodeType::STRING).unwrap() {
            strings.push(v.to_text().unwrap().into_owned());
        }
        assert_eq!(strings, ["s0", "s1"]);
        assert_eq!(
            reader.read_value().unwrap().unwrap().to_value().unwrap(),
            SerializedValue::from("outside")
        );
    }

    #[test]
    fn test_sibling_scalars_keep_their_text() {
        let mut reader = SerializedObjectReader::from_str(r#"["a","bb",12,"",null]"#, small()).unwrap();
        let values = reader.read_value().unwrap().unwrap().to_value().unwrap();
        assert_eq!(
            values,
            SerializedValue::Array(vec![
                SerializedValue::from("a"),
                SerializedValue::from("bb"),
                SerializedValue::from(12),
                SerializedValue::from(""),
                SerializedValue::Null,
            ])
        );
    }

    #[test]
    fn test_scope_errors() {
        let mut reader = SerializedObjectReader::from_str("[1]", small()).unwrap();
        assert!(reader.read_member().is_err());
        let mut reader = SerializedObjectReader::from_str("[1]", small()).unwrap();
        assert!(matches!(reader.read_object(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut reader = SerializedObjectReader::from_str("[true]", small()).unwrap();
        assert_eq!(reader.peek().unwrap(), Some(NodeType::BEGIN_ARRAY));
        assert_eq!(reader.step().unwrap(), Some(NodeType::BEGIN_ARRAY));
        assert_eq!(reader.peek().unwrap(), Some(NodeType::PRIMITIVE));
        assert_eq!(reader.step().unwrap(), Some(NodeType::PRIMITIVE));
        assert_eq!(reader.step().unwrap(), Some(NodeType::END_ARRAY));
        assert_eq!(reader.peek().unwrap(), None);
    }

    #[test]
    fn test_nesting_beyond_token_buffer_overflows() {
        let json = format!("{}{}", "[".repeat(40), "]".repeat(40));
        let mut reader = SerializedObjectReader::from_str(&json, small()).unwrap();
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, Error::TokenBufferOverflow { capacity: 16 }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SerializedObjectReaderConfig::new().with_block_size(1);
        assert!(SerializedObjectReader::from_str("{}", config).is_err());
    }

    #[test]
    fn test_syntax_error_surfaces() {
        let mut reader = SerializedObjectReader::from_str("[1, }", small()).unwrap();
        assert!(reader.read_value().unwrap_err().is_parse_error());
    }

    #[test]
    fn test_simple_mode() {
        let config = small().with_validation_type(JsonValidationType::Simple);
        let mut reader = SerializedObjectReader::from_str("{name = widget, n: 3,}", config).unwrap();
        let value = reader.read_value().unwrap().unwrap().to_value().unwrap();
        assert_eq!(value.get("name").and_then(SerializedValue::as_str), Some("widget"));
        assert_eq!(value.get("n").and_then(SerializedValue::as_i64), Some(3));
    }

    #[test]
    fn test_owned_reader_with_prefetch() {
        let json = br#"{"values": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]}"#.to_vec();
        let config = small().with_read_async(true);
        let mut reader = SerializedObjectReader::from_owned_reader(std::io::Cursor::new(json), config).unwrap();
        let root = reader.read_object().unwrap().unwrap();
        let values = root.get("values").and_then(|v| v.as_array()).unwrap();
        assert_eq!(values.len(), 10);
    }
}
