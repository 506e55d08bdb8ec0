//! Node parser: scope tracking over the packed token stream.

use super::packed::PackedBinaryStream;
use super::tokenizer::TokenType;
use bitflags::bitflags;

bitflags! {
    /// Kinds of nodes produced while stepping through a document.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeType: u16 {
        const BEGIN_OBJECT = 1 << 0;
        const END_OBJECT   = 1 << 1;
        const BEGIN_ARRAY  = 1 << 2;
        const END_ARRAY    = 1 << 3;
        const MEMBER       = 1 << 4;
        const STRING       = 1 << 5;
        const PRIMITIVE    = 1 << 6;
        /// Any node that starts a value.
        const VALUE = Self::BEGIN_OBJECT.bits()
            | Self::BEGIN_ARRAY.bits()
            | Self::STRING.bits()
            | Self::PRIMITIVE.bits();
        const ANY = Self::VALUE.bits()
            | Self::END_OBJECT.bits()
            | Self::END_ARRAY.bits()
            | Self::MEMBER.bits();
    }
}

impl NodeType {
    #[inline]
    #[must_use]
    pub fn is_end(self) -> bool {
        self.intersects(NodeType::END_OBJECT | NodeType::END_ARRAY)
    }
}

/// A node: its kind and the packed token it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    pub node_type: NodeType,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    Node(Node),
    /// The stream holds no further complete node yet.
    NeedInput,
}

/// Cursor plus the stack of open objects, arrays and members.
#[derive(Clone, Debug, Default)]
pub struct NodeParser {
    cursor: usize,
    stack: Vec<usize>,
}

impl NodeParser {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        NodeParser {
            cursor: 0,
            stack: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    /// Innermost open object or array, skipping members.
    #[must_use]
    pub fn scope(&self, stream: &PackedBinaryStream) -> Option<usize> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&i| stream.token(i).token_type != TokenType::Member)
    }

    /// Produces the next node, or [`NodeEvent::NeedInput`].
    ///
    /// Members do not produce end nodes; they are popped silently once their
    /// value is done.
    pub fn next_node(&mut self, stream: &PackedBinaryStream) -> NodeEvent {
        while let Some(&top) = self.stack.last() {
            let token = stream.token(top);
            if token.subtree_end < 0 || self.cursor < token.subtree_end as usize {
                break;
            }
            self.stack.pop();
            match token.token_type {
                TokenType::Object => {
                    return NodeEvent::Node(Node {
                        node_type: NodeType::END_OBJECT,
                        index: top,
                    })
                }
                TokenType::Array => {
                    return NodeEvent::Node(Node {
                        node_type: NodeType::END_ARRAY,
                        index: top,
                    })
                }
                _ => {}
            }
        }

        if self.cursor >= stream.len() {
            return NodeEvent::NeedInput;
        }
        let index = self.cursor;
        let token = stream.token(index);
        if !token.data_complete {
            return NodeEvent::NeedInput;
        }
        let node_type = match token.token_type {
            TokenType::Object => NodeType::BEGIN_OBJECT,
            TokenType::Array => NodeType::BEGIN_ARRAY,
            TokenType::Member => NodeType::MEMBER,
            TokenType::String => NodeType::STRING,
            TokenType::Primitive => NodeType::PRIMITIVE,
        };
        self.cursor += 1;
        if matches!(
            token.token_type,
            TokenType::Object | TokenType::Array | TokenType::Member
        ) {
            self.stack.push(index);
        }
        NodeEvent::Node(Node { node_type, index })
    }

    /// Leaves the stack entry at `depth - 1` and everything above it,
    /// moving the cursor past that entry's subtree.
    ///
    /// Returns `false` (and does nothing) while the subtree is incomplete.
    pub fn skip_to(&mut self, stream: &PackedBinaryStream, depth: usize) -> bool {
        let token = stream.token(self.stack[depth - 1]);
        if !token.is_complete() {
            return false;
        }
        self.stack.truncate(depth - 1);
        self.cursor = token.subtree_end as usize;
        true
    }

    /// Applies a packed stream compaction table.
    pub(crate) fn remap(&mut self, remap: &[i32]) {
        self.cursor = remap[..self.cursor].iter().filter(|r| **r >= 0).count();
        for index in &mut self.stack {
            *index = remap[*index] as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::packed::PackedBinaryWriter;
    use crate::parser::tokenizer::Tokenizer;
    use crate::JsonValidationType;

    fn pack(input: &[u8]) -> PackedBinaryStream {
        let mut tokenizer = Tokenizer::new(64, JsonValidationType::Standard);
        let mut writer = PackedBinaryWriter::new();
        let mut stream = PackedBinaryStream::default();
        let to = tokenizer.write(input, 0).unwrap();
        writer.write(&mut stream, tokenizer.tokens(), input, 0, to);
        tokenizer.finish().unwrap();
        writer.write(&mut stream, tokenizer.tokens(), &[], 0, 0);
        stream
    }

    fn events(stream: &PackedBinaryStream) -> Vec<NodeType> {
        let mut parser = NodeParser::default();
        let mut out = Vec::new();
        while let NodeEvent::Node(node) = parser.next_node(stream) {
            out.push(node.node_type);
        }
        out
    }

    #[test]
    fn test_event_sequence() {
        let stream = pack(br#"{"a": [1, "x"], "b": {}}"#);
        assert_eq!(
            events(&stream),
            [
                NodeType::BEGIN_OBJECT,
                NodeType::MEMBER,
                NodeType::BEGIN_ARRAY,
                NodeType::PRIMITIVE,
                NodeType::STRING,
                NodeType::END_ARRAY,
                NodeType::MEMBER,
                NodeType::BEGIN_OBJECT,
                NodeType::END_OBJECT,
                NodeType::END_OBJECT,
            ]
        );
    }

    #[test]
    fn test_skip_to_jumps_over_subtree() {
        let stream = pack(br#"[[1, [2]], 3]"#);
        let mut parser = NodeParser::default();
        parser.next_node(&stream);
        parser.next_node(&stream);
        assert_eq!(parser.stack().len(), 2);
        assert!(parser.skip_to(&stream, 2));
        match parser.next_node(&stream) {
            NodeEvent::Node(node) => {
                assert_eq!(node.node_type, NodeType::PRIMITIVE);
                assert_eq!(stream.data(node.index), b"3");
            }
            NodeEvent::NeedInput => panic!("expected a node"),
        }
        assert_eq!(parser.scope(&stream), Some(0));
    }

    #[test]
    fn test_incomplete_stream_needs_input() {
        let mut tokenizer = Tokenizer::new(64, JsonValidationType::Standard);
        let mut writer = PackedBinaryWriter::new();
        let mut stream = PackedBinaryStream::default();
        let input = br#"[1, "ab"#;
        let to = tokenizer.write(input, 0).unwrap();
        writer.write(&mut stream, tokenizer.tokens(), input, 0, to);

        let mut parser = NodeParser::default();
        assert!(matches!(parser.next_node(&stream), NodeEvent::Node(_)));
        assert!(matches!(parser.next_node(&stream), NodeEvent::Node(_)));
        assert_eq!(parser.next_node(&stream), NodeEvent::NeedInput);
        assert!(!parser.skip_to(&stream, 1));
    }
}
