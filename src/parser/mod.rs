//! Streaming JSON reader.
//!
//! Input flows through four stages:
//!
//! 1. a [`BlockSource`] cuts the input into fixed-size blocks
//! 2. the [`Tokenizer`] turns each block into a bounded buffer of tokens
//! 3. the [`PackedBinaryWriter`] mirrors tokens and their bytes into a
//!    [`PackedBinaryStream`], which outlives the block
//! 4. the [`NodeParser`] walks the packed stream for the
//!    [`SerializedObjectReader`], whose views index into it

mod block;
mod config;
mod node;
mod packed;
mod reader;
mod tokenizer;
mod view;

pub use block::{BlockSource, PrefetchSource, ReadSource, SliceSource};
pub use config::{
    JsonValidationType, SerializedObjectReaderConfig, MIN_BLOCK_SIZE, MIN_NODE_BUFFER_SIZE,
    MIN_OUTPUT_BUFFER_SIZE, MIN_TOKEN_BUFFER_SIZE,
};
pub use node::{Node, NodeEvent, NodeParser, NodeType};
pub use packed::{PackedBinaryStream, PackedBinaryWriter, PackedToken};
pub use reader::SerializedObjectReader;
pub use tokenizer::{Token, TokenType, Tokenizer};
pub use view::{
    SerializedArrayView, SerializedMemberView, SerializedObjectView, SerializedPrimitiveView,
    SerializedStringView, SerializedValueView,
};
