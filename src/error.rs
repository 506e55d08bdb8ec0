//! Error types for property visitation, codecs and the JSON reader.
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing is
//! retried internally: the caller decides whether to abort, skip or
//! substitute a default.
//!
//! ## Error Categories
//!
//! - **Dispatch errors**: [`Error::MissingPropertyBag`], [`Error::NullContainer`],
//!   [`Error::InvalidContainerType`]
//! - **Parse errors**: malformed JSON with line/column information, and reader
//!   misconfiguration rejected at construction time
//! - **Read-only violations**: [`Error::ReadOnlyProperty`] under the strict policy
//! - **Reference errors**: reference tokens without a reference table, or ids
//!   that were never assigned
//!
//! ## Examples
//!
//! ```rust
//! use propbag::Error;
//!
//! let err = Error::syntax(3, 14, "unexpected ']'");
//! assert!(err.to_string().contains("line 3"));
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors raised by visitation, serialization and parsing.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error while reading a block source.
    #[error("IO error: {0}")]
    Io(String),

    /// No property bag is registered for the requested type.
    #[error("No property bag registered for type `{type_name}`")]
    MissingPropertyBag { type_name: String },

    /// A null container was supplied where a value is required.
    #[error("Container of type `{type_name}` is null")]
    NullContainer { type_name: String },

    /// The value's type is known but is not container-shaped.
    #[error("Type `{type_name}` is not a valid container type")]
    InvalidContainerType { type_name: String },

    /// Malformed JSON input.
    #[error("Syntax error at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// The input ended in the middle of a value.
    #[error("Unexpected end of input at line {line}, column {col}: expected {expected}")]
    UnexpectedEof {
        line: usize,
        col: usize,
        expected: String,
    },

    /// Reader buffers configured below their minimum viable size.
    #[error("Invalid reader configuration: {0}")]
    InvalidConfiguration(String),

    /// Nesting is deeper than the token buffer can hold.
    #[error("Token buffer overflow: nesting exceeds capacity of {capacity} tokens")]
    TokenBufferOverflow { capacity: usize },

    /// Type mismatch between the stream and the declared value type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// No adapter, shape or property bag can handle the type.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A property name collides with the reserved `$serialized*` members.
    #[error("Property name `{0}` collides with a reserved serialization key")]
    ReservedPropertyName(String),

    /// The bag cannot construct a new instance of its container.
    #[error("Property bag for `{0}` has no constructor")]
    MissingConstructor(String),

    /// Attempted to write a read-only property under the strict policy.
    #[error("Property `{property}` of `{container}` is read-only")]
    ReadOnlyProperty { container: String, property: String },

    /// A reference token was read while serialized references are disabled.
    #[error("Encountered a serialized reference but no reference table is configured")]
    MissingReferenceTable,

    /// The same object identity was seen twice while references are disabled.
    #[error("Object of type `{0}` is referenced more than once but serialized references are disabled")]
    DuplicateReference(String),

    /// A reference id that was never assigned.
    #[error("Unresolved serialized reference id {0}")]
    UnresolvedReference(u32),

    /// A migration failed or could not be applied.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a syntax error with line and column information.
    ///
    /// ```rust
    /// use propbag::Error;
    ///
    /// let err = Error::syntax(10, 5, "unexpected token");
    /// assert!(err.to_string().contains("column 5"));
    /// ```
    pub fn syntax(line: usize, col: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            col,
            msg: msg.to_string(),
        }
    }

    /// Creates an unexpected end-of-input error.
    pub fn unexpected_eof(line: usize, col: usize, expected: &str) -> Self {
        Error::UnexpectedEof {
            line,
            col,
            expected: expected.to_string(),
        }
    }

    /// Creates a type mismatch error.
    ///
    /// ```rust
    /// use propbag::Error;
    ///
    /// let err = Error::type_mismatch("integer", "string");
    /// assert!(err.to_string().contains("expected integer"));
    /// ```
    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn missing_property_bag(type_name: &str) -> Self {
        Error::MissingPropertyBag {
            type_name: type_name.to_string(),
        }
    }

    pub fn null_container(type_name: &str) -> Self {
        Error::NullContainer {
            type_name: type_name.to_string(),
        }
    }

    pub fn invalid_container_type(type_name: &str) -> Self {
        Error::InvalidContainerType {
            type_name: type_name.to_string(),
        }
    }

    pub fn invalid_configuration(msg: &str) -> Self {
        Error::InvalidConfiguration(msg.to_string())
    }

    pub fn unsupported_type(type_name: &str) -> Self {
        Error::UnsupportedType(type_name.to_string())
    }

    pub fn read_only(container: &str, property: &str) -> Self {
        Error::ReadOnlyProperty {
            container: container.to_string(),
            property: property.to_string(),
        }
    }

    pub fn migration<T: fmt::Display>(msg: T) -> Self {
        Error::Migration(msg.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for block source failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns `true` for errors raised by the tokenizer or reader configuration.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. }
                | Error::UnexpectedEof { .. }
                | Error::InvalidConfiguration(_)
                | Error::TokenBufferOverflow { .. }
        )
    }

    /// Returns `true` for the three visitation dispatch failures.
    #[must_use]
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            Error::MissingPropertyBag { .. }
                | Error::NullContainer { .. }
                | Error::InvalidContainerType { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(Error::syntax(1, 1, "x").is_parse_error());
        assert!(Error::invalid_configuration("block").is_parse_error());
        assert!(Error::missing_property_bag("Foo").is_dispatch_error());
        assert!(!Error::MissingReferenceTable.is_dispatch_error());
    }

    #[test]
    fn test_messages_name_the_type() {
        let err = Error::null_container("app::Player");
        assert!(err.to_string().contains("app::Player"));
    }
}
