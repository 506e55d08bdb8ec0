//! Output options for the JSON writer.
//!
//! ```rust
//! use propbag::{to_json_with, JsonSerializationParameters, JsonWriterOptions};
//!
//! let params = JsonSerializationParameters::new().with_writer(JsonWriterOptions::pretty());
//! let json = to_json_with(&vec![1, 2], &params).unwrap();
//! assert_eq!(json, "[\n  1,\n  2\n]");
//! ```

/// Formatting of written JSON.
///
/// # Examples
///
/// ```rust
/// use propbag::JsonWriterOptions;
///
/// // Compact: no whitespace at all
/// let options = JsonWriterOptions::new();
/// assert!(!options.pretty);
///
/// // One member or element per line, 4-space indentation
/// let options = JsonWriterOptions::pretty().with_indent(4);
/// assert_eq!(options.indent, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonWriterOptions {
    pub indent: usize,
    pub pretty: bool,
}

impl Default for JsonWriterOptions {
    fn default() -> Self {
        JsonWriterOptions {
            indent: 2,
            pretty: false,
        }
    }
}

impl JsonWriterOptions {
    /// Creates compact options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for pretty-printed output with newlines and indentation.
    #[must_use]
    pub fn pretty() -> Self {
        JsonWriterOptions {
            pretty: true,
            ..Default::default()
        }
    }

    /// Sets the indentation size (number of spaces per level).
    ///
    /// Default is 2. Only affects pretty-printed output.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
