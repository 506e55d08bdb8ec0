//! # propbag
//!
//! Reflection-free property visitation and serialization.
//!
//! ## What is a property bag?
//!
//! A property bag describes the members of a type as named, typed
//! [`Property`] accessors, registered once per type in a process-wide
//! registry. Generic algorithms (the JSON and binary codecs, migrations, the
//! [`inspect`] dump, your own [visitors](visit)) then walk any registered
//! value through those bags without knowing its concrete type.
//!
//! ## Key Features
//!
//! - **Double dispatch**: visitors implement only the capabilities they need
//!   (containers, lists, sets, dictionaries, generic collections)
//! - **Adapters**: per-type overrides resolved from user, then global
//!   adapters, with explicit delegation to the next link or the built-in path
//! - **Shared graphs**: `Rc<RefCell<T>>` objects are written once and
//!   referenced by id afterwards, so cycles round-trip to the same instances
//! - **Migrations**: versioned readers for outdated container layouts
//! - **Streaming JSON**: a block-based tokenizer feeding a packed token
//!   stream, with borrowed views that never re-read the input
//!
//! ## Quick Start
//!
//! ```rust
//! use propbag::{from_binary, from_json, property_bag, to_binary, to_json};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct User {
//!     id: u32,
//!     name: String,
//!     tags: Vec<String>,
//! }
//!
//! property_bag!(User { id: u32, name: String, tags: Vec<String> });
//!
//! let user = User { id: 123, name: "Alice".into(), tags: vec!["admin".into()] };
//!
//! let json = to_json(&user).unwrap();
//! assert_eq!(json, r#"{"id":123,"name":"Alice","tags":["admin"]}"#);
//! assert_eq!(from_json::<User>(&json).unwrap(), user);
//!
//! let bytes = to_binary(&user).unwrap();
//! assert_eq!(from_binary::<User>(&bytes).unwrap(), user);
//! ```
//!
//! ### Reading large documents
//!
//! ```rust
//! use propbag::{NodeType, SerializedObjectReader, SerializedObjectReaderConfig};
//!
//! let json = r#"{"items": [{"id": 1}, {"id": 2}, {"id": 3}]}"#;
//! let config = SerializedObjectReaderConfig::new().with_block_size(16);
//! let mut reader = SerializedObjectReader::from_str(json, config).unwrap();
//!
//! reader.step_until(NodeType::BEGIN_ARRAY).unwrap();
//! let mut ids = Vec::new();
//! while let Some(item) = reader.read_array_element().unwrap() {
//!     let id = item.as_object().and_then(|o| o.get("id")).unwrap();
//!     ids.push(id.as_primitive().unwrap().as_i64().unwrap());
//! }
//! assert_eq!(ids, [1, 2, 3]);
//! ```
//!
//! ### Building values with serialized!
//!
//! ```rust
//! use propbag::{serialized, SerializedValue};
//!
//! let data = serialized!({ "name": "Alice", "tags": ["rust", "json"] });
//! assert_eq!(data.get("name").and_then(SerializedValue::as_str), Some("Alice"));
//! ```
//!
//! ## Concurrency
//!
//! The registry and the global adapter lists are shared and lock-protected.
//! Every codec call owns its writer or reader, adapter chain and reference
//! table for the duration of the call.
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - All buffer indexing is bounds-checked
//! - Proper error propagation with `Result` types

mod adapter;
pub mod bag;
pub mod binary;
pub mod dynamic;
pub mod error;
pub mod inspect;
pub mod json;
pub mod macros;
pub mod map;
pub mod options;
pub mod parser;
pub mod primitive;
pub mod property;
mod references;
pub mod registry;
pub mod type_info;
pub mod value;
pub mod visit;

pub use bag::{
    register_enum, BagKind, CollectionBag, ContainerBag, ContainerPropertyBag, DictionaryBag,
    ListBag, PropertyBag, PropertyEnum, SetBag, ValueShape,
};
pub use binary::{
    from_binary, from_binary_into, from_binary_with, to_binary, to_binary_with,
    BinarySerializationParameters,
};
pub use dynamic::DynamicValue;
pub use error::{Error, Result};
pub use json::{
    from_json, from_json_into, from_json_reader, from_json_with, from_view, to_json,
    to_json_with, JsonSerializationParameters,
};
pub use map::SerializedMap;
pub use options::JsonWriterOptions;
pub use parser::{
    JsonValidationType, NodeType, SerializedArrayView, SerializedMemberView,
    SerializedObjectReader, SerializedObjectReaderConfig, SerializedObjectView,
    SerializedPrimitiveView, SerializedStringView, SerializedValueView,
};
pub use property::{DelegateProperty, Property, PropertyValue, ReadOnlyPolicy};
pub use type_info::TypeInfo;
pub use value::{Number, SerializedValue};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }
    property_bag!(Point { x: i32, y: i32 });

    #[derive(Clone, Default, Debug, PartialEq)]
    struct User {
        id: u32,
        name: String,
        active: bool,
        tags: Vec<String>,
        home: Option<Point>,
    }
    property_bag!(User {
        id: u32,
        name: String,
        active: bool,
        tags: Vec<String>,
        home: Option<Point>,
    });

    fn user() -> User {
        User {
            id: 123,
            name: "Alice".to_string(),
            active: true,
            tags: vec!["admin".to_string(), "user".to_string()],
            home: Some(Point { x: 1, y: 2 }),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let json = to_json(&user()).unwrap();
        assert_eq!(
            json,
            r#"{"id":123,"name":"Alice","active":true,"tags":["admin","user"],"home":{"x":1,"y":2}}"#
        );
        assert_eq!(from_json::<User>(&json).unwrap(), user());
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes = to_binary(&user()).unwrap();
        assert_eq!(from_binary::<User>(&bytes).unwrap(), user());
    }

    #[test]
    fn test_pretty_printing() {
        let params = JsonSerializationParameters::new().with_writer(JsonWriterOptions::pretty());
        let json = to_json_with(&user(), &params).unwrap();
        assert!(json.contains("\n  \"home\": {\n    \"x\": 1,"));
        assert_eq!(from_json::<User>(&json).unwrap(), user());
    }

    #[test]
    fn test_to_value() {
        let json = to_json(&Point { x: 1, y: 2 }).unwrap();
        let mut reader = SerializedObjectReader::from_str(&json, Default::default()).unwrap();
        let value = reader.read_value().unwrap().unwrap().to_value().unwrap();
        assert_eq!(value.get("x"), Some(&SerializedValue::Number(Number::Integer(1))));
        assert_eq!(value.get("y"), Some(&SerializedValue::Number(Number::Integer(2))));
    }

    #[test]
    fn test_arrays_and_maps() {
        let numbers = vec![1, 2, 3, 4, 5];
        let json = to_json(&numbers).unwrap();
        assert_eq!(json, "[1,2,3,4,5]");
        assert_eq!(from_json::<Vec<i32>>(&json).unwrap(), numbers);

        let mut map = BTreeMap::new();
        map.insert("p".to_string(), Point { x: -1, y: 0 });
        let bytes = to_binary(&map).unwrap();
        assert_eq!(from_binary::<BTreeMap<String, Point>>(&bytes).unwrap(), map);
    }
}
