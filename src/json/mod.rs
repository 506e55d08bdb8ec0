//! JSON codec.
//!
//! Writes JSON text through [`JsonWriter`] and reads it back through the
//! streaming [`SerializedObjectReader`]; deserialization only ever looks at
//! [`SerializedValueView`]s, never at raw text.
//!
//! ## Reserved members
//!
//! Objects may carry metadata members, emitted only when needed:
//!
//! | Member                | Meaning                                          |
//! |-----------------------|--------------------------------------------------|
//! | `$serializedId`       | id of an object referenced more than once        |
//! | `$serializedRef`      | a later occurrence of the object with that id    |
//! | `$serializedType`     | runtime type of a [`DynamicValue`](crate::DynamicValue) |
//! | `$serializedVersion`  | version of a type with a registered migration    |
//! | `$serializedElements` | elements of a collection that carries metadata   |
//! | `$serializedValue`    | a scalar that carries metadata                   |
//!
//! Container properties may not use these names.
//!
//! ## Examples
//!
//! ```rust
//! use propbag::{from_json, property_bag, to_json};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Sample { a: f32, b: i32, c: String, d: f64 }
//! property_bag!(Sample { a as "A": f32, b as "B": i32, c as "C": String, d as "D": f64 });
//!
//! let sample = Sample { a: 1.5, b: 3, c: "x".into(), d: 2.5 };
//! let json = to_json(&sample).unwrap();
//! assert_eq!(json, r#"{"A":1.5,"B":3,"C":"x","D":2.5}"#);
//! assert_eq!(from_json::<Sample>(&json).unwrap(), sample);
//! ```

mod adapter;
mod de;
mod migration;
pub(crate) mod scalar;
mod ser;
mod writer;

pub use adapter::{
    JsonAdapter, JsonAdapterFn, JsonDeserializationContext, JsonSerializationContext,
};
pub use migration::{JsonMigration, JsonMigrationContext, JsonMigrationFn};
pub use writer::{write_escaped, JsonWriter};

use crate::adapter::{unbox, AdapterChain, GlobalList};
use crate::parser::{SerializedObjectReader, SerializedObjectReaderConfig, SerializedValueView};
use crate::property::{PropertyValue, ReadOnlyPolicy};
use crate::references::{self, SerializedReferences};
use crate::{registry, Error, JsonWriterOptions, Result, TypeInfo};
use de::JsonDeserializer;
use ser::JsonSerializer;
use std::io::Read;
use std::sync::Arc;

pub const ID: &str = "$serializedId";
pub const REF: &str = "$serializedRef";
pub const TYPE: &str = "$serializedType";
pub const VERSION: &str = "$serializedVersion";
pub const ELEMENTS: &str = "$serializedElements";
pub const VALUE: &str = "$serializedValue";

/// Member names of a non-string keyed dictionary entry.
pub const KEY: &str = "Key";
pub const PAIR_VALUE: &str = "Value";

const RESERVED: [&str; 6] = [ID, REF, TYPE, VERSION, ELEMENTS, VALUE];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

static GLOBAL_ADAPTERS: GlobalList<dyn JsonAdapter> = GlobalList::new();
static GLOBAL_MIGRATIONS: GlobalList<dyn JsonMigration> = GlobalList::new();

/// Adds an adapter consulted by every JSON call, after the call's own adapters.
pub fn register_global_adapter(adapter: impl JsonAdapter + 'static) {
    GLOBAL_ADAPTERS.push(Arc::new(adapter));
}

pub fn register_global_migration(migration: impl JsonMigration + 'static) {
    GLOBAL_MIGRATIONS.push(Arc::new(migration));
}

/// Per-call options of the JSON codec.
///
/// # Examples
///
/// ```rust
/// use propbag::{JsonSerializationParameters, JsonWriterOptions, ReadOnlyPolicy};
///
/// let params = JsonSerializationParameters::new()
///     .with_writer(JsonWriterOptions::pretty())
///     .with_read_only_policy(ReadOnlyPolicy::Strict)
///     .with_serialized_references(false);
/// assert!(params.disable_serialized_references);
/// ```
#[derive(Clone, Default)]
pub struct JsonSerializationParameters {
    /// Adapters tried before the global ones.
    pub user_adapters: Vec<Arc<dyn JsonAdapter>>,
    pub user_migrations: Vec<Arc<dyn JsonMigration>>,
    /// Fail on shared objects instead of writing `$serializedRef`.
    pub disable_serialized_references: bool,
    pub read_only_policy: ReadOnlyPolicy,
    pub writer: JsonWriterOptions,
    pub reader: SerializedObjectReaderConfig,
}

impl JsonSerializationParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user adapter; earlier adapters take priority.
    #[must_use]
    pub fn with_adapter(mut self, adapter: impl JsonAdapter + 'static) -> Self {
        self.user_adapters.push(Arc::new(adapter));
        self
    }

    #[must_use]
    pub fn with_migration(mut self, migration: impl JsonMigration + 'static) -> Self {
        self.user_migrations.push(Arc::new(migration));
        self
    }

    #[must_use]
    pub fn with_serialized_references(mut self, enabled: bool) -> Self {
        self.disable_serialized_references = !enabled;
        self
    }

    #[must_use]
    pub fn with_read_only_policy(mut self, policy: ReadOnlyPolicy) -> Self {
        self.read_only_policy = policy;
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: JsonWriterOptions) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn with_reader(mut self, reader: SerializedObjectReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    fn adapters(&self) -> AdapterChain<dyn JsonAdapter> {
        AdapterChain::new(&self.user_adapters, &GLOBAL_ADAPTERS)
    }

    fn migrations(&self) -> AdapterChain<dyn JsonMigration> {
        AdapterChain::new(&self.user_migrations, &GLOBAL_MIGRATIONS)
    }

    fn deserializer(&self) -> JsonDeserializer {
        let references = (!self.disable_serialized_references).then(SerializedReferences::new);
        JsonDeserializer::new(
            self.adapters(),
            self.migrations(),
            references,
            self.read_only_policy,
        )
    }
}

/// Serializes `value` as compact JSON.
pub fn to_json<T: PropertyValue>(value: &T) -> Result<String> {
    to_json_with(value, &JsonSerializationParameters::default())
}

pub fn to_json_with<T: PropertyValue>(
    value: &T,
    params: &JsonSerializationParameters,
) -> Result<String> {
    registry::register::<T>();
    let ty = TypeInfo::of::<T>();
    let references = if params.disable_serialized_references {
        None
    } else {
        let counts = references::count_references(value, ty)?;
        Some(SerializedReferences::with_counts(counts))
    };
    let mut serializer = JsonSerializer::new(
        params.writer.clone(),
        params.adapters(),
        params.migrations(),
        references,
    );
    serializer.serialize(value, ty, 0)?;
    Ok(serializer.into_string())
}

fn root_view<'r>(reader: &'r mut SerializedObjectReader<'_>) -> Result<SerializedValueView<'r>> {
    reader
        .read_value()?
        .ok_or_else(|| Error::unexpected_eof(1, 1, "a JSON value"))
}

/// Deserializes a `T` from JSON text.
pub fn from_json<T: PropertyValue>(json: &str) -> Result<T> {
    from_json_with(json, &JsonSerializationParameters::default())
}

pub fn from_json_with<T: PropertyValue>(
    json: &str,
    params: &JsonSerializationParameters,
) -> Result<T> {
    let mut reader = SerializedObjectReader::from_str(json, params.reader.clone())?;
    from_view(root_view(&mut reader)?, params)
}

/// Reads JSON into an existing instance.
///
/// Containers and collections are filled in place: properties missing
/// from the input keep their current values, collections are replaced.
///
/// ```rust
/// use propbag::{from_json_into, property_bag, JsonSerializationParameters};
///
/// #[derive(Clone, Default)]
/// struct Window { width: u32, height: u32 }
/// property_bag!(Window { width: u32, height: u32 });
///
/// let mut window = Window { width: 800, height: 600 };
/// from_json_into(r#"{"width":1024}"#, &mut window, &JsonSerializationParameters::new()).unwrap();
/// assert_eq!((window.width, window.height), (1024, 600));
/// ```
pub fn from_json_into<T: PropertyValue>(
    json: &str,
    target: &mut T,
    params: &JsonSerializationParameters,
) -> Result<()> {
    registry::register::<T>();
    let ty = TypeInfo::of::<T>();
    let mut reader = SerializedObjectReader::from_str(json, params.reader.clone())?;
    let view = root_view(&mut reader)?;
    let mut deserializer = params.deserializer();
    match registry::try_get_bag(&ty) {
        Some(bag) if !deserializer.is_claimed(&ty) => deserializer.fill(view, target, &bag),
        _ => {
            *target = unbox(deserializer.deserialize(view, ty, 0)?)?;
            Ok(())
        }
    }
}

/// Deserializes a `T` from any byte source, reading it block by block.
///
/// With [`SerializedObjectReaderConfig::use_read_async`] set, blocks are
/// prefetched on a background thread.
pub fn from_json_reader<T: PropertyValue, R: Read + Send + 'static>(
    source: R,
    params: &JsonSerializationParameters,
) -> Result<T> {
    let mut reader = SerializedObjectReader::from_owned_reader(source, params.reader.clone())?;
    from_view(root_view(&mut reader)?, params)
}

/// Deserializes a `T` from a view obtained while stepping through a document.
///
/// ```rust
/// use propbag::{from_view, JsonSerializationParameters, NodeType, SerializedObjectReader};
///
/// let json = r#"[[1, 2], [3], []]"#;
/// let mut reader = SerializedObjectReader::from_str(json, Default::default()).unwrap();
/// reader.step_until(NodeType::BEGIN_ARRAY).unwrap();
///
/// let params = JsonSerializationParameters::new();
/// let mut sums = Vec::new();
/// while let Some(view) = reader.read_array_element().unwrap() {
///     let row: Vec<i32> = from_view(view, &params).unwrap();
///     sums.push(row.iter().sum::<i32>());
/// }
/// assert_eq!(sums, [3, 3, 0]);
/// ```
pub fn from_view<T: PropertyValue>(
    view: SerializedValueView<'_>,
    params: &JsonSerializationParameters,
) -> Result<T> {
    registry::register::<T>();
    let value = params
        .deserializer()
        .deserialize(view, TypeInfo::of::<T>(), 0)?;
    unbox(value)
}
