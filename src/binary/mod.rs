//! Binary codec.
//!
//! A flat stream with no field names: the reader walks the same property
//! bags as the writer, in the same order. Only values that can be absent,
//! shared or polymorphic carry a leading [`Tag`].
//!
//! - built-in scalars: fixed-width little-endian, strings length-prefixed
//! - `Option`: [`Tag::Null`], or [`Tag::None`] followed by the value
//! - enums: zigzag varint of the discriminant
//! - shared references: [`Tag::Ref`] and the id of an earlier occurrence,
//!   or [`Tag::None`] and the content; ids are implicit, counting first
//!   occurrences in stream order
//! - dynamic values: [`Tag::Polymorphic`], the runtime type name, the value
//! - containers: [`Tag::None`], version varint, properties in declaration
//!   order
//! - collections: element count, elements; dictionaries: entry count, then
//!   key and value of each entry
//!
//! ```rust
//! use propbag::{from_binary, property_bag, to_binary};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Sample { a: f32, b: i32, c: String, d: f64 }
//! property_bag!(Sample { a as "A": f32, b as "B": i32, c as "C": String, d as "D": f64 });
//!
//! let sample = Sample { a: 1.5, b: 3, c: "x".into(), d: 2.5 };
//! let bytes = to_binary(&sample).unwrap();
//! // tag, version, 4 + 4 + (1 + 1) + 8 payload bytes
//! assert_eq!(bytes.len(), 20);
//! assert_eq!(from_binary::<Sample>(&bytes).unwrap(), sample);
//! ```

mod adapter;
mod de;
mod migration;
mod reader;
mod scalar;
mod ser;
mod writer;

pub use adapter::{
    BinaryAdapter, BinaryAdapterFn, BinaryDeserializationContext, BinarySerializationContext,
};
pub use migration::{BinaryMigration, BinaryMigrationContext, BinaryMigrationFn};
pub use reader::BinaryReader;
pub use writer::{BinaryWriter, Tag};

use crate::adapter::{unbox, AdapterChain, GlobalList};
use crate::property::{PropertyValue, ReadOnlyPolicy};
use crate::references::SerializedReferences;
use crate::{registry, Error, Result, TypeInfo};
use de::BinaryDeserializer;
use ser::BinarySerializer;
use std::sync::Arc;

static GLOBAL_ADAPTERS: GlobalList<dyn BinaryAdapter> = GlobalList::new();
static GLOBAL_MIGRATIONS: GlobalList<dyn BinaryMigration> = GlobalList::new();

/// Adds an adapter consulted by every binary call, after the call's own adapters.
pub fn register_global_adapter(adapter: impl BinaryAdapter + 'static) {
    GLOBAL_ADAPTERS.push(Arc::new(adapter));
}

pub fn register_global_migration(migration: impl BinaryMigration + 'static) {
    GLOBAL_MIGRATIONS.push(Arc::new(migration));
}

/// Per-call options of the binary codec.
#[derive(Clone, Default)]
pub struct BinarySerializationParameters {
    /// Adapters tried before the global ones.
    pub user_adapters: Vec<Arc<dyn BinaryAdapter>>,
    pub user_migrations: Vec<Arc<dyn BinaryMigration>>,
    /// Fail on shared objects instead of writing reference tags.
    pub disable_serialized_references: bool,
    pub read_only_policy: ReadOnlyPolicy,
}

impl BinarySerializationParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: impl BinaryAdapter + 'static) -> Self {
        self.user_adapters.push(Arc::new(adapter));
        self
    }

    #[must_use]
    pub fn with_migration(mut self, migration: impl BinaryMigration + 'static) -> Self {
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

    fn adapters(&self) -> AdapterChain<dyn BinaryAdapter> {
        AdapterChain::new(&self.user_adapters, &GLOBAL_ADAPTERS)
    }

    fn migrations(&self) -> AdapterChain<dyn BinaryMigration> {
        AdapterChain::new(&self.user_migrations, &GLOBAL_MIGRATIONS)
    }

    fn references(&self) -> Option<SerializedReferences> {
        (!self.disable_serialized_references).then(SerializedReferences::new)
    }

    fn deserializer(&self) -> BinaryDeserializer {
        BinaryDeserializer::new(
            self.adapters(),
            self.migrations(),
            self.references(),
            self.read_only_policy,
        )
    }
}

pub fn to_binary<T: PropertyValue>(value: &T) -> Result<Vec<u8>> {
    to_binary_with(value, &BinarySerializationParameters::default())
}

pub fn to_binary_with<T: PropertyValue>(
    value: &T,
    params: &BinarySerializationParameters,
) -> Result<Vec<u8>> {
    registry::register::<T>();
    let mut serializer =
        BinarySerializer::new(params.adapters(), params.migrations(), params.references());
    serializer.serialize(value, TypeInfo::of::<T>(), 0)?;
    Ok(serializer.into_bytes())
}

pub fn from_binary<T: PropertyValue>(bytes: &[u8]) -> Result<T> {
    from_binary_with(bytes, &BinarySerializationParameters::default())
}

/// Deserializes a `T`; the input must hold exactly one value.
pub fn from_binary_with<T: PropertyValue>(
    bytes: &[u8],
    params: &BinarySerializationParameters,
) -> Result<T> {
    registry::register::<T>();
    let mut reader = BinaryReader::new(bytes);
    let value = params
        .deserializer()
        .deserialize(&mut reader, TypeInfo::of::<T>(), 0)?;
    finish(&reader)?;
    unbox(value)
}

/// Reads binary data into an existing instance, like
/// [`from_json_into`](crate::from_json_into).
pub fn from_binary_into<T: PropertyValue>(
    bytes: &[u8],
    target: &mut T,
    params: &BinarySerializationParameters,
) -> Result<()> {
    registry::register::<T>();
    let ty = TypeInfo::of::<T>();
    let mut reader = BinaryReader::new(bytes);
    let mut deserializer = params.deserializer();
    match registry::try_get_bag(&ty) {
        Some(bag) if !deserializer.is_claimed(&ty) => {
            deserializer.fill(&mut reader, target, &bag)?;
        }
        _ => *target = unbox(deserializer.deserialize(&mut reader, ty, 0)?)?,
    }
    finish(&reader)
}

fn finish(reader: &BinaryReader<'_>) -> Result<()> {
    if reader.is_at_end() {
        Ok(())
    } else {
        Err(Error::custom(format!(
            "{} trailing bytes after the value",
            reader.remaining()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{property_bag, property_enum, DynamicValue};
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use std::collections::{BTreeSet, HashMap};
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    enum Shade {
        #[default]
        Light = -1,
        Dark = 1,
    }
    property_enum!(Shade { Light, Dark });

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Palette {
        name: String,
        shade: Shade,
        accent: Option<u32>,
        tags: BTreeSet<String>,
        weights: IndexMap<String, f32>,
    }
    property_bag!(Palette {
        name: String,
        shade: Shade,
        accent: Option<u32>,
        tags: BTreeSet<String>,
        weights: IndexMap<String, f32>,
    });

    #[test]
    fn test_container_layout() {
        let palette = Palette {
            name: "p".into(),
            shade: Shade::Light,
            accent: None,
            ..Default::default()
        };
        let bytes = to_binary(&palette).unwrap();
        // None tag, version 0, "p", zigzag(-1), Null tag, 0 tags, 0 weights
        assert_eq!(bytes, [1, 0, 1, b'p', 1, 0, 0, 0]);
        assert_eq!(from_binary::<Palette>(&bytes).unwrap(), palette);
    }

    #[test]
    fn test_round_trip_with_collections() {
        let mut palette = Palette {
            name: "warm".into(),
            shade: Shade::Dark,
            accent: Some(0xFF8800),
            ..Default::default()
        };
        palette.tags.insert("orange".into());
        palette.weights.insert("r".into(), 1.0);
        palette.weights.insert("g".into(), 0.5);
        let bytes = to_binary(&palette).unwrap();
        assert_eq!(from_binary::<Palette>(&bytes).unwrap(), palette);
    }

    #[test]
    fn test_non_string_keys() {
        let mut map = HashMap::new();
        map.insert(3_i64, vec![Shade::Dark]);
        let bytes = to_binary(&map).unwrap();
        assert_eq!(from_binary::<HashMap<i64, Vec<Shade>>>(&bytes).unwrap(), map);
    }

    #[test]
    fn test_shared_references() {
        let shared = Rc::new(RefCell::new(String::from("s")));
        let list = vec![shared.clone(), shared];
        let bytes = to_binary(&list).unwrap();
        assert_eq!(bytes, [2, 1, 1, b's', 2, 0]);

        let back: Vec<Rc<RefCell<String>>> = from_binary(&bytes).unwrap();
        assert!(Rc::ptr_eq(&back[0], &back[1]));

        let params = BinarySerializationParameters::new().with_serialized_references(false);
        assert!(matches!(
            to_binary_with(&list, &params),
            Err(Error::DuplicateReference(_))
        ));
        assert!(matches!(
            from_binary_with::<Vec<Rc<RefCell<String>>>>(&bytes, &params),
            Err(Error::MissingReferenceTable)
        ));
    }

    #[test]
    fn test_dynamic_values() {
        let values = vec![DynamicValue::new(7_u8), DynamicValue::new(String::from("x"))];
        let bytes = to_binary(&values).unwrap();
        assert_eq!(&bytes[..5], &[2, 3, 2, b'u', b'8']);
        let back: Vec<DynamicValue> = from_binary(&bytes).unwrap();
        assert_eq!(back[0].downcast_ref::<u8>(), Some(&7));
        assert_eq!(back[1].downcast_ref::<String>().map(String::as_str), Some("x"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            from_binary::<Palette>(&[0]),
            Err(Error::NullContainer { .. })
        ));
        assert!(matches!(
            from_binary::<u16>(&[1]),
            Err(Error::UnexpectedEof { .. })
        ));
        assert!(from_binary::<u8>(&[1, 2]).is_err());
        assert!(from_binary::<Shade>(&[4]).is_err());
    }

    #[test]
    fn test_collections_are_presized_from_count() {
        let values: Vec<u32> = (0..100).collect();
        let back: Vec<u32> = from_binary(&to_binary(&values).unwrap()).unwrap();
        assert_eq!(back, values);
        assert_eq!(back.capacity(), 100);

        // A bogus count is bounded by the input left, then runs out of bytes.
        let bogus = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 1];
        assert!(matches!(
            from_binary::<Vec<u8>>(&bogus),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_fill_existing_instance() {
        let mut palette = Palette {
            name: "old".into(),
            ..Default::default()
        };
        palette.tags.insert("stale".into());
        let source = Palette {
            name: "new".into(),
            ..Default::default()
        };
        let bytes = to_binary(&source).unwrap();
        from_binary_into(&bytes, &mut palette, &BinarySerializationParameters::new()).unwrap();
        assert_eq!(palette, source);
    }
}
