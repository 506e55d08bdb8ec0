//! Versioned binary migrations.
//!
//! Every container is written with a version varint: the version of the
//! latest migration registered for its type, or 0. When the reader finds an
//! older version, the migration reads the old layout field by field and
//! returns a current value.
//!
//! ```rust
//! use propbag::binary::{BinaryMigrationFn, BinaryWriter, Tag};
//! use propbag::{from_binary_with, property_bag, BinarySerializationParameters};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Point { x: f64, y: f64 }
//! property_bag!(Point { x: f64, y: f64 });
//!
//! // Version 0 stored integer coordinates.
//! let migration = BinaryMigrationFn::<Point>::new(1, |ctx| {
//!     let x: i32 = ctx.read()?;
//!     let y: i32 = ctx.read()?;
//!     Ok(Point { x: x.into(), y: y.into() })
//! });
//! let params = BinarySerializationParameters::new().with_migration(migration);
//!
//! let mut old = BinaryWriter::new();
//! old.write_tag(Tag::None);
//! old.write_varint(0);
//! old.write_i32(3);
//! old.write_i32(-4);
//!
//! let point: Point = from_binary_with(old.as_bytes(), &params).unwrap();
//! assert_eq!(point, Point { x: 3.0, y: -4.0 });
//! ```

use super::de::BinaryDeserializer;
use super::reader::BinaryReader;
use crate::adapter::unbox;
use crate::property::PropertyValue;
use crate::{registry, Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;

pub trait BinaryMigration: Send + Sync {
    fn handles(&self, ty: &TypeInfo) -> bool;

    /// The version written for current data of the claimed type.
    fn version(&self) -> u32;

    /// Reads the properties of an older layout and builds a current value.
    fn migrate(&self, ctx: &mut BinaryMigrationContext<'_, '_, '_>) -> Result<Box<dyn Any>>;
}

/// Positioned right after the version of an outdated container.
pub struct BinaryMigrationContext<'d, 'r, 'b> {
    pub(crate) deserializer: &'d mut BinaryDeserializer,
    pub(crate) reader: &'r mut BinaryReader<'b>,
    pub(crate) serialized_version: u32,
}

impl<'b> BinaryMigrationContext<'_, '_, 'b> {
    #[must_use]
    pub fn serialized_version(&self) -> u32 {
        self.serialized_version
    }

    /// Reads the next value as `V` through the full adapter chain.
    pub fn read<V: PropertyValue>(&mut self) -> Result<V> {
        registry::register::<V>();
        let value = self
            .deserializer
            .deserialize(self.reader, TypeInfo::of::<V>(), 0)?;
        unbox(value)
    }

    pub fn reader(&mut self) -> &mut BinaryReader<'b> {
        &mut *self.reader
    }
}

type MigrateFn<T> =
    Box<dyn Fn(&mut BinaryMigrationContext<'_, '_, '_>) -> Result<T> + Send + Sync>;

/// A [`BinaryMigration`] for exactly the type `T`.
pub struct BinaryMigrationFn<T> {
    version: u32,
    migrate: MigrateFn<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> BinaryMigrationFn<T> {
    pub fn new(
        version: u32,
        migrate: impl Fn(&mut BinaryMigrationContext<'_, '_, '_>) -> Result<T>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        BinaryMigrationFn {
            version,
            migrate: Box::new(migrate),
            _marker: PhantomData,
        }
    }
}

impl<T: Any> BinaryMigration for BinaryMigrationFn<T> {
    fn handles(&self, ty: &TypeInfo) -> bool {
        ty.is::<T>()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn migrate(&self, ctx: &mut BinaryMigrationContext<'_, '_, '_>) -> Result<Box<dyn Any>> {
        (self.migrate)(ctx)
            .map(|v| Box::new(v) as Box<dyn Any>)
            .map_err(|e| match e {
                Error::Migration(_) => e,
                other => Error::migration(format!(
                    "{} from version {}: {other}",
                    std::any::type_name::<T>(),
                    ctx.serialized_version
                )),
            })
    }
}
