//! Versioned JSON migrations.
//!
//! A container whose type has a registered migration is written with a
//! `$serializedVersion` member holding the migration's version. When the
//! reader finds an older version (a missing member counts as version 0), it
//! hands the raw object to the migration instead of reading properties.
//!
//! ```rust
//! use propbag::json::JsonMigrationFn;
//! use propbag::{from_json_with, property_bag, JsonSerializationParameters};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Settings { volume: f32 }
//! property_bag!(Settings { volume: f32 });
//!
//! // Version 0 stored the volume as a percentage.
//! let migration = JsonMigrationFn::<Settings>::new(1, |ctx| {
//!     let percent: u32 = ctx.read_member("percent")?.unwrap_or(100);
//!     Ok(Settings { volume: percent as f32 / 100.0 })
//! });
//! let params = JsonSerializationParameters::new().with_migration(migration);
//!
//! let settings: Settings = from_json_with(r#"{"percent":50}"#, &params).unwrap();
//! assert_eq!(settings, Settings { volume: 0.5 });
//! ```

use super::de::JsonDeserializer;
use crate::adapter::unbox;
use crate::parser::{SerializedObjectView, SerializedValueView};
use crate::property::PropertyValue;
use crate::registry;
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;

pub trait JsonMigration: Send + Sync {
    fn handles(&self, ty: &TypeInfo) -> bool;

    /// The version written for current data of the claimed type.
    fn version(&self) -> u32;

    /// Builds a current value from an older serialized object.
    fn migrate(&self, ctx: &mut JsonMigrationContext<'_, '_>) -> Result<Box<dyn Any>>;
}

/// Access to an outdated serialized object.
pub struct JsonMigrationContext<'d, 'v> {
    pub(crate) deserializer: &'d mut JsonDeserializer,
    pub(crate) object: SerializedObjectView<'v>,
    pub(crate) serialized_version: u32,
}

impl<'v> JsonMigrationContext<'_, 'v> {
    /// Version found in the input, 0 when absent.
    #[must_use]
    pub fn serialized_version(&self) -> u32 {
        self.serialized_version
    }

    #[must_use]
    pub fn object(&self) -> SerializedObjectView<'v> {
        self.object
    }

    /// Reads member `name` as `V`; `Ok(None)` when the member is missing.
    pub fn read_member<V: PropertyValue>(&mut self, name: &str) -> Result<Option<V>> {
        match self.object.get(name) {
            Some(view) => self.read(view).map(Some),
            None => Ok(None),
        }
    }

    /// Reads any view as `V` through the full adapter chain.
    pub fn read<V: PropertyValue>(&mut self, view: SerializedValueView<'_>) -> Result<V> {
        registry::register::<V>();
        let value = self.deserializer.deserialize(view, TypeInfo::of::<V>(), 0)?;
        unbox(value)
    }
}

type MigrateFn<T> = Box<dyn Fn(&mut JsonMigrationContext<'_, '_>) -> Result<T> + Send + Sync>;

/// A [`JsonMigration`] for exactly the type `T`.
pub struct JsonMigrationFn<T> {
    version: u32,
    migrate: MigrateFn<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> JsonMigrationFn<T> {
    pub fn new(
        version: u32,
        migrate: impl Fn(&mut JsonMigrationContext<'_, '_>) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        JsonMigrationFn {
            version,
            migrate: Box::new(migrate),
            _marker: PhantomData,
        }
    }
}

impl<T: Any> JsonMigration for JsonMigrationFn<T> {
    fn handles(&self, ty: &TypeInfo) -> bool {
        ty.is::<T>()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn migrate(&self, ctx: &mut JsonMigrationContext<'_, '_>) -> Result<Box<dyn Any>> {
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
