//! JSON serialization.
//!
//! Every value goes through the adapter chain first. Unclaimed values take
//! the built-in path:
//!
//! - built-in scalars are written directly
//! - `Option` writes `null` or its content
//! - enums are written as integers
//! - shared references write their content once and `{"$serializedRef":id}`
//!   afterwards
//! - dynamic values tag their content with `$serializedType`
//! - containers become objects, other collections arrays
//!
//! Metadata members (`$serializedId`, `$serializedType`,
//! `$serializedVersion`) precede the properties of an object. A value that
//! carries metadata but is not written as an object is wrapped as
//! `{..metadata, "$serializedValue": value}`; collections put their elements
//! under `$serializedElements`.

use super::adapter::{JsonAdapter, JsonSerializationContext};
use super::migration::JsonMigration;
use super::writer::JsonWriter;
use super::{scalar, ELEMENTS, ID, KEY, PAIR_VALUE, REF, TYPE, VALUE, VERSION};
use crate::adapter::AdapterChain;
use crate::bag::{
    CollectionBag, ContainerBag, DictionaryBag, PropertyBag, ReferenceShape, ValueShape,
};
use crate::dynamic::DynamicValue;
use crate::references::SerializedReferences;
use crate::{primitive, registry, Error, JsonWriterOptions, Result, TypeInfo};
use std::any::Any;
use std::collections::HashSet;

/// Metadata members written ahead of an object's content.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Metadata {
    pub(crate) id: Option<u32>,
    pub(crate) type_name: Option<&'static str>,
}

impl Metadata {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.type_name.is_none()
    }
}

pub(crate) struct JsonSerializer {
    pub(crate) writer: JsonWriter,
    adapters: AdapterChain<dyn JsonAdapter>,
    migrations: AdapterChain<dyn JsonMigration>,
    /// `None` when serialized references are disabled.
    references: Option<SerializedReferences>,
    seen: HashSet<usize>,
}

impl JsonSerializer {
    pub(crate) fn new(
        options: JsonWriterOptions,
        adapters: AdapterChain<dyn JsonAdapter>,
        migrations: AdapterChain<dyn JsonMigration>,
        references: Option<SerializedReferences>,
    ) -> Self {
        JsonSerializer {
            writer: JsonWriter::new(options),
            adapters,
            migrations,
            references,
            seen: HashSet::new(),
        }
    }

    pub(crate) fn into_string(self) -> String {
        self.writer.into_string()
    }

    /// Writes `value` starting the adapter search at position `start`.
    pub(crate) fn serialize(&mut self, value: &dyn Any, ty: TypeInfo, start: usize) -> Result<()> {
        if let Some((index, adapter)) = self.adapters.find(start, |a| a.handles(&ty)) {
            let mut ctx = JsonSerializationContext {
                serializer: self,
                ty,
                index,
            };
            return adapter.serialize(&mut ctx, value);
        }
        self.serialize_default(value, ty, Metadata::default())
    }

    /// Like [`serialize`](Self::serialize), but with metadata to emit.
    fn serialize_with_meta(
        &mut self,
        value: &dyn Any,
        ty: TypeInfo,
        meta: Metadata,
    ) -> Result<()> {
        if meta.is_empty() {
            return self.serialize(value, ty, 0);
        }
        if let Some((index, adapter)) = self.adapters.find(0, |a| a.handles(&ty)) {
            self.writer.begin_object();
            self.write_meta(meta, None);
            self.writer.write_key(VALUE);
            let mut ctx = JsonSerializationContext {
                serializer: self,
                ty,
                index,
            };
            adapter.serialize(&mut ctx, value)?;
            self.writer.end_object();
            return Ok(());
        }
        self.serialize_default(value, ty, meta)
    }

    pub(crate) fn serialize_default(
        &mut self,
        value: &dyn Any,
        ty: TypeInfo,
        meta: Metadata,
    ) -> Result<()> {
        if primitive::is_builtin(&ty) {
            return self.write_scalar(meta, |s| scalar::write(&mut s.writer, value, ty));
        }
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => match shape.inner(value)? {
                    Some(inner) => self.serialize_with_meta(inner, shape.inner_type(), meta),
                    None => self.write_scalar(meta, |s| {
                        s.writer.write_null();
                        Ok(())
                    }),
                },
                ValueShape::Enum(shape) => {
                    let number = shape.to_i64(value)?;
                    self.write_scalar(meta, |s| {
                        s.writer.write_i64(number);
                        Ok(())
                    })
                }
                ValueShape::Reference(shape) => {
                    self.serialize_reference(shape.as_ref(), value, ty, meta)
                }
                ValueShape::Dynamic => {
                    let dynamic = value
                        .downcast_ref::<DynamicValue>()
                        .ok_or_else(|| Error::type_mismatch("DynamicValue", ty.name()))?;
                    let runtime = dynamic.type_info();
                    let meta = Metadata {
                        type_name: Some(runtime.name()),
                        ..meta
                    };
                    self.serialize_with_meta(dynamic.value(), runtime, meta)
                }
            };
        }
        match registry::try_get_bag(&ty) {
            Some(PropertyBag::Container(bag)) => {
                self.serialize_container(bag.as_ref(), value, meta)
            }
            Some(PropertyBag::List(bag)) => {
                self.serialize_collection(bag.as_collection(), value, meta)
            }
            Some(PropertyBag::Set(bag)) => {
                self.serialize_collection(bag.as_collection(), value, meta)
            }
            Some(PropertyBag::Collection(bag)) => {
                self.serialize_collection(bag.as_ref(), value, meta)
            }
            Some(PropertyBag::Dictionary(bag)) => {
                self.serialize_dictionary(bag.as_ref(), value, meta)
            }
            None => Err(Error::unsupported_type(ty.name())),
        }
    }

    /// Writes a scalar, wrapped when there is metadata to carry.
    fn write_scalar(
        &mut self,
        meta: Metadata,
        write: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if meta.is_empty() {
            return write(self);
        }
        self.writer.begin_object();
        self.write_meta(meta, None);
        self.writer.write_key(VALUE);
        write(self)?;
        self.writer.end_object();
        Ok(())
    }

    fn write_meta(&mut self, meta: Metadata, version: Option<u32>) {
        if let Some(id) = meta.id {
            self.writer.write_key(ID);
            self.writer.write_u64(u64::from(id));
        }
        if let Some(type_name) = meta.type_name {
            self.writer.write_key(TYPE);
            self.writer.write_str(type_name);
        }
        if let Some(version) = version {
            self.writer.write_key(VERSION);
            self.writer.write_u64(u64::from(version));
        }
    }

    fn serialize_reference(
        &mut self,
        shape: &dyn ReferenceShape,
        value: &dyn Any,
        ty: TypeInfo,
        meta: Metadata,
    ) -> Result<()> {
        let identity = shape.identity(value)?;
        let mut meta = meta;
        match self.references.as_mut() {
            Some(references) => {
                if let Some(id) = references.id_of(identity) {
                    self.writer.begin_object();
                    if let Some(type_name) = meta.type_name {
                        self.writer.write_key(TYPE);
                        self.writer.write_str(type_name);
                    }
                    self.writer.write_key(REF);
                    self.writer.write_u64(u64::from(id));
                    self.writer.end_object();
                    return Ok(());
                }
                if references.is_shared(identity) {
                    meta.id = Some(references.assign(identity));
                } else if !references.mark_written(identity) {
                    return Err(Error::DuplicateReference(ty.name().to_string()));
                }
            }
            None => {
                if !self.seen.insert(identity) {
                    return Err(Error::DuplicateReference(ty.name().to_string()));
                }
            }
        }
        let inner_type = shape.inner_type();
        shape.with_inner(value, &mut |inner| {
            self.serialize_with_meta(inner, inner_type, meta)
        })
    }

    fn serialize_container(
        &mut self,
        bag: &dyn ContainerBag,
        value: &dyn Any,
        meta: Metadata,
    ) -> Result<()> {
        let ty = bag.type_info();
        let version = self
            .migrations
            .latest(|m| m.handles(&ty), |m| m.version())
            .map(|m| m.version())
            .filter(|&v| v > 0);

        self.writer.begin_object();
        self.write_meta(meta, version);
        for property in bag.properties() {
            let name = property.name();
            if super::is_reserved(name) {
                return Err(Error::ReservedPropertyName(name.to_string()));
            }
            let value_type = property.value_type();
            self.writer.write_key(name);
            property.get_value(value, &mut |v| self.serialize(v, value_type, 0))?;
        }
        self.writer.end_object();
        Ok(())
    }

    fn serialize_collection(
        &mut self,
        bag: &dyn CollectionBag,
        value: &dyn Any,
        meta: Metadata,
    ) -> Result<()> {
        let element_type = bag.element_type();
        let wrapped = !meta.is_empty();
        if wrapped {
            self.writer.begin_object();
            self.write_meta(meta, None);
            self.writer.write_key(ELEMENTS);
        }
        self.writer.begin_array();
        bag.for_each(value, &mut |element| self.serialize(element, element_type, 0))?;
        self.writer.end_array();
        if wrapped {
            self.writer.end_object();
        }
        Ok(())
    }

    fn serialize_dictionary(
        &mut self,
        bag: &dyn DictionaryBag,
        value: &dyn Any,
        meta: Metadata,
    ) -> Result<()> {
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        let wrapped = !meta.is_empty();
        if wrapped {
            self.writer.begin_object();
            self.write_meta(meta, None);
            self.writer.write_key(ELEMENTS);
        }
        if key_type.is::<String>() {
            self.writer.begin_object();
            bag.for_each(value, &mut |key, item| {
                let key = key
                    .downcast_ref::<String>()
                    .ok_or_else(|| Error::type_mismatch("String", key_type.name()))?;
                if super::is_reserved(key) {
                    return Err(Error::ReservedPropertyName(key.clone()));
                }
                self.writer.write_key(key);
                self.serialize(item, value_type, 0)
            })?;
            self.writer.end_object();
        } else {
            self.writer.begin_array();
            bag.for_each(value, &mut |key, item| {
                self.writer.begin_object();
                self.writer.write_key(KEY);
                self.serialize(key, key_type, 0)?;
                self.writer.write_key(PAIR_VALUE);
                self.serialize(item, value_type, 0)?;
                self.writer.end_object();
                Ok(())
            })?;
            self.writer.end_array();
        }
        if wrapped {
            self.writer.end_object();
        }
        Ok(())
    }
}
