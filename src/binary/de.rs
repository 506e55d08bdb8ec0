//! Binary deserialization, the inverse of [`ser`](super::ser).

use super::adapter::{BinaryAdapter, BinaryDeserializationContext};
use super::migration::{BinaryMigration, BinaryMigrationContext};
use super::reader::BinaryReader;
use super::scalar;
use super::writer::Tag;
use crate::adapter::AdapterChain;
use crate::bag::{
    CollectionBag, ContainerBag, DictionaryBag, PropertyBag, ReferenceShape, ValueShape,
};
use crate::dynamic::DynamicValue;
use crate::references::SerializedReferences;
use crate::{primitive, registry, Error, ReadOnlyPolicy, Result, TypeInfo};
use std::any::Any;
use tracing::{debug, warn};

fn unexpected_tag(tag: Tag, ty: TypeInfo) -> Error {
    Error::type_mismatch(ty.name(), &format!("{tag:?} tag"))
}

pub(crate) struct BinaryDeserializer {
    adapters: AdapterChain<dyn BinaryAdapter>,
    migrations: AdapterChain<dyn BinaryMigration>,
    /// `None` when serialized references are disabled.
    references: Option<SerializedReferences>,
    read_only_policy: ReadOnlyPolicy,
}

impl BinaryDeserializer {
    pub(crate) fn new(
        adapters: AdapterChain<dyn BinaryAdapter>,
        migrations: AdapterChain<dyn BinaryMigration>,
        references: Option<SerializedReferences>,
        read_only_policy: ReadOnlyPolicy,
    ) -> Self {
        BinaryDeserializer {
            adapters,
            migrations,
            references,
            read_only_policy,
        }
    }

    pub(crate) fn is_claimed(&self, ty: &TypeInfo) -> bool {
        self.adapters.find(0, |a| a.handles(ty)).is_some()
    }

    pub(crate) fn deserialize(
        &mut self,
        reader: &mut BinaryReader<'_>,
        ty: TypeInfo,
        start: usize,
    ) -> Result<Box<dyn Any>> {
        if let Some((index, adapter)) = self.adapters.find(start, |a| a.handles(&ty)) {
            let mut ctx = BinaryDeserializationContext {
                deserializer: self,
                reader,
                ty,
                index,
            };
            return adapter.deserialize(&mut ctx);
        }
        self.deserialize_default(reader, ty)
    }

    pub(crate) fn deserialize_default(
        &mut self,
        reader: &mut BinaryReader<'_>,
        ty: TypeInfo,
    ) -> Result<Box<dyn Any>> {
        if primitive::is_builtin(&ty) {
            return scalar::read(reader, ty);
        }
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => match reader.read_tag()? {
                    Tag::Null => shape.wrap(None),
                    Tag::None => {
                        let inner = self.deserialize(reader, shape.inner_type(), 0)?;
                        shape.wrap(Some(inner))
                    }
                    tag => Err(unexpected_tag(tag, ty)),
                },
                ValueShape::Enum(shape) => shape.from_i64(reader.read_varint_signed()?),
                ValueShape::Reference(shape) => {
                    self.deserialize_reference(reader, shape.as_ref(), ty)
                }
                ValueShape::Dynamic => match reader.read_tag()? {
                    Tag::Polymorphic => {
                        let name = reader.read_str()?;
                        let runtime = registry::type_by_name(name)
                            .ok_or_else(|| Error::missing_property_bag(name))?;
                        let value = self.deserialize(reader, runtime, 0)?;
                        Ok(Box::new(DynamicValue::from_boxed(value, runtime)))
                    }
                    tag => Err(unexpected_tag(tag, ty)),
                },
            };
        }
        match registry::try_get_bag(&ty) {
            Some(bag) => {
                let mut instance = bag.create_instance()?;
                self.fill(reader, &mut *instance, &bag)?;
                Ok(instance)
            }
            None => Err(Error::unsupported_type(ty.name())),
        }
    }

    pub(crate) fn fill(
        &mut self,
        reader: &mut BinaryReader<'_>,
        target: &mut dyn Any,
        bag: &PropertyBag,
    ) -> Result<()> {
        match bag {
            PropertyBag::Container(bag) => self.fill_container(reader, target, bag.as_ref()),
            PropertyBag::List(bag) => self.fill_collection(reader, target, bag.as_collection()),
            PropertyBag::Set(bag) => self.fill_collection(reader, target, bag.as_collection()),
            PropertyBag::Collection(bag) => self.fill_collection(reader, target, bag.as_ref()),
            PropertyBag::Dictionary(bag) => self.fill_dictionary(reader, target, bag.as_ref()),
        }
    }

    fn deserialize_reference(
        &mut self,
        reader: &mut BinaryReader<'_>,
        shape: &dyn ReferenceShape,
        ty: TypeInfo,
    ) -> Result<Box<dyn Any>> {
        match reader.read_tag()? {
            Tag::Ref => {
                let id = reader.read_u32_varint()?;
                let references = self
                    .references
                    .as_ref()
                    .ok_or(Error::MissingReferenceTable)?;
                return shape.clone_ref(references.get(id)?);
            }
            Tag::None => {}
            tag => return Err(unexpected_tag(tag, ty)),
        }
        let id = self.references.as_mut().map(SerializedReferences::reserve);

        let inner_type = shape.inner_type();
        let claimed = self.is_claimed(&inner_type);
        let handle = match registry::try_get_bag(&inner_type).filter(|_| !claimed) {
            Some(bag) => {
                let handle = shape.create(bag.create_instance()?)?;
                self.remember(id, shape, &*handle)?;
                shape.with_inner_mut(&*handle, &mut |inner| self.fill(reader, inner, &bag))?;
                handle
            }
            None => {
                let inner = self.deserialize(reader, inner_type, 0)?;
                let handle = shape.create(inner)?;
                self.remember(id, shape, &*handle)?;
                handle
            }
        };
        Ok(handle)
    }

    fn remember(
        &mut self,
        id: Option<u32>,
        shape: &dyn ReferenceShape,
        handle: &dyn Any,
    ) -> Result<()> {
        if let (Some(id), Some(references)) = (id, self.references.as_mut()) {
            references.set(id, shape.clone_ref(handle)?);
        }
        Ok(())
    }

    fn fill_container(
        &mut self,
        reader: &mut BinaryReader<'_>,
        target: &mut dyn Any,
        bag: &dyn ContainerBag,
    ) -> Result<()> {
        let ty = bag.type_info();
        match reader.read_tag()? {
            Tag::None => {}
            Tag::Null => return Err(Error::null_container(ty.name())),
            tag => return Err(unexpected_tag(tag, ty)),
        }
        let version = reader.read_u32_varint()?;

        if let Some(migration) = self.migrations.latest(|m| m.handles(&ty), |m| m.version()) {
            if version < migration.version() {
                debug!(
                    type_name = ty.name(),
                    from = version,
                    to = migration.version(),
                    "migrating"
                );
                let mut ctx = BinaryMigrationContext {
                    deserializer: self,
                    reader,
                    serialized_version: version,
                };
                let migrated = migration.migrate(&mut ctx)?;
                return bag.assign(target, migrated);
            }
        }

        for property in bag.properties() {
            let value = self.deserialize(reader, property.value_type(), 0)?;
            if property.is_read_only() {
                match self.read_only_policy {
                    ReadOnlyPolicy::Ignore => {
                        warn!(
                            type_name = ty.name(),
                            property = property.name(),
                            "ignoring value for read-only property"
                        );
                        continue;
                    }
                    ReadOnlyPolicy::Strict => {
                        return Err(Error::read_only(ty.name(), property.name()))
                    }
                }
            }
            property.set_value(target, value)?;
        }
        Ok(())
    }

    fn fill_collection(
        &mut self,
        reader: &mut BinaryReader<'_>,
        target: &mut dyn Any,
        bag: &dyn CollectionBag,
    ) -> Result<()> {
        let count = reader.read_len()?;
        let element_type = bag.element_type();
        bag.clear(target)?;
        // Every element takes at least one byte.
        bag.reserve(target, count.min(reader.remaining()))?;
        for _ in 0..count {
            let element = self.deserialize(reader, element_type, 0)?;
            bag.add(target, element)?;
        }
        Ok(())
    }

    fn fill_dictionary(
        &mut self,
        reader: &mut BinaryReader<'_>,
        target: &mut dyn Any,
        bag: &dyn DictionaryBag,
    ) -> Result<()> {
        let count = reader.read_len()?;
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        bag.clear(target)?;
        bag.reserve(target, count.min(reader.remaining() / 2))?;
        for _ in 0..count {
            let key = self.deserialize(reader, key_type, 0)?;
            let value = self.deserialize(reader, value_type, 0)?;
            bag.insert(target, key, value)?;
        }
        Ok(())
    }
}
