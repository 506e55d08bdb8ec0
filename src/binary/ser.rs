//! Binary serialization through the adapter chain and the registry.

use super::adapter::{BinaryAdapter, BinarySerializationContext};
use super::migration::BinaryMigration;
use super::scalar;
use super::writer::{BinaryWriter, Tag};
use crate::adapter::AdapterChain;
use crate::bag::{
    CollectionBag, ContainerBag, DictionaryBag, PropertyBag, ReferenceShape, ValueShape,
};
use crate::dynamic::DynamicValue;
use crate::references::SerializedReferences;
use crate::{primitive, registry, Error, Result, TypeInfo};
use std::any::Any;
use std::collections::HashSet;

pub(crate) struct BinarySerializer {
    pub(crate) writer: BinaryWriter,
    adapters: AdapterChain<dyn BinaryAdapter>,
    migrations: AdapterChain<dyn BinaryMigration>,
    /// `None` when serialized references are disabled.
    references: Option<SerializedReferences>,
    seen: HashSet<usize>,
}

impl BinarySerializer {
    pub(crate) fn new(
        adapters: AdapterChain<dyn BinaryAdapter>,
        migrations: AdapterChain<dyn BinaryMigration>,
        references: Option<SerializedReferences>,
    ) -> Self {
        BinarySerializer {
            writer: BinaryWriter::new(),
            adapters,
            migrations,
            references,
            seen: HashSet::new(),
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    pub(crate) fn serialize(&mut self, value: &dyn Any, ty: TypeInfo, start: usize) -> Result<()> {
        if let Some((index, adapter)) = self.adapters.find(start, |a| a.handles(&ty)) {
            let mut ctx = BinarySerializationContext {
                serializer: self,
                ty,
                index,
            };
            return adapter.serialize(&mut ctx, value);
        }
        self.serialize_default(value, ty)
    }

    pub(crate) fn serialize_default(&mut self, value: &dyn Any, ty: TypeInfo) -> Result<()> {
        if primitive::is_builtin(&ty) {
            return scalar::write(&mut self.writer, value, ty);
        }
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => match shape.inner(value)? {
                    Some(inner) => {
                        self.writer.write_tag(Tag::None);
                        self.serialize(inner, shape.inner_type(), 0)
                    }
                    None => {
                        self.writer.write_tag(Tag::Null);
                        Ok(())
                    }
                },
                ValueShape::Enum(shape) => {
                    self.writer.write_varint_signed(shape.to_i64(value)?);
                    Ok(())
                }
                ValueShape::Reference(shape) => {
                    self.serialize_reference(shape.as_ref(), value, ty)
                }
                ValueShape::Dynamic => {
                    let dynamic = value
                        .downcast_ref::<DynamicValue>()
                        .ok_or_else(|| Error::type_mismatch("DynamicValue", ty.name()))?;
                    let runtime = dynamic.type_info();
                    self.writer.write_tag(Tag::Polymorphic);
                    self.writer.write_str(runtime.name());
                    self.serialize(dynamic.value(), runtime, 0)
                }
            };
        }
        match registry::try_get_bag(&ty) {
            Some(PropertyBag::Container(bag)) => self.serialize_container(bag.as_ref(), value),
            Some(PropertyBag::List(bag)) => self.serialize_collection(bag.as_collection(), value),
            Some(PropertyBag::Set(bag)) => self.serialize_collection(bag.as_collection(), value),
            Some(PropertyBag::Collection(bag)) => self.serialize_collection(bag.as_ref(), value),
            Some(PropertyBag::Dictionary(bag)) => self.serialize_dictionary(bag.as_ref(), value),
            None => Err(Error::unsupported_type(ty.name())),
        }
    }

    fn serialize_reference(
        &mut self,
        shape: &dyn ReferenceShape,
        value: &dyn Any,
        ty: TypeInfo,
    ) -> Result<()> {
        let identity = shape.identity(value)?;
        match self.references.as_mut() {
            Some(references) => {
                if let Some(id) = references.id_of(identity) {
                    self.writer.write_tag(Tag::Ref);
                    self.writer.write_varint(u64::from(id));
                    return Ok(());
                }
                references.assign(identity);
            }
            None => {
                if !self.seen.insert(identity) {
                    return Err(Error::DuplicateReference(ty.name().to_string()));
                }
            }
        }
        self.writer.write_tag(Tag::None);
        let inner_type = shape.inner_type();
        shape.with_inner(value, &mut |inner| self.serialize(inner, inner_type, 0))
    }

    fn serialize_container(&mut self, bag: &dyn ContainerBag, value: &dyn Any) -> Result<()> {
        let ty = bag.type_info();
        let version = self
            .migrations
            .latest(|m| m.handles(&ty), |m| m.version())
            .map_or(0, |m| m.version());
        self.writer.write_tag(Tag::None);
        self.writer.write_varint(u64::from(version));
        for property in bag.properties() {
            let value_type = property.value_type();
            property.get_value(value, &mut |v| self.serialize(v, value_type, 0))?;
        }
        Ok(())
    }

    fn serialize_collection(&mut self, bag: &dyn CollectionBag, value: &dyn Any) -> Result<()> {
        let element_type = bag.element_type();
        self.writer.write_len(bag.count(value)?);
        bag.for_each(value, &mut |element| self.serialize(element, element_type, 0))
    }

    fn serialize_dictionary(&mut self, bag: &dyn DictionaryBag, value: &dyn Any) -> Result<()> {
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        self.writer.write_len(bag.count(value)?);
        bag.for_each(value, &mut |key, item| {
            self.serialize(key, key_type, 0)?;
            self.serialize(item, value_type, 0)
        })
    }
}
