//! Binary adapters and the contexts they run in.
//!
//! Binary adapters work like [JSON adapters](crate::json::JsonAdapter), on
//! the raw [`BinaryWriter`] and [`BinaryReader`]. The stream is not
//! self-delimiting: whatever an adapter writes, its `deserialize` must read
//! back exactly.
//!
//! ```rust
//! use propbag::binary::BinaryAdapterFn;
//! use propbag::{from_binary_with, to_binary_with, BinarySerializationParameters};
//!
//! // u64 values as varints.
//! let compact = BinaryAdapterFn::<u64>::new(
//!     |ctx, value| {
//!         ctx.writer().write_varint(*value);
//!         Ok(())
//!     },
//!     |ctx| ctx.reader().read_varint(),
//! );
//! let params = BinarySerializationParameters::new().with_adapter(compact);
//!
//! let bytes = to_binary_with(&vec![1_u64, 300], &params).unwrap();
//! assert_eq!(bytes, [2, 1, 0xAC, 0x02]);
//! let back: Vec<u64> = from_binary_with(&bytes, &params).unwrap();
//! assert_eq!(back, [1, 300]);
//! ```

use super::de::BinaryDeserializer;
use super::reader::BinaryReader;
use super::ser::BinarySerializer;
use super::writer::BinaryWriter;
use crate::adapter::unbox;
use crate::property::PropertyValue;
use crate::{registry, Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;

/// A per-type override of binary (de)serialization.
pub trait BinaryAdapter: Send + Sync {
    fn handles(&self, ty: &TypeInfo) -> bool;

    fn serialize(&self, ctx: &mut BinarySerializationContext<'_>, value: &dyn Any) -> Result<()>;

    fn deserialize(
        &self,
        ctx: &mut BinaryDeserializationContext<'_, '_, '_>,
    ) -> Result<Box<dyn Any>>;
}

pub struct BinarySerializationContext<'s> {
    pub(crate) serializer: &'s mut BinarySerializer,
    pub(crate) ty: TypeInfo,
    pub(crate) index: usize,
}

impl BinarySerializationContext<'_> {
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    pub fn writer(&mut self) -> &mut BinaryWriter {
        &mut self.serializer.writer
    }

    /// Writes a nested value through the full adapter chain.
    pub fn serialize_value<T: PropertyValue>(&mut self, value: &T) -> Result<()> {
        registry::register::<T>();
        self.serializer.serialize(value, TypeInfo::of::<T>(), 0)
    }

    pub fn continue_visitation(&mut self, value: &dyn Any) -> Result<()> {
        self.serializer.serialize(value, self.ty, self.index + 1)
    }

    pub fn continue_visitation_without_adapters(&mut self, value: &dyn Any) -> Result<()> {
        self.serializer.serialize_default(value, self.ty)
    }
}

pub struct BinaryDeserializationContext<'d, 'r, 'b> {
    pub(crate) deserializer: &'d mut BinaryDeserializer,
    pub(crate) reader: &'r mut BinaryReader<'b>,
    pub(crate) ty: TypeInfo,
    pub(crate) index: usize,
}

impl<'b> BinaryDeserializationContext<'_, '_, 'b> {
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    pub fn reader(&mut self) -> &mut BinaryReader<'b> {
        &mut *self.reader
    }

    /// Reads a nested value through the full adapter chain.
    pub fn deserialize_value<T: PropertyValue>(&mut self) -> Result<T> {
        registry::register::<T>();
        let value = self
            .deserializer
            .deserialize(self.reader, TypeInfo::of::<T>(), 0)?;
        unbox(value)
    }

    pub fn continue_visitation(&mut self) -> Result<Box<dyn Any>> {
        self.deserializer
            .deserialize(self.reader, self.ty, self.index + 1)
    }

    pub fn continue_visitation_without_adapters(&mut self) -> Result<Box<dyn Any>> {
        self.deserializer.deserialize_default(self.reader, self.ty)
    }
}

type SerializeFn<V> =
    Box<dyn Fn(&mut BinarySerializationContext<'_>, &V) -> Result<()> + Send + Sync>;
type DeserializeFn<V> =
    Box<dyn Fn(&mut BinaryDeserializationContext<'_, '_, '_>) -> Result<V> + Send + Sync>;

/// A [`BinaryAdapter`] for exactly the type `V`, built from two closures.
pub struct BinaryAdapterFn<V> {
    serialize: SerializeFn<V>,
    deserialize: DeserializeFn<V>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Any> BinaryAdapterFn<V> {
    pub fn new(
        serialize: impl Fn(&mut BinarySerializationContext<'_>, &V) -> Result<()>
            + Send
            + Sync
            + 'static,
        deserialize: impl Fn(&mut BinaryDeserializationContext<'_, '_, '_>) -> Result<V>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        BinaryAdapterFn {
            serialize: Box::new(serialize),
            deserialize: Box::new(deserialize),
            _marker: PhantomData,
        }
    }
}

impl<V: Any> BinaryAdapter for BinaryAdapterFn<V> {
    fn handles(&self, ty: &TypeInfo) -> bool {
        ty.is::<V>()
    }

    fn serialize(&self, ctx: &mut BinarySerializationContext<'_>, value: &dyn Any) -> Result<()> {
        let value = value
            .downcast_ref::<V>()
            .ok_or_else(|| Error::type_mismatch(std::any::type_name::<V>(), ctx.ty.name()))?;
        (self.serialize)(ctx, value)
    }

    fn deserialize(
        &self,
        ctx: &mut BinaryDeserializationContext<'_, '_, '_>,
    ) -> Result<Box<dyn Any>> {
        (self.deserialize)(ctx).map(|v| Box::new(v) as Box<dyn Any>)
    }
}
