//! JSON adapters and the contexts they run in.
//!
//! An adapter overrides how values of the types it claims are written and
//! read. Inside an adapter the context offers the raw writer or view, the
//! recursive entry points for nested values, and two ways to give up:
//! [`continue_visitation`](JsonSerializationContext::continue_visitation)
//! hands the value to the next adapter in the chain, while
//! [`continue_visitation_without_adapters`](JsonSerializationContext::continue_visitation_without_adapters)
//! jumps straight to the built-in handling.
//!
//! ```rust
//! use propbag::json::{JsonAdapterFn, JsonSerializationContext};
//! use propbag::{from_json_with, to_json_with, JsonSerializationParameters};
//!
//! // Booleans as "yes"/"no" strings.
//! let yes_no = JsonAdapterFn::<bool>::new(
//!     |ctx, value| {
//!         ctx.writer().write_str(if *value { "yes" } else { "no" });
//!         Ok(())
//!     },
//!     |ctx| Ok(ctx.view().to_text()? == "yes"),
//! );
//! let params = JsonSerializationParameters::new().with_adapter(yes_no);
//!
//! let json = to_json_with(&vec![true, false], &params).unwrap();
//! assert_eq!(json, r#"["yes","no"]"#);
//! let back: Vec<bool> = from_json_with(&json, &params).unwrap();
//! assert_eq!(back, [true, false]);
//! ```

use super::de::JsonDeserializer;
use super::ser::{JsonSerializer, Metadata};
use super::writer::JsonWriter;
use crate::adapter::unbox;
use crate::parser::SerializedValueView;
use crate::property::PropertyValue;
use crate::registry;
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;

/// A per-type override of JSON (de)serialization.
///
/// `handles` decides which static types the adapter claims. Typed adapters
/// claim exactly one type; an adapter may also claim a whole family, for
/// example every type whose name lives in one module.
pub trait JsonAdapter: Send + Sync {
    fn handles(&self, ty: &TypeInfo) -> bool;

    /// Writes exactly one JSON value for `value`.
    fn serialize(&self, ctx: &mut JsonSerializationContext<'_>, value: &dyn Any) -> Result<()>;

    /// Reads a value of the claimed type from `ctx.view()`.
    fn deserialize(&self, ctx: &mut JsonDeserializationContext<'_, '_>) -> Result<Box<dyn Any>>;
}

/// Writer state handed to [`JsonAdapter::serialize`].
pub struct JsonSerializationContext<'s> {
    pub(crate) serializer: &'s mut JsonSerializer,
    pub(crate) ty: TypeInfo,
    pub(crate) index: usize,
}

impl JsonSerializationContext<'_> {
    /// Static type of the value being written.
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    pub fn writer(&mut self) -> &mut JsonWriter {
        &mut self.serializer.writer
    }

    /// Writes a nested value through the full adapter chain.
    pub fn serialize_value<T: PropertyValue>(&mut self, value: &T) -> Result<()> {
        registry::register::<T>();
        self.serializer.serialize(value, TypeInfo::of::<T>(), 0)
    }

    /// Hands `value` to the next adapter claiming its type, or to the
    /// built-in handling when there is none.
    pub fn continue_visitation(&mut self, value: &dyn Any) -> Result<()> {
        self.serializer.serialize(value, self.ty, self.index + 1)
    }

    /// Writes `value` with the built-in handling, skipping remaining adapters.
    pub fn continue_visitation_without_adapters(&mut self, value: &dyn Any) -> Result<()> {
        self.serializer
            .serialize_default(value, self.ty, Metadata::default())
    }
}

/// Reader state handed to [`JsonAdapter::deserialize`].
pub struct JsonDeserializationContext<'d, 'v> {
    pub(crate) deserializer: &'d mut JsonDeserializer,
    pub(crate) view: SerializedValueView<'v>,
    pub(crate) ty: TypeInfo,
    pub(crate) index: usize,
}

impl<'v> JsonDeserializationContext<'_, 'v> {
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// The value to read.
    #[must_use]
    pub fn view(&self) -> SerializedValueView<'v> {
        self.view
    }

    /// Reads a nested value through the full adapter chain.
    pub fn deserialize_value<T: PropertyValue>(
        &mut self,
        view: SerializedValueView<'_>,
    ) -> Result<T> {
        registry::register::<T>();
        let value = self.deserializer.deserialize(view, TypeInfo::of::<T>(), 0)?;
        unbox(value)
    }

    pub fn continue_visitation(&mut self) -> Result<Box<dyn Any>> {
        self.deserializer
            .deserialize(self.view, self.ty, self.index + 1)
    }

    pub fn continue_visitation_without_adapters(&mut self) -> Result<Box<dyn Any>> {
        self.deserializer.deserialize_default(self.view, self.ty)
    }
}

type SerializeFn<V> =
    Box<dyn Fn(&mut JsonSerializationContext<'_>, &V) -> Result<()> + Send + Sync>;
type DeserializeFn<V> =
    Box<dyn Fn(&mut JsonDeserializationContext<'_, '_>) -> Result<V> + Send + Sync>;

/// A [`JsonAdapter`] for exactly the type `V`, built from two closures.
pub struct JsonAdapterFn<V> {
    serialize: SerializeFn<V>,
    deserialize: DeserializeFn<V>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Any> JsonAdapterFn<V> {
    pub fn new(
        serialize: impl Fn(&mut JsonSerializationContext<'_>, &V) -> Result<()>
            + Send
            + Sync
            + 'static,
        deserialize: impl Fn(&mut JsonDeserializationContext<'_, '_>) -> Result<V>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        JsonAdapterFn {
            serialize: Box::new(serialize),
            deserialize: Box::new(deserialize),
            _marker: PhantomData,
        }
    }
}

impl<V: Any> JsonAdapter for JsonAdapterFn<V> {
    fn handles(&self, ty: &TypeInfo) -> bool {
        ty.is::<V>()
    }

    fn serialize(&self, ctx: &mut JsonSerializationContext<'_>, value: &dyn Any) -> Result<()> {
        let value = value
            .downcast_ref::<V>()
            .ok_or_else(|| Error::type_mismatch(std::any::type_name::<V>(), ctx.ty.name()))?;
        (self.serialize)(ctx, value)
    }

    fn deserialize(&self, ctx: &mut JsonDeserializationContext<'_, '_>) -> Result<Box<dyn Any>> {
        (self.deserialize)(ctx).map(|v| Box::new(v) as Box<dyn Any>)
    }
}
