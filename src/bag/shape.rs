//! Value shapes: types that are not containers themselves but change how a
//! value is reached or encoded.
//!
//! - `Option<T>` is **nullable**: `None` encodes as null, `Some` is unwrapped.
//! - Types implementing [`PropertyEnum`] are written as their integer value.
//! - `Rc<RefCell<T>>` is a **reference**: shared by identity and tracked by the
//!   reference table so cycles terminate.
//! - [`DynamicValue`](crate::DynamicValue) is a polymorphic slot carrying its
//!   runtime type.

use crate::property::PropertyValue;
use crate::registry::PropertyBagRegistry;
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// A registered value shape.
#[derive(Clone)]
pub enum ValueShape {
    Nullable(Arc<dyn NullableShape>),
    Enum(Arc<dyn EnumShape>),
    Reference(Arc<dyn ReferenceShape>),
    Dynamic,
}

pub trait NullableShape: Send + Sync {
    fn inner_type(&self) -> TypeInfo;

    /// Returns the wrapped value, or `None` for a null value.
    fn inner<'a>(&self, value: &'a dyn Any) -> Result<Option<&'a dyn Any>>;

    fn wrap(&self, inner: Option<Box<dyn Any>>) -> Result<Box<dyn Any>>;
}

pub trait EnumShape: Send + Sync {
    fn to_i64(&self, value: &dyn Any) -> Result<i64>;

    fn from_i64(&self, value: i64) -> Result<Box<dyn Any>>;
}

pub trait ReferenceShape: Send + Sync {
    fn inner_type(&self) -> TypeInfo;

    /// Address identifying the shared object.
    fn identity(&self, value: &dyn Any) -> Result<usize>;

    fn with_inner(&self, value: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>)
        -> Result<()>;

    fn with_inner_mut(
        &self,
        value: &dyn Any,
        f: &mut dyn FnMut(&mut dyn Any) -> Result<()>,
    ) -> Result<()>;

    /// Wraps a freshly built inner value into a new shared reference.
    fn create(&self, inner: Box<dyn Any>) -> Result<Box<dyn Any>>;

    /// Returns another handle to the same shared object.
    fn clone_ref(&self, value: &dyn Any) -> Result<Box<dyn Any>>;
}

/// A field-less enum with a stable integer mapping.
pub trait PropertyEnum: PropertyValue + Copy {
    fn to_i64(self) -> i64;

    fn from_i64(value: i64) -> Option<Self>;
}

/// Registers the enum shape of `E`. Called from [`PropertyValue::register`].
pub fn register_enum<E: PropertyEnum>(registry: &mut PropertyBagRegistry) {
    registry.register_shape(TypeInfo::of::<E>(), || {
        ValueShape::Enum(Arc::new(EnumValueShape::<E>(PhantomData)))
    });
}

struct OptionShape<T>(PhantomData<fn() -> T>);

impl<T: PropertyValue> NullableShape for OptionShape<T> {
    fn inner_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn inner<'a>(&self, value: &'a dyn Any) -> Result<Option<&'a dyn Any>> {
        let value = value
            .downcast_ref::<Option<T>>()
            .ok_or_else(|| Error::type_mismatch(std::any::type_name::<Option<T>>(), "a different type"))?;
        Ok(value.as_ref().map(|v| v as &dyn Any))
    }

    fn wrap(&self, inner: Option<Box<dyn Any>>) -> Result<Box<dyn Any>> {
        match inner {
            None => Ok(Box::new(None::<T>)),
            Some(inner) => {
                let inner = inner.downcast::<T>().map_err(|_| {
                    Error::type_mismatch(std::any::type_name::<T>(), "a different type")
                })?;
                Ok(Box::new(Some(*inner)))
            }
        }
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_shape(TypeInfo::of::<Self>(), || {
            ValueShape::Nullable(Arc::new(OptionShape::<T>(PhantomData)))
        }) {
            T::register(registry);
        }
    }
}

struct EnumValueShape<E>(PhantomData<fn() -> E>);

impl<E: PropertyEnum> EnumShape for EnumValueShape<E> {
    fn to_i64(&self, value: &dyn Any) -> Result<i64> {
        value
            .downcast_ref::<E>()
            .map(|e| e.to_i64())
            .ok_or_else(|| Error::type_mismatch(std::any::type_name::<E>(), "a different type"))
    }

    fn from_i64(&self, value: i64) -> Result<Box<dyn Any>> {
        E::from_i64(value)
            .map(|e| Box::new(e) as Box<dyn Any>)
            .ok_or_else(|| {
                Error::type_mismatch(std::any::type_name::<E>(), &format!("value {value}"))
            })
    }
}

struct RcShape<T>(PhantomData<fn() -> T>);

impl<T: PropertyValue> RcShape<T> {
    fn downcast<'a>(&self, value: &'a dyn Any) -> Result<&'a Rc<RefCell<T>>> {
        value.downcast_ref::<Rc<RefCell<T>>>().ok_or_else(|| {
            Error::type_mismatch(std::any::type_name::<Rc<RefCell<T>>>(), "a different type")
        })
    }
}

impl<T: PropertyValue> ReferenceShape for RcShape<T> {
    fn inner_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn identity(&self, value: &dyn Any) -> Result<usize> {
        Ok(Rc::as_ptr(self.downcast(value)?) as *const () as usize)
    }

    fn with_inner(
        &self,
        value: &dyn Any,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<()> {
        let cell = self.downcast(value)?;
        let inner = cell
            .try_borrow()
            .map_err(|_| Error::custom("shared value is mutably borrowed"))?;
        f(&*inner)
    }

    fn with_inner_mut(
        &self,
        value: &dyn Any,
        f: &mut dyn FnMut(&mut dyn Any) -> Result<()>,
    ) -> Result<()> {
        let cell = self.downcast(value)?;
        let mut inner = cell
            .try_borrow_mut()
            .map_err(|_| Error::custom("shared value is already borrowed"))?;
        f(&mut *inner)
    }

    fn create(&self, inner: Box<dyn Any>) -> Result<Box<dyn Any>> {
        let inner = inner
            .downcast::<T>()
            .map_err(|_| Error::type_mismatch(std::any::type_name::<T>(), "a different type"))?;
        Ok(Box::new(Rc::new(RefCell::new(*inner))))
    }

    fn clone_ref(&self, value: &dyn Any) -> Result<Box<dyn Any>> {
        Ok(Box::new(Rc::clone(self.downcast(value)?)))
    }
}

impl<T: PropertyValue> PropertyValue for Rc<RefCell<T>> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_shape(TypeInfo::of::<Self>(), || {
            ValueShape::Reference(Arc::new(RcShape::<T>(PhantomData)))
        }) {
            T::register(registry);
        }
    }
}
