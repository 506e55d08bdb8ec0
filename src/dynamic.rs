//! Polymorphic value slots.

use crate::bag::ValueShape;
use crate::property::PropertyValue;
use crate::registry::{self, PropertyBagRegistry};
use crate::TypeInfo;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A value whose concrete type is only known at runtime.
///
/// Codecs tag the payload with its type name (`$serializedType` in JSON, a
/// polymorphic tag in binary) so the reader can reconstruct the right type.
/// The runtime type must be registered in the reader's process; constructing
/// a `DynamicValue` registers it.
///
/// ```rust
/// use propbag::DynamicValue;
///
/// let value = DynamicValue::new(42_u16);
/// assert_eq!(value.downcast_ref::<u16>(), Some(&42));
/// assert!(value.downcast_ref::<i32>().is_none());
/// ```
#[derive(Clone)]
pub struct DynamicValue {
    value: Rc<dyn Any>,
    type_info: TypeInfo,
}

impl DynamicValue {
    pub fn new<T: PropertyValue>(value: T) -> Self {
        registry::register::<T>();
        DynamicValue {
            value: Rc::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub(crate) fn from_boxed(value: Box<dyn Any>, type_info: TypeInfo) -> Self {
        DynamicValue {
            value: Rc::from(value),
            type_info,
        }
    }

    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[must_use]
    pub fn value(&self) -> &dyn Any {
        &*self.value
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_info.is::<T>()
    }
}

impl fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynamicValue({})", self.type_info.name())
    }
}

impl PropertyValue for DynamicValue {
    fn register(registry: &mut PropertyBagRegistry) {
        registry.register_shape(TypeInfo::of::<Self>(), || ValueShape::Dynamic);
    }
}
