//! Properties: named, typed accessors over a container.
//!
//! A [`Property`] describes one member of a container type. Properties are
//! created once per container type, stored in that type's
//! [`ContainerPropertyBag`](crate::ContainerPropertyBag) and shared from then on.
//!
//! Values cross the property boundary type-erased (`&dyn Any` out,
//! `Box<dyn Any>` in); [`Property::value_type`] tells the caller which
//! concrete type to expect.
//!
//! ## Examples
//!
//! ```rust
//! use propbag::{DelegateProperty, Property};
//!
//! #[derive(Clone, Default)]
//! struct Player { health: i32 }
//!
//! let health = DelegateProperty::new(
//!     "health",
//!     |p: &Player| p.health,
//!     |p: &mut Player, v| p.health = v,
//! );
//!
//! let mut player = Player { health: 10 };
//! health.set_value(&mut player, Box::new(25_i32)).unwrap();
//! assert_eq!(player.health, 25);
//! assert!(!health.is_read_only());
//! ```

use crate::registry::PropertyBagRegistry;
use crate::visit::ContainerVisitor;
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;

/// A type that can appear as a property value, collection element or root.
///
/// [`PropertyValue::register`] registers whatever the type needs in the
/// registry (its own bag or shape, then its dependencies). It is called on
/// demand the first time a value of the type is visited or serialized, and
/// must be idempotent. Primitive and built-in value types register nothing.
pub trait PropertyValue: Any + Clone {
    fn register(registry: &mut PropertyBagRegistry) {
        let _ = registry;
    }
}

macro_rules! impl_builtin_property_value {
    ($($t:ty),* $(,)?) => {
        $(impl PropertyValue for $t {})*
    };
}

impl_builtin_property_value!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    std::path::PathBuf,
    chrono::DateTime<chrono::Utc>,
    chrono::TimeDelta,
    num_bigint::BigInt,
);

/// Describes one named member of a container.
pub trait Property: Send + Sync {
    fn name(&self) -> &str;

    fn is_read_only(&self) -> bool;

    /// The container type this property reads from.
    fn container_type(&self) -> TypeInfo;

    /// The declared value type.
    fn value_type(&self) -> TypeInfo;

    /// Reads the value out of `container` and hands it to `f`.
    fn get_value(
        &self,
        container: &dyn Any,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<()>;

    /// Writes `value` into `container`.
    ///
    /// Fails with [`Error::ReadOnlyProperty`] on read-only properties.
    fn set_value(&self, container: &mut dyn Any, value: Box<dyn Any>) -> Result<()>;

    /// Registers the bags and shapes the value type depends on.
    fn register_value_type(&self, registry: &mut PropertyBagRegistry);

    /// Double dispatch: calls back `visitor.visit_property(self, container)`.
    fn accept(&self, visitor: &mut dyn ContainerVisitor, container: &dyn Any) -> Result<()>;
}

type Getter<C, V> = Box<dyn Fn(&C) -> V + Send + Sync>;
type Setter<C, V> = Box<dyn Fn(&mut C, V) + Send + Sync>;

/// A [`Property`] backed by a getter and an optional setter closure.
pub struct DelegateProperty<C, V> {
    name: String,
    getter: Getter<C, V>,
    setter: Option<Setter<C, V>>,
    _marker: PhantomData<fn() -> (C, V)>,
}

impl<C: Any, V: PropertyValue> DelegateProperty<C, V> {
    pub fn new(
        name: impl Into<String>,
        getter: impl Fn(&C) -> V + Send + Sync + 'static,
        setter: impl Fn(&mut C, V) + Send + Sync + 'static,
    ) -> Self {
        DelegateProperty {
            name: name.into(),
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
            _marker: PhantomData,
        }
    }

    /// Creates a property without a setter.
    pub fn read_only(
        name: impl Into<String>,
        getter: impl Fn(&C) -> V + Send + Sync + 'static,
    ) -> Self {
        DelegateProperty {
            name: name.into(),
            getter: Box::new(getter),
            setter: None,
            _marker: PhantomData,
        }
    }

    fn downcast_container<'a>(&self, container: &'a dyn Any) -> Result<&'a C> {
        container.downcast_ref::<C>().ok_or_else(|| {
            Error::type_mismatch(std::any::type_name::<C>(), "a different container type")
        })
    }
}

impl<C: Any, V: PropertyValue> Property for DelegateProperty<C, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    fn container_type(&self) -> TypeInfo {
        TypeInfo::of::<C>()
    }

    fn value_type(&self) -> TypeInfo {
        TypeInfo::of::<V>()
    }

    fn get_value(
        &self,
        container: &dyn Any,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<()> {
        let container = self.downcast_container(container)?;
        let value = (self.getter)(container);
        f(&value)
    }

    fn set_value(&self, container: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| Error::read_only(std::any::type_name::<C>(), &self.name))?;
        let container = container.downcast_mut::<C>().ok_or_else(|| {
            Error::type_mismatch(std::any::type_name::<C>(), "a different container type")
        })?;
        let value = value.downcast::<V>().map_err(|_| {
            Error::type_mismatch(std::any::type_name::<V>(), "a different value type")
        })?;
        setter(container, *value);
        Ok(())
    }

    fn register_value_type(&self, registry: &mut PropertyBagRegistry) {
        V::register(registry);
    }

    fn accept(&self, visitor: &mut dyn ContainerVisitor, container: &dyn Any) -> Result<()> {
        visitor.visit_property(self, container)
    }
}

/// What deserialization does when the input carries a value for a read-only property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadOnlyPolicy {
    /// Skip the value and log a warning.
    #[default]
    Ignore,
    /// Fail with [`Error::ReadOnlyProperty`].
    Strict,
}
