//! The visitor contract and dispatch entry points.
//!
//! A visitor implements [`Visitor`] plus whichever capability traits it
//! cares about, and advertises them through the `as_*_visitor` methods.
//! Dispatch resolves the value's bag in the registry and calls back exactly
//! one capability:
//!
//! | Bag kind   | Capability tried                              |
//! |------------|-----------------------------------------------|
//! | Container  | [`ContainerVisitor`] once per property        |
//! | List       | [`ListVisitor`], then [`CollectionVisitor`]   |
//! | Set        | [`SetVisitor`], then [`CollectionVisitor`]    |
//! | Collection | [`CollectionVisitor`]                         |
//! | Dictionary | [`DictionaryVisitor`]                         |
//!
//! A missing capability means the value is skipped.
//!
//! ## Examples
//!
//! ```rust
//! use propbag::visit::{self, ContainerVisitor, Visitor};
//! use propbag::{property_bag, Property, Result};
//! use std::any::Any;
//!
//! #[derive(Clone, Default)]
//! struct Pair { a: i32, b: i32 }
//! property_bag!(Pair { a: i32, b: i32 });
//!
//! #[derive(Default)]
//! struct Names(Vec<String>);
//!
//! impl Visitor for Names {
//!     fn as_container_visitor(&mut self) -> Option<&mut dyn ContainerVisitor> {
//!         Some(self)
//!     }
//! }
//!
//! impl ContainerVisitor for Names {
//!     fn visit_property(&mut self, property: &dyn Property, _container: &dyn Any) -> Result<()> {
//!         self.0.push(property.name().to_string());
//!         Ok(())
//!     }
//! }
//!
//! let mut names = Names::default();
//! visit::accept(&mut names, &Pair::default()).unwrap();
//! assert_eq!(names.0, ["a", "b"]);
//! ```

use crate::bag::{CollectionBag, DictionaryBag, ListBag, PropertyBag, SetBag, ValueShape};
use crate::dynamic::DynamicValue;
use crate::primitive;
use crate::property::{Property, PropertyValue};
use crate::registry;
use crate::{Error, Result, TypeInfo};
use std::any::Any;

/// Capability discovery for visitors.
pub trait Visitor {
    fn as_container_visitor(&mut self) -> Option<&mut dyn ContainerVisitor> {
        None
    }

    fn as_collection_visitor(&mut self) -> Option<&mut dyn CollectionVisitor> {
        None
    }

    fn as_list_visitor(&mut self) -> Option<&mut dyn ListVisitor> {
        None
    }

    fn as_set_visitor(&mut self) -> Option<&mut dyn SetVisitor> {
        None
    }

    fn as_dictionary_visitor(&mut self) -> Option<&mut dyn DictionaryVisitor> {
        None
    }
}

pub trait ContainerVisitor {
    fn visit_property(&mut self, property: &dyn Property, container: &dyn Any) -> Result<()>;
}

pub trait CollectionVisitor {
    fn visit_collection(&mut self, bag: &dyn CollectionBag, collection: &dyn Any) -> Result<()>;
}

pub trait ListVisitor {
    fn visit_list(&mut self, bag: &dyn ListBag, list: &dyn Any) -> Result<()>;
}

pub trait SetVisitor {
    fn visit_set(&mut self, bag: &dyn SetBag, set: &dyn Any) -> Result<()>;
}

pub trait DictionaryVisitor {
    fn visit_dictionary(&mut self, bag: &dyn DictionaryBag, dictionary: &dyn Any) -> Result<()>;
}

/// Visits `container`, registering its type first.
pub fn accept<T: PropertyValue>(visitor: &mut dyn Visitor, container: &T) -> Result<()> {
    registry::register::<T>();
    accept_value(visitor, container, TypeInfo::of::<T>())
}

/// Visits a type-erased value whose static type is `ty`.
///
/// Nullable values are unwrapped, references are followed and dynamic
/// values dispatch on their runtime type.
///
/// # Errors
///
/// - [`Error::NullContainer`] for a `None` where a container is required
/// - [`Error::InvalidContainerType`] for enums and built-in value types
/// - [`Error::MissingPropertyBag`] for types that were never registered
pub fn accept_value(visitor: &mut dyn Visitor, value: &dyn Any, ty: TypeInfo) -> Result<()> {
    if let Some(shape) = registry::try_get_shape(&ty) {
        return match shape {
            ValueShape::Nullable(shape) => match shape.inner(value)? {
                Some(inner) => accept_value(visitor, inner, shape.inner_type()),
                None => Err(Error::null_container(ty.name())),
            },
            ValueShape::Reference(shape) => {
                let inner_type = shape.inner_type();
                shape.with_inner(value, &mut |inner| accept_value(visitor, inner, inner_type))
            }
            ValueShape::Dynamic => {
                let dynamic = value
                    .downcast_ref::<DynamicValue>()
                    .ok_or_else(|| Error::type_mismatch("DynamicValue", ty.name()))?;
                accept_value(visitor, dynamic.value(), dynamic.type_info())
            }
            ValueShape::Enum(_) => Err(Error::invalid_container_type(ty.name())),
        };
    }

    match registry::try_get_bag(&ty) {
        Some(bag) => bag.accept(visitor, value),
        None if primitive::is_builtin(&ty) => Err(Error::invalid_container_type(ty.name())),
        None => Err(Error::missing_property_bag(ty.name())),
    }
}

/// Looks up the container bag of `C`.
pub(crate) fn container_bag<C: PropertyValue>() -> Result<std::sync::Arc<dyn crate::ContainerBag>> {
    registry::register::<C>();
    let ty = TypeInfo::of::<C>();
    match registry::try_get_bag(&ty) {
        Some(PropertyBag::Container(bag)) => Ok(bag),
        Some(_) => Err(Error::invalid_container_type(ty.name())),
        None => Err(Error::missing_property_bag(ty.name())),
    }
}

/// Reads the property `name` of `container`.
///
/// ```rust
/// use propbag::{property_bag, visit};
///
/// #[derive(Clone, Default)]
/// struct Config { retries: u8 }
/// property_bag!(Config { retries: u8 });
///
/// let config = Config { retries: 3 };
/// assert_eq!(visit::get_value::<_, u8>(&config, "retries").unwrap(), 3);
/// ```
pub fn get_value<C: PropertyValue, V: PropertyValue>(container: &C, name: &str) -> Result<V> {
    let bag = container_bag::<C>()?;
    let property = bag.property(name).ok_or_else(|| unknown_property::<C>(name))?;
    let mut out = None;
    property.get_value(container, &mut |value| {
        out = value.downcast_ref::<V>().cloned();
        Ok(())
    })?;
    out.ok_or_else(|| Error::type_mismatch(std::any::type_name::<V>(), property.value_type().name()))
}

/// Writes the property `name` of `container`.
pub fn set_value<C: PropertyValue, V: PropertyValue>(
    container: &mut C,
    name: &str,
    value: V,
) -> Result<()> {
    let bag = container_bag::<C>()?;
    let property = bag.property(name).ok_or_else(|| unknown_property::<C>(name))?;
    property.set_value(container, Box::new(value))
}

fn unknown_property<C>(name: &str) -> Error {
    Error::custom(format!(
        "type `{}` has no property `{name}`",
        std::any::type_name::<C>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_bag;

    #[derive(Clone, Default)]
    struct Leaf {
        value: i32,
    }
    property_bag!(Leaf { value: i32 });

    #[derive(Default)]
    struct Counter {
        properties: usize,
        lists: usize,
        collections: usize,
    }

    impl Visitor for Counter {
        fn as_container_visitor(&mut self) -> Option<&mut dyn ContainerVisitor> {
            Some(self)
        }

        fn as_collection_visitor(&mut self) -> Option<&mut dyn CollectionVisitor> {
            Some(self)
        }
    }

    impl ContainerVisitor for Counter {
        fn visit_property(&mut self, _property: &dyn Property, _container: &dyn Any) -> Result<()> {
            self.properties += 1;
            Ok(())
        }
    }

    impl CollectionVisitor for Counter {
        fn visit_collection(&mut self, bag: &dyn CollectionBag, collection: &dyn Any) -> Result<()> {
            self.collections += bag.count(collection)?;
            Ok(())
        }
    }

    impl ListVisitor for Counter {
        fn visit_list(&mut self, _bag: &dyn ListBag, _list: &dyn Any) -> Result<()> {
            self.lists += 1;
            Ok(())
        }
    }

    #[test]
    fn test_list_falls_back_to_collection_capability() {
        let mut counter = Counter::default();
        accept(&mut counter, &vec![1, 2, 3]).unwrap();
        assert_eq!(counter.lists, 0);
        assert_eq!(counter.collections, 3);
    }

    #[test]
    fn test_missing_capability_skips() {
        struct Nothing;
        impl Visitor for Nothing {}
        accept(&mut Nothing, &Leaf::default()).unwrap();
    }

    #[test]
    fn test_dispatch_errors() {
        let mut counter = Counter::default();
        let err = accept(&mut counter, &None::<Leaf>).unwrap_err();
        assert!(matches!(err, Error::NullContainer { .. }));

        let err = accept(&mut counter, &5_i32).unwrap_err();
        assert!(matches!(err, Error::InvalidContainerType { .. }));

        struct Unregistered;
        let err = accept_value(&mut counter, &Unregistered, TypeInfo::of::<Unregistered>())
            .unwrap_err();
        assert!(matches!(err, Error::MissingPropertyBag { .. }));
    }

    #[test]
    fn test_nullable_and_reference_unwrap() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut counter = Counter::default();
        accept(&mut counter, &Some(Leaf::default())).unwrap();
        accept(&mut counter, &Rc::new(RefCell::new(Leaf::default()))).unwrap();
        assert_eq!(counter.properties, 2);
    }

    #[test]
    fn test_get_and_set_value() {
        let mut leaf = Leaf { value: 1 };
        set_value(&mut leaf, "value", 8_i32).unwrap();
        assert_eq!(get_value::<_, i32>(&leaf, "value").unwrap(), 8);
        assert!(get_value::<_, i32>(&leaf, "missing").is_err());
        assert!(get_value::<_, u8>(&leaf, "value").is_err());
    }
}
