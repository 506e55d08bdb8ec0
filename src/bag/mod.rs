//! Property bags: per-type descriptions used for visitation.
//!
//! A registered type falls into exactly one [`BagKind`]. Plain containers
//! expose named [`Property`] accessors; lists, sets and generic collections
//! expose their element type plus enumeration and insertion; dictionaries add
//! a key type. The [`PropertyBag`] enum is the closed set of those variants.
//!
//! ```rust
//! use propbag::{ContainerPropertyBag, DelegateProperty, ContainerBag};
//!
//! #[derive(Clone, Default)]
//! struct Point { x: f32, y: f32 }
//!
//! let bag = ContainerPropertyBag::<Point>::with_default()
//!     .with_property(DelegateProperty::new("x", |p: &Point| p.x, |p, v| p.x = v))
//!     .with_property(DelegateProperty::new("y", |p: &Point| p.y, |p, v| p.y = v));
//!
//! let names: Vec<_> = bag.properties().iter().map(|p| p.name().to_string()).collect();
//! assert_eq!(names, ["x", "y"]);
//! ```

mod collections;
mod shape;

pub use collections::{
    CollectionBag, CollectionPropertyBag, DictionaryBag, DictionaryPropertyBag, ListBag,
    ListPropertyBag, Mapping, Sequence, SetBag, SetPropertyBag,
};
pub use shape::{
    register_enum, EnumShape, NullableShape, PropertyEnum, ReferenceShape, ValueShape,
};

use crate::property::Property;
use crate::visit::{ContainerVisitor, Visitor};
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// The capability category of a registered type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BagKind {
    Container,
    Collection,
    List,
    Set,
    Dictionary,
}

/// A registered property bag, one variant per capability category.
#[derive(Clone)]
pub enum PropertyBag {
    Container(Arc<dyn ContainerBag>),
    Collection(Arc<dyn CollectionBag>),
    List(Arc<dyn ListBag>),
    Set(Arc<dyn SetBag>),
    Dictionary(Arc<dyn DictionaryBag>),
}

impl PropertyBag {
    #[must_use]
    pub fn kind(&self) -> BagKind {
        match self {
            PropertyBag::Container(_) => BagKind::Container,
            PropertyBag::Collection(_) => BagKind::Collection,
            PropertyBag::List(_) => BagKind::List,
            PropertyBag::Set(_) => BagKind::Set,
            PropertyBag::Dictionary(_) => BagKind::Dictionary,
        }
    }

    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        match self {
            PropertyBag::Container(bag) => bag.type_info(),
            PropertyBag::Collection(bag) => bag.type_info(),
            PropertyBag::List(bag) => bag.type_info(),
            PropertyBag::Set(bag) => bag.type_info(),
            PropertyBag::Dictionary(bag) => bag.type_info(),
        }
    }

    /// Dispatches `container` to the capability `visitor` supports for this kind.
    ///
    /// Lists and sets fall back to the collection capability. A visitor
    /// lacking every applicable capability is skipped silently.
    pub fn accept(&self, visitor: &mut dyn Visitor, container: &dyn Any) -> Result<()> {
        match self {
            PropertyBag::Container(bag) => match visitor.as_container_visitor() {
                Some(v) => bag.accept(v, container),
                None => Ok(()),
            },
            PropertyBag::List(bag) => {
                if let Some(v) = visitor.as_list_visitor() {
                    return v.visit_list(bag.as_ref(), container);
                }
                match visitor.as_collection_visitor() {
                    Some(v) => v.visit_collection(bag.as_collection(), container),
                    None => Ok(()),
                }
            }
            PropertyBag::Set(bag) => {
                if let Some(v) = visitor.as_set_visitor() {
                    return v.visit_set(bag.as_ref(), container);
                }
                match visitor.as_collection_visitor() {
                    Some(v) => v.visit_collection(bag.as_collection(), container),
                    None => Ok(()),
                }
            }
            PropertyBag::Collection(bag) => match visitor.as_collection_visitor() {
                Some(v) => v.visit_collection(bag.as_ref(), container),
                None => Ok(()),
            },
            PropertyBag::Dictionary(bag) => match visitor.as_dictionary_visitor() {
                Some(v) => v.visit_dictionary(bag.as_ref(), container),
                None => Ok(()),
            },
        }
    }

    /// Creates an empty instance of the bag's type.
    pub fn create_instance(&self) -> Result<Box<dyn Any>> {
        match self {
            PropertyBag::Container(bag) => bag.create_instance(),
            PropertyBag::Collection(bag) => Ok(bag.create_instance(0)),
            PropertyBag::List(bag) => Ok(bag.create_instance(0)),
            PropertyBag::Set(bag) => Ok(bag.create_instance(0)),
            PropertyBag::Dictionary(bag) => Ok(bag.create_instance(0)),
        }
    }
}

/// Bag of a plain container: an ordered list of named properties.
///
/// Property order is the serialization order for every codec.
pub trait ContainerBag: Send + Sync {
    fn type_info(&self) -> TypeInfo;

    fn properties(&self) -> &[Box<dyn Property>];

    fn property(&self, name: &str) -> Option<&dyn Property> {
        self.properties()
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Constructs a fresh instance to deserialize into.
    fn create_instance(&self) -> Result<Box<dyn Any>>;

    /// Replaces `target` with `value`; both must be the bag's container type.
    fn assign(&self, target: &mut dyn Any, value: Box<dyn Any>) -> Result<()>;

    /// Visits every property in declaration order.
    fn accept(&self, visitor: &mut dyn ContainerVisitor, container: &dyn Any) -> Result<()> {
        for property in self.properties() {
            property.accept(visitor, container)?;
        }
        Ok(())
    }
}

type Constructor<C> = Box<dyn Fn() -> C + Send + Sync>;

/// The standard [`ContainerBag`] for a container type `C`.
pub struct ContainerPropertyBag<C> {
    properties: Vec<Box<dyn Property>>,
    constructor: Option<Constructor<C>>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Any> ContainerPropertyBag<C> {
    /// Creates a bag without a constructor; such containers can be
    /// serialized but only deserialized *into* an existing instance.
    #[must_use]
    pub fn new() -> Self {
        ContainerPropertyBag {
            properties: Vec::new(),
            constructor: None,
            _marker: PhantomData,
        }
    }

    /// Creates a bag that constructs instances with `C::default()`.
    #[must_use]
    pub fn with_default() -> Self
    where
        C: Default,
    {
        Self::new().with_constructor(C::default)
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: impl Fn() -> C + Send + Sync + 'static) -> Self {
        self.constructor = Some(Box::new(constructor));
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: impl Property + 'static) -> Self {
        self.add_property(property);
        self
    }

    pub fn add_property(&mut self, property: impl Property + 'static) {
        self.properties.push(Box::new(property));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<C: Any> Default for ContainerPropertyBag<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Any> ContainerBag for ContainerPropertyBag<C> {
    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<C>()
    }

    fn properties(&self) -> &[Box<dyn Property>] {
        &self.properties
    }

    fn create_instance(&self) -> Result<Box<dyn Any>> {
        match &self.constructor {
            Some(constructor) => Ok(Box::new(constructor())),
            None => Err(Error::MissingConstructor(
                std::any::type_name::<C>().to_string(),
            )),
        }
    }

    fn assign(&self, target: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
        let name = std::any::type_name::<C>();
        let target = target
            .downcast_mut::<C>()
            .ok_or_else(|| Error::type_mismatch(name, "a different container type"))?;
        let value = value
            .downcast::<C>()
            .map_err(|_| Error::type_mismatch(name, "a different value type"))?;
        *target = *value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DelegateProperty;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Pair {
        a: i32,
        b: i32,
    }

    fn pair_bag() -> ContainerPropertyBag<Pair> {
        ContainerPropertyBag::with_default()
            .with_property(DelegateProperty::new("a", |p: &Pair| p.a, |p, v| p.a = v))
            .with_property(DelegateProperty::new("b", |p: &Pair| p.b, |p, v| p.b = v))
    }

    #[test]
    fn test_property_lookup_by_name() {
        let bag = pair_bag();
        assert_eq!(bag.len(), 2);
        assert!(bag.property("b").is_some());
        assert!(bag.property("c").is_none());
    }

    #[test]
    fn test_create_and_assign() {
        let bag = pair_bag();
        let mut instance = bag.create_instance().unwrap();
        bag.assign(&mut *instance, Box::new(Pair { a: 1, b: 2 }))
            .unwrap();
        assert_eq!(instance.downcast_ref::<Pair>(), Some(&Pair { a: 1, b: 2 }));
    }

    #[test]
    fn test_missing_constructor() {
        let bag = ContainerPropertyBag::<Pair>::new();
        assert!(matches!(
            bag.create_instance(),
            Err(Error::MissingConstructor(_))
        ));
    }
}
