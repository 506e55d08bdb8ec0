//! The process-wide property bag registry.
//!
//! Maps runtime type identity to a [`PropertyBag`] (container-shaped types)
//! or a [`ValueShape`] (nullable, enum, reference and dynamic values). At most
//! one entry exists per type; registration is idempotent and walks the
//! dependencies of a newly registered type exactly once.
//!
//! Lookups never fail: an unregistered type yields `None`.
//!
//! ```rust
//! use propbag::{registry, BagKind, TypeInfo};
//!
//! registry::register::<Vec<u32>>();
//! let bag = registry::try_get_bag(&TypeInfo::of::<Vec<u32>>()).unwrap();
//! assert_eq!(bag.kind(), BagKind::List);
//! assert!(registry::try_get_bag(&TypeInfo::of::<u32>()).is_none());
//! ```

use crate::bag::{ContainerBag, ContainerPropertyBag, PropertyBag, ValueShape};
use crate::primitive;
use crate::property::PropertyValue;
use crate::TypeInfo;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use tracing::debug;

/// Registry storage. Use the free functions of this module for the global
/// instance; a local registry is mostly useful inside [`PropertyValue::register`].
pub struct PropertyBagRegistry {
    bags: HashMap<TypeId, PropertyBag>,
    shapes: HashMap<TypeId, ValueShape>,
    names: HashMap<&'static str, TypeInfo>,
}

impl PropertyBagRegistry {
    /// Creates a registry that knows the names of the built-in value types.
    #[must_use]
    pub fn new() -> Self {
        let mut names = HashMap::new();
        for info in primitive::builtin_types() {
            names.insert(info.name(), info);
        }
        PropertyBagRegistry {
            bags: HashMap::new(),
            shapes: HashMap::new(),
            names,
        }
    }

    /// Registers `T` and everything it depends on.
    pub fn register<T: PropertyValue>(&mut self) {
        T::register(self);
    }

    /// Inserts the bag produced by `make` unless `ty` already has one.
    ///
    /// Returns `true` when the bag was inserted, in which case the caller
    /// should go on to register the type's dependencies.
    pub fn register_bag(&mut self, ty: TypeInfo, make: impl FnOnce() -> PropertyBag) -> bool {
        if self.bags.contains_key(&ty.id()) {
            return false;
        }
        let bag = make();
        debug!(type_name = ty.name(), kind = ?bag.kind(), "registered property bag");
        self.bags.insert(ty.id(), bag);
        self.names.insert(ty.name(), ty);
        true
    }

    /// Registers a container bag, then the value types of its properties.
    pub fn register_container<C: Any>(&mut self, bag: ContainerPropertyBag<C>) -> bool {
        let ty = TypeInfo::of::<C>();
        if self.bags.contains_key(&ty.id()) {
            return false;
        }
        let bag = Arc::new(bag);
        self.register_bag(ty, || PropertyBag::Container(bag.clone()));
        for property in bag.properties() {
            property.register_value_type(self);
        }
        true
    }

    /// Inserts the shape produced by `make` unless `ty` already has one.
    pub fn register_shape(&mut self, ty: TypeInfo, make: impl FnOnce() -> ValueShape) -> bool {
        if self.shapes.contains_key(&ty.id()) {
            return false;
        }
        debug!(type_name = ty.name(), "registered value shape");
        self.shapes.insert(ty.id(), make());
        self.names.insert(ty.name(), ty);
        true
    }

    #[must_use]
    pub fn try_get_bag(&self, ty: &TypeInfo) -> Option<PropertyBag> {
        self.bags.get(&ty.id()).cloned()
    }

    #[must_use]
    pub fn try_get_shape(&self, ty: &TypeInfo) -> Option<ValueShape> {
        self.shapes.get(&ty.id()).cloned()
    }

    /// Resolves a `$serializedType` name back to a type.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<TypeInfo> {
        self.names.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, ty: &TypeInfo) -> bool {
        self.bags.contains_key(&ty.id()) || self.shapes.contains_key(&ty.id())
    }
}

impl Default for PropertyBagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: LazyLock<RwLock<PropertyBagRegistry>> =
    LazyLock::new(|| RwLock::new(PropertyBagRegistry::new()));

fn read_registry<R>(f: impl FnOnce(&PropertyBagRegistry) -> R) -> R {
    match REGISTRY.read() {
        Ok(guard) => f(&guard),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

fn write_registry<R>(f: impl FnOnce(&mut PropertyBagRegistry) -> R) -> R {
    match REGISTRY.write() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Registers `T` in the global registry. Cheap when already registered.
pub fn register<T: PropertyValue>() {
    let ty = TypeInfo::of::<T>();
    if primitive::is_builtin(&ty) || read_registry(|r| r.contains(&ty)) {
        return;
    }
    write_registry(|r| r.register::<T>());
}

/// Registers a hand-built container bag in the global registry.
pub fn register_container<C: Any>(bag: ContainerPropertyBag<C>) -> bool {
    write_registry(|r| r.register_container(bag))
}

#[must_use]
pub fn try_get_bag(ty: &TypeInfo) -> Option<PropertyBag> {
    read_registry(|r| r.try_get_bag(ty))
}

#[must_use]
pub fn try_get_shape(ty: &TypeInfo) -> Option<ValueShape> {
    read_registry(|r| r.try_get_shape(ty))
}

#[must_use]
pub fn type_by_name(name: &str) -> Option<TypeInfo> {
    read_registry(|r| r.type_by_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BagKind;
    use std::collections::HashMap as StdMap;

    #[test]
    fn test_dependencies_registered_once() {
        let mut registry = PropertyBagRegistry::new();
        registry.register::<Vec<Option<Vec<i32>>>>();

        let outer = TypeInfo::of::<Vec<Option<Vec<i32>>>>();
        assert_eq!(registry.try_get_bag(&outer).map(|b| b.kind()), Some(BagKind::List));
        assert!(registry
            .try_get_shape(&TypeInfo::of::<Option<Vec<i32>>>())
            .is_some());
        assert!(registry.try_get_bag(&TypeInfo::of::<Vec<i32>>()).is_some());

        // Second registration is a no-op.
        assert!(!registry.register_bag(outer, || unreachable!()));
    }

    #[test]
    fn test_unregistered_lookup_is_none() {
        let registry = PropertyBagRegistry::new();
        assert!(registry
            .try_get_bag(&TypeInfo::of::<StdMap<String, u8>>())
            .is_none());
    }

    #[test]
    fn test_builtin_names_resolve() {
        let registry = PropertyBagRegistry::new();
        assert_eq!(registry.type_by_name("i32"), Some(TypeInfo::of::<i32>()));
        assert_eq!(
            registry.type_by_name("alloc::string::String"),
            Some(TypeInfo::of::<String>())
        );
    }
}
