//! Collection-shaped bags for the standard library containers.
//!
//! [`Sequence`] abstracts over `Vec`, `VecDeque`, `LinkedList` and the set
//! types; [`Mapping`] over `HashMap`, `BTreeMap` and `IndexMap`. The bag
//! structs are thin type-erasing wrappers around those traits.

use crate::bag::PropertyBag;
use crate::property::PropertyValue;
use crate::registry::PropertyBagRegistry;
use crate::{Error, Result, TypeInfo};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Enumeration and insertion over a homogeneous collection.
pub trait CollectionBag: Send + Sync {
    fn type_info(&self) -> TypeInfo;

    fn element_type(&self) -> TypeInfo;

    fn count(&self, collection: &dyn Any) -> Result<usize>;

    fn for_each(
        &self,
        collection: &dyn Any,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<()>;

    /// Creates an empty collection, pre-sized where the type supports it.
    fn create_instance(&self, capacity: usize) -> Box<dyn Any>;

    fn add(&self, collection: &mut dyn Any, element: Box<dyn Any>) -> Result<()>;

    fn clear(&self, collection: &mut dyn Any) -> Result<()>;

    /// Makes room for `additional` elements where the type supports it.
    fn reserve(&self, collection: &mut dyn Any, additional: usize) -> Result<()>;
}

/// A collection with indexed access.
pub trait ListBag: CollectionBag {
    fn get(
        &self,
        list: &dyn Any,
        index: usize,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<bool>;

    fn as_collection(&self) -> &dyn CollectionBag;
}

/// A collection of unique elements.
pub trait SetBag: CollectionBag {
    fn as_collection(&self) -> &dyn CollectionBag;
}

/// Key/value enumeration and insertion.
pub trait DictionaryBag: Send + Sync {
    fn type_info(&self) -> TypeInfo;

    fn key_type(&self) -> TypeInfo;

    fn value_type(&self) -> TypeInfo;

    fn count(&self, dictionary: &dyn Any) -> Result<usize>;

    fn for_each(
        &self,
        dictionary: &dyn Any,
        f: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>,
    ) -> Result<()>;

    fn create_instance(&self, capacity: usize) -> Box<dyn Any>;

    fn insert(&self, dictionary: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>)
        -> Result<()>;

    fn clear(&self, dictionary: &mut dyn Any) -> Result<()>;

    fn reserve(&self, dictionary: &mut dyn Any, additional: usize) -> Result<()>;
}

/// Minimal sequence operations shared by the std collections.
pub trait Sequence: PropertyValue {
    type Item: PropertyValue;

    fn seq_len(&self) -> usize;

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &Self::Item> + '_>;

    fn seq_with_capacity(capacity: usize) -> Self;

    fn seq_add(&mut self, item: Self::Item);

    fn seq_clear(&mut self);

    fn seq_reserve(&mut self, additional: usize) {
        let _ = additional;
    }

    fn seq_get(&self, index: usize) -> Option<&Self::Item> {
        self.seq_iter().nth(index)
    }
}

/// Minimal map operations shared by the std maps.
pub trait Mapping: PropertyValue {
    type Key: PropertyValue;
    type Value: PropertyValue;

    fn map_len(&self) -> usize;

    fn map_iter(&self) -> Box<dyn Iterator<Item = (&Self::Key, &Self::Value)> + '_>;

    fn map_with_capacity(capacity: usize) -> Self;

    fn map_insert(&mut self, key: Self::Key, value: Self::Value);

    fn map_clear(&mut self);

    fn map_reserve(&mut self, additional: usize) {
        let _ = additional;
    }
}

fn downcast<'a, T: Any>(value: &'a dyn Any) -> Result<&'a T> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::type_mismatch(std::any::type_name::<T>(), "a different type"))
}

fn downcast_mut<'a, T: Any>(value: &'a mut dyn Any) -> Result<&'a mut T> {
    value
        .downcast_mut::<T>()
        .ok_or_else(|| Error::type_mismatch(std::any::type_name::<T>(), "a different type"))
}

fn unbox<T: Any>(value: Box<dyn Any>) -> Result<T> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| Error::type_mismatch(std::any::type_name::<T>(), "a different type"))
}

macro_rules! sequence_collection_bag {
    ($bag:ident) => {
        impl<S: Sequence> CollectionBag for $bag<S> {
            fn type_info(&self) -> TypeInfo {
                TypeInfo::of::<S>()
            }

            fn element_type(&self) -> TypeInfo {
                TypeInfo::of::<S::Item>()
            }

            fn count(&self, collection: &dyn Any) -> Result<usize> {
                Ok(downcast::<S>(collection)?.seq_len())
            }

            fn for_each(
                &self,
                collection: &dyn Any,
                f: &mut dyn FnMut(&dyn Any) -> Result<()>,
            ) -> Result<()> {
                for item in downcast::<S>(collection)?.seq_iter() {
                    f(item)?;
                }
                Ok(())
            }

            fn create_instance(&self, capacity: usize) -> Box<dyn Any> {
                Box::new(S::seq_with_capacity(capacity))
            }

            fn add(&self, collection: &mut dyn Any, element: Box<dyn Any>) -> Result<()> {
                let item = unbox::<S::Item>(element)?;
                downcast_mut::<S>(collection)?.seq_add(item);
                Ok(())
            }

            fn clear(&self, collection: &mut dyn Any) -> Result<()> {
                downcast_mut::<S>(collection)?.seq_clear();
                Ok(())
            }

            fn reserve(&self, collection: &mut dyn Any, additional: usize) -> Result<()> {
                downcast_mut::<S>(collection)?.seq_reserve(additional);
                Ok(())
            }
        }

        impl<S> $bag<S> {
            #[must_use]
            pub fn new() -> Self {
                $bag(PhantomData)
            }
        }

        impl<S> Default for $bag<S> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// [`ListBag`] over any indexed [`Sequence`].
pub struct ListPropertyBag<S>(PhantomData<fn() -> S>);

/// [`CollectionBag`] over any [`Sequence`] without indexed access.
pub struct CollectionPropertyBag<S>(PhantomData<fn() -> S>);

/// [`SetBag`] over any set-like [`Sequence`].
pub struct SetPropertyBag<S>(PhantomData<fn() -> S>);

sequence_collection_bag!(ListPropertyBag);
sequence_collection_bag!(CollectionPropertyBag);
sequence_collection_bag!(SetPropertyBag);

impl<S: Sequence> ListBag for ListPropertyBag<S> {
    fn get(
        &self,
        list: &dyn Any,
        index: usize,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<bool> {
        match downcast::<S>(list)?.seq_get(index) {
            Some(item) => f(item).map(|_| true),
            None => Ok(false),
        }
    }

    fn as_collection(&self) -> &dyn CollectionBag {
        self
    }
}

impl<S: Sequence> SetBag for SetPropertyBag<S> {
    fn as_collection(&self) -> &dyn CollectionBag {
        self
    }
}

/// [`DictionaryBag`] over any [`Mapping`].
pub struct DictionaryPropertyBag<M>(PhantomData<fn() -> M>);

impl<M> DictionaryPropertyBag<M> {
    #[must_use]
    pub fn new() -> Self {
        DictionaryPropertyBag(PhantomData)
    }
}

impl<M> Default for DictionaryPropertyBag<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Mapping> DictionaryBag for DictionaryPropertyBag<M> {
    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<M>()
    }

    fn key_type(&self) -> TypeInfo {
        TypeInfo::of::<M::Key>()
    }

    fn value_type(&self) -> TypeInfo {
        TypeInfo::of::<M::Value>()
    }

    fn count(&self, dictionary: &dyn Any) -> Result<usize> {
        Ok(downcast::<M>(dictionary)?.map_len())
    }

    fn for_each(
        &self,
        dictionary: &dyn Any,
        f: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>,
    ) -> Result<()> {
        for (key, value) in downcast::<M>(dictionary)?.map_iter() {
            f(key, value)?;
        }
        Ok(())
    }

    fn create_instance(&self, capacity: usize) -> Box<dyn Any> {
        Box::new(M::map_with_capacity(capacity))
    }

    fn insert(
        &self,
        dictionary: &mut dyn Any,
        key: Box<dyn Any>,
        value: Box<dyn Any>,
    ) -> Result<()> {
        let key = unbox::<M::Key>(key)?;
        let value = unbox::<M::Value>(value)?;
        downcast_mut::<M>(dictionary)?.map_insert(key, value);
        Ok(())
    }

    fn clear(&self, dictionary: &mut dyn Any) -> Result<()> {
        downcast_mut::<M>(dictionary)?.map_clear();
        Ok(())
    }

    fn reserve(&self, dictionary: &mut dyn Any, additional: usize) -> Result<()> {
        downcast_mut::<M>(dictionary)?.map_reserve(additional);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// std implementations

impl<T: PropertyValue> Sequence for Vec<T> {
    type Item = T;

    fn seq_len(&self) -> usize {
        self.len()
    }

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn seq_with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn seq_add(&mut self, item: T) {
        self.push(item);
    }

    fn seq_clear(&mut self) {
        self.clear();
    }

    fn seq_reserve(&mut self, additional: usize) {
        self.reserve_exact(additional);
    }

    fn seq_get(&self, index: usize) -> Option<&T> {
        self.get(index)
    }
}

impl<T: PropertyValue> Sequence for VecDeque<T> {
    type Item = T;

    fn seq_len(&self) -> usize {
        self.len()
    }

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn seq_with_capacity(capacity: usize) -> Self {
        VecDeque::with_capacity(capacity)
    }

    fn seq_add(&mut self, item: T) {
        self.push_back(item);
    }

    fn seq_clear(&mut self) {
        self.clear();
    }

    fn seq_reserve(&mut self, additional: usize) {
        self.reserve_exact(additional);
    }

    fn seq_get(&self, index: usize) -> Option<&T> {
        self.get(index)
    }
}

impl<T: PropertyValue> Sequence for LinkedList<T> {
    type Item = T;

    fn seq_len(&self) -> usize {
        self.len()
    }

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn seq_with_capacity(_capacity: usize) -> Self {
        LinkedList::new()
    }

    fn seq_add(&mut self, item: T) {
        self.push_back(item);
    }

    fn seq_clear(&mut self) {
        self.clear();
    }
}

impl<T: PropertyValue + Eq + Hash> Sequence for HashSet<T> {
    type Item = T;

    fn seq_len(&self) -> usize {
        self.len()
    }

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn seq_with_capacity(capacity: usize) -> Self {
        HashSet::with_capacity(capacity)
    }

    fn seq_add(&mut self, item: T) {
        self.insert(item);
    }

    fn seq_clear(&mut self) {
        self.clear();
    }

    fn seq_reserve(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<T: PropertyValue + Ord> Sequence for BTreeSet<T> {
    type Item = T;

    fn seq_len(&self) -> usize {
        self.len()
    }

    fn seq_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn seq_with_capacity(_capacity: usize) -> Self {
        BTreeSet::new()
    }

    fn seq_add(&mut self, item: T) {
        self.insert(item);
    }

    fn seq_clear(&mut self) {
        self.clear();
    }
}

impl<K: PropertyValue + Eq + Hash, V: PropertyValue> Mapping for HashMap<K, V> {
    type Key = K;
    type Value = V;

    fn map_len(&self) -> usize {
        self.len()
    }

    fn map_iter(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        Box::new(self.iter())
    }

    fn map_with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity(capacity)
    }

    fn map_insert(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn map_clear(&mut self) {
        self.clear();
    }

    fn map_reserve(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<K: PropertyValue + Ord, V: PropertyValue> Mapping for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn map_len(&self) -> usize {
        self.len()
    }

    fn map_iter(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        Box::new(self.iter())
    }

    fn map_with_capacity(_capacity: usize) -> Self {
        BTreeMap::new()
    }

    fn map_insert(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn map_clear(&mut self) {
        self.clear();
    }
}

impl<K: PropertyValue + Eq + Hash, V: PropertyValue> Mapping for IndexMap<K, V> {
    type Key = K;
    type Value = V;

    fn map_len(&self) -> usize {
        self.len()
    }

    fn map_iter(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        Box::new(self.iter())
    }

    fn map_with_capacity(capacity: usize) -> Self {
        IndexMap::with_capacity(capacity)
    }

    fn map_insert(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn map_clear(&mut self) {
        self.clear();
    }

    fn map_reserve(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

// -----------------------------------------------------------------------------
// Registration

impl<T: PropertyValue> PropertyValue for Vec<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::List(Arc::new(ListPropertyBag::<Self>::new()))
        }) {
            T::register(registry);
        }
    }
}

impl<T: PropertyValue> PropertyValue for VecDeque<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::List(Arc::new(ListPropertyBag::<Self>::new()))
        }) {
            T::register(registry);
        }
    }
}

impl<T: PropertyValue> PropertyValue for LinkedList<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Collection(Arc::new(CollectionPropertyBag::<Self>::new()))
        }) {
            T::register(registry);
        }
    }
}

impl<T: PropertyValue + Eq + Hash> PropertyValue for HashSet<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Set(Arc::new(SetPropertyBag::<Self>::new()))
        }) {
            T::register(registry);
        }
    }
}

impl<T: PropertyValue + Ord> PropertyValue for BTreeSet<T> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Set(Arc::new(SetPropertyBag::<Self>::new()))
        }) {
            T::register(registry);
        }
    }
}

impl<K: PropertyValue + Eq + Hash, V: PropertyValue> PropertyValue for HashMap<K, V> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Dictionary(Arc::new(DictionaryPropertyBag::<Self>::new()))
        }) {
            K::register(registry);
            V::register(registry);
        }
    }
}

impl<K: PropertyValue + Ord, V: PropertyValue> PropertyValue for BTreeMap<K, V> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Dictionary(Arc::new(DictionaryPropertyBag::<Self>::new()))
        }) {
            K::register(registry);
            V::register(registry);
        }
    }
}

impl<K: PropertyValue + Eq + Hash, V: PropertyValue> PropertyValue for IndexMap<K, V> {
    fn register(registry: &mut PropertyBagRegistry) {
        if registry.register_bag(TypeInfo::of::<Self>(), || {
            PropertyBag::Dictionary(Arc::new(DictionaryPropertyBag::<Self>::new()))
        }) {
            K::register(registry);
            V::register(registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_bag_roundtrip_through_erased_api() {
        let bag = ListPropertyBag::<Vec<i32>>::new();
        let mut list = bag.create_instance(3);
        for i in [1, 2, 3] {
            bag.add(&mut *list, Box::new(i)).unwrap();
        }
        assert_eq!(bag.count(&*list).unwrap(), 3);

        let mut second = None;
        assert!(bag
            .get(&*list, 1, &mut |v| {
                second = v.downcast_ref::<i32>().copied();
                Ok(())
            })
            .unwrap());
        assert_eq!(second, Some(2));
        assert!(!bag.get(&*list, 9, &mut |_| Ok(())).unwrap());
    }

    #[test]
    fn test_set_bag_deduplicates() {
        let bag = SetPropertyBag::<BTreeSet<u8>>::new();
        let mut set = bag.create_instance(0);
        bag.add(&mut *set, Box::new(4_u8)).unwrap();
        bag.add(&mut *set, Box::new(4_u8)).unwrap();
        assert_eq!(bag.count(&*set).unwrap(), 1);
    }

    #[test]
    fn test_dictionary_bag_preserves_insertion_order() {
        let bag = DictionaryPropertyBag::<IndexMap<String, i64>>::new();
        let mut map = bag.create_instance(2);
        bag.insert(&mut *map, Box::new("b".to_string()), Box::new(2_i64))
            .unwrap();
        bag.insert(&mut *map, Box::new("a".to_string()), Box::new(1_i64))
            .unwrap();

        let mut keys = Vec::new();
        bag.for_each(&*map, &mut |k, _| {
            keys.push(k.downcast_ref::<String>().cloned().unwrap_or_default());
            Ok(())
        })
        .unwrap();
        assert_eq!(keys, ["b", "a"]);
        assert!(bag.key_type().is::<String>());
    }

    #[test]
    fn test_add_wrong_element_type() {
        let bag = ListPropertyBag::<Vec<i32>>::new();
        let mut list = bag.create_instance(0);
        assert!(bag.add(&mut *list, Box::new("no")).is_err());
    }
}
