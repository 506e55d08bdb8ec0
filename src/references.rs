//! Reference tables for shared and cyclic object graphs.
//!
//! A table lives for exactly one serialize or deserialize call. While
//! writing it maps object identity to the id under which the object was
//! first written; while reading it maps ids back to the handles built so far,
//! so a reference read before its referent is complete still yields the same
//! shared object.

use crate::bag::{CollectionBag, DictionaryBag, ValueShape};
use crate::dynamic::DynamicValue;
use crate::property::Property;
use crate::registry;
use crate::visit::{CollectionVisitor, ContainerVisitor, DictionaryVisitor, Visitor};
use crate::{Error, Result, TypeInfo};
use std::any::Any;
use std::collections::{HashMap, HashSet};

/// Identity and id bookkeeping for one codec call.
#[derive(Default)]
pub(crate) struct SerializedReferences {
    /// Occurrences per identity, when a pre-pass ran.
    counts: Option<HashMap<usize, usize>>,
    ids: HashMap<usize, u32>,
    written: HashSet<usize>,
    objects: HashMap<u32, Box<dyn Any>>,
    next_id: u32,
}

impl SerializedReferences {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A writing table that only assigns ids to identities the pre-pass saw
    /// more than once.
    pub(crate) fn with_counts(counts: HashMap<usize, usize>) -> Self {
        SerializedReferences {
            counts: Some(counts),
            ..Self::default()
        }
    }

    pub(crate) fn id_of(&self, identity: usize) -> Option<u32> {
        self.ids.get(&identity).copied()
    }

    /// Whether `identity` needs an id. Identities the pre-pass never saw are
    /// treated as shared.
    pub(crate) fn is_shared(&self, identity: usize) -> bool {
        match &self.counts {
            Some(counts) => counts.get(&identity).map_or(true, |&n| n > 1),
            None => true,
        }
    }

    pub(crate) fn assign(&mut self, identity: usize) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(identity, id);
        id
    }

    /// Records that `identity` was written in full. Returns `false` when it
    /// already was.
    pub(crate) fn mark_written(&mut self, identity: usize) -> bool {
        self.written.insert(identity)
    }

    /// Reserves the next implicit id while reading.
    pub(crate) fn reserve(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Stores the handle of object `id`.
    pub(crate) fn set(&mut self, id: u32, handle: Box<dyn Any>) {
        self.objects.insert(id, handle);
    }

    pub(crate) fn get(&self, id: u32) -> Result<&dyn Any> {
        self.objects
            .get(&id)
            .map(|handle| &**handle)
            .ok_or(Error::UnresolvedReference(id))
    }
}

/// Counts how often each shared object is reachable from `value`.
///
/// The walk descends into a shared object only the first time it is seen,
/// so cycles terminate.
pub(crate) fn count_references(value: &dyn Any, ty: TypeInfo) -> Result<HashMap<usize, usize>> {
    let mut collector = ReferenceCollector::default();
    collector.walk(value, ty)?;
    Ok(collector.counts)
}

#[derive(Default)]
struct ReferenceCollector {
    counts: HashMap<usize, usize>,
}

impl ReferenceCollector {
    fn walk(&mut self, value: &dyn Any, ty: TypeInfo) -> Result<()> {
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => match shape.inner(value)? {
                    Some(inner) => self.walk(inner, shape.inner_type()),
                    None => Ok(()),
                },
                ValueShape::Reference(shape) => {
                    let count = self.counts.entry(shape.identity(value)?).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        return Ok(());
                    }
                    let inner_type = shape.inner_type();
                    shape.with_inner(value, &mut |inner| self.walk(inner, inner_type))
                }
                ValueShape::Dynamic => match value.downcast_ref::<DynamicValue>() {
                    Some(dynamic) => self.walk(dynamic.value(), dynamic.type_info()),
                    None => Ok(()),
                },
                ValueShape::Enum(_) => Ok(()),
            };
        }
        match registry::try_get_bag(&ty) {
            Some(bag) => bag.accept(self, value),
            None => Ok(()),
        }
    }
}

impl Visitor for ReferenceCollector {
    fn as_container_visitor(&mut self) -> Option<&mut dyn ContainerVisitor> {
        Some(self)
    }

    fn as_collection_visitor(&mut self) -> Option<&mut dyn CollectionVisitor> {
        Some(self)
    }

    fn as_dictionary_visitor(&mut self) -> Option<&mut dyn DictionaryVisitor> {
        Some(self)
    }
}

impl ContainerVisitor for ReferenceCollector {
    fn visit_property(&mut self, property: &dyn Property, container: &dyn Any) -> Result<()> {
        let ty = property.value_type();
        property.get_value(container, &mut |value| self.walk(value, ty))
    }
}

impl CollectionVisitor for ReferenceCollector {
    fn visit_collection(&mut self, bag: &dyn CollectionBag, collection: &dyn Any) -> Result<()> {
        let ty = bag.element_type();
        bag.for_each(collection, &mut |element| self.walk(element, ty))
    }
}

impl DictionaryVisitor for ReferenceCollector {
    fn visit_dictionary(&mut self, bag: &dyn DictionaryBag, dictionary: &dyn Any) -> Result<()> {
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        bag.for_each(dictionary, &mut |key, value| {
            self.walk(key, key_type)?;
            self.walk(value, value_type)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_bag;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Link {
        label: String,
        next: Option<Rc<RefCell<Link>>>,
    }
    property_bag!(Link {
        label: String,
        next: Option<Rc<RefCell<Link>>>,
    });

    fn counts_of<T: crate::PropertyValue>(value: &T) -> HashMap<usize, usize> {
        registry::register::<T>();
        count_references(value, TypeInfo::of::<T>()).unwrap()
    }

    #[test]
    fn test_shared_object_counted_twice() {
        let shared = Rc::new(RefCell::new(Link::default()));
        let counts = counts_of(&vec![shared.clone(), shared.clone()]);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn test_cycle_terminates() {
        let a = Rc::new(RefCell::new(Link {
            label: "a".into(),
            next: None,
        }));
        let b = Rc::new(RefCell::new(Link {
            label: "b".into(),
            next: Some(a.clone()),
        }));
        a.borrow_mut().next = Some(b.clone());

        let counts = counts_of(&a);
        let a_id = Rc::as_ptr(&a) as *const () as usize;
        let b_id = Rc::as_ptr(&b) as *const () as usize;
        assert_eq!(counts.get(&a_id), Some(&2));
        assert_eq!(counts.get(&b_id), Some(&1));

        a.borrow_mut().next = None;
    }

    #[test]
    fn test_table_ids() {
        let mut counts = HashMap::new();
        counts.insert(10, 1);
        counts.insert(20, 3);
        let mut table = SerializedReferences::with_counts(counts);
        assert!(!table.is_shared(10));
        assert!(table.is_shared(20));
        assert!(table.is_shared(30));

        assert_eq!(table.assign(20), 0);
        assert_eq!(table.id_of(20), Some(0));
        assert!(table.mark_written(20));
        assert!(!table.mark_written(20));

        let mut reading = SerializedReferences::new();
        let id = reading.reserve();
        assert!(matches!(reading.get(id), Err(Error::UnresolvedReference(0))));
        reading.set(id, Box::new(5_u8));
        assert_eq!(reading.get(id).unwrap().downcast_ref::<u8>(), Some(&5));
    }
}
