//! JSON deserialization from buffered views.
//!
//! The reader mirrors [`ser`](super::ser): adapters first, then the built-in
//! path. Objects are filled in place, so a shared object is registered in
//! the reference table before its members are read and a cycle back to it
//! resolves to the same instance.

use super::adapter::{JsonAdapter, JsonDeserializationContext};
use super::migration::{JsonMigration, JsonMigrationContext};
use super::{scalar, ELEMENTS, ID, KEY, PAIR_VALUE, REF, TYPE, VALUE, VERSION};
use crate::adapter::AdapterChain;
use crate::bag::{
    CollectionBag, ContainerBag, DictionaryBag, PropertyBag, ReferenceShape, ValueShape,
};
use crate::dynamic::DynamicValue;
use crate::parser::SerializedValueView;
use crate::references::SerializedReferences;
use crate::{primitive, registry, Error, ReadOnlyPolicy, Result, TypeInfo};
use std::any::Any;
use tracing::{debug, warn};

/// `$serializedValue` of a wrapper object, or the view itself.
fn unwrap_value(view: SerializedValueView<'_>) -> SerializedValueView<'_> {
    view.as_object()
        .and_then(|object| object.get(VALUE))
        .unwrap_or(view)
}

fn read_u32(view: SerializedValueView<'_>, what: &str) -> Result<u32> {
    let number = view
        .as_primitive()
        .ok_or_else(|| Error::type_mismatch(what, view.kind_name()))?
        .as_u64()?;
    u32::try_from(number).map_err(|_| Error::type_mismatch(what, &number.to_string()))
}

pub(crate) struct JsonDeserializer {
    adapters: AdapterChain<dyn JsonAdapter>,
    migrations: AdapterChain<dyn JsonMigration>,
    /// `None` when serialized references are disabled.
    references: Option<SerializedReferences>,
    read_only_policy: ReadOnlyPolicy,
}

impl JsonDeserializer {
    pub(crate) fn new(
        adapters: AdapterChain<dyn JsonAdapter>,
        migrations: AdapterChain<dyn JsonMigration>,
        references: Option<SerializedReferences>,
        read_only_policy: ReadOnlyPolicy,
    ) -> Self {
        JsonDeserializer {
            adapters,
            migrations,
            references,
            read_only_policy,
        }
    }

    /// Whether some adapter overrides the handling of `ty`.
    pub(crate) fn is_claimed(&self, ty: &TypeInfo) -> bool {
        self.adapters.find(0, |a| a.handles(ty)).is_some()
    }

    /// Reads a `ty` from `view`, starting the adapter search at `start`.
    pub(crate) fn deserialize(
        &mut self,
        view: SerializedValueView<'_>,
        ty: TypeInfo,
        start: usize,
    ) -> Result<Box<dyn Any>> {
        if let Some((index, adapter)) = self.adapters.find(start, |a| a.handles(&ty)) {
            let mut ctx = JsonDeserializationContext {
                deserializer: self,
                view,
                ty,
                index,
            };
            return adapter.deserialize(&mut ctx);
        }
        self.deserialize_default(view, ty)
    }

    pub(crate) fn deserialize_default(
        &mut self,
        view: SerializedValueView<'_>,
        ty: TypeInfo,
    ) -> Result<Box<dyn Any>> {
        if primitive::is_builtin(&ty) {
            return scalar::read(view, ty);
        }
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => {
                    if view.is_null() {
                        shape.wrap(None)
                    } else {
                        let inner = self.deserialize(view, shape.inner_type(), 0)?;
                        shape.wrap(Some(inner))
                    }
                }
                ValueShape::Enum(shape) => {
                    let number = view
                        .as_primitive()
                        .filter(|p| !p.is_null())
                        .ok_or_else(|| Error::type_mismatch("integer", view.kind_name()))?
                        .as_i64()?;
                    shape.from_i64(number)
                }
                ValueShape::Reference(shape) => {
                    self.deserialize_reference(view, shape.as_ref())
                }
                ValueShape::Dynamic => self.deserialize_dynamic(view),
            };
        }
        match registry::try_get_bag(&ty) {
            Some(bag) => {
                let mut instance = bag.create_instance()?;
                self.fill(view, &mut *instance, &bag)?;
                Ok(instance)
            }
            None => Err(Error::unsupported_type(ty.name())),
        }
    }

    /// Reads `view` into an existing instance of the bag's type.
    pub(crate) fn fill(
        &mut self,
        view: SerializedValueView<'_>,
        target: &mut dyn Any,
        bag: &PropertyBag,
    ) -> Result<()> {
        match bag {
            PropertyBag::Container(bag) => self.fill_container(view, target, bag.as_ref()),
            PropertyBag::List(bag) => self.fill_collection(view, target, bag.as_collection()),
            PropertyBag::Set(bag) => self.fill_collection(view, target, bag.as_collection()),
            PropertyBag::Collection(bag) => self.fill_collection(view, target, bag.as_ref()),
            PropertyBag::Dictionary(bag) => self.fill_dictionary(view, target, bag.as_ref()),
        }
    }

    fn remember(
        &mut self,
        id: Option<u32>,
        shape: &dyn ReferenceShape,
        handle: &dyn Any,
    ) -> Result<()> {
        if let (Some(id), Some(references)) = (id, self.references.as_mut()) {
            references.set(id, shape.clone_ref(handle)?);
        }
        Ok(())
    }

    fn deserialize_reference(
        &mut self,
        view: SerializedValueView<'_>,
        shape: &dyn ReferenceShape,
    ) -> Result<Box<dyn Any>> {
        let object = view.as_object();
        if let Some(id_view) = object.and_then(|o| o.get(REF)) {
            let id = read_u32(id_view, "reference id")?;
            let references = self
                .references
                .as_ref()
                .ok_or(Error::MissingReferenceTable)?;
            return shape.clone_ref(references.get(id)?);
        }
        let id = match object.and_then(|o| o.get(ID)) {
            Some(id_view) => Some(read_u32(id_view, "reference id")?),
            None => None,
        };

        let inner_type = shape.inner_type();
        let claimed = self.is_claimed(&inner_type);
        match registry::try_get_bag(&inner_type).filter(|_| !claimed) {
            Some(bag) => {
                let handle = shape.create(bag.create_instance()?)?;
                self.remember(id, shape, &*handle)?;
                shape.with_inner_mut(&*handle, &mut |inner| self.fill(view, inner, &bag))?;
                Ok(handle)
            }
            None => {
                let inner = self.deserialize(unwrap_value(view), inner_type, 0)?;
                let handle = shape.create(inner)?;
                self.remember(id, shape, &*handle)?;
                Ok(handle)
            }
        }
    }

    fn deserialize_dynamic(&mut self, view: SerializedValueView<'_>) -> Result<Box<dyn Any>> {
        let name = view
            .as_object()
            .and_then(|o| o.get(TYPE))
            .ok_or_else(|| {
                Error::type_mismatch("object with `$serializedType`", view.kind_name())
            })?
            .to_text()?;
        let runtime =
            registry::type_by_name(&name).ok_or_else(|| Error::missing_property_bag(&name))?;
        // A shared object keeps its id next to the wrapped value.
        let inner_view = match registry::try_get_shape(&runtime) {
            Some(ValueShape::Reference(_)) => view,
            _ => unwrap_value(view),
        };
        let value = self.deserialize(inner_view, runtime, 0)?;
        Ok(Box::new(DynamicValue::from_boxed(value, runtime)))
    }

    fn fill_container(
        &mut self,
        view: SerializedValueView<'_>,
        target: &mut dyn Any,
        bag: &dyn ContainerBag,
    ) -> Result<()> {
        let ty = bag.type_info();
        let object = view
            .as_object()
            .ok_or_else(|| Error::type_mismatch("object", view.kind_name()))?;

        if let Some(migration) = self.migrations.latest(|m| m.handles(&ty), |m| m.version()) {
            let version = match object.get(VERSION) {
                Some(version) => read_u32(version, "version")?,
                None => 0,
            };
            if version < migration.version() {
                debug!(
                    type_name = ty.name(),
                    from = version,
                    to = migration.version(),
                    "migrating"
                );
                let mut ctx = JsonMigrationContext {
                    deserializer: self,
                    object,
                    serialized_version: version,
                };
                let migrated = migration.migrate(&mut ctx)?;
                return bag.assign(target, migrated);
            }
        }

        for member in object.members() {
            let name = member.name()?;
            if super::is_reserved(&name) {
                continue;
            }
            let Some(property) = bag.property(&name) else {
                debug!(type_name = ty.name(), member = %name, "skipping unknown member");
                continue;
            };
            let Some(value) = member.value() else {
                continue;
            };
            if property.is_read_only() {
                match self.read_only_policy {
                    ReadOnlyPolicy::Ignore => {
                        warn!(
                            type_name = ty.name(),
                            property = %name,
                            "ignoring value for read-only property"
                        );
                        continue;
                    }
                    ReadOnlyPolicy::Strict => return Err(Error::read_only(ty.name(), &name)),
                }
            }
            let value = self.deserialize(value, property.value_type(), 0)?;
            property.set_value(target, value)?;
        }
        Ok(())
    }

    fn fill_collection(
        &mut self,
        view: SerializedValueView<'_>,
        target: &mut dyn Any,
        bag: &dyn CollectionBag,
    ) -> Result<()> {
        let elements = view
            .as_array()
            .or_else(|| {
                view.as_object()
                    .and_then(|o| o.get(ELEMENTS))
                    .and_then(|v| v.as_array())
            })
            .ok_or_else(|| Error::type_mismatch("array", view.kind_name()))?;
        let element_type = bag.element_type();
        bag.clear(target)?;
        bag.reserve(target, elements.len())?;
        for element in elements.iter() {
            let value = self.deserialize(element, element_type, 0)?;
            bag.add(target, value)?;
        }
        Ok(())
    }

    fn fill_dictionary(
        &mut self,
        view: SerializedValueView<'_>,
        target: &mut dyn Any,
        bag: &dyn DictionaryBag,
    ) -> Result<()> {
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        let entries = view
            .as_object()
            .and_then(|o| o.get(ELEMENTS))
            .unwrap_or(view);
        bag.clear(target)?;

        if let Some(object) = entries.as_object().filter(|_| key_type.is::<String>()) {
            bag.reserve(target, object.len())?;
            for member in object.members() {
                let Some(value) = member.value() else {
                    continue;
                };
                let key = member.name()?.into_owned();
                let value = self.deserialize(value, value_type, 0)?;
                bag.insert(target, Box::new(key), value)?;
            }
            return Ok(());
        }

        let pairs = entries
            .as_array()
            .ok_or_else(|| {
                Error::type_mismatch("array of key/value pairs", entries.kind_name())
            })?;
        bag.reserve(target, pairs.len())?;
        for pair in pairs.iter() {
            let pair = pair
                .as_object()
                .ok_or_else(|| Error::type_mismatch("key/value object", pair.kind_name()))?;
            let (Some(key), Some(value)) = (pair.get(KEY), pair.get(PAIR_VALUE)) else {
                return Err(Error::custom("dictionary entry needs `Key` and `Value` members"));
            };
            let key = self.deserialize(key, key_type, 0)?;
            let value = self.deserialize(value, value_type, 0)?;
            bag.insert(target, key, value)?;
        }
        Ok(())
    }
}
