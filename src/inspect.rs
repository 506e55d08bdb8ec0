//! Human-readable dumps of property trees.
//!
//! [`to_debug_string`] walks a value through the visitor machinery and
//! renders one property, element or entry per line. Scalars use their JSON
//! spelling. Shared objects are labelled `#n` the first time they appear
//! and printed as `<ref #n>` afterwards, so cyclic graphs terminate.
//!
//! ```rust
//! use propbag::{inspect, property_bag};
//!
//! #[derive(Clone, Default)]
//! struct Player { name: String, scores: Vec<u32>, clan: Option<String> }
//! property_bag!(Player { name: String, scores: Vec<u32>, clan: Option<String> });
//!
//! let player = Player { name: "ada".into(), scores: vec![7, 9], clan: None };
//! let dump = inspect::to_debug_string(&player).unwrap();
//! assert_eq!(
//!     dump,
//!     "Player\n  name: \"ada\"\n  scores: [2]\n    - 7\n    - 9\n  clan: null"
//! );
//! ```

use crate::bag::{CollectionBag, DictionaryBag, PropertyBag, ValueShape};
use crate::dynamic::DynamicValue;
use crate::json::{scalar, JsonWriter};
use crate::property::{Property, PropertyValue};
use crate::visit::{CollectionVisitor, ContainerVisitor, DictionaryVisitor, Visitor};
use crate::{primitive, registry, Error, JsonWriterOptions, Result, TypeInfo};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Renders `value` as an indented property tree.
pub fn to_debug_string<T: PropertyValue>(value: &T) -> Result<String> {
    registry::register::<T>();
    let mut inspector = Inspector::default();
    inspector.value(value, TypeInfo::of::<T>())?;
    Ok(inspector.out)
}

/// `app::model::Player` -> `Player`, keeping generic arguments intact.
fn short_name(name: &str) -> &str {
    let path_end = name.find('<').unwrap_or(name.len());
    match name[..path_end].rfind("::") {
        Some(i) => &name[i + 2..],
        None => name,
    }
}

#[derive(Default)]
struct Inspector {
    out: String,
    depth: usize,
    /// Label of every shared object printed so far, by identity.
    labels: HashMap<usize, usize>,
}

impl Inspector {
    fn new_line(&mut self) {
        self.out.push('\n');
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn value(&mut self, value: &dyn Any, ty: TypeInfo) -> Result<()> {
        if primitive::is_builtin(&ty) {
            let mut writer = JsonWriter::new(JsonWriterOptions::new());
            scalar::write(&mut writer, value, ty)?;
            self.out.push_str(writer.as_str());
            return Ok(());
        }
        if let Some(shape) = registry::try_get_shape(&ty) {
            return match shape {
                ValueShape::Nullable(shape) => match shape.inner(value)? {
                    Some(inner) => self.value(inner, shape.inner_type()),
                    None => {
                        self.out.push_str("null");
                        Ok(())
                    }
                },
                ValueShape::Enum(shape) => {
                    let number = shape.to_i64(value)?;
                    let _ = write!(self.out, "{}({number})", short_name(ty.name()));
                    Ok(())
                }
                ValueShape::Reference(shape) => {
                    let identity = shape.identity(value)?;
                    if let Some(label) = self.labels.get(&identity) {
                        let _ = write!(self.out, "<ref #{label}>");
                        return Ok(());
                    }
                    let label = self.labels.len();
                    self.labels.insert(identity, label);
                    let _ = write!(self.out, "#{label} ");
                    let inner_type = shape.inner_type();
                    shape.with_inner(value, &mut |inner| self.value(inner, inner_type))
                }
                ValueShape::Dynamic => {
                    let dynamic = value
                        .downcast_ref::<DynamicValue>()
                        .ok_or_else(|| Error::type_mismatch("DynamicValue", ty.name()))?;
                    self.value(dynamic.value(), dynamic.type_info())
                }
            };
        }
        let bag =
            registry::try_get_bag(&ty).ok_or_else(|| Error::missing_property_bag(ty.name()))?;
        if matches!(bag, PropertyBag::Container(_)) {
            self.out.push_str(short_name(ty.name()));
        }
        bag.accept(self, value)
    }
}

impl Visitor for Inspector {
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

impl ContainerVisitor for Inspector {
    fn visit_property(&mut self, property: &dyn Property, container: &dyn Any) -> Result<()> {
        self.nested(|this| {
            this.new_line();
            let _ = write!(this.out, "{}: ", property.name());
            let value_type = property.value_type();
            property.get_value(container, &mut |value| this.value(value, value_type))
        })
    }
}

impl CollectionVisitor for Inspector {
    fn visit_collection(&mut self, bag: &dyn CollectionBag, collection: &dyn Any) -> Result<()> {
        let _ = write!(self.out, "[{}]", bag.count(collection)?);
        let element_type = bag.element_type();
        self.nested(|this| {
            bag.for_each(collection, &mut |element| {
                this.new_line();
                this.out.push_str("- ");
                this.value(element, element_type)
            })
        })
    }
}

impl DictionaryVisitor for Inspector {
    fn visit_dictionary(&mut self, bag: &dyn DictionaryBag, dictionary: &dyn Any) -> Result<()> {
        let _ = write!(self.out, "{{{}}}", bag.count(dictionary)?);
        let (key_type, value_type) = (bag.key_type(), bag.value_type());
        self.nested(|this| {
            bag.for_each(dictionary, &mut |key, value| {
                this.new_line();
                this.value(key, key_type)?;
                this.out.push_str(": ");
                this.value(value, value_type)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{property_bag, property_enum};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Clone, Copy, Default)]
    enum Role {
        #[default]
        Guest = 0,
        Admin = 3,
    }
    property_enum!(Role { Guest, Admin });

    #[derive(Clone, Default)]
    struct Member {
        role: Role,
        limits: BTreeMap<String, u8>,
    }
    property_bag!(Member { role: Role, limits: BTreeMap<String, u8> });

    #[derive(Clone, Default)]
    struct Node {
        name: String,
        next: Option<Rc<RefCell<Node>>>,
    }
    property_bag!(Node { name: String, next: Option<Rc<RefCell<Node>>> });

    #[test]
    fn test_short_names() {
        assert_eq!(short_name("app::model::Player"), "Player");
        assert_eq!(short_name("Player"), "Player");
        assert_eq!(
            short_name("app::Wrapper<core::option::Option<u8>>"),
            "Wrapper<core::option::Option<u8>>"
        );
    }

    #[test]
    fn test_enums_and_dictionaries() {
        let mut limits = BTreeMap::new();
        limits.insert("a".to_string(), 1);
        let member = Member {
            role: Role::Admin,
            limits,
        };
        assert_eq!(
            to_debug_string(&member).unwrap(),
            "Member\n  role: Role(3)\n  limits: {1}\n    \"a\": 1"
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let a = Rc::new(RefCell::new(Node {
            name: "a".into(),
            next: None,
        }));
        let b = Rc::new(RefCell::new(Node {
            name: "b".into(),
            next: Some(a.clone()),
        }));
        a.borrow_mut().next = Some(b);

        let dump = to_debug_string(&a).unwrap();
        assert_eq!(
            dump,
            "#0 Node\n  name: \"a\"\n  next: #1 Node\n    name: \"b\"\n    next: <ref #0>"
        );
        a.borrow_mut().next = None;
    }

    #[test]
    fn test_scalar_root() {
        let dump = to_debug_string(&vec![Some(1.5_f64), None]).unwrap();
        assert_eq!(dump, "[2]\n  - 1.5\n  - null");
    }
}
