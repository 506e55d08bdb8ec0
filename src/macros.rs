/// Declares the property bag of a plain struct and implements
/// [`PropertyValue`](crate::PropertyValue) for it.
///
/// Each listed field becomes a read/write property named after the field.
/// `readonly` fields only get a getter; `as "Name"` renames the property.
/// Properties are declared in the order listed, which is the serialization
/// order. The struct must implement `Clone` and `Default`.
///
/// ```rust
/// use propbag::{property_bag, to_json};
///
/// #[derive(Clone, Default)]
/// struct Sample { a: f32, b: i32, id: u64 }
///
/// property_bag!(Sample {
///     a as "A": f32,
///     b as "B": i32,
///     readonly id: u64,
/// });
///
/// let json = to_json(&Sample { a: 1.5, b: 3, id: 7 }).unwrap();
/// assert_eq!(json, r#"{"A":1.5,"B":3,"id":7}"#);
/// ```
#[macro_export]
macro_rules! property_bag {
    (@props $ty:ty, $bag:expr, ) => {
        $bag
    };

    (@props $ty:ty, $bag:expr, readonly $field:ident as $name:tt : $fty:ty $(, $($rest:tt)*)?) => {
        $crate::property_bag!(@props $ty,
            $bag.with_property($crate::DelegateProperty::read_only(
                $name,
                |c: &$ty| -> $fty { c.$field.clone() },
            )),
            $($($rest)*)?)
    };

    (@props $ty:ty, $bag:expr, readonly $field:ident : $fty:ty $(, $($rest:tt)*)?) => {
        $crate::property_bag!(@props $ty, $bag, readonly $field as (stringify!($field)) : $fty $(, $($rest)*)?)
    };

    (@props $ty:ty, $bag:expr, $field:ident as $name:tt : $fty:ty $(, $($rest:tt)*)?) => {
        $crate::property_bag!(@props $ty,
            $bag.with_property($crate::DelegateProperty::new(
                $name,
                |c: &$ty| -> $fty { c.$field.clone() },
                |c: &mut $ty, v: $fty| c.$field = v,
            )),
            $($($rest)*)?)
    };

    (@props $ty:ty, $bag:expr, $field:ident : $fty:ty $(, $($rest:tt)*)?) => {
        $crate::property_bag!(@props $ty, $bag, $field as (stringify!($field)) : $fty $(, $($rest)*)?)
    };

    ($ty:ty { $($body:tt)* }) => {
        impl $crate::PropertyValue for $ty {
            fn register(registry: &mut $crate::registry::PropertyBagRegistry) {
                let bag = $crate::ContainerPropertyBag::<$ty>::with_default();
                registry.register_container($crate::property_bag!(@props $ty, bag, $($body)*));
            }
        }
    };
}

/// Registers a field-less enum as an integer-valued property type.
///
/// Variants map to their discriminants; values without a variant fail to
/// deserialize.
///
/// ```rust
/// use propbag::{property_enum, PropertyEnum};
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Mode { Idle = 0, Running = 5 }
///
/// property_enum!(Mode { Idle, Running });
///
/// assert_eq!(Mode::Running.to_i64(), 5);
/// assert_eq!(Mode::from_i64(0), Some(Mode::Idle));
/// assert_eq!(Mode::from_i64(1), None);
/// ```
#[macro_export]
macro_rules! property_enum {
    ($ty:ident { $($variant:ident),* $(,)? }) => {
        impl $crate::PropertyValue for $ty {
            fn register(registry: &mut $crate::registry::PropertyBagRegistry) {
                $crate::register_enum::<$ty>(registry);
            }
        }

        impl $crate::PropertyEnum for $ty {
            fn to_i64(self) -> i64 {
                self as i64
            }

            fn from_i64(value: i64) -> Option<Self> {
                $(
                    if value == $ty::$variant as i64 {
                        return Some($ty::$variant);
                    }
                )*
                None
            }
        }
    };
}

/// Builds a [`SerializedValue`](crate::SerializedValue) from JSON-like syntax.
///
/// ```rust
/// use propbag::{serialized, SerializedValue};
///
/// let value = serialized!({ "name": "Alice", "tags": [1, 2], "ok": true });
/// assert_eq!(value.get("name").and_then(SerializedValue::as_str), Some("Alice"));
/// ```
#[macro_export]
macro_rules! serialized {
    (null) => {
        $crate::SerializedValue::Null
    };

    (true) => {
        $crate::SerializedValue::Bool(true)
    };

    (false) => {
        $crate::SerializedValue::Bool(false)
    };

    ([]) => {
        $crate::SerializedValue::Array(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::SerializedValue::Array(vec![$($crate::serialized!($elem)),*])
    };

    ({}) => {
        $crate::SerializedValue::Object($crate::SerializedMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut object = $crate::SerializedMap::new();
        $(
            object.insert($key.to_string(), $crate::serialized!($value));
        )*
        $crate::SerializedValue::Object(object)
    }};

    ($other:expr) => {
        $crate::SerializedValue::from($other)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Number, SerializedMap, SerializedValue};

    #[test]
    fn test_serialized_macro_primitives() {
        assert_eq!(serialized!(null), SerializedValue::Null);
        assert_eq!(serialized!(true), SerializedValue::Bool(true));
        assert_eq!(serialized!(42), SerializedValue::Number(Number::Integer(42)));
        assert_eq!(serialized!(3.5), SerializedValue::Number(Number::Float(3.5)));
        assert_eq!(serialized!("hello"), SerializedValue::String("hello".to_string()));
    }

    #[test]
    fn test_serialized_macro_nested() {
        assert_eq!(serialized!({}), SerializedValue::Object(SerializedMap::new()));

        let obj = serialized!({ "list": [1, 2, 3], "inner": { "x": null } });
        let list = obj.get("list").and_then(SerializedValue::as_array).map(Vec::len);
        assert_eq!(list, Some(3));
        assert_eq!(
            obj.get("inner").and_then(|v| v.get("x")),
            Some(&SerializedValue::Null)
        );
    }
}
