//! Property-based tests for the round-trip guarantees of both codecs.

use proptest::prelude::*;
use propbag::{from_binary, from_json, property_bag, to_binary, to_json, PropertyValue};
use std::collections::BTreeMap;

fn roundtrip<T: PropertyValue + PartialEq + std::fmt::Debug>(value: &T) -> bool {
    let json = match to_json(value) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("JSON serialize failed: {}", e);
            return false;
        }
    };
    match from_json::<T>(&json) {
        Ok(back) if back == *value => {}
        Ok(back) => {
            eprintln!("JSON mismatch: {:?} via {}", back, json);
            return false;
        }
        Err(e) => {
            eprintln!("JSON deserialize failed: {} for {}", e, json);
            return false;
        }
    }

    let bytes = match to_binary(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("binary serialize failed: {}", e);
            return false;
        }
    };
    match from_binary::<T>(&bytes) {
        Ok(back) => back == *value,
        Err(e) => {
            eprintln!("binary deserialize failed: {}", e);
            false
        }
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Reading {
    sensor: String,
    value: f64,
    flags: Vec<bool>,
    offset: Option<i16>,
}
property_bag!(Reading {
    sensor: String,
    value: f64,
    flags: Vec<bool>,
    offset: Option<i16>,
});

fn reading() -> impl Strategy<Value = Reading> {
    (
        any::<String>(),
        any::<f64>().prop_filter("finite", |v| v.is_finite()),
        prop::collection::vec(any::<bool>(), 0..8),
        proptest::option::of(any::<i16>()),
    )
        .prop_map(|(sensor, value, flags, offset)| Reading {
            sensor,
            value,
            flags,
            offset,
        })
}

proptest! {
    #[test]
    fn prop_i32(n in any::<i32>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_i64(n in any::<i64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_u64(n in any::<u64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_f64(n in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_string(s in any::<String>()) {
        prop_assert!(roundtrip(&s));
    }

    #[test]
    fn prop_char(c in any::<char>()) {
        prop_assert!(roundtrip(&c));
    }

    #[test]
    fn prop_vec_option_i32(v in prop::collection::vec(proptest::option::of(any::<i32>()), 0..20)) {
        prop_assert!(roundtrip(&v));
    }

    #[test]
    fn prop_string_keyed_map(m in prop::collection::btree_map(any::<String>(), any::<u8>(), 0..10)) {
        prop_assert!(roundtrip(&m));
    }

    #[test]
    fn prop_int_keyed_map(m in prop::collection::btree_map(any::<i32>(), any::<bool>(), 0..10)) {
        prop_assert!(roundtrip(&m));
    }

    #[test]
    fn prop_container(r in reading()) {
        prop_assert!(roundtrip(&r));
    }

    #[test]
    fn prop_container_list(v in prop::collection::vec(reading(), 0..5)) {
        let by_sensor: BTreeMap<String, Reading> =
            v.iter().map(|r| (r.sensor.clone(), r.clone())).collect();
        prop_assert!(roundtrip(&v));
        prop_assert!(roundtrip(&by_sensor));
    }
}
