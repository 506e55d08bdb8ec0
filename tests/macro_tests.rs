use propbag::{
    from_json, property_bag, property_enum, registry, serialized, to_json, visit, BagKind, Number,
    PropertyEnum, SerializedMap, SerializedObjectReader, SerializedValue, TypeInfo,
};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
enum Priority {
    Low = -1,
    #[default]
    Normal = 0,
    Urgent = 10,
}
property_enum!(Priority { Low, Normal, Urgent });

#[derive(Clone, Default, Debug, PartialEq)]
struct Task {
    title: String,
    priority: Priority,
    created_by: String,
    labels: HashMap<String, Vec<u8>>,
    parent: Option<Box<u64>>,
}

// `parent` is deliberately left out of the bag.
property_bag!(Task {
    title as "Title": String,
    priority: Priority,
    readonly created_by as "createdBy": String,
    labels: HashMap<String, Vec<u8>>,
});

#[test]
fn test_property_enum_discriminants() {
    assert_eq!(Priority::Low.to_i64(), -1);
    assert_eq!(Priority::Urgent.to_i64(), 10);
    assert_eq!(Priority::from_i64(0), Some(Priority::Normal));
    assert_eq!(Priority::from_i64(1), None);

    assert_eq!(to_json(&vec![Priority::Low, Priority::Urgent]).unwrap(), "[-1,10]");
    assert!(from_json::<Priority>("3").is_err());
}

#[test]
fn test_property_bag_names_and_order() {
    registry::register::<Task>();
    let bag = registry::try_get_bag(&TypeInfo::of::<Task>()).unwrap();
    assert_eq!(bag.kind(), BagKind::Container);

    let task = Task {
        title: "ship".to_string(),
        priority: Priority::Urgent,
        created_by: "ops".to_string(),
        labels: HashMap::new(),
        parent: Some(Box::new(7)),
    };
    assert_eq!(
        to_json(&task).unwrap(),
        r#"{"Title":"ship","priority":10,"createdBy":"ops","labels":{}}"#
    );
}

#[test]
fn test_property_bag_read_only_and_skipped_fields() {
    let json = r#"{"Title":"t","createdBy":"someone","labels":{"x":[1,2]}}"#;
    let task: Task = from_json(json).unwrap();
    assert_eq!(task.title, "t");
    assert_eq!(task.created_by, "");
    assert_eq!(task.labels["x"], [1, 2]);
    assert_eq!(task.parent, None);

    let mut task = task;
    assert!(visit::set_value(&mut task, "createdBy", "me".to_string()).is_err());
    visit::set_value(&mut task, "priority", Priority::Low).unwrap();
    assert_eq!(task.priority, Priority::Low);
}

#[test]
fn test_serialized_macro_literals() {
    assert_eq!(serialized!(null), SerializedValue::Null);
    assert_eq!(serialized!(false), SerializedValue::Bool(false));
    assert_eq!(serialized!(-123), SerializedValue::Number(Number::Integer(-123)));
    assert_eq!(serialized!(0.25), SerializedValue::Number(Number::Float(0.25)));
    assert_eq!(serialized!(""), SerializedValue::String(String::new()));
    assert_eq!(serialized!([]), SerializedValue::Array(vec![]));
}

#[test]
fn test_serialized_macro_objects_keep_order() {
    let value = serialized!({
        "z": 1,
        "a": [true, null, "s"],
        "m": {}
    });
    let object = value.as_object().unwrap();
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    assert_eq!(keys, ["z", "a", "m"]);
    assert_eq!(object.get("m"), Some(&SerializedValue::Object(SerializedMap::new())));
    assert_eq!(
        value.get("a").and_then(SerializedValue::as_array).map(Vec::len),
        Some(3)
    );
}

#[test]
fn test_serialized_macro_matches_parsed_json() {
    let task = Task {
        title: "write".to_string(),
        priority: Priority::Normal,
        ..Default::default()
    };
    let json = to_json(&task).unwrap();
    let mut reader = SerializedObjectReader::from_str(&json, Default::default()).unwrap();
    let parsed = reader.read_value().unwrap().unwrap().to_value().unwrap();

    let expected = serialized!({
        "Title": "write",
        "priority": 0,
        "createdBy": "",
        "labels": {}
    });
    assert_eq!(parsed, expected);
}
