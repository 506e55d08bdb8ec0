//! Ordered map for detached JSON objects.
//!
//! ```rust
//! use propbag::{SerializedMap, SerializedValue};
//!
//! let mut map = SerializedMap::new();
//! map.insert("first".to_string(), SerializedValue::from(1));
//! map.insert("second".to_string(), SerializedValue::from(2));
//!
//! let keys: Vec<_> = map.keys().cloned().collect();
//! assert_eq!(keys, vec!["first", "second"]);
//! ```

use crate::SerializedValue;
use indexmap::IndexMap;

/// Members of a [`SerializedValue::Object`] in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerializedMap(IndexMap<String, SerializedValue>);

impl SerializedMap {
    #[must_use]
    pub fn new() -> Self {
        SerializedMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        SerializedMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a member. A repeated key keeps its first position and takes
    /// the new value.
    pub fn insert(&mut self, key: String, value: SerializedValue) -> Option<SerializedValue> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SerializedValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<SerializedValue> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, SerializedValue> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, SerializedValue> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, SerializedValue> {
        self.0.iter()
    }
}

impl IntoIterator for SerializedMap {
    type Item = (String, SerializedValue);
    type IntoIter = indexmap::map::IntoIter<String, SerializedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SerializedMap {
    type Item = (&'a String, &'a SerializedValue);
    type IntoIter = indexmap::map::Iter<'a, String, SerializedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, SerializedValue)> for SerializedMap {
    fn from_iter<T: IntoIterator<Item = (String, SerializedValue)>>(iter: T) -> Self {
        SerializedMap(IndexMap::from_iter(iter))
    }
}
