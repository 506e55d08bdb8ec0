//! Adapter and migration chains shared by both codecs.
//!
//! Each codec call resolves overrides from an ordered chain: the user
//! adapters passed with the call first, then a snapshot of the process-wide
//! global list. Anything no adapter claims falls through to the codec's
//! built-in handling, which always comes last.

use crate::{Error, Result};
use std::any::Any;
use std::sync::{Arc, RwLock};

/// A process-wide list of adapters or migrations, mutated at startup.
pub(crate) struct GlobalList<T: ?Sized> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> GlobalList<T> {
    pub(crate) const fn new() -> Self {
        GlobalList {
            items: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, item: Arc<T>) {
        match self.items.write() {
            Ok(mut items) => items.push(item),
            Err(poisoned) => poisoned.into_inner().push(item),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        match self.items.read() {
            Ok(items) => items.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// User entries followed by global entries, fixed for one codec call.
pub(crate) struct AdapterChain<T: ?Sized> {
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized> AdapterChain<T> {
    pub(crate) fn new(user: &[Arc<T>], global: &GlobalList<T>) -> Self {
        let mut entries = user.to_vec();
        entries.extend(global.snapshot());
        AdapterChain { entries }
    }

    /// First entry at or after `start` accepted by `claims`, with its position.
    pub(crate) fn find(
        &self,
        start: usize,
        mut claims: impl FnMut(&T) -> bool,
    ) -> Option<(usize, Arc<T>)> {
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| claims(entry))
            .map(|(i, entry)| (i, Arc::clone(entry)))
    }

    /// Among entries accepted by `claims`, the earliest one with the highest
    /// `version`.
    pub(crate) fn latest(
        &self,
        mut claims: impl FnMut(&T) -> bool,
        version: impl Fn(&T) -> u32,
    ) -> Option<Arc<T>> {
        let mut best: Option<&Arc<T>> = None;
        for entry in self.entries.iter().filter(|e| claims(e)) {
            if best.map_or(true, |b| version(entry) > version(b)) {
                best = Some(entry);
            }
        }
        best.cloned()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Takes a type-erased codec result back to its static type.
pub(crate) fn unbox<T: Any>(value: Box<dyn Any>) -> Result<T> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| Error::type_mismatch(std::any::type_name::<T>(), "a different type"))
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
        fn version(&self) -> u32;
    }

    struct Entry(&'static str, u32);

    impl Named for Entry {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> u32 {
            self.1
        }
    }

    static GLOBAL: GlobalList<dyn Named> = GlobalList::new();

    #[test]
    fn test_user_entries_come_first() {
        GLOBAL.push(Arc::new(Entry("global", 1)));
        let user: Vec<Arc<dyn Named>> = vec![Arc::new(Entry("user", 1))];
        let chain = AdapterChain::new(&user, &GLOBAL);
        assert_eq!(chain.len(), 2);

        let (index, first) = chain.find(0, |_| true).unwrap();
        assert_eq!((index, first.name()), (0, "user"));
        let (index, next) = chain.find(index + 1, |_| true).unwrap();
        assert_eq!((index, next.name()), (1, "global"));
        assert!(chain.find(index + 1, |_| true).is_none());
    }

    #[test]
    fn test_latest_prefers_highest_then_earliest() {
        let user: Vec<Arc<dyn Named>> = vec![
            Arc::new(Entry("a", 1)),
            Arc::new(Entry("b", 3)),
            Arc::new(Entry("c", 3)),
        ];
        let chain = AdapterChain::new(&user, &GlobalList::new());
        let latest = chain.latest(|_| true, |e| e.version()).unwrap();
        assert_eq!(latest.name(), "b");
        assert!(chain.latest(|e| e.name() == "z", |e| e.version()).is_none());
    }
}
