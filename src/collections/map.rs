// ============================================================================
// weft - Observed Map
// ============================================================================

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::collections::CollectionObserver;
use crate::observation::subscriber::CollectionChange;

/// A keyed table whose mutators emit add/update/remove patches.
pub struct ObservedMap<K, V> {
    entries: RefCell<FxHashMap<K, V>>,
    observer: Rc<CollectionObserver>,
}

impl<K: Eq + Hash, V> ObservedMap<K, V> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            entries: RefCell::new(FxHashMap::default()),
            observer: CollectionObserver::new(),
        })
    }

    pub fn observer(&self) -> Rc<CollectionObserver> {
        self.observer.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn with_entries<R>(&self, f: impl FnOnce(&FxHashMap<K, V>) -> R) -> R {
        f(&self.entries.borrow())
    }

    /// Insert or overwrite. A fresh key emits `Add`, an existing key emits
    /// `Update`.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let old = self.entries.borrow_mut().insert(key, value);
        let change = match old {
            Some(_) => CollectionChange::Update { count: 1 },
            None => CollectionChange::Add { count: 1 },
        };
        self.observer.notify(change);
        old
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.observer.notify(CollectionChange::Remove { count: 1 });
        }
        removed
    }

    pub fn clear(&self) {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let removed = entries.len();
            entries.clear();
            removed
        };
        if removed > 0 {
            self.observer.notify(CollectionChange::Clear { removed });
        }
    }
}

impl<K: Eq + Hash, V: Clone> ObservedMap<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }
}

// =============================================================================
// TESTS
// =============================================================================
