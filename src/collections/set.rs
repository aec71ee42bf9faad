// ============================================================================
// weft - Observed Set
// ============================================================================

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::collections::CollectionObserver;
use crate::observation::subscriber::CollectionChange;

/// A keyed set whose mutators emit add/remove patches. Inserting an item
/// already present is a no-op and does not notify.
pub struct ObservedSet<T> {
    items: RefCell<FxHashSet<T>>,
    observer: Rc<CollectionObserver>,
}

impl<T: Eq + Hash> ObservedSet<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(FxHashSet::default()),
            observer: CollectionObserver::new(),
        })
    }

    pub fn observer(&self) -> Rc<CollectionObserver> {
        self.observer.clone()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.borrow().contains(item)
    }

    pub fn insert(&self, item: T) -> bool {
        let inserted = self.items.borrow_mut().insert(item);
        if inserted {
            self.observer.notify(CollectionChange::Add { count: 1 });
        }
        inserted
    }

    pub fn remove(&self, item: &T) -> bool {
        let removed = self.items.borrow_mut().remove(item);
        if removed {
            self.observer.notify(CollectionChange::Remove { count: 1 });
        }
        removed
    }

    pub fn clear(&self) {
        let removed = {
            let mut items = self.items.borrow_mut();
            let removed = items.len();
            items.clear();
            removed
        };
        if removed > 0 {
            self.observer.notify(CollectionChange::Clear { removed });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
