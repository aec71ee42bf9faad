// ============================================================================
// weft - Observed Array
// ============================================================================

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::collections::CollectionObserver;
use crate::observation::subscriber::CollectionChange;

/// An ordered sequence whose mutators emit one splice/reorder patch per
/// call. Reads go through [`with_items`](Self::with_items) or, for `Clone`
/// items, [`get`](Self::get) and [`to_vec`](Self::to_vec).
pub struct ObservedArray<T> {
    items: RefCell<Vec<T>>,
    observer: Rc<CollectionObserver>,
}

impl<T> ObservedArray<T> {
    pub fn new() -> Rc<Self> {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
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

    /// Read access without cloning.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.borrow())
    }

    pub fn push(&self, item: T) {
        let start = {
            let mut items = self.items.borrow_mut();
            items.push(item);
            items.len() - 1
        };
        self.observer.notify(CollectionChange::Splice {
            start,
            removed: 0,
            added: 1,
        });
    }

    pub fn pop(&self) -> Option<T> {
        let popped = self.items.borrow_mut().pop();
        if popped.is_some() {
            self.observer.notify(CollectionChange::Splice {
                start: self.items.borrow().len(),
                removed: 1,
                added: 0,
            });
        }
        popped
    }

    pub fn insert(&self, index: usize, item: T) {
        self.items.borrow_mut().insert(index, item);
        self.observer.notify(CollectionChange::Splice {
            start: index,
            removed: 0,
            added: 1,
        });
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.observer.notify(CollectionChange::Splice {
            start: index,
            removed: 1,
            added: 0,
        });
        Some(removed)
    }

    /// Replace `delete_count` items starting at `start` with `added`,
    /// returning the removed items. One patch regardless of how many items
    /// move.
    pub fn splice(&self, start: usize, delete_count: usize, added: Vec<T>) -> Vec<T> {
        let added_count = added.len();
        let start = start.min(self.items.borrow().len());
        let removed: Vec<T> = {
            let mut items = self.items.borrow_mut();
            let end = (start + delete_count).min(items.len());
            items.splice(start..end, added).collect()
        };
        self.observer.notify(CollectionChange::Splice {
            start,
            removed: removed.len(),
            added: added_count,
        });
        removed
    }

    pub fn set(&self, index: usize, item: T) -> Option<T> {
        let old = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            Some(std::mem::replace(&mut items[index], item))
        };
        self.observer.notify(CollectionChange::Splice {
            start: index,
            removed: 1,
            added: 1,
        });
        old
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

    pub fn reverse(&self) {
        self.items.borrow_mut().reverse();
        self.observer.notify(CollectionChange::Reorder);
    }

    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.items.borrow_mut().sort_by(compare);
        self.observer.notify(CollectionChange::Reorder);
    }
}

impl<T: Clone> ObservedArray<T> {
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}

impl<T: Ord> ObservedArray<T> {
    pub fn sort(&self) {
        self.items.borrow_mut().sort();
        self.observer.notify(CollectionChange::Reorder);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::tests::PatchRecorder;

    #[test]
    fn push_and_pop_emit_splice_patches() {
        let array = ObservedArray::new();
        let recorder = PatchRecorder::new();
        array.observer().subscribe(recorder.clone());

        array.push(1);
        array.push(2);
        assert_eq!(array.pop(), Some(2));

        let batches = recorder.batches.borrow();
        assert_eq!(
            batches[0][0],
            CollectionChange::Splice { start: 0, removed: 0, added: 1 }
        );
        assert_eq!(
            batches[1][0],
            CollectionChange::Splice { start: 1, removed: 0, added: 1 }
        );
        assert_eq!(
            batches[2][0],
            CollectionChange::Splice { start: 1, removed: 1, added: 0 }
        );
    }

    #[test]
    fn splice_emits_exactly_one_patch() {
        let array = ObservedArray::from_vec(vec![1, 2, 3, 4, 5]);
        let recorder = PatchRecorder::new();
        array.observer().subscribe(recorder.clone());

        let removed = array.splice(1, 2, vec![10, 20, 30]);
        assert_eq!(removed, vec![2, 3]);
        assert_eq!(array.to_vec(), vec![1, 10, 20, 30, 4, 5]);

        assert_eq!(recorder.call_count(), 1);
        assert_eq!(
            recorder.batches.borrow()[0][0],
            CollectionChange::Splice { start: 1, removed: 2, added: 3 }
        );
    }

    #[test]
    fn bulk_mutations_never_notify_per_element() {
        let array = ObservedArray::from_vec((0..100).collect());
        let recorder = PatchRecorder::new();
        array.observer().subscribe(recorder.clone());

        array.clear();
        assert_eq!(recorder.call_count(), 1);
        assert_eq!(
            recorder.batches.borrow()[0][0],
            CollectionChange::Clear { removed: 100 }
        );
    }

    #[test]
    fn reorder_operations_emit_reorder() {
        let array = ObservedArray::from_vec(vec![3, 1, 2]);
        let recorder = PatchRecorder::new();
        array.observer().subscribe(recorder.clone());

        array.sort();
        assert_eq!(array.to_vec(), vec![1, 2, 3]);
        array.reverse();
        assert_eq!(array.to_vec(), vec![3, 2, 1]);

        assert_eq!(recorder.call_count(), 2);
        assert_eq!(recorder.batches.borrow()[0][0], CollectionChange::Reorder);
        assert_eq!(recorder.batches.borrow()[1][0], CollectionChange::Reorder);
    }

    #[test]
    fn out_of_range_accesses_do_not_notify() {
        let array: Rc<ObservedArray<i32>> = ObservedArray::new();
        let recorder = PatchRecorder::new();
        array.observer().subscribe(recorder.clone());

        assert_eq!(array.pop(), None);
        assert_eq!(array.remove(3), None);
        assert_eq!(array.set(0, 1), None);
        array.clear();
        assert_eq!(recorder.call_count(), 0);
    }
}
