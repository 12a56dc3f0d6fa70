//! Single-threaded observable value.
//!
//! Holds a value and a list of subscriber callbacks. Every replacement of
//! the value invokes all subscribers synchronously, in subscription order,
//! with the new value.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;
type Subscribers<T> = RefCell<Vec<(u64, Callback<T>)>>;

/// A value holder that notifies subscribers on change.
pub struct ObservableState<T> {
    value: RefCell<T>,
    subscribers: Rc<Subscribers<T>>,
    next_id: Cell<u64>,
}

impl<T: Clone + 'static> ObservableState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RefCell::new(initial),
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutate the value in place, then notify every subscriber.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
        self.notify();
    }

    /// Register `callback`; the returned [`Subscription`] removes it again.
    ///
    /// The callback is not invoked with the current value on subscription.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription<T> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            id,
            subscribers: Rc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    fn notify(&self) {
        // Snapshot both the value and the callback list so subscribers may
        // read, set, subscribe or unsubscribe re-entrantly.
        let value = self.value.borrow().clone();
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(&value);
        }
    }
}

/// Capability to remove one subscriber from an [`ObservableState`].
pub struct Subscription<T> {
    id: u64,
    subscribers: Weak<Subscribers<T>>,
}

impl<T> Subscription<T> {
    /// Remove the callback. A no-op if the state has already been dropped.
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_subscribers_in_order() {
        let state = ObservableState::new(0u32);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&seen);
        let _s1 = state.subscribe(move |v| a.borrow_mut().push(("a", *v)));
        let b = Rc::clone(&seen);
        let _s2 = state.subscribe(move |v| b.borrow_mut().push(("b", *v)));

        state.set(7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
        assert_eq!(state.get(), 7);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let state = ObservableState::new(String::new());
        let count = Rc::new(Cell::new(0));

        let c = Rc::clone(&count);
        let sub = state.subscribe(move |_| c.set(c.get() + 1));
        state.set("one".to_string());
        sub.unsubscribe();
        state.set("two".to_string());

        assert_eq!(count.get(), 1);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_update_in_place() {
        let state = ObservableState::new(vec![1, 2]);
        let last = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&last);
        let _sub = state.subscribe(move |v: &Vec<i32>| *l.borrow_mut() = v.clone());

        state.update(|v| v.push(3));
        assert_eq!(*last.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reentrant_unsubscribe_during_notify() {
        let state = Rc::new(ObservableState::new(0));
        let slot: Rc<RefCell<Option<Subscription<i32>>>> = Rc::new(RefCell::new(None));

        let slot_inner = Rc::clone(&slot);
        let sub = state.subscribe(move |_| {
            if let Some(s) = slot_inner.borrow_mut().take() {
                s.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);

        state.set(1);
        assert_eq!(state.subscriber_count(), 0);
        state.set(2);
    }

    #[test]
    fn test_unsubscribe_after_drop_is_noop() {
        let state = ObservableState::new(1);
        let sub = state.subscribe(|_| {});
        drop(state);
        sub.unsubscribe();
    }
}
