//! Explicit subscription registry for views that follow what is on the map.

use serde::{Deserialize, Serialize};

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A list of callbacks notified with `&T` on every publish.
pub struct Observers<T> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Box<dyn FnMut(&T)>)>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Notify every subscriber in subscription order.
    pub fn publish(&mut self, value: &T) {
        for (_, callback) in &mut self.subscribers {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Category of entity reported in a [`VisibleEntities`] update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Territory,
    Area,
    Connection,
    Marker,
}

/// The ids currently shown on the map for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleEntities {
    pub kind: EntityKind,
    pub ids: Vec<String>,
}

impl VisibleEntities {
    pub fn new(kind: EntityKind, ids: Vec<String>) -> Self {
        Self { kind, ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_reaches_subscribers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut observers = Observers::new();
        let sink = Rc::clone(&seen);
        observers.subscribe(move |update: &VisibleEntities| sink.borrow_mut().push(update.ids.clone()));

        observers.publish(&VisibleEntities::new(EntityKind::Marker, vec!["a".into()]));
        assert_eq!(*seen.borrow(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut observers: Observers<u32> = Observers::new();
        let counter = Rc::clone(&count);
        let id = observers.subscribe(move |_| *counter.borrow_mut() += 1);

        observers.publish(&1);
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.publish(&2);
        assert_eq!(*count.borrow(), 1);
        assert!(observers.is_empty());
    }
}
