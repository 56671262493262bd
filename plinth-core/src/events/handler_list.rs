//! Per-event-type listener list with a baked dispatch order

use std::collections::BTreeMap;
use std::sync::Arc;

use plinth_plugin_api::{EventKey, EventPriority, Listener, Plugin, RegisteredListener, same_listener};

/// Listeners of one event type, bucketed by priority.
///
/// Within a bucket listeners keep registration order. The flattened order
/// is baked into a shared slice after each change so dispatch can iterate a
/// snapshot while the list keeps changing underneath it.
#[derive(Debug)]
pub struct HandlerList {
    owner: EventKey,
    slots: BTreeMap<EventPriority, Vec<Arc<RegisteredListener>>>,
    baked: Option<Arc<[Arc<RegisteredListener>]>>,
}

impl HandlerList {
    pub fn new(owner: EventKey) -> Self {
        Self {
            owner,
            slots: BTreeMap::new(),
            baked: None,
        }
    }

    /// Event type that declared this list
    pub fn owner(&self) -> EventKey {
        self.owner
    }

    pub fn register(&mut self, listener: RegisteredListener) {
        self.slots
            .entry(listener.priority())
            .or_default()
            .push(Arc::new(listener));
        self.baked = None;
    }

    pub fn register_all(&mut self, listeners: impl IntoIterator<Item = RegisteredListener>) {
        for listener in listeners {
            self.register(listener);
        }
    }

    /// Remove one registration. Returns whether it was present.
    pub fn unregister(&mut self, listener: &Arc<RegisteredListener>) -> bool {
        self.remove_where(|l| Arc::ptr_eq(l, listener))
    }

    /// Remove every registration owned by `plugin`
    pub fn unregister_plugin(&mut self, plugin: &Arc<Plugin>) -> bool {
        self.remove_where(|l| Arc::ptr_eq(l.plugin(), plugin))
    }

    /// Remove every registration made by `listener`
    pub fn unregister_listener(&mut self, listener: &Arc<dyn Listener>) -> bool {
        self.remove_where(|l| same_listener(l.listener(), listener))
    }

    fn remove_where(&mut self, matches: impl Fn(&Arc<RegisteredListener>) -> bool) -> bool {
        let mut changed = false;
        for bucket in self.slots.values_mut() {
            let before = bucket.len();
            bucket.retain(|l| !matches(l));
            changed |= bucket.len() != before;
        }
        self.slots.retain(|_, bucket| !bucket.is_empty());
        if changed {
            self.baked = None;
        }
        changed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.baked = None;
    }

    /// Flatten the buckets into dispatch order, if not already done
    pub fn bake(&mut self) -> Arc<[Arc<RegisteredListener>]> {
        if let Some(baked) = &self.baked {
            return Arc::clone(baked);
        }
        let baked: Arc<[Arc<RegisteredListener>]> = self.slots.values().flatten().cloned().collect();
        self.baked = Some(Arc::clone(&baked));
        baked
    }

    /// Baked dispatch order, `None` when a change has not been baked yet
    pub fn baked(&self) -> Option<Arc<[Arc<RegisteredListener>]>> {
        self.baked.clone()
    }

    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
