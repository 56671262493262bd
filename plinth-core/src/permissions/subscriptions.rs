//! Subscription index - which permissibles watch which permission or tier

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use plinth_plugin_api::Permissible;

/// Subscribers grouped by key, held weakly.
///
/// Dead subscribers are pruned whenever their entry is touched, and an entry
/// left without subscribers is removed.
struct SubscriberMap<K> {
    entries: Mutex<HashMap<K, Vec<Weak<dyn Permissible>>>>,
}

impl<K> Default for SubscriberMap<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

fn same_subscriber(weak: &Weak<dyn Permissible>, strong: &Arc<dyn Permissible>) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(strong))
}

impl<K: Eq + Hash> SubscriberMap<K> {
    fn subscribe(&self, key: K, subscriber: &Arc<dyn Permissible>) {
        let mut entries = self.entries.lock();
        let subscribers = entries.entry(key).or_default();
        subscribers.retain(|weak| weak.strong_count() > 0);
        if !subscribers.iter().any(|weak| same_subscriber(weak, subscriber)) {
            subscribers.push(Arc::downgrade(subscriber));
        }
    }

    fn unsubscribe(&self, key: &K, subscriber: &Arc<dyn Permissible>) {
        let mut entries = self.entries.lock();
        if let Some(subscribers) = entries.get_mut(key) {
            subscribers.retain(|weak| weak.strong_count() > 0 && !same_subscriber(weak, subscriber));
            if subscribers.is_empty() {
                entries.remove(key);
            }
        }
    }

    fn subscribers(&self, key: &K) -> Vec<Arc<dyn Permissible>> {
        let mut entries = self.entries.lock();
        let Some(subscribers) = entries.get_mut(key) else {
            return Vec::new();
        };

        let live: Vec<Arc<dyn Permissible>> = subscribers.iter().filter_map(Weak::upgrade).collect();
        if live.len() != subscribers.len() {
            subscribers.retain(|weak| weak.strong_count() > 0);
        }
        if subscribers.is_empty() {
            entries.remove(key);
        }
        live
    }

    fn has_entry(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Permissibles subscribed to a permission name or to a default tier.
///
/// The index never keeps a subscriber alive: once the last strong reference
/// to a permissible is dropped it stops being returned.
#[derive(Default)]
pub struct SubscriptionIndex {
    by_permission: SubscriberMap<String>,
    by_default: SubscriberMap<bool>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch the permission `name` (case-insensitive)
    pub fn subscribe_to_permission(&self, name: &str, subscriber: &Arc<dyn Permissible>) {
        self.by_permission.subscribe(name.to_lowercase(), subscriber);
    }

    pub fn unsubscribe_from_permission(&self, name: &str, subscriber: &Arc<dyn Permissible>) {
        self.by_permission
            .unsubscribe(&name.to_lowercase(), subscriber);
    }

    /// Live subscribers of the permission `name`
    pub fn permission_subscriptions(&self, name: &str) -> Vec<Arc<dyn Permissible>> {
        self.by_permission.subscribers(&name.to_lowercase())
    }

    /// Watch the operator (`op = true`) or non-operator default set
    pub fn subscribe_to_default_perms(&self, op: bool, subscriber: &Arc<dyn Permissible>) {
        self.by_default.subscribe(op, subscriber);
    }

    pub fn unsubscribe_from_default_perms(&self, op: bool, subscriber: &Arc<dyn Permissible>) {
        self.by_default.unsubscribe(&op, subscriber);
    }

    /// Live subscribers of a default set
    pub fn default_perm_subscriptions(&self, op: bool) -> Vec<Arc<dyn Permissible>> {
        self.by_default.subscribers(&op)
    }

    /// Whether any entry, live or not yet pruned, exists for `name`
    pub fn has_permission_entry(&self, name: &str) -> bool {
        self.by_permission.has_entry(&name.to_lowercase())
    }

    pub fn has_default_entry(&self, op: bool) -> bool {
        self.by_default.has_entry(&op)
    }

    pub fn clear(&self) {
        self.by_permission.clear();
        self.by_default.clear();
    }
}
