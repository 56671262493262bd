//! Permission registry - definitions and default-tier membership

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use plinth_plugin_api::{Permissible, Permission, PermissionDefault};

use super::subscriptions::SubscriptionIndex;
use crate::error::PermissionError;

#[derive(Default)]
struct Table {
    /// Keyed by lowercase name
    permissions: BTreeMap<String, Permission>,
    /// Keys granted to operators by default, in the order they joined
    op_defaults: Vec<String>,
    /// Keys granted to non-operators by default, in the order they joined
    non_op_defaults: Vec<String>,
}

impl Table {
    fn defaults_mut(&mut self, op: bool) -> &mut Vec<String> {
        if op {
            &mut self.op_defaults
        } else {
            &mut self.non_op_defaults
        }
    }

    /// Add `key` to the sets its tier grants, returning the tiers it joined
    fn classify(&mut self, key: &str, default: PermissionDefault) -> Vec<bool> {
        let mut joined = Vec::with_capacity(2);
        for op in [true, false] {
            if default.grants(op) {
                let set = self.defaults_mut(op);
                if !set.iter().any(|k| k == key) {
                    set.push(key.to_string());
                }
                joined.push(op);
            }
        }
        joined
    }
}

/// Registered permissions and the default sets derived from their tiers.
///
/// Subscribers of a default set are asked to recalculate whenever a
/// permission joins that set. No lock is held while they run, so a
/// subscriber may query the registry from `recalculate_permissions`.
pub struct PermissionRegistry {
    table: RwLock<Table>,
    subscriptions: Arc<SubscriptionIndex>,
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SubscriptionIndex::new()))
    }
}

impl PermissionRegistry {
    pub fn new(subscriptions: Arc<SubscriptionIndex>) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            subscriptions,
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionIndex> {
        &self.subscriptions
    }

    /// Register a permission. Names are compared case-insensitively.
    pub fn add_permission(&self, permission: Permission) -> Result<(), PermissionError> {
        let key = permission.key();
        let joined = {
            let mut table = self.table.write();
            if table.permissions.contains_key(&key) {
                return Err(PermissionError::AlreadyDefined(key));
            }
            let default = permission.default();
            table.permissions.insert(key.clone(), permission);
            // A removed permission may have left its key behind
            table.op_defaults.retain(|k| *k != key);
            table.non_op_defaults.retain(|k| *k != key);
            table.classify(&key, default)
        };

        tracing::debug!(permission = %key, "Registered permission");
        self.notify(&joined);
        Ok(())
    }

    /// Remove a permission from the table.
    ///
    /// Default sets are left as they are and nobody is notified; call
    /// [`Self::recalculate_permission_defaults`] for a full cleanup.
    pub fn remove_permission(&self, name: &str) -> Option<Permission> {
        self.table.write().permissions.remove(&name.to_lowercase())
    }

    pub fn get_permission(&self, name: &str) -> Option<Permission> {
        self.table.read().permissions.get(&name.to_lowercase()).cloned()
    }

    /// All registered permissions, ordered by name
    pub fn permissions(&self) -> Vec<Permission> {
        self.table.read().permissions.values().cloned().collect()
    }

    /// Permissions granted by default to operators (`op = true`) or to
    /// everyone else
    pub fn default_permissions(&self, op: bool) -> Vec<Permission> {
        let table = self.table.read();
        let keys = if op {
            &table.op_defaults
        } else {
            &table.non_op_defaults
        };
        keys.iter()
            .filter_map(|key| table.permissions.get(key).cloned())
            .collect()
    }

    /// Recompute which default sets the permission `name` belongs to.
    ///
    /// Does nothing if the permission is not registered.
    pub fn recalculate_permission_defaults(&self, name: &str) {
        let key = name.to_lowercase();
        let joined = {
            let mut table = self.table.write();
            let Some(default) = table.permissions.get(&key).map(Permission::default) else {
                return;
            };
            table.op_defaults.retain(|k| *k != key);
            table.non_op_defaults.retain(|k| *k != key);
            table.classify(&key, default)
        };
        self.notify(&joined);
    }

    /// Change the default tier of a registered permission
    pub fn set_permission_default(
        &self,
        name: &str,
        default: PermissionDefault,
    ) -> Result<(), PermissionError> {
        {
            let mut table = self.table.write();
            let key = name.to_lowercase();
            let permission = table
                .permissions
                .remove(&key)
                .ok_or_else(|| PermissionError::NotFound(name.to_string()))?;
            table
                .permissions
                .insert(key, permission.with_default(default));
        }
        self.recalculate_permission_defaults(name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.read().permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().permissions.is_empty()
    }

    /// Drop every permission and both default sets. Subscriptions are kept.
    pub fn clear(&self) {
        *self.table.write() = Table::default();
    }

    fn notify(&self, tiers: &[bool]) {
        for &op in tiers {
            let subscribers: Vec<Arc<dyn Permissible>> =
                self.subscriptions.default_perm_subscriptions(op);
            for subscriber in subscribers {
                subscriber.recalculate_permissions();
            }
        }
    }
}
