//! PluginManager - discovery, load order, lifecycle and event routing

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;

use plinth_plugin_api::{
    CommandSink, CommandSpec, Event, EventExecutor, EventKey, EventPriority, Listener, Messenger,
    NoopSink, Permissible, Permission, PermissionDefault, Plugin, PluginDescriptor, PluginError,
    PluginLoader, RegisteredListener, Scheduler, ServiceRegistry,
};

use super::config::PluginHostConfig;
use super::error::PluginManagerError;
use super::registry::PluginRegistry;
use crate::commands::CommandRegistry;
use crate::error::PermissionError;
use crate::events::{EventBus, ListenerTiming};
use crate::graph::{DependencyGraph, LoadOrder, ResolveError, sort};
use crate::isolation::{Failure, isolate};
use crate::loaders::LoaderRegistry;
use crate::permissions::{PermissionRegistry, SubscriptionIndex};

/// Host services the manager drives on behalf of plugins
#[derive(Clone)]
pub struct HostSinks {
    pub scheduler: Arc<dyn Scheduler>,
    pub services: Arc<dyn ServiceRegistry>,
    pub messenger: Arc<dyn Messenger>,
    pub commands: Arc<dyn CommandSink>,
}

impl Default for HostSinks {
    fn default() -> Self {
        Self {
            scheduler: Arc::new(NoopSink),
            services: Arc::new(NoopSink),
            messenger: Arc::new(NoopSink),
            commands: Arc::new(CommandRegistry::new()),
        }
    }
}

/// The plugin manager loads plugins, drives their lifecycle and dispatches
/// events to them
///
/// Every table (loaders, plugins, listeners, permissions) has its own lock,
/// held only while that table is touched. Whole operations are additionally
/// serialized by a re-entrant guard, so extension code called from inside an
/// operation may call back into the manager on the same thread.
pub struct PluginManager {
    config: PluginHostConfig,
    guard: ReentrantMutex<()>,
    loaders: LoaderRegistry,
    plugins: PluginRegistry,
    events: EventBus,
    permissions: PermissionRegistry,
    subscriptions: Arc<SubscriptionIndex>,
    sinks: HostSinks,
    use_timings: AtomicBool,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginHostConfig::default())
    }
}

impl PluginManager {
    /// Create a manager with no-op host sinks and a fresh command registry
    pub fn new(config: PluginHostConfig) -> Self {
        Self::with_sinks(config, HostSinks::default())
    }

    pub fn with_sinks(config: PluginHostConfig, sinks: HostSinks) -> Self {
        let subscriptions = Arc::new(SubscriptionIndex::new());
        Self {
            use_timings: AtomicBool::new(config.use_timings),
            config,
            guard: ReentrantMutex::new(()),
            loaders: LoaderRegistry::new(),
            plugins: PluginRegistry::new(),
            events: EventBus::new(),
            permissions: PermissionRegistry::new(Arc::clone(&subscriptions)),
            subscriptions,
            sinks,
        }
    }

    pub fn config(&self) -> &PluginHostConfig {
        &self.config
    }

    /// Register a loader for every file-name pattern it declares.
    ///
    /// When patterns of several loaders match one file, the loader registered
    /// last handles it.
    pub fn register_interface(&self, loader: Arc<dyn PluginLoader>) {
        self.loaders.register(loader);
    }

    /// Resolve the load order of the plugin files directly inside
    /// `directory` without loading anything.
    ///
    /// Files are considered in file-name order. Files no loader claims are
    /// ignored; files whose descriptor cannot be read are reported as
    /// excluded.
    pub fn plan_load(&self, directory: &Path) -> Result<LoadOrder, PluginManagerError> {
        if !directory.is_dir() {
            return Err(PluginManagerError::NotADirectory {
                path: directory.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut unreadable = Vec::new();
        let mut described: Vec<(PathBuf, PluginDescriptor)> = Vec::new();
        for file in files {
            let Some(loader) = self.loaders.find(&file) else {
                continue;
            };
            match isolate(|| loader.describe(&file)) {
                Ok(descriptor) => described.push((file, descriptor)),
                Err(failure) => unreadable.push(ResolveError::InvalidDescription {
                    file,
                    reason: failure.to_string(),
                }),
            }
        }

        let graph = DependencyGraph::build(described);
        for (plugin, dependency) in graph.absent_soft_dependencies() {
            tracing::info!(plugin = %plugin, dependency = %dependency, "Loading without soft dependency");
        }

        let mut order = sort(graph);
        unreadable.append(&mut order.excluded);
        order.excluded = unreadable;
        Ok(order)
    }

    /// Load every plugin in `directory`, dependencies first.
    ///
    /// Plugins that cannot be ordered or loaded are logged and skipped; the
    /// rest of the batch still loads. Returns the plugins loaded by this call.
    pub fn load_all(&self, directory: &Path) -> Result<Vec<Arc<Plugin>>, PluginManagerError> {
        let _guard = self.guard.lock();
        let plan = self.plan_load(directory)?;

        for excluded in &plan.excluded {
            tracing::error!(dir = %directory.display(), error = %excluded, "Skipping plugin");
        }

        let update_dir = self.config.update_dir(directory);
        let mut loaded = Vec::with_capacity(plan.order.len());
        for resolved in &plan.order {
            match self.load_file(&resolved.file, update_dir.as_deref()) {
                Ok(Some(plugin)) => {
                    tracing::info!(plugin = %plugin, "Loaded plugin");
                    loaded.push(plugin);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        file = %resolved.file.display(),
                        dir = %directory.display(),
                        error = %e,
                        "Could not load plugin"
                    );
                }
            }
        }

        Ok(loaded)
    }

    /// Load a single plugin file.
    ///
    /// Returns `Ok(None)` when no registered loader claims the file. The
    /// update folder is looked up next to the file.
    pub fn load_plugin(&self, file: &Path) -> Result<Option<Arc<Plugin>>, PluginManagerError> {
        if file.as_os_str().is_empty() {
            return Err(PluginManagerError::InvalidArgument(
                "File cannot be empty".to_string(),
            ));
        }
        let _guard = self.guard.lock();
        let update_dir = file
            .parent()
            .and_then(|parent| self.config.update_dir(parent));
        self.load_file(file, update_dir.as_deref())
    }

    fn load_file(
        &self,
        file: &Path,
        update_dir: Option<&Path>,
    ) -> Result<Option<Arc<Plugin>>, PluginManagerError> {
        if let Some(update_dir) = update_dir {
            apply_update(file, update_dir);
        }

        let Some(loader) = self.loaders.find(file) else {
            tracing::debug!(file = %file.display(), "No loader for file");
            return Ok(None);
        };

        let plugin = isolate(|| Arc::clone(&loader).load(file)).map_err(|failure| {
            PluginManagerError::Load {
                path: file.to_path_buf(),
                source: match failure {
                    Failure::Error(e) => e,
                    panic => PluginError::custom(panic.to_string()),
                },
            }
        })?;

        self.plugins.insert(plugin).map(Some)
    }

    /// Plugin registered under `name` (case-sensitive)
    pub fn get_plugin(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.get(name)
    }

    /// All loaded plugins in load order
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.plugins.all()
    }

    /// Whether a plugin named `name` is loaded and enabled
    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).is_some_and(|p| p.is_enabled())
    }

    /// Whether `plugin` is held by this manager and enabled
    pub fn is_enabled(&self, plugin: &Arc<Plugin>) -> bool {
        self.plugins.contains(plugin) && plugin.is_enabled()
    }

    /// Enable `plugin`. Does nothing if it is already enabled.
    ///
    /// Declared commands and permissions are registered first, then the
    /// owning loader enables the plugin. A failing loader is logged; the
    /// enabled flag keeps whatever value the loader left it at.
    pub fn enable_plugin(&self, plugin: &Arc<Plugin>) {
        let _guard = self.guard.lock();
        if plugin.is_enabled() {
            return;
        }

        let descriptor = plugin.descriptor();
        if !descriptor.commands.is_empty() {
            if let Err(failure) =
                isolate(|| self.sinks.commands.register_all(plugin.name(), &descriptor.commands))
            {
                tracing::error!(plugin = %plugin, error = %failure, "Could not register plugin commands");
            }
        }

        for permission in &descriptor.permissions {
            if self.permissions.get_permission(permission.name()).as_ref() == Some(permission) {
                tracing::debug!(
                    plugin = %plugin,
                    permission = %permission.name(),
                    "Permission already registered from an earlier enable"
                );
                continue;
            }
            if let Err(e) = self.permissions.add_permission(permission.clone()) {
                tracing::warn!(
                    plugin = %plugin,
                    permission = %permission.name(),
                    error = %e,
                    "Plugin tried to register a permission that is already registered"
                );
            }
        }

        if let Err(failure) = isolate(|| plugin.loader().enable(plugin)) {
            tracing::error!(
                plugin = %plugin,
                error = %failure,
                "Error occurred (in the plugin loader) while enabling plugin (Is it up to date?)"
            );
        }

        self.events.bake_all();
    }

    /// Disable `plugin`. Does nothing if it is already disabled.
    ///
    /// Runs every teardown step even when an earlier one fails.
    pub fn disable_plugin(&self, plugin: &Arc<Plugin>) {
        let _guard = self.guard.lock();
        if !plugin.is_enabled() {
            return;
        }

        if let Err(failure) = isolate(|| plugin.loader().disable(plugin)) {
            teardown_failed(plugin, "disabling", &failure);
        }
        if let Err(failure) = isolate(|| self.sinks.scheduler.cancel_tasks(plugin)) {
            teardown_failed(plugin, "cancelling tasks for", &failure);
        }
        if let Err(failure) = isolate(|| self.sinks.services.unregister_all(plugin)) {
            teardown_failed(plugin, "unregistering services for", &failure);
        }
        if let Err(failure) = isolate(|| {
            self.events.unregister_plugin(plugin);
            Ok::<(), PluginError>(())
        }) {
            teardown_failed(plugin, "unregistering events for", &failure);
        }
        if let Err(failure) = isolate(|| self.sinks.messenger.unregister_incoming_channels(plugin)) {
            teardown_failed(plugin, "unregistering incoming channels for", &failure);
        }
        if let Err(failure) = isolate(|| self.sinks.messenger.unregister_outgoing_channels(plugin)) {
            teardown_failed(plugin, "unregistering outgoing channels for", &failure);
        }
    }

    /// Disable every plugin in load order
    pub fn disable_plugins(&self) {
        let _guard = self.guard.lock();
        for plugin in self.plugins.all() {
            self.disable_plugin(&plugin);
        }
    }

    /// Disable everything, then forget all plugins, listeners, loaders and
    /// permissions. Declared event types and subscriptions survive.
    pub fn clear_plugins(&self) {
        let _guard = self.guard.lock();
        self.disable_plugins();
        self.plugins.clear();
        self.events.unregister_all();
        self.loaders.clear();
        self.permissions.clear();
    }

    /// Give the event type `E` its own handler list
    pub fn declare_event<E: Event>(&self) {
        self.events.declare::<E>();
    }

    /// Dispatch `C` events through the handler list of `P`; listeners of `P`
    /// receive them borrowed as `P`
    pub fn declare_child_event<C, P>(&self) -> Result<(), PluginManagerError>
    where
        C: Event + AsMut<P>,
        P: Event,
    {
        Ok(self.events.declare_child::<C, P>()?)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Dispatch a typed event
    pub fn call_event<E: Event>(&self, event: &mut E) -> Result<(), PluginManagerError> {
        self.dispatch(event)
    }

    /// Dispatch an event to the listeners of its type
    pub fn dispatch(&self, event: &mut dyn Event) -> Result<(), PluginManagerError> {
        let _guard = self.guard.lock();
        self.events.dispatch(event)?;
        Ok(())
    }

    /// Register every handler `listener` declares, on behalf of `plugin`
    pub fn register_events(
        &self,
        listener: Arc<dyn Listener>,
        plugin: &Arc<Plugin>,
    ) -> Result<(), PluginManagerError> {
        if !plugin.is_enabled() {
            return Err(PluginManagerError::illegal_access(plugin.name(), "register listener"));
        }

        let grouped = plugin
            .loader()
            .create_registered_listeners(listener, plugin, self.use_timings());
        self.events.register_all(grouped)?;
        Ok(())
    }

    /// Register one executor for events of type `E`
    pub fn register_event<E: Event>(
        &self,
        listener: Arc<dyn Listener>,
        priority: EventPriority,
        executor: EventExecutor,
        plugin: &Arc<Plugin>,
        ignore_cancelled: bool,
    ) -> Result<(), PluginManagerError> {
        if !plugin.is_enabled() {
            return Err(PluginManagerError::illegal_access(
                plugin.name(),
                &format!("register {}", EventKey::of::<E>()),
            ));
        }

        let mut registered = RegisteredListener::new(
            listener,
            executor,
            priority,
            Arc::clone(plugin),
            ignore_cancelled,
        );
        if self.use_timings() {
            registered = registered.timed();
        }
        self.events.register(EventKey::of::<E>(), registered)?;
        Ok(())
    }

    /// Register commands under the name of `plugin`
    pub fn register_command(
        &self,
        plugin: &Arc<Plugin>,
        commands: &[CommandSpec],
    ) -> Result<(), PluginManagerError> {
        if !plugin.is_enabled() {
            return Err(PluginManagerError::illegal_access(plugin.name(), "register command"));
        }
        self.sinks.commands.register_all(plugin.name(), commands)?;
        Ok(())
    }

    /// Record timings for listeners registered from now on
    pub fn set_use_timings(&self, use_timings: bool) {
        self.use_timings.store(use_timings, Ordering::Relaxed);
    }

    pub fn use_timings(&self) -> bool {
        self.use_timings.load(Ordering::Relaxed)
    }

    /// Per-plugin, per-event totals of timed listeners
    pub fn timings(&self) -> Vec<ListenerTiming> {
        self.events.timings()
    }

    pub fn add_permission(&self, permission: Permission) -> Result<(), PermissionError> {
        let _guard = self.guard.lock();
        self.permissions.add_permission(permission)
    }

    pub fn remove_permission(&self, name: &str) -> Option<Permission> {
        let _guard = self.guard.lock();
        self.permissions.remove_permission(name)
    }

    pub fn get_permission(&self, name: &str) -> Option<Permission> {
        self.permissions.get_permission(name)
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.permissions.permissions()
    }

    pub fn default_permissions(&self, op: bool) -> Vec<Permission> {
        self.permissions.default_permissions(op)
    }

    pub fn recalculate_permission_defaults(&self, name: &str) {
        let _guard = self.guard.lock();
        self.permissions.recalculate_permission_defaults(name);
    }

    pub fn set_permission_default(
        &self,
        name: &str,
        default: PermissionDefault,
    ) -> Result<(), PermissionError> {
        let _guard = self.guard.lock();
        self.permissions.set_permission_default(name, default)
    }

    pub fn subscribe_to_permission(&self, name: &str, permissible: &Arc<dyn Permissible>) {
        self.subscriptions.subscribe_to_permission(name, permissible);
    }

    pub fn unsubscribe_from_permission(&self, name: &str, permissible: &Arc<dyn Permissible>) {
        self.subscriptions
            .unsubscribe_from_permission(name, permissible);
    }

    pub fn permission_subscriptions(&self, name: &str) -> Vec<Arc<dyn Permissible>> {
        self.subscriptions.permission_subscriptions(name)
    }

    pub fn subscribe_to_default_perms(&self, op: bool, permissible: &Arc<dyn Permissible>) {
        self.subscriptions.subscribe_to_default_perms(op, permissible);
    }

    pub fn unsubscribe_from_default_perms(&self, op: bool, permissible: &Arc<dyn Permissible>) {
        self.subscriptions
            .unsubscribe_from_default_perms(op, permissible);
    }

    pub fn default_perm_subscriptions(&self, op: bool) -> Vec<Arc<dyn Permissible>> {
        self.subscriptions.default_perm_subscriptions(op)
    }
}

fn teardown_failed(plugin: &Plugin, step: &str, failure: &dyn std::fmt::Display) {
    tracing::error!(
        plugin = %plugin,
        error = %failure,
        "Error occurred (in the plugin loader) while {step} plugin (Is it up to date?)"
    );
}

/// Replace `file` with its copy in `update_dir`, if there is one
fn apply_update(file: &Path, update_dir: &Path) {
    if !update_dir.is_dir() {
        return;
    }
    let Some(name) = file.file_name() else {
        return;
    };
    let update = update_dir.join(name);
    if !update.is_file() {
        return;
    }

    match std::fs::copy(&update, file) {
        Ok(_) => {
            tracing::info!(file = %file.display(), "Applied plugin update");
            if let Err(e) = std::fs::remove_file(&update) {
                tracing::warn!(file = %update.display(), error = %e, "Could not remove applied update");
            }
        }
        Err(e) => {
            tracing::error!(
                file = %file.display(),
                update = %update.display(),
                error = %e,
                "Could not apply plugin update"
            );
        }
    }
}
