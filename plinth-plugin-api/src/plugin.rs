//! Plugin - the host-side handle of a materialized plugin

use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::loader::PluginLoader;

/// Behaviour supplied by a plugin author.
///
/// Loaders call these hooks from their own `enable`/`disable`. Both hooks
/// default to no-ops so manifest-only plugins can use `()`.
pub trait PluginMain: Send {
    /// Called after the plugin has been flagged enabled
    fn on_enable(&mut self, _plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called before the plugin is flagged disabled
    fn on_disable(&mut self, _plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        Ok(())
    }
}

impl PluginMain for () {}

/// A loaded plugin.
///
/// Created by a [`PluginLoader`], owned by the host's plugin registry for the
/// rest of its life. The enabled flag belongs to the owning loader: the host
/// reads it but only loaders write it.
pub struct Plugin {
    descriptor: PluginDescriptor,
    file: PathBuf,
    loader: Arc<dyn PluginLoader>,
    enabled: AtomicBool,
    naggable: AtomicBool,
    main: Mutex<Box<dyn PluginMain>>,
}

impl Plugin {
    /// Create a disabled plugin owned by `loader`
    pub fn new(
        descriptor: PluginDescriptor,
        file: impl Into<PathBuf>,
        loader: Arc<dyn PluginLoader>,
        main: Box<dyn PluginMain>,
    ) -> Self {
        Self {
            descriptor,
            file: file.into(),
            loader,
            enabled: AtomicBool::new(false),
            naggable: AtomicBool::new(true),
            main: Mutex::new(main),
        }
    }

    /// Plugin name (from the descriptor)
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// File the plugin was loaded from
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Loader that materialized this plugin
    pub fn loader(&self) -> &Arc<dyn PluginLoader> {
        &self.loader
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the enabled flag (loader use)
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether legacy-usage warnings are still reported for this plugin
    pub fn is_naggable(&self) -> bool {
        self.naggable.load(Ordering::SeqCst)
    }

    pub fn set_naggable(&self, naggable: bool) {
        self.naggable.store(naggable, Ordering::SeqCst);
    }

    /// Clear the naggable flag, returning whether it was set
    pub fn take_naggable(&self) -> bool {
        self.naggable.swap(false, Ordering::SeqCst)
    }

    /// Run `f` with exclusive access to the plugin's behaviour
    pub fn with_main<R>(&self, f: impl FnOnce(&mut dyn PluginMain) -> R) -> R {
        let mut main = self.main.lock();
        f(main.as_mut())
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.descriptor.name)
            .field("version", &self.descriptor.version)
            .field("file", &self.file)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor.full_name())
    }
}
