//! Driver factory registry.
//!
//! Maps URL schemes to the factories that open connections for them.
//! Resolution tries the registered factories first. When none matches and
//! dynamic loading is enabled, it looks for a driver module named after the
//! scheme in the configured search paths, registers the factories the
//! module exports, and tries again.
//!
//! All state sits behind one `RwLock`. Lookups take the read lock; the
//! write lock covers registration and module loading, so two threads can
//! never load the same module twice.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::DriverConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::plugin;
use crate::url::ConnectionUrl;

/// Backend-specific constructor of connections for one or more schemes.
pub trait DriverFactory: Send + Sync {
    /// Driver name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Every scheme alias this factory claims, e.g. `["mysql", "maria", "mariadb", "my"]`.
    fn supported_schemes(&self) -> &[&str];

    /// Open a connection for `url`, whose scheme is one of `supported_schemes`.
    fn create_connection(&self, url: &ConnectionUrl) -> Result<Box<dyn Connection>>;
}

struct RegistryState {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
    search_paths: Vec<PathBuf>,
    dynamic_loading: bool,
    /// Schemes already looked up on disk since the last reconfiguration.
    attempted: HashSet<String>,
}

impl RegistryState {
    fn insert(&mut self, factory: Arc<dyn DriverFactory>) {
        tracing::debug!(
            driver = factory.name(),
            schemes = ?factory.supported_schemes(),
            "registering driver factory"
        );
        for scheme in factory.supported_schemes() {
            self.factories.insert(scheme.to_string(), Arc::clone(&factory));
        }
    }

    fn load_module(&mut self, scheme: &str) {
        let Some(path) = plugin::find_module(&self.search_paths, scheme) else {
            tracing::debug!(scheme, "no driver module found");
            return;
        };
        match plugin::load_module(&path) {
            Ok(factories) => {
                tracing::info!(
                    scheme,
                    path = %path.display(),
                    factories = factories.len(),
                    "loaded driver module"
                );
                for factory in factories {
                    self.insert(factory);
                }
            }
            Err(e) => {
                tracing::warn!(scheme, path = %path.display(), error = %e, "failed to load driver module");
            }
        }
    }
}

/// Process-wide (or, via [`Registry::new`], isolated) scheme → factory map.
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry with dynamic loading enabled and no search paths.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                factories: HashMap::new(),
                search_paths: Vec::new(),
                dynamic_loading: true,
                attempted: HashSet::new(),
            }),
        }
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `factory` under every scheme it claims. A later registration
    /// for the same scheme replaces the earlier one.
    pub fn register(&self, factory: Arc<dyn DriverFactory>) {
        self.write().insert(factory);
    }

    /// Apply search paths and the dynamic-loading switch. Forgets earlier
    /// failed lookups so they are retried against the new paths.
    pub fn configure(&self, config: &DriverConfig) {
        let mut state = self.write();
        state.search_paths = config.search_paths.clone();
        state.dynamic_loading = config.dynamic_loading;
        state.attempted.clear();
    }

    /// Every registered scheme, sorted.
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.read().factories.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.read().factories.contains_key(scheme)
    }

    /// Find the factory for `scheme`, loading a driver module if needed.
    ///
    /// A scheme is looked up on disk at most once until the registry is
    /// reconfigured or cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverNotFound`] if no factory claims the scheme.
    pub fn resolve(&self, scheme: &str) -> Result<Arc<dyn DriverFactory>> {
        if let Some(factory) = self.read().factories.get(scheme) {
            return Ok(Arc::clone(factory));
        }

        let mut state = self.write();
        if let Some(factory) = state.factories.get(scheme) {
            return Ok(Arc::clone(factory));
        }
        if state.dynamic_loading && state.attempted.insert(scheme.to_string()) {
            state.load_module(scheme);
            if let Some(factory) = state.factories.get(scheme) {
                return Ok(Arc::clone(factory));
            }
        }
        Err(Error::DriverNotFound {
            scheme: scheme.to_string(),
        })
    }

    /// Parse `url`, resolve its scheme and open a connection.
    pub fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        let parsed = ConnectionUrl::parse(url)?;
        let factory = self.resolve(parsed.scheme())?;
        tracing::debug!(scheme = parsed.scheme(), driver = factory.name(), "opening connection");
        factory.create_connection(&parsed)
    }

    /// Drop every registered factory and forget failed lookups.
    ///
    /// Loaded modules stay mapped: connections they produced may still be
    /// alive (see [`plugin::load_module`]).
    pub fn clear(&self) {
        let mut state = self.write();
        state.factories.clear();
        state.attempted.clear();
    }
}
