//! String-keyed constructor registry
//!
//! Catalogs that used to store type names as strings (cache drivers, field
//! backends) register a constructor function under the key instead. The map
//! is populated once at startup; `create` is a plain lookup plus a call,
//! never reflection-by-name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::host::Host;

/// Constructor function for one registered implementation
pub type FactoryFn<T> = dyn Fn(&dyn Host) -> Result<T> + Send + Sync;

/// Registry mapping string keys to constructor functions
pub struct FactoryRegistry<T> {
    name: String,
    factories: HashMap<String, Arc<FactoryFn<T>>>,
}

impl<T> Clone for FactoryRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            factories: self.factories.clone(),
        }
    }
}

impl<T> FactoryRegistry<T> {
    /// Create an empty registry
    ///
    /// The name appears as the category in errors (e.g. "cache").
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: HashMap::new(),
        }
    }

    /// Register a constructor under a key
    ///
    /// Fails with `AlreadyRegistered` if the key is taken.
    pub fn register<F>(&mut self, key: impl Into<String>, func: F) -> Result<()>
    where
        F: Fn(&dyn Host) -> Result<T> + Send + Sync + 'static,
    {
        self.register_with_force(key, func, false)
    }

    /// Register a constructor, optionally replacing an existing one
    pub fn register_with_force<F>(
        &mut self,
        key: impl Into<String>,
        func: F,
        force: bool,
    ) -> Result<()>
    where
        F: Fn(&dyn Host) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        if !force && self.factories.contains_key(&key) {
            return Err(Error::already_registered(&key).with_category(&self.name));
        }
        self.factories.insert(key, Arc::new(func));
        Ok(())
    }

    /// Check if a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// All registered keys
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Construct the implementation registered under a key
    pub fn create(&self, key: &str, host: &dyn Host) -> Result<T> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| Error::undefined_entry(&self.name, key))?;
        factory(host)
    }
}
