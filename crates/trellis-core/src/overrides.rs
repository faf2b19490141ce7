//! Plugin override provider
//!
//! Every lookup has two access paths: the standard one consults the
//! override provider before the core catalog, and the core-truth one
//! bypasses overrides entirely so higher layers can always reach the
//! original definition even when a plugin has replaced it.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Supplier of plugin-provided replacements for catalog entries
pub trait OverrideProvider: Send + Sync {
    /// Look up a replacement for one entry
    ///
    /// Returning `None` falls back to the core producer.
    fn lookup(&self, category: &str, name: &str) -> Option<Value>;

    /// All overrides for one category, for whole-category merges
    ///
    /// Providers that cannot enumerate may keep the default; additions to
    /// a category are then only reachable through `lookup`.
    fn entries(&self, category: &str) -> IndexMap<String, Value> {
        let _ = category;
        IndexMap::new()
    }

    /// A whole-unit replacement for a unit category
    fn unit(&self, category: &str) -> Option<Value> {
        let _ = category;
        None
    }
}

/// A materialized override table
///
/// Plugins register concrete replacement values up front; lookups are plain
/// map reads.
#[derive(Debug, Clone, Default)]
pub struct StaticOverrides {
    entries: HashMap<String, IndexMap<String, Value>>,
    units: HashMap<String, Value>,
}

impl StaticOverrides {
    /// Create an empty override table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for one entry
    ///
    /// Fails with `AlreadyRegistered` if the entry is already overridden.
    pub fn register(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.register_with_force(category, name, value, false)
    }

    /// Register an override, optionally replacing an existing one
    pub fn register_with_force(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        force: bool,
    ) -> Result<()> {
        let category = category.into();
        let name = name.into();
        let table = self.entries.entry(category.clone()).or_default();
        if !force && table.contains_key(&name) {
            return Err(Error::already_registered(&name).with_category(category));
        }
        table.insert(name, value.into());
        Ok(())
    }

    /// Register a whole-unit replacement for a unit category
    pub fn register_unit(
        &mut self,
        category: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let category = category.into();
        if self.units.contains_key(&category) {
            return Err(Error::already_registered(&category));
        }
        self.units.insert(category, value.into());
        Ok(())
    }
}

impl OverrideProvider for StaticOverrides {
    fn lookup(&self, category: &str, name: &str) -> Option<Value> {
        self.entries
            .get(category)
            .and_then(|table| table.get(name))
            .cloned()
    }

    fn entries(&self, category: &str) -> IndexMap<String, Value> {
        self.entries.get(category).cloned().unwrap_or_default()
    }

    fn unit(&self, category: &str) -> Option<Value> {
        self.units.get(category).cloned()
    }
}
