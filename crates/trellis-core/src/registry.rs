//! Catalog of named producers
//!
//! A `Registry` declares, per category, how each named value is produced:
//! a constant, a definition file to include, or a derivation over the
//! sibling entries resolved so far. Declaration order is the dependency
//! order - a derivation may only reference names declared earlier in the
//! same category. The resolver validates this at runtime: referencing a
//! later or misspelled name fails the whole category with
//! `UnresolvedReference`.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::loader::Loader;
use crate::value::Value;

/// Derivation function: sees the sibling entries resolved so far
pub type DeriveFn =
    dyn Fn(&CategoryView<'_>, &ProducerContext<'_>) -> Result<Value> + Send + Sync;

/// Generator function for unit categories (e.g. route tables)
pub type GenerateFn = dyn Fn(&ProducerContext<'_>) -> Result<Value> + Send + Sync;

/// How one entry's value is produced
#[derive(Clone)]
pub enum Producer {
    /// A fixed value
    Constant(Value),
    /// A definition file, resolved through the `Loader`
    Include(PathBuf),
    /// A derivation over the already-resolved sibling entries
    Derive(Arc<DeriveFn>),
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Producer::Include(path) => f.debug_tuple("Include").field(path).finish(),
            Producer::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

/// One named configuration value and its producer
#[derive(Debug, Clone)]
pub struct Entry {
    /// Name, unique within the category
    pub name: String,
    /// How the value is produced
    pub producer: Producer,
}

impl Entry {
    /// Declare a constant entry
    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            producer: Producer::Constant(value.into()),
        }
    }

    /// Declare an entry loaded from a definition file
    pub fn include(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            producer: Producer::Include(path.into()),
        }
    }

    /// Declare a derived entry
    ///
    /// The derivation only sees siblings declared earlier in the category.
    pub fn derive<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CategoryView<'_>, &ProducerContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            producer: Producer::Derive(Arc::new(func)),
        }
    }
}

/// Producer for a whole-unit category
#[derive(Clone)]
pub enum UnitProducer {
    /// One definition file, its value cached verbatim
    Include(PathBuf),
    /// A generator function (sees the host, e.g. for route tables)
    Generate(Arc<GenerateFn>),
}

impl fmt::Debug for UnitProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitProducer::Include(path) => f.debug_tuple("Include").field(path).finish(),
            UnitProducer::Generate(_) => f.write_str("Generate(..)"),
        }
    }
}

/// How a category is resolved
#[derive(Debug, Clone)]
pub enum CategoryDef {
    /// Entries resolved one by one in declaration order; the whole mapping
    /// is cached atomically on success
    Ordered(Vec<Entry>),
    /// One external unit, cached verbatim
    Unit(UnitProducer),
}

/// Static catalog mapping category names to their definitions
#[derive(Debug, Clone, Default)]
pub struct Registry {
    categories: IndexMap<String, CategoryDef>,
    /// Per-category alias tables: alias -> canonical entry name
    aliases: HashMap<String, HashMap<String, String>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an ordered category
    ///
    /// Re-declaring a category replaces the previous definition.
    pub fn with_ordered(mut self, name: impl Into<String>, entries: Vec<Entry>) -> Self {
        self.categories
            .insert(name.into(), CategoryDef::Ordered(entries));
        self
    }

    /// Declare a unit category backed by a generator function
    pub fn with_unit<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ProducerContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.categories.insert(
            name.into(),
            CategoryDef::Unit(UnitProducer::Generate(Arc::new(func))),
        );
        self
    }

    /// Declare a unit category backed by a definition file
    pub fn with_unit_include(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.categories.insert(
            name.into(),
            CategoryDef::Unit(UnitProducer::Include(path.into())),
        );
        self
    }

    /// Declare alias names for one category's entries
    pub fn with_aliases(mut self, category: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        let table = self.aliases.entry(category.into()).or_default();
        for (alias, canonical) in pairs {
            table.insert((*alias).to_string(), (*canonical).to_string());
        }
        self
    }

    /// Get a category definition by name
    pub fn category(&self, name: &str) -> Option<&CategoryDef> {
        self.categories.get(name)
    }

    /// Check if a category is declared
    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Names of all declared categories, in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Resolve an alias to its canonical entry name
    ///
    /// Names without an alias pass through unchanged.
    pub fn canonical<'a>(&'a self, category: &str, name: &'a str) -> &'a str {
        self.aliases
            .get(category)
            .and_then(|table| table.get(name))
            .map(String::as_str)
            .unwrap_or(name)
    }
}

/// Read-only view of the entries resolved so far in one category pass
///
/// Handed to derivation functions. Asking for a name that is not resolved
/// yet is the primary operator error this design surfaces: it fails loudly
/// with `UnresolvedReference` instead of returning a default.
pub struct CategoryView<'a> {
    category: &'a str,
    resolved: &'a IndexMap<String, Value>,
}

impl<'a> CategoryView<'a> {
    pub(crate) fn new(category: &'a str, resolved: &'a IndexMap<String, Value>) -> Self {
        Self { category, resolved }
    }

    /// Get an already-resolved sibling entry
    pub fn get(&self, name: &str) -> Result<&'a Value> {
        self.resolved
            .get(name)
            .ok_or_else(|| Error::unresolved_reference(self.category, name))
    }

    /// Get an already-resolved sibling entry as a string
    pub fn str(&self, name: &str) -> Result<&'a str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| {
            Error::type_mismatch("string", value.type_name())
                .with_category(self.category)
                .with_entry(name)
        })
    }

    /// Check whether a sibling entry is already resolved
    pub fn contains(&self, name: &str) -> bool {
        self.resolved.contains_key(name)
    }
}

/// Context handed to producers for the duration of one invocation
pub struct ProducerContext<'a> {
    /// Category being resolved
    pub category: &'a str,
    /// Entry being produced (absent for unit producers)
    pub entry: Option<&'a str>,
    /// Read-only host state
    pub host: &'a dyn Host,
    /// Definition-file loader
    pub loader: &'a dyn Loader,
}
