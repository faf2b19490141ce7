//! Read-only host context
//!
//! Producers that need more than their sibling entries (option values, the
//! current request path) get it through the `Host` trait. The resolver
//! never mutates host state; cross-category access, when a host chooses to
//! allow it, also flows through here.

use indexmap::IndexMap;

use crate::value::Value;

/// Read-only accessor for host state consumed by producers
pub trait Host: Send + Sync {
    /// Look up a host configuration option
    fn option(&self, key: &str) -> Option<Value>;

    /// Look up a host configuration option, falling back to a default
    fn option_or(&self, key: &str, default: Value) -> Value {
        self.option(key).unwrap_or(default)
    }

    /// The path of the current request, without surrounding slashes
    fn path(&self) -> String;
}

/// A simple owned host context
///
/// Suitable for embedders without an application object of their own, and
/// for tests.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    options: IndexMap<String, Value>,
    path: String,
}

impl HostContext {
    /// Create an empty host context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set the current request path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl Host for HostContext {
    fn option(&self, key: &str) -> Option<Value> {
        self.options.get(key).cloned()
    }

    fn path(&self) -> String {
        self.path.trim_matches('/').to_string()
    }
}
