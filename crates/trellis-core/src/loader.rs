//! Definition-file loading
//!
//! Loaders turn an external definition file into a `Value`. The resolver
//! never reads files itself; every path-valued producer goes through the
//! `Loader` capability so that hosts can swap in their own mechanism
//! (interpret a script, dispatch to a plugin hook) without touching the
//! resolution engine.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::value::Value;

/// Trait for definition-file loaders
pub trait Loader: Send + Sync {
    /// Load one definition file and return its produced value
    fn load(&self, path: &Path) -> Result<Value>;

    /// Get the name of this loader
    fn name(&self) -> &str;
}

/// Built-in loader for serialized definition files
///
/// Picks the format by extension: `.yaml`/`.yml` and `.json` are supported.
/// A missing file and a malformed file are distinct errors so that callers
/// can tell an operator typo from a broken definition.
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    /// Create a new file loader
    pub fn new() -> Self {
        Self
    }
}

impl Loader for FileLoader {
    fn load(&self, path: &Path) -> Result<Value> {
        let text = fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(path.display().to_string())
            } else {
                Error::io(err.to_string())
            }
        })?;

        log::trace!("loaded definition file '{}'", path.display());

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .map_err(|err| Error::parse(path.display().to_string(), err.to_string())),
            Some("json") => serde_json::from_str(&text)
                .map_err(|err| Error::parse(path.display().to_string(), err.to_string())),
            _ => Err(Error::unsupported_format(path.display().to_string())),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// A function-backed loader
///
/// Useful for hosts whose definition files are executable (templates,
/// plugin hooks) and for tests.
pub struct FnLoader<F>
where
    F: Fn(&Path) -> Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&Path) -> Result<Value> + Send + Sync,
{
    /// Create a new function-backed loader
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Loader for FnLoader<F>
where
    F: Fn(&Path) -> Result<Value> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<Value> {
        (self.func)(path)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
