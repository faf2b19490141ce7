//! trellis-core: lazy, dependency-aware resolution for a host application's
//! core catalog
//!
//! This crate provides the resolution engine behind a host's named values:
//! filesystem roots, public URLs, component tables, route tables, tag
//! definitions. Each value is produced on first request, computed at most
//! once per run, and made available to later producers that depend on it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::{catalog, FileLoader, HostContext, Registry, Resolver};
//!
//! let registry = Registry::new().with_ordered(catalog::URLS, catalog::urls());
//! let host = HostContext::new()
//!     .with_option("url", "https://example.com/")
//!     .with_path("blog/article");
//! let resolver = Resolver::new(registry, Arc::new(host), Arc::new(FileLoader::new()));
//!
//! let assets = resolver.get(catalog::URLS, "assets").unwrap();
//! assert_eq!(assets.as_str(), Some("https://example.com/assets"));
//! ```

pub mod catalog;
pub mod error;
pub mod factory;
pub mod host;
pub mod loader;
pub mod overrides;
pub mod registry;
pub mod resolver;
pub mod value;

pub use error::{Error, ErrorKind, ProducerErrorKind, Result};
pub use factory::FactoryRegistry;
pub use host::{Host, HostContext};
pub use loader::{FileLoader, FnLoader, Loader};
pub use overrides::{OverrideProvider, StaticOverrides};
pub use registry::{
    CategoryDef, CategoryView, Entry, Producer, ProducerContext, Registry, UnitProducer,
};
pub use resolver::Resolver;
pub use value::Value;
