//! The resolution engine
//!
//! A `Resolver` lazily evaluates the categories declared in a `Registry`,
//! caches each resolved category for the lifetime of the instance, and
//! hands already-resolved sibling entries to the producers that depend on
//! them. Construct one instance per application run and pass it explicitly
//! to every component that needs resolution; there is no global state.
//!
//! Caching is per whole category and atomic: either the complete category
//! resolves and is cached, or the attempt fails and nothing is kept, so a
//! later call retries from scratch. A producer is invoked at most once per
//! category per resolver lifetime, including under thread races: the cache
//! lock covers the whole check-then-populate sequence, and concurrent
//! requesters for an in-flight category block until the winner finishes.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use crate::error::{Error, Result};
use crate::host::Host;
use crate::loader::Loader;
use crate::overrides::OverrideProvider;
use crate::registry::{CategoryDef, CategoryView, Producer, ProducerContext, Registry, UnitProducer};
use crate::value::Value;

/// Host-scoped cache state, guarded by one mutex
struct CacheState {
    /// Fully resolved categories
    resolved: HashMap<String, Arc<Value>>,
    /// Categories currently being produced, keyed to the producing thread
    in_flight: HashMap<String, ThreadId>,
}

/// Lazy, memoizing resolver over a registry of named producers
pub struct Resolver {
    registry: Registry,
    host: Arc<dyn Host>,
    loader: Arc<dyn Loader>,
    overrides: Option<Arc<dyn OverrideProvider>>,
    cache: Mutex<CacheState>,
    resolved_signal: Condvar,
}

impl Resolver {
    /// Create a resolver for one application run
    pub fn new(registry: Registry, host: Arc<dyn Host>, loader: Arc<dyn Loader>) -> Self {
        Self {
            registry,
            host,
            loader,
            overrides: None,
            cache: Mutex::new(CacheState {
                resolved: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            resolved_signal: Condvar::new(),
        }
    }

    /// Attach an override provider
    ///
    /// The standard access paths (`get`, `category`, `unit`) consult it
    /// before the core catalog; the `_core` variants never do.
    pub fn with_overrides(mut self, overrides: Arc<dyn OverrideProvider>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// The registry this resolver serves
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Look up one entry, override-aware
    ///
    /// Aliases are resolved first; an override for the canonical name wins
    /// over the core producer. Fails with `UndefinedEntry` when neither the
    /// catalog nor an override supplies the name.
    pub fn get(&self, category: &str, name: &str) -> Result<Value> {
        let name = self.registry.canonical(category, name);
        if let Some(overrides) = &self.overrides {
            if let Some(value) = overrides.lookup(category, name) {
                return Ok(value);
            }
        }
        self.lookup_core(category, name)
    }

    /// Look up one entry in the core catalog, bypassing overrides
    pub fn get_core(&self, category: &str, name: &str) -> Result<Value> {
        let name = self.registry.canonical(category, name);
        self.lookup_core(category, name)
    }

    /// Resolve a whole category to its mapping, override-aware
    ///
    /// Override entries are layered over the core mapping; overrides win
    /// and may add names the catalog does not declare.
    pub fn category(&self, category: &str) -> Result<IndexMap<String, Value>> {
        let mut mapping = self.category_core(category)?;
        if let Some(overrides) = &self.overrides {
            for (name, value) in overrides.entries(category) {
                mapping.insert(name, value);
            }
        }
        Ok(mapping)
    }

    /// Resolve a whole category to its core mapping, bypassing overrides
    pub fn category_core(&self, category: &str) -> Result<IndexMap<String, Value>> {
        let resolved = self.resolve(category)?;
        match resolved.as_mapping() {
            Some(mapping) => Ok(mapping.clone()),
            None => {
                Err(Error::type_mismatch("mapping", resolved.type_name()).with_category(category))
            }
        }
    }

    /// Resolve a unit category to its cached value, override-aware
    ///
    /// The value is returned verbatim; unit categories are not required to
    /// be mappings.
    pub fn unit(&self, category: &str) -> Result<Arc<Value>> {
        if let Some(overrides) = &self.overrides {
            if let Some(value) = overrides.unit(category) {
                return Ok(Arc::new(value));
            }
        }
        self.unit_core(category)
    }

    /// Resolve a unit category to its core value, bypassing overrides
    pub fn unit_core(&self, category: &str) -> Result<Arc<Value>> {
        self.resolve(category)
    }

    /// Drop one category's cached resolution, forcing recomputation on the
    /// next access. For tests and resets only; steady-state operation never
    /// invalidates.
    pub fn invalidate(&self, category: &str) {
        let mut state = self.cache.lock().unwrap();
        state.resolved.remove(category);
    }

    /// Drop all cached resolutions. For tests and resets only.
    pub fn clear(&self) {
        let mut state = self.cache.lock().unwrap();
        state.resolved.clear();
    }

    fn lookup_core(&self, category: &str, name: &str) -> Result<Value> {
        let resolved = self.resolve(category)?;
        let mapping = resolved.as_mapping().ok_or_else(|| {
            Error::type_mismatch("mapping", resolved.type_name()).with_category(category)
        })?;
        mapping
            .get(name)
            .cloned()
            .ok_or_else(|| Error::undefined_entry(category, name))
    }

    /// Memoized category resolution
    ///
    /// Invariants: the producer pass runs at most once per category per
    /// resolver lifetime; a failed pass caches nothing; a producer that
    /// re-enters the category it is resolving fails with
    /// `CircularResolution` instead of deadlocking.
    fn resolve(&self, category: &str) -> Result<Arc<Value>> {
        let def = self
            .registry
            .category(category)
            .ok_or_else(|| Error::unknown_category(category))?;

        let me = thread::current().id();
        let mut state = self.cache.lock().unwrap();
        loop {
            if let Some(value) = state.resolved.get(category) {
                return Ok(Arc::clone(value));
            }
            match state.in_flight.get(category) {
                Some(owner) if *owner == me => {
                    return Err(Error::circular_resolution(category));
                }
                // Another thread is producing; wait for it, then re-check.
                // If it failed, in_flight is empty again and we take over.
                Some(_) => state = self.resolved_signal.wait(state).unwrap(),
                None => break,
            }
        }
        state.in_flight.insert(category.to_string(), me);
        drop(state);

        log::trace!("resolving category '{}'", category);
        let produced = self.produce(category, def);

        let mut state = self.cache.lock().unwrap();
        state.in_flight.remove(category);
        let result = match produced {
            Ok(value) => {
                let value = Arc::new(value);
                state.resolved.insert(category.to_string(), Arc::clone(&value));
                log::trace!("cached category '{}'", category);
                Ok(value)
            }
            Err(err) => Err(err),
        };
        drop(state);
        self.resolved_signal.notify_all();
        result
    }

    /// Run one category's producer pass
    fn produce(&self, category: &str, def: &CategoryDef) -> Result<Value> {
        match def {
            CategoryDef::Ordered(entries) => {
                let mut resolved = IndexMap::with_capacity(entries.len());
                for entry in entries {
                    let ctx = ProducerContext {
                        category,
                        entry: Some(&entry.name),
                        host: self.host.as_ref(),
                        loader: self.loader.as_ref(),
                    };
                    let value = match &entry.producer {
                        Producer::Constant(value) => value.clone(),
                        Producer::Include(path) => self.loader.load(path)?,
                        Producer::Derive(func) => {
                            let view = CategoryView::new(category, &resolved);
                            func(&view, &ctx)?
                        }
                    };
                    resolved.insert(entry.name.clone(), value);
                }
                Ok(Value::Mapping(resolved))
            }
            CategoryDef::Unit(producer) => {
                let ctx = ProducerContext {
                    category,
                    entry: None,
                    host: self.host.as_ref(),
                    loader: self.loader.as_ref(),
                };
                match producer {
                    UnitProducer::Include(path) => self.loader.load(path),
                    UnitProducer::Generate(func) => func(&ctx),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::HostContext;
    use crate::loader::{FileLoader, FnLoader};
    use crate::overrides::StaticOverrides;
    use crate::registry::Entry;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn resolver_with(registry: Registry) -> Resolver {
        Resolver::new(
            registry,
            Arc::new(HostContext::new()),
            Arc::new(FileLoader::new()),
        )
    }

    #[test]
    fn test_producer_invoked_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = Registry::new().with_ordered(
            "roots",
            vec![Entry::derive("index", move |_roots, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("/var/www"))
            })],
        );
        let resolver = resolver_with(registry);

        let first = resolver.get("roots", "index").unwrap();
        let second = resolver.get("roots", "index").unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_category_resolution_is_one_arc() {
        let registry = Registry::new()
            .with_ordered("roots", vec![Entry::constant("index", "/var/www")]);
        let resolver = resolver_with(registry);

        let first = resolver.unit_core("roots").unwrap();
        let second = resolver.unit_core("roots").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_dependency_visibility_in_order() {
        // index -> base -> assets, each deriving from the one before
        let registry = Registry::new().with_ordered(
            "urls",
            vec![
                Entry::constant("index", "https://example.com"),
                Entry::derive("base", |urls, _ctx| {
                    Ok(Value::from(urls.str("index")?.trim_end_matches('/')))
                }),
                Entry::derive("assets", |urls, _ctx| {
                    Ok(Value::from(format!("{}/assets", urls.str("base")?)))
                }),
            ],
        );
        let resolver = resolver_with(registry);

        assert_eq!(
            resolver.get("urls", "assets").unwrap().as_str(),
            Some("https://example.com/assets")
        );
    }

    #[test]
    fn test_forward_reference_fails_category() {
        let early_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&early_calls);
        let registry = Registry::new().with_ordered(
            "urls",
            vec![
                Entry::derive("base", move |urls, _ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    // "index" is declared later: a declaration-order bug
                    Ok(Value::from(urls.str("index")?.trim_end_matches('/')))
                }),
                Entry::constant("index", "https://example.com"),
            ],
        );
        let resolver = resolver_with(registry);

        let err = resolver.get("urls", "base").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedReference);
        assert_eq!(err.entry, Some("index".into()));

        // Nothing was cached: the next access re-runs the pass from scratch
        let err = resolver.get("urls", "index").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedReference);
        assert_eq!(early_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_resolution_is_retried_and_may_succeed() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let first_counter = Arc::clone(&first_calls);
        let transient = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&transient);
        let registry = Registry::new().with_ordered(
            "roots",
            vec![
                Entry::derive("index", move |_roots, _ctx| {
                    first_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::from("/var/www"))
                }),
                Entry::derive("cache", move |roots, _ctx| {
                    if gate.load(Ordering::SeqCst) {
                        return Err(Error::producer("cache dir unavailable"));
                    }
                    Ok(Value::from(format!("{}/cache", roots.str("index")?)))
                }),
            ],
        );
        let resolver = resolver_with(registry);

        // First attempt fails partway; entry 1 of 2 had already produced,
        // but the atomic contract keeps it out of the cache
        assert!(resolver.get("roots", "index").is_err());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);

        // The transient condition clears; the retry starts from scratch
        transient.store(false, Ordering::SeqCst);
        assert_eq!(
            resolver.get("roots", "cache").unwrap().as_str(),
            Some("/var/www/cache")
        );
        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_undefined_entry() {
        let registry = Registry::new()
            .with_ordered("roots", vec![Entry::constant("index", "/var/www")]);
        let resolver = resolver_with(registry);

        let err = resolver.get("roots", "doesNotExist").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedEntry);
        assert_eq!(err.entry, Some("doesNotExist".into()));
    }

    #[test]
    fn test_unknown_category() {
        let resolver = resolver_with(Registry::new());

        let err = resolver.get("widgets", "anything").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownCategory);
    }

    #[test]
    fn test_override_precedence() {
        let registry = Registry::new().with_ordered(
            "components",
            vec![Entry::constant("markdown", "core/markdown")],
        );
        let mut overrides = StaticOverrides::new();
        overrides
            .register("components", "markdown", "plugin/markdown")
            .unwrap();
        let resolver = resolver_with(registry).with_overrides(Arc::new(overrides));

        // The overridable path returns the override's value
        assert_eq!(
            resolver.get("components", "markdown").unwrap().as_str(),
            Some("plugin/markdown")
        );
        // The override-free path still reaches the core definition
        assert_eq!(
            resolver.get_core("components", "markdown").unwrap().as_str(),
            Some("core/markdown")
        );
    }

    #[test]
    fn test_override_supplies_undeclared_entry() {
        let registry = Registry::new().with_ordered(
            "components",
            vec![Entry::constant("markdown", "core/markdown")],
        );
        let mut overrides = StaticOverrides::new();
        overrides
            .register("components", "smartypants", "plugin/smartypants")
            .unwrap();
        let resolver = resolver_with(registry).with_overrides(Arc::new(overrides));

        assert_eq!(
            resolver.get("components", "smartypants").unwrap().as_str(),
            Some("plugin/smartypants")
        );
        assert_eq!(
            resolver.get_core("components", "smartypants").unwrap_err().kind,
            ErrorKind::UndefinedEntry
        );

        // Whole-category view includes the addition, override winning
        let merged = resolver.category("components").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.get("smartypants").and_then(Value::as_str),
            Some("plugin/smartypants")
        );
        let core = resolver.category_core("components").unwrap();
        assert_eq!(core.len(), 1);
    }

    #[test]
    fn test_idempotent_category_resolution() {
        let host = HostContext::new().with_option("url", "https://example.com");
        let registry = Registry::new().with_ordered(
            "urls",
            vec![
                Entry::derive("index", |_urls, ctx| {
                    Ok(ctx.host.option_or("url", Value::from("/")))
                }),
                Entry::derive("assets", |urls, _ctx| {
                    Ok(Value::from(format!("{}/assets", urls.str("index")?)))
                }),
            ],
        );
        let resolver = Resolver::new(registry, Arc::new(host), Arc::new(FileLoader::new()));

        let first = resolver.category_core("urls").unwrap();
        let second = resolver.category_core("urls").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unit_include_cached_verbatim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = FnLoader::new("test", move |path: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut map = IndexMap::new();
            map.insert("from".to_string(), Value::from(path.display().to_string()));
            Ok(Value::Mapping(map))
        });
        let registry = Registry::new().with_unit_include("components", "/config/components.yaml");
        let resolver = Resolver::new(registry, Arc::new(HostContext::new()), Arc::new(loader));

        let unit = resolver.unit("components").unwrap();
        assert_eq!(
            unit.as_mapping().and_then(|m| m.get("from")).and_then(Value::as_str),
            Some("/config/components.yaml")
        );

        // Per-entry access goes through the same cached unit
        assert_eq!(
            resolver.get("components", "from").unwrap().as_str(),
            Some("/config/components.yaml")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unit_generator_sees_host() {
        let host = HostContext::new().with_option("api.slug", "v2");
        let registry = Registry::new().with_unit("routes", |ctx| {
            let slug = ctx.host.option_or("api.slug", Value::from("api"));
            Ok(Value::from(vec![format!("{}/auth", slug)]))
        });
        let resolver = Resolver::new(registry, Arc::new(host), Arc::new(FileLoader::new()));

        let routes = resolver.unit("routes").unwrap();
        assert_eq!(
            routes.as_sequence().and_then(|s| s[0].as_str()),
            Some("v2/auth")
        );
    }

    #[test]
    fn test_entry_lookup_on_non_mapping_unit() {
        let registry = Registry::new().with_unit("banner", |_ctx| Ok(Value::from("welcome")));
        let resolver = resolver_with(registry);

        let err = resolver.get("banner", "anything").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);

        // Verbatim access still works
        assert_eq!(resolver.unit("banner").unwrap().as_str(), Some("welcome"));
    }

    #[test]
    fn test_unit_override_replaces_whole_unit() {
        let registry = Registry::new().with_unit("routes", |_ctx| Ok(Value::from(vec!["core"])));
        let mut overrides = StaticOverrides::new();
        overrides.register_unit("routes", vec!["plugin"]).unwrap();
        let resolver = resolver_with(registry).with_overrides(Arc::new(overrides));

        let routes = resolver.unit("routes").unwrap();
        assert_eq!(routes.as_sequence().and_then(|s| s[0].as_str()), Some("plugin"));

        let core = resolver.unit_core("routes").unwrap();
        assert_eq!(core.as_sequence().and_then(|s| s[0].as_str()), Some("core"));
    }

    #[test]
    fn test_alias_lookup() {
        let registry = Registry::new()
            .with_ordered("tags", vec![Entry::constant("video", "tag/video")])
            .with_aliases("tags", &[("youtube", "video"), ("vimeo", "video")]);
        let resolver = resolver_with(registry);

        assert_eq!(
            resolver.get("tags", "youtube").unwrap().as_str(),
            Some("tag/video")
        );
        assert_eq!(
            resolver.get_core("tags", "vimeo").unwrap().as_str(),
            Some("tag/video")
        );
    }

    #[test]
    fn test_invalidate_forces_recomputation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = Registry::new().with_ordered(
            "roots",
            vec![Entry::derive("index", move |_roots, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("/var/www"))
            })],
        );
        let resolver = resolver_with(registry);

        resolver.get("roots", "index").unwrap();
        resolver.invalidate("roots");
        resolver.get("roots", "index").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_same_thread_reentry_is_circular() {
        // A producer that reaches back into the resolver for its own
        // category; the slot is filled after construction
        let slot: Arc<Mutex<Option<Arc<Resolver>>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let registry = Registry::new().with_ordered(
            "roots",
            vec![Entry::derive("index", move |_roots, _ctx| {
                let resolver = inner.lock().unwrap().clone().expect("slot filled");
                resolver.get("roots", "index")
            })],
        );
        let resolver = Arc::new(resolver_with(registry));
        *slot.lock().unwrap() = Some(Arc::clone(&resolver));

        let err = resolver.get("roots", "index").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CircularResolution);
    }

    #[test]
    fn test_cross_category_through_host_is_allowed() {
        let slot: Arc<Mutex<Option<Arc<Resolver>>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let registry = Registry::new()
            .with_ordered("roots", vec![Entry::constant("media", "/var/www/media")])
            .with_ordered(
                "urls",
                vec![Entry::derive("media", move |_urls, _ctx| {
                    let resolver = inner.lock().unwrap().clone().expect("slot filled");
                    let root = resolver.get("roots", "media")?;
                    Ok(Value::from(format!("file://{}", root)))
                })],
            );
        let resolver = Arc::new(resolver_with(registry));
        *slot.lock().unwrap() = Some(Arc::clone(&resolver));

        assert_eq!(
            resolver.get("urls", "media").unwrap().as_str(),
            Some("file:///var/www/media")
        );
    }

    #[test]
    fn test_concurrent_requests_invoke_producer_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = Registry::new().with_ordered(
            "roots",
            vec![Entry::derive("index", move |_roots, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(Value::from("/var/www"))
            })],
        );
        let resolver = resolver_with(registry);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let value = resolver.get("roots", "index").unwrap();
                    assert_eq!(value.as_str(), Some("/var/www"));
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
