//! Standard catalog builders
//!
//! Ready-made category definitions for the directory roots and public URLs
//! a content platform needs, declared in dependency order. Embedders anchor
//! the chains (the system install directory, the site index directory) and
//! register the result; everything else derives from earlier entries.

use crate::error::{Error, Result};
use crate::registry::{CategoryView, Entry, ProducerContext, Registry};
use crate::value::Value;

/// Category name for filesystem roots
pub const ROOTS: &str = "roots";
/// Category name for public URLs
pub const URLS: &str = "urls";
/// Category name for core component functions
pub const COMPONENTS: &str = "components";
/// Category name for the router's route table
pub const ROUTES: &str = "routes";
/// Category name for text tag definitions
pub const TAGS: &str = "tags";
/// Category name for field method definitions
pub const METHODS: &str = "methods";

/// Alias names for text tags
pub const TAG_ALIASES: &[(&str, &str)] = &[("youtube", "video"), ("vimeo", "video")];

/// Alias names for field methods
pub const METHOD_ALIASES: &[(&str, &str)] = &[
    ("bool", "to_bool"),
    ("esc", "escape"),
    ("excerpt", "to_excerpt"),
    ("float", "to_float"),
    ("h", "html"),
    ("int", "to_int"),
    ("link", "to_link"),
    ("md", "markdown"),
    ("sp", "smartypants"),
    ("v", "is_valid"),
    ("x", "xml"),
];

/// Derive a child path under an earlier-declared root
fn child(view: &CategoryView<'_>, parent: &str, segment: &str) -> Result<Value> {
    Ok(Value::from(format!("{}/{}", view.str(parent)?, segment)))
}

/// Read a host option that must be a string, with a default
fn option_str(ctx: &ProducerContext<'_>, key: &str, default: &str) -> Result<String> {
    match ctx.host.option(key) {
        None => Ok(default.to_string()),
        Some(value) => match value.as_str() {
            Some(s) => Ok(s.to_string()),
            None => Err(Error::type_mismatch("string", value.type_name())
                .with_category(ctx.category)
                .with_help(format!("Set the '{}' option to a string", key))),
        },
    }
}

/// The standard filesystem-root chain
///
/// `system` is the platform installation directory, `index` the site
/// installation; both are anchors. Every other root derives from an entry
/// declared earlier in the list.
pub fn roots(system: impl Into<String>, index: impl Into<String>) -> Vec<Entry> {
    let system: String = system.into();
    let index: String = index.into();
    vec![
        // platform
        Entry::constant("system", system),
        Entry::derive("i18n", |roots, _ctx| child(roots, "system", "i18n")),
        Entry::derive("translations", |roots, _ctx| {
            child(roots, "i18n", "translations")
        }),
        // site installation
        Entry::constant("index", index),
        Entry::derive("assets", |roots, _ctx| child(roots, "index", "assets")),
        Entry::derive("content", |roots, _ctx| child(roots, "index", "content")),
        Entry::derive("media", |roots, _ctx| child(roots, "index", "media")),
        // site
        Entry::derive("site", |roots, _ctx| child(roots, "index", "site")),
        Entry::derive("accounts", |roots, _ctx| child(roots, "site", "accounts")),
        Entry::derive("blueprints", |roots, _ctx| child(roots, "site", "blueprints")),
        Entry::derive("cache", |roots, _ctx| child(roots, "site", "cache")),
        Entry::derive("config", |roots, _ctx| child(roots, "site", "config")),
        Entry::derive("languages", |roots, _ctx| child(roots, "site", "languages")),
        Entry::derive("plugins", |roots, _ctx| child(roots, "site", "plugins")),
        Entry::derive("sessions", |roots, _ctx| child(roots, "site", "sessions")),
        Entry::derive("snippets", |roots, _ctx| child(roots, "site", "snippets")),
        Entry::derive("templates", |roots, _ctx| child(roots, "site", "templates")),
        // two levels deep
        Entry::derive("license", |roots, _ctx| child(roots, "config", ".license")),
        Entry::derive("roles", |roots, _ctx| child(roots, "blueprints", "users")),
    ]
}

/// The standard public-URL chain
///
/// `index` comes from the host's `url` option (default `/`); `current`
/// appends the request path. Slugs for the api and admin endpoints are
/// host options as well.
pub fn urls() -> Vec<Entry> {
    vec![
        Entry::derive("index", |_urls, ctx| {
            Ok(Value::from(option_str(ctx, "url", "/")?))
        }),
        Entry::derive("base", |urls, _ctx| {
            Ok(Value::from(urls.str("index")?.trim_end_matches('/')))
        }),
        Entry::derive("current", |urls, ctx| {
            let path = ctx.host.path();
            if path.is_empty() {
                Ok(urls.get("index")?.clone())
            } else {
                Ok(Value::from(format!("{}/{}", urls.str("base")?, path)))
            }
        }),
        Entry::derive("assets", |urls, _ctx| child(urls, "base", "assets")),
        Entry::derive("media", |urls, _ctx| child(urls, "base", "media")),
        Entry::derive("api", |urls, ctx| {
            let slug = option_str(ctx, "api.slug", "api")?;
            Ok(Value::from(format!("{}/{}", urls.str("base")?, slug)))
        }),
        Entry::derive("admin", |urls, ctx| {
            let slug = option_str(ctx, "admin.slug", "admin")?;
            Ok(Value::from(format!("{}/{}", urls.str("base")?, slug)))
        }),
    ]
}

/// A registry with the standard roots and urls categories declared
///
/// Unit categories (components, routes, tags, methods) are host-specific;
/// declare them on the returned registry with their definition files.
pub fn standard_registry(system: impl Into<String>, index: impl Into<String>) -> Registry {
    Registry::new()
        .with_ordered(ROOTS, roots(system, index))
        .with_ordered(URLS, urls())
        .with_aliases(TAGS, TAG_ALIASES)
        .with_aliases(METHODS, METHOD_ALIASES)
}
