//! Error types for trellis
//!
//! Errors are structured: a kind plus the category/entry the resolver was
//! working on and an actionable help message. All failures surface
//! synchronously to the caller; the resolver never logs, retries, or caches
//! a failed resolution.

use std::fmt;

/// Result type alias for trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for trellis operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Category the resolver was working on, if known
    pub category: Option<String>,
    /// Entry within the category, if known
    pub entry: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested name is not declared in the category and no override supplies it
    UndefinedEntry,
    /// The category itself is not registered
    UnknownCategory,
    /// A derivation referenced a sibling entry that is not resolved yet
    /// (declared later, or misspelled) - a declaration-order bug
    UnresolvedReference,
    /// A producer re-entered the category that is currently being resolved
    CircularResolution,
    /// The underlying loader or derivation failed
    Producer(ProducerErrorKind),
    /// A resolved value had the wrong shape for the requested access
    TypeMismatch,
    /// Registration refused because the name is already taken
    AlreadyRegistered,
}

/// Specific producer failure categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerErrorKind {
    /// Definition file not found
    FileNotFound { path: String },
    /// Definition file has an extension no loader understands
    UnsupportedFormat { path: String },
    /// Definition file could not be parsed
    Parse { path: String },
    /// I/O error other than a missing file
    Io,
    /// A derivation or generator returned an error of its own
    Custom { message: String },
}

impl Error {
    /// Create an undefined entry error
    pub fn undefined_entry(category: impl Into<String>, entry: impl Into<String>) -> Self {
        let category = category.into();
        let entry = entry.into();
        Self {
            kind: ErrorKind::UndefinedEntry,
            help: Some(format!(
                "Check that '{}' is declared in the '{}' catalog or supplied by an override",
                entry, category
            )),
            category: Some(category),
            entry: Some(entry),
            cause: None,
        }
    }

    /// Create an unknown category error
    pub fn unknown_category(category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            kind: ErrorKind::UnknownCategory,
            help: Some(format!(
                "Register a '{}' category before resolving it",
                category
            )),
            category: Some(category),
            entry: None,
            cause: None,
        }
    }

    /// Create an unresolved reference error
    ///
    /// Raised when a derivation asks for a sibling that is not in the
    /// accumulator. The whole category attempt fails and nothing is cached.
    pub fn unresolved_reference(category: impl Into<String>, entry: impl Into<String>) -> Self {
        let category = category.into();
        let entry = entry.into();
        Self {
            kind: ErrorKind::UnresolvedReference,
            help: Some(format!(
                "Declare '{}' earlier in the '{}' category than the entries that derive from it",
                entry, category
            )),
            category: Some(category),
            entry: Some(entry),
            cause: None,
        }
    }

    /// Create a circular resolution error
    pub fn circular_resolution(category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            kind: ErrorKind::CircularResolution,
            help: Some(format!(
                "A producer requested the '{}' category while it was being resolved; break the cycle",
                category
            )),
            category: Some(category),
            entry: None,
            cause: None,
        }
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: ErrorKind::Producer(ProducerErrorKind::FileNotFound { path }),
            category: None,
            entry: None,
            help: Some("Check that the definition file exists".into()),
            cause: None,
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: ErrorKind::Producer(ProducerErrorKind::UnsupportedFormat { path }),
            category: None,
            entry: None,
            help: Some("Use a .yaml, .yml or .json definition file".into()),
            cause: None,
        }
    }

    /// Create a parse error for a definition file
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: ErrorKind::Producer(ProducerErrorKind::Parse { path }),
            category: None,
            entry: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Producer(ProducerErrorKind::Io),
            category: None,
            entry: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a custom producer error
    pub fn producer(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Producer(ProducerErrorKind::Custom {
                message: message.into(),
            }),
            category: None,
            entry: None,
            help: None,
            cause: None,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::TypeMismatch,
            category: None,
            entry: None,
            help: Some(format!("Expected a {} value", expected.into())),
            cause: Some(format!("Got: {}", got.into())),
        }
    }

    /// Create an already registered error
    pub fn already_registered(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ErrorKind::AlreadyRegistered,
            category: None,
            entry: Some(name.clone()),
            help: Some(format!(
                "Use register_with_force(..., force=true) to replace '{}'",
                name
            )),
            cause: None,
        }
    }

    /// Add category context to the error
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add entry context to the error
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Main error message
        match &self.kind {
            ErrorKind::UndefinedEntry => write!(f, "Undefined entry")?,
            ErrorKind::UnknownCategory => write!(f, "Unknown category")?,
            ErrorKind::UnresolvedReference => write!(f, "Unresolved reference")?,
            ErrorKind::CircularResolution => write!(f, "Circular resolution detected")?,
            ErrorKind::Producer(p) => match p {
                ProducerErrorKind::FileNotFound { path } => {
                    write!(f, "Definition file not found: {}", path)?
                }
                ProducerErrorKind::UnsupportedFormat { path } => {
                    write!(f, "Unsupported definition format: {}", path)?
                }
                ProducerErrorKind::Parse { path } => {
                    write!(f, "Failed to parse definition file: {}", path)?
                }
                ProducerErrorKind::Io => write!(f, "I/O error")?,
                ProducerErrorKind::Custom { message } => {
                    write!(f, "Producer error: {}", message)?
                }
            },
            ErrorKind::TypeMismatch => write!(f, "Type mismatch")?,
            ErrorKind::AlreadyRegistered => write!(f, "Already registered")?,
        }

        // Category / entry context
        if let Some(category) = &self.category {
            write!(f, "\n  Category: {}", category)?;
        }
        if let Some(entry) = &self.entry {
            write!(f, "\n  Entry: {}", entry)?;
        }

        // Cause
        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        // Help
        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_entry_display() {
        let err = Error::undefined_entry("roots", "doesNotExist");
        let display = format!("{}", err);

        assert!(display.contains("Undefined entry"));
        assert!(display.contains("Category: roots"));
        assert!(display.contains("Entry: doesNotExist"));
        assert!(display.contains("Help:"));
    }

    #[test]
    fn test_unresolved_reference_display() {
        let err = Error::unresolved_reference("urls", "base");
        let display = format!("{}", err);

        assert!(display.contains("Unresolved reference"));
        assert!(display.contains("Category: urls"));
        assert!(display.contains("Entry: base"));
        assert!(display.contains("earlier in the 'urls' category"));
    }

    #[test]
    fn test_unknown_category() {
        let err = Error::unknown_category("widgets");

        assert_eq!(err.kind, ErrorKind::UnknownCategory);
        assert_eq!(err.category, Some("widgets".into()));
        assert!(err.entry.is_none());
    }

    #[test]
    fn test_circular_resolution_display() {
        let err = Error::circular_resolution("roots");
        let display = format!("{}", err);

        assert!(display.contains("Circular resolution detected"));
        assert!(display.contains("Category: roots"));
    }

    #[test]
    fn test_file_not_found_error() {
        let err = Error::file_not_found("/config/components.yaml");
        let display = format!("{}", err);

        assert!(display.contains("Definition file not found: /config/components.yaml"));
        assert!(matches!(
            err.kind,
            ErrorKind::Producer(ProducerErrorKind::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_parse_error_carries_cause() {
        let err = Error::parse("/config/routes.yaml", "mapping values are not allowed here");
        let display = format!("{}", err);

        assert!(display.contains("Failed to parse definition file: /config/routes.yaml"));
        assert!(display.contains("mapping values are not allowed here"));
    }

    #[test]
    fn test_type_mismatch_error() {
        let err = Error::type_mismatch("string", "mapping")
            .with_category("urls")
            .with_entry("index");
        let display = format!("{}", err);

        assert!(display.contains("Type mismatch"));
        assert!(display.contains("Category: urls"));
        assert!(display.contains("Entry: index"));
        assert!(display.contains("Got: mapping"));
    }

    #[test]
    fn test_already_registered_error() {
        let err = Error::already_registered("smartypants");
        let display = format!("{}", err);

        assert!(display.contains("Already registered"));
        assert!(display.contains("register_with_force"));
    }

    #[test]
    fn test_with_help() {
        let err = Error::producer("generator failed").with_help("Check the route generator");
        let display = format!("{}", err);

        assert!(display.contains("Producer error: generator failed"));
        assert!(display.contains("Help: Check the route generator"));
    }
}
