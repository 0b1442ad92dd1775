//! Compiled-in registry of named initializers.
//!
//! Names are type paths such as `com.example.Seed` or `example::Seed`. Both
//! separators are accepted and normalised to `.` so either spelling finds the
//! same registration.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::{Initializer, InitializerScope, SearchPathSet};

type Factory = Box<dyn Fn() -> Box<dyn Initializer> + Send + Sync>;

struct Registration {
    scope: InitializerScope,
    factory: Factory,
}

/// Result of looking up an initializer by name.
pub enum Lookup {
    /// A fresh instance of the registered initializer.
    Found(Box<dyn Initializer>),
    /// Nothing visible is registered under the name.
    NotFound,
    /// The name is not a well-formed type path.
    InvalidShape(String),
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::NotFound => f.write_str("NotFound"),
            Self::InvalidShape(reason) => f.debug_tuple("InvalidShape").field(reason).finish(),
        }
    }
}

/// Initializers keyed by type path.
///
/// # Example
///
/// ```ignore
/// let mut registry = InitializerRegistry::new();
/// registry.register_default::<SeedExpectations>(
///     "com.example.SeedExpectations",
///     InitializerScope::Tests,
/// )?;
/// ```
#[derive(Default)]
pub struct InitializerRegistry {
    entries: HashMap<String, Registration>,
}

impl fmt::Debug for InitializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("InitializerRegistry")
            .field("names", &names)
            .finish()
    }
}

impl InitializerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a malformed name and
    /// [`RegistryError::Duplicate`] when the name is already taken.
    pub fn register<F>(
        &mut self,
        name: &str,
        scope: InitializerScope,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Initializer> + Send + Sync + 'static,
    {
        let key = validate_type_name(name).map_err(|reason| RegistryError::InvalidName {
            name: name.to_owned(),
            reason,
        })?;
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate { name: key });
        }
        self.entries.insert(
            key,
            Registration {
                scope,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    /// Registers a type built through [`Default`].
    ///
    /// # Errors
    ///
    /// See [`InitializerRegistry::register`].
    pub fn register_default<T>(
        &mut self,
        name: &str,
        scope: InitializerScope,
    ) -> Result<(), RegistryError>
    where
        T: Initializer + Default + 'static,
    {
        self.register(name, scope, || Box::new(T::default()))
    }

    /// Looks up `name` among the registrations visible through `paths`.
    ///
    /// With an empty search path every registration is visible. Otherwise a
    /// registration is visible only when its group has a root.
    #[must_use]
    pub fn lookup(&self, name: &str, paths: &SearchPathSet) -> Lookup {
        let key = match validate_type_name(name) {
            Ok(key) => key,
            Err(reason) => return Lookup::InvalidShape(reason),
        };
        match self.entries.get(&key) {
            Some(entry) if paths.is_empty() || paths.includes(entry.scope) => {
                Lookup::Found((entry.factory)())
            }
            _ => Lookup::NotFound,
        }
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks that `name` is a type path and returns its normalised form.
///
/// # Errors
///
/// Returns a description of the problem when a segment is empty or contains
/// characters other than letters, digits, `_` and `$`, or starts with a digit.
pub fn validate_type_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name is empty".to_owned());
    }
    let normalised = trimmed.replace("::", ".");
    for segment in normalised.split('.') {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(format!("'{trimmed}' contains an empty path segment"));
        };
        if !(first.is_alphabetic() || first == '_' || first == '$') {
            return Err(format!(
                "segment '{segment}' of '{trimmed}' must start with a letter, '_' or '$'"
            ));
        }
        if let Some(bad) = chars.find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '$')) {
            return Err(format!(
                "segment '{segment}' of '{trimmed}' contains '{bad}'"
            ));
        }
    }
    Ok(normalised)
}

/// Errors raised while registering an initializer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is not a well-formed type path.
    #[error("initializer name '{name}' is invalid: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The name is already registered.
    #[error("initializer '{name}' is already registered")]
    Duplicate {
        /// The normalised name.
        name: String,
    },
}
