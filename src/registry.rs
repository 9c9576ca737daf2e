//! Generic name → constructor registry shared by providers, data sources,
//! plugins and notifiers.

pub mod discovery;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, warn};

pub use discovery::{discover_manifests, Manifest};

/// Registry configuration errors. Both are fatal for the invocation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A name was registered twice.
    #[error("{kind} '{name}' is already registered")]
    DuplicateName {
        /// Capability the registry holds (e.g. "provider").
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// No constructor is registered under the name.
    #[error("Unknown {kind} '{name}' (available: {available})")]
    Unknown {
        /// Capability the registry holds.
        kind: &'static str,
        /// Requested name.
        name: String,
        /// Comma-separated registered names.
        available: String,
    },
}

/// Builds a `T` from the constructor argument `A`.
pub type Constructor<T, A> = Arc<dyn Fn(&A) -> Result<Box<T>> + Send + Sync>;

/// Ordered map from names to constructors.
///
/// Names are kept in registration order; [`Registry::names`] and
/// [`Registry::build_all`] follow it.
pub struct Registry<T: ?Sized, A> {
    kind: &'static str,
    entries: Vec<(String, Constructor<T, A>)>,
}

impl<T: ?Sized, A> Registry<T, A> {
    /// Empty registry for the given capability label.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Capability label used in errors and logs.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Registers a constructor. A duplicate name is rejected and the first
    /// registration stays in place.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&A) -> Result<Box<T>> + Send + Sync + 'static,
    {
        self.register_arc(name, Arc::new(constructor))
    }

    /// Registers an already shared constructor.
    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        constructor: Constructor<T, A>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(RegistryError::DuplicateName {
                kind: self.kind,
                name,
            });
        }
        debug!(kind = self.kind, name = %name, "Registered constructor");
        self.entries.push((name, constructor));
        Ok(())
    }

    /// Registers a constructor, logging and skipping a duplicate name.
    /// Used for discovered extensions; returns whether the entry was added.
    pub fn register_or_skip(&mut self, name: &str, constructor: Constructor<T, A>) -> bool {
        match self.register_arc(name, constructor) {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = self.kind, name = %name, "Skipping extension: {e}");
                false
            }
        }
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the constructor for `name`.
    pub fn constructor(&self, name: &str) -> Result<&Constructor<T, A>, RegistryError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| RegistryError::Unknown {
                kind: self.kind,
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Resolves `name` and runs its constructor.
    pub fn resolve(&self, name: &str, arg: &A) -> Result<Box<T>> {
        let constructor = self.constructor(name)?;
        constructor(arg)
    }

    /// Runs every constructor in registration order, pairing each result
    /// with its name.
    pub fn build_all(&self, arg: &A) -> Vec<(String, Result<Box<T>>)> {
        self.entries
            .iter()
            .map(|(name, constructor)| (name.clone(), constructor(arg)))
            .collect()
    }
}

impl<T: ?Sized, A> fmt::Debug for Registry<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .finish()
    }
}
