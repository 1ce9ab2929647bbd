//! Provider registry: maps provider names to session constructors.
//!
//! The registry is built once by the composition root and shared read-only.
//! Each call to a factory yields a brand new provider session.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ProviderError, RegistryError};

use super::{DockerImageProvider, HttpAgentProvider, SandboxProvider};

/// Constructor for a fresh provider session.
pub type ProviderFactory =
    Arc<dyn Fn() -> Result<Box<dyn SandboxProvider>, ProviderError> + Send + Sync>;

/// Name → constructor map for sandbox providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the adapters shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            DockerImageProvider::NAME.to_string(),
            Arc::new(|| Ok(Box::new(DockerImageProvider::new()) as Box<dyn SandboxProvider>)),
        );
        registry.factories.insert(
            HttpAgentProvider::NAME.to_string(),
            Arc::new(|| {
                HttpAgentProvider::new().map(|p| Box::new(p) as Box<dyn SandboxProvider>)
            }),
        );
        registry
    }

    /// Registers a provider constructor under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Box<dyn SandboxProvider>, ProviderError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Looks up the constructor for `name`.
    pub fn factory(&self, name: &str) -> Result<ProviderFactory, RegistryError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownProvider {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
