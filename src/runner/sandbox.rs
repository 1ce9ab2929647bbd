//! Scoped ownership of a created sandbox.
//!
//! A [`SandboxLease`] holds the id of the sandbox a run created. Releasing
//! it destroys the sandbox at most once; the runner releases it quietly on
//! every exit path so a fatal error or a caught panic never leaks a sandbox.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::SandboxProvider;

/// Owns at most one live sandbox id for a provider session.
pub struct SandboxLease<'a> {
    provider: &'a dyn SandboxProvider,
    id: Option<String>,
    destroy_timeout: Duration,
}

impl<'a> SandboxLease<'a> {
    /// Creates an empty lease.
    pub fn new(provider: &'a dyn SandboxProvider, destroy_timeout: Duration) -> Self {
        Self {
            provider,
            id: None,
            destroy_timeout,
        }
    }

    /// Takes ownership of a freshly created sandbox.
    pub fn acquire(&mut self, sandbox_id: String) {
        if let Some(previous) = self.id.replace(sandbox_id) {
            warn!(sandbox = %previous, "Lease replaced a sandbox that was never released");
        }
    }

    /// The held sandbox id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_held(&self) -> bool {
        self.id.is_some()
    }

    /// Destroys the held sandbox.
    ///
    /// Returns `None` when nothing is held (never created or already
    /// released). The id is given up before the destroy call, so a failed
    /// destroy is not retried.
    pub async fn release(&mut self) -> Option<Result<(), ProviderError>> {
        let id = self.id.take()?;
        debug!(provider = %self.provider.name(), sandbox = %id, "Destroying sandbox");

        let result = match tokio::time::timeout(self.destroy_timeout, self.provider.destroy(&id)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout("destroy", self.destroy_timeout)),
        };
        Some(result)
    }

    /// Best-effort release that swallows errors.
    pub async fn release_quietly(&mut self) {
        if let Some(Err(e)) = self.release().await {
            debug!(provider = %self.provider.name(), error = %e, "Best-effort sandbox cleanup failed");
        }
    }
}

impl Drop for SandboxLease<'_> {
    fn drop(&mut self) {
        if let Some(id) = &self.id {
            warn!(
                provider = %self.provider.name(),
                sandbox = %id,
                "Sandbox lease dropped without release, sandbox may be leaked"
            );
        }
    }
}
