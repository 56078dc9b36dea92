//! Cluster secret store trait and implementations

pub mod cluster;
pub mod kubectl;
pub mod memory;

use crate::types::Secret;
use anyhow::Result;
use async_trait::async_trait;

/// Read-only access to a cluster's secrets
///
/// Implementations are stateless lookups; nothing is cached between calls.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret
    ///
    /// Returns Ok(None) if the secret does not exist
    /// Returns Err if the store could not be queried
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Names listed in a service account's `imagePullSecrets`
    ///
    /// Returns Ok(None) if the service account does not exist
    async fn service_account_pull_secrets(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> Result<Option<Vec<String>>>;

    /// Store name for logs and error messages
    fn name(&self) -> &'static str;
}

pub use cluster::KubeSecretStore;
pub use kubectl::KubectlSecretStore;
pub use memory::InMemorySecretStore;
