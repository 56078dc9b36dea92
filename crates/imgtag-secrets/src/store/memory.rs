//! In-memory secret store
//!
//! Stands in for a cluster in tests and for callers that already hold their
//! pull secrets. An empty store behaves like a fresh cluster with no secrets.

use crate::store::SecretStore;
use crate::types::Secret;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<BTreeMap<Key, Secret>>,
    service_accounts: RwLock<BTreeMap<Key, Vec<String>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret while building the store
    pub fn with_secret(mut self, secret: Secret) -> Self {
        let key = (secret.namespace.clone(), secret.name.clone());
        self.secrets.get_mut().insert(key, secret);
        self
    }

    /// Add a service account with `imagePullSecrets` while building the store
    pub fn with_service_account(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        pull_secrets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let pull_secrets = pull_secrets.into_iter().map(Into::into).collect();
        self.service_accounts
            .get_mut()
            .insert((namespace.into(), name.into()), pull_secrets);
        self
    }

    /// Create or replace a secret
    pub async fn insert_secret(&self, secret: Secret) {
        let key = (secret.namespace.clone(), secret.name.clone());
        self.secrets.write().await.insert(key, secret);
    }

    /// Delete a secret, returning whether it existed
    pub async fn remove_secret(&self, namespace: &str, name: &str) -> bool {
        self.secrets
            .write()
            .await
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn service_account_pull_secrets(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> Result<Option<Vec<String>>> {
        let accounts = self.service_accounts.read().await;
        Ok(accounts
            .get(&(namespace.to_string(), service_account.to_string()))
            .cloned())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
