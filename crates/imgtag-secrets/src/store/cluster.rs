//! Secret store backed by the Kubernetes API
//!
//! Reads secrets and service accounts through a [`kube::Client`]. A 404 from
//! the API server is an absent object; every other failure is an error.

use crate::store::SecretStore;
use crate::types::Secret;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret as KubeSecret, ServiceAccount};
use kube::{Api, Client};
use tracing::debug;

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with the in-cluster config, falling back to the local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        debug!("Reading secret {}/{} from the API server", namespace, name);
        let api: Api<KubeSecret> = Api::namespaced(self.client.clone(), namespace);
        let found = api
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to read secret {}/{}", namespace, name))?;
        Ok(found.map(|raw| convert_secret(namespace, name, raw)))
    }

    async fn service_account_pull_secrets(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> Result<Option<Vec<String>>> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get_opt(service_account).await.with_context(|| {
            format!("Failed to read service account {}/{}", namespace, service_account)
        })?;
        Ok(found.map(pull_secret_names))
    }

    fn name(&self) -> &'static str {
        "kubernetes"
    }
}

fn convert_secret(namespace: &str, name: &str, raw: KubeSecret) -> Secret {
    let mut secret = Secret::new(
        raw.metadata.namespace.unwrap_or_else(|| namespace.to_string()),
        raw.metadata.name.unwrap_or_else(|| name.to_string()),
        raw.type_.unwrap_or_default(),
    );
    for (key, value) in raw.data.unwrap_or_default() {
        secret.data.insert(key, value.0);
    }
    secret
}

fn pull_secret_names(account: ServiceAccount) -> Vec<String> {
    account
        .image_pull_secrets
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.name)
        .filter(|n| !n.is_empty())
        .collect()
}
