//! Common test infrastructure for imgtag-secrets tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imgtag_secrets::{Secret, SecretStore};
use std::time::Duration;

pub const NAMESPACE: &str = "default";

/// `.dockerconfigjson` document with one `auth` entry
pub fn docker_config(host: &str, username: &str, password: &str) -> String {
    let auth = STANDARD.encode(format!("{username}:{password}"));
    format!(r#"{{"auths":{{"{host}":{{"auth":"{auth}"}}}}}}"#)
}

pub fn pull_secret(name: &str, host: &str, username: &str, password: &str) -> Secret {
    Secret::docker_config_json(NAMESPACE, name, docker_config(host, username, password))
}

/// Store whose every call fails, as an unreachable API server would
pub struct FailingStore;

#[async_trait]
impl SecretStore for FailingStore {
    async fn get_secret(&self, _namespace: &str, _name: &str) -> Result<Option<Secret>> {
        Err(anyhow!("connection refused"))
    }

    async fn service_account_pull_secrets(
        &self,
        _namespace: &str,
        _service_account: &str,
    ) -> Result<Option<Vec<String>>> {
        Err(anyhow!("connection refused"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Store that never answers within a test's lifetime
pub struct HangingStore;

#[async_trait]
impl SecretStore for HangingStore {
    async fn get_secret(&self, _namespace: &str, _name: &str) -> Result<Option<Secret>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn service_account_pull_secrets(
        &self,
        _namespace: &str,
        _service_account: &str,
    ) -> Result<Option<Vec<String>>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}
