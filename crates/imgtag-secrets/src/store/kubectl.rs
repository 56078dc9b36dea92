//! Secret store backed by `kubectl`
//!
//! Runs `kubectl get secret|serviceaccount <name> -n <ns> -o json` and parses
//! the JSON. Only the API server's `NotFound` for the requested object is
//! reported as absent. Every other failure, including a missing kubeconfig
//! context, is an error carrying kubectl's stderr.

use crate::store::SecretStore;
use crate::types::Secret;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct KubectlSecretStore {
    binary: PathBuf,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl KubectlSecretStore {
    /// Use `kubectl` from `PATH` with the current kubeconfig context
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            context: None,
            kubeconfig: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Target a specific kubeconfig context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    /// Check that the kubectl binary can be found
    pub fn validate(&self) -> Result<()> {
        which::which(&self.binary)
            .map(|_| ())
            .with_context(|| format!("{} not found in PATH", self.binary.display()))
    }

    /// Run `kubectl get <kind> <name> -n <namespace> -o json`
    ///
    /// Returns Ok(None) when the object does not exist.
    async fn get_json(&self, kind: &str, namespace: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["get", kind, name, "-n", namespace, "-o", "json"]);
        if let Some(context) = &self.context {
            cmd.args(["--context", context]);
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }

        debug!("Running kubectl get {} {} -n {}", kind, name, namespace);

        let output = cmd
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if output.status.success() {
            return Ok(Some(output.stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr, kind, name) {
            return Ok(None);
        }

        Err(anyhow!(
            "kubectl get {} {}/{} failed ({}): {}",
            kind,
            namespace,
            name,
            output.status,
            stderr.trim()
        ))
    }
}

impl Default for KubectlSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for KubectlSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        match self.get_json("secret", namespace, name).await? {
            Some(json) => parse_secret(&json).map(Some),
            None => Ok(None),
        }
    }

    async fn service_account_pull_secrets(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> Result<Option<Vec<String>>> {
        match self
            .get_json("serviceaccount", namespace, service_account)
            .await?
        {
            Some(json) => parse_service_account(&json).map(Some),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "kubectl"
    }
}

/// Whether kubectl reported that `<kind> <name>` does not exist
fn is_not_found(stderr: &str, kind: &str, name: &str) -> bool {
    let expected = format!("Error from server (NotFound): {}s \"{}\" not found", kind, name);
    stderr.lines().any(|line| line.trim() == expected)
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Deserialize)]
struct KubeSecret {
    metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    secret_type: String,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeServiceAccount {
    #[serde(default)]
    image_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Deserialize)]
struct LocalObjectReference {
    name: String,
}

fn parse_secret(json: &[u8]) -> Result<Secret> {
    let raw: KubeSecret = serde_json::from_slice(json)
        .map_err(|e| anyhow!("Failed to parse kubectl secret output: {}", json_position(&e)))?;

    let mut secret = Secret::new(raw.metadata.namespace, raw.metadata.name, raw.secret_type);
    for (key, value) in raw.data {
        let decoded = STANDARD.decode(value.as_bytes()).map_err(|_| {
            anyhow!(
                "secret {}/{} key {} is not valid base64",
                secret.namespace,
                secret.name,
                key
            )
        })?;
        secret.data.insert(key, decoded);
    }
    Ok(secret)
}

fn parse_service_account(json: &[u8]) -> Result<Vec<String>> {
    let raw: KubeServiceAccount = serde_json::from_slice(json)
        .context("Failed to parse kubectl serviceaccount output")?;
    Ok(raw
        .image_pull_secrets
        .into_iter()
        .map(|r| r.name)
        .filter(|n| !n.is_empty())
        .collect())
}

/// Position-only description of a parse error; never echoes input
fn json_position(e: &serde_json::Error) -> String {
    format!("{:?} error at line {}, column {}", e.classify(), e.line(), e.column())
}
