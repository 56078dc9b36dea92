//! Docker config documents stored in pull secrets
//!
//! Two shapes are recognized:
//! - `.dockerconfigjson`: `{"auths": {"<host>": {...}}}`
//! - `.dockercfg` (legacy): `{"<host>": {...}}`
//!
//! Entry keys are compared after [`normalize_registry_host`], so
//! `https://index.docker.io/v1/` and `docker.io` name the same registry.

use crate::types::{
    Credentials, Secret, DOCKER_CFG_KEY, DOCKER_CFG_TYPE, DOCKER_CONFIG_JSON_KEY,
    DOCKER_CONFIG_JSON_TYPE,
};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imgtag_core::DOCKER_HUB;
use serde::Deserialize;
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

#[derive(Deserialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Default, Deserialize, Zeroize, ZeroizeOnDrop)]
struct AuthEntry {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    identitytoken: Option<String>,
    #[serde(default)]
    registrytoken: Option<String>,
}

/// Normalize a docker config entry key or registry host for comparison
pub fn normalize_registry_host(key: &str) -> String {
    let trimmed = key.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase();

    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            DOCKER_HUB.to_string()
        }
        _ => host,
    }
}

/// Extract credentials for `registry_host` from a pull secret
///
/// Returns `Ok(None)` when the secret is a docker config but has no entry for
/// the host, and `Err` when the secret is not a docker config or an entry is
/// malformed. Error text never includes secret data.
pub fn credentials_for_host(secret: &Secret, registry_host: &str) -> Result<Option<Credentials>> {
    let entries = parse_entries(secret)?;
    let wanted = normalize_registry_host(registry_host);

    let Some((key, entry)) = entries
        .iter()
        .find(|(key, _)| normalize_registry_host(key) == wanted)
    else {
        return Ok(None);
    };

    let credentials = entry_credentials(entry).with_context(|| {
        format!(
            "entry {:?} in secret {}/{} is not usable",
            key, secret.namespace, secret.name
        )
    })?;
    Ok(Some(credentials))
}

fn parse_entries(secret: &Secret) -> Result<BTreeMap<String, AuthEntry>> {
    let key = match secret.secret_type.as_str() {
        DOCKER_CONFIG_JSON_TYPE => DOCKER_CONFIG_JSON_KEY,
        DOCKER_CFG_TYPE => DOCKER_CFG_KEY,
        other => bail!(
            "secret {}/{} of type {:?} is not a docker config secret (expected type {} or {})",
            secret.namespace,
            secret.name,
            other,
            DOCKER_CONFIG_JSON_TYPE,
            DOCKER_CFG_TYPE
        ),
    };

    let document = secret.data.get(key).ok_or_else(|| {
        anyhow!(
            "secret {}/{} of type {} has no {} key",
            secret.namespace,
            secret.name,
            secret.secret_type,
            key
        )
    })?;

    let malformed = |e: serde_json::Error| {
        anyhow!(
            "secret {}/{} has a malformed {} document (line {}, column {})",
            secret.namespace,
            secret.name,
            key,
            e.line(),
            e.column()
        )
    };

    if key == DOCKER_CONFIG_JSON_KEY {
        let config: DockerConfigJson = serde_json::from_slice(document).map_err(malformed)?;
        Ok(config.auths)
    } else {
        serde_json::from_slice(document).map_err(malformed)
    }
}

fn entry_credentials(entry: &AuthEntry) -> Result<Credentials> {
    let token = non_empty(&entry.registrytoken).or_else(|| non_empty(&entry.identitytoken));
    if let Some(token) = token {
        return Ok(Credentials::token(token));
    }

    if let (Some(username), Some(password)) =
        (non_empty(&entry.username), non_empty(&entry.password))
    {
        return Ok(Credentials::basic(username, password));
    }

    if let Some(auth) = non_empty(&entry.auth) {
        let decoded = STANDARD
            .decode(auth.trim())
            .map_err(|_| anyhow!("auth field is not valid base64"))?;
        let text = Zeroizing::new(
            String::from_utf8(decoded)
                .map_err(|_| anyhow!("auth field does not decode to UTF-8"))?,
        );
        let (username, password) = text
            .split_once(':')
            .ok_or_else(|| anyhow!("auth field is not of the form username:password"))?;
        return Ok(Credentials::basic(username, password));
    }

    bail!("entry has no username/password, auth, or token")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
