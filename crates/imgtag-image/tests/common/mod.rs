//! Common test infrastructure for imgtag-image tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Repository names, credentials, timestamps
//! - `mock_registry`: Wiremock setup helpers for the distribution API
//! - `assertions`: Error-kind assertions for resolution results

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod constants;
pub mod mock_registry;

pub use assertions::*;
pub use constants::*;
pub use mock_registry::*;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imgtag_core::{Context, ResolverConfig, Result, UpdateStrategy};
use imgtag_image::{ResolveRequest, Resolver};
use imgtag_secrets::{InMemorySecretStore, Secret};

/// Route resolver logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("imgtag_image=debug")
        .with_test_writer()
        .try_init();
}

/// Pull secret with basic credentials for `host`
pub fn pull_secret(name: &str, host: &str, username: &str, password: &str) -> Secret {
    let auth = STANDARD.encode(format!("{username}:{password}"));
    let doc = format!(r#"{{"auths":{{"{host}":{{"auth":"{auth}"}}}}}}"#);
    Secret::docker_config_json(NAMESPACE, name, doc)
}

/// Legacy `kubernetes.io/dockercfg` pull secret with basic credentials for `host`
pub fn legacy_pull_secret(name: &str, host: &str, username: &str, password: &str) -> Secret {
    let auth = STANDARD.encode(format!("{username}:{password}"));
    let doc = format!(r#"{{"{host}":{{"auth":"{auth}","email":"{username}@example.com"}}}}"#);
    Secret::new(NAMESPACE, name, "kubernetes.io/dockercfg")
        .with_data(".dockercfg", doc.into_bytes())
}

/// Pull secret whose entry for `host` carries a token under `field`
///
/// `field` is `registrytoken` or `identitytoken`.
pub fn token_pull_secret(name: &str, host: &str, field: &str, token: &str) -> Secret {
    let doc = format!(r#"{{"auths":{{"{host}":{{"{field}":"{token}"}}}}}}"#);
    Secret::docker_config_json(NAMESPACE, name, doc)
}

/// Resolve `request` with default settings and an empty secret store
pub async fn resolve(request: &ResolveRequest) -> Result<String> {
    resolve_with(&Context::background(), &InMemorySecretStore::new(), request).await
}

pub async fn resolve_with(
    ctx: &Context,
    store: &InMemorySecretStore,
    request: &ResolveRequest,
) -> Result<String> {
    Resolver::new(ResolverConfig::default())?
        .resolve(ctx, store, request)
        .await
}

/// SemVer request for the mock repository on `server`
pub fn semver_request(server: &wiremock::MockServer, constraint: &str) -> ResolveRequest {
    ResolveRequest::new(image_ref(server))
        .with_strategy(UpdateStrategy::SemVer)
        .with_constraint(constraint)
}
