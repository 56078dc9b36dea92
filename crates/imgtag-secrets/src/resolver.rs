//! Credential resolution for one image
//!
//! A named pull secret must exist and hold an entry for the image's registry,
//! otherwise resolution fails with `CredentialsNotFound`. Without a name the
//! lookup is best effort: the configured service account's
//! `imagePullSecrets` are tried in order and anything missing or broken
//! degrades to anonymous access.

use crate::dockerconfig::credentials_for_host;
use crate::security::AuditLog;
use crate::store::SecretStore;
use crate::types::Credentials;
use anyhow::{anyhow, Context as _};
use imgtag_core::{Context, Error, ImageReference, ResolverConfig, Result};
use tracing::{debug, warn};

/// Resolve registry credentials for `image`
///
/// `pull_secret` names a secret in `config.namespace`; an empty name selects
/// the default lookup. Secret payloads never reach logs or error text.
pub async fn resolve_credentials(
    ctx: &Context,
    store: &dyn SecretStore,
    config: &ResolverConfig,
    image: &ImageReference,
    pull_secret: &str,
) -> Result<Credentials> {
    let pull_secret = pull_secret.trim();

    if pull_secret.is_empty() {
        return ctx
            .run(default_credentials(store, config, image))
            .await
            .map_err(|interrupt| interrupt.into_error(image.name(), "default credential lookup"));
    }

    ctx.run(named_credentials(store, &config.namespace, pull_secret, image))
        .await
        .map_err(|interrupt| interrupt.into_error(image.name(), "reading pull secret"))?
        .map_err(|e| Error::credentials_not_found(image.name(), &e))
}

async fn named_credentials(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
    image: &ImageReference,
) -> anyhow::Result<Credentials> {
    let audit = AuditLog::new("get", namespace, name, store.name());

    let secret = match store.get_secret(namespace, name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            let err = anyhow!("secret {:?} not found in namespace {:?}", name, namespace);
            audit.with_error(err.to_string()).log();
            return Err(err);
        }
        Err(e) => {
            audit.with_error(format!("{e:#}")).log();
            return Err(e).with_context(|| {
                format!("reading secret {:?} in namespace {:?}", name, namespace)
            });
        }
    };

    match credentials_for_host(&secret, &image.registry) {
        Ok(Some(credentials)) => {
            audit.log();
            debug!(
                "Using {} credentials from secret {}/{} for {}",
                credentials.kind(),
                namespace,
                name,
                image.registry
            );
            Ok(credentials)
        }
        Ok(None) => {
            let err = anyhow!(
                "secret {}/{} has no credentials for registry {}",
                namespace,
                name,
                image.registry
            );
            audit.with_error(err.to_string()).log();
            Err(err)
        }
        Err(e) => {
            audit.with_error(format!("{e:#}")).log();
            Err(e)
        }
    }
}

async fn default_credentials(
    store: &dyn SecretStore,
    config: &ResolverConfig,
    image: &ImageReference,
) -> Credentials {
    let namespace = config.namespace.as_str();
    let account = config.service_account.as_str();

    let names = match store.service_account_pull_secrets(namespace, account).await {
        Ok(Some(names)) => names,
        Ok(None) => {
            debug!(
                "Service account {}/{} not found, using anonymous access for {}",
                namespace, account, image.registry
            );
            return Credentials::Anonymous;
        }
        Err(e) => {
            warn!(
                "Failed to read service account {}/{}: {:#}; using anonymous access",
                namespace, account, e
            );
            return Credentials::Anonymous;
        }
    };

    for name in &names {
        match store.get_secret(namespace, name).await {
            Ok(Some(secret)) => match credentials_for_host(&secret, &image.registry) {
                Ok(Some(credentials)) => {
                    AuditLog::new("get", namespace, name.as_str(), store.name()).log();
                    debug!(
                        "Using {} credentials from {}/{} (service account {}) for {}",
                        credentials.kind(),
                        namespace,
                        name,
                        account,
                        image.registry
                    );
                    return credentials;
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping pull secret {}/{}: {:#}", namespace, name, e),
            },
            Ok(None) => debug!(
                "Pull secret {}/{} listed by service account {} does not exist",
                namespace, name, account
            ),
            Err(e) => warn!("Failed to read pull secret {}/{}: {:#}", namespace, name, e),
        }
    }

    debug!("No pull secret matches {}, using anonymous access", image.registry);
    Credentials::Anonymous
}
