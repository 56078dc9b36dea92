//! Registry credential discovery for imgtag
//!
//! This crate turns a pull-secret name into registry credentials:
//! - **Secret stores**: Kubernetes API, `kubectl` and in-memory (tests, embedding)
//! - **Docker config parsing**: `.dockerconfigjson` and legacy `.dockercfg`
//! - **Security**: zeroized, redacted credential material; audit logging that
//!   never records secret values

pub mod dockerconfig;
pub mod resolver;
pub mod security;
pub mod store;
pub mod types;

pub use dockerconfig::{credentials_for_host, normalize_registry_host};
pub use resolver::resolve_credentials;
pub use security::{AuditLog, SecureString};
pub use store::{InMemorySecretStore, KubeSecretStore, KubectlSecretStore, SecretStore};
pub use types::{Credentials, Secret};
