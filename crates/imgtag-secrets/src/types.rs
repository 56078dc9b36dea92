//! Core types for credential discovery

use crate::security::SecureString;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// Secret type holding a `.dockerconfigjson` document
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
/// Secret type holding a legacy `.dockercfg` document
pub const DOCKER_CFG_TYPE: &str = "kubernetes.io/dockercfg";

pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const DOCKER_CFG_KEY: &str = ".dockercfg";

/// A secret read from the cluster, with its data already base64-decoded
///
/// Data values are zeroed when the secret is dropped and never appear in
/// `Debug` output.
#[derive(Clone)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub secret_type: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        secret_type: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            secret_type: secret_type.into(),
            data: BTreeMap::new(),
        }
    }

    /// A `kubernetes.io/dockerconfigjson` secret wrapping `document`
    pub fn docker_config_json(
        namespace: impl Into<String>,
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self::new(namespace, name, DOCKER_CONFIG_JSON_TYPE)
            .with_data(DOCKER_CONFIG_JSON_KEY, document.into().into_bytes())
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        for value in self.data.values_mut() {
            value.zeroize();
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("secret_type", &self.secret_type)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Authentication material for registry calls
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// No credentials; registries allowing anonymous pulls still work
    #[default]
    Anonymous,
    /// Username and password, sent as HTTP basic auth or exchanged for a bearer token
    UsernamePassword {
        username: String,
        password: SecureString,
    },
    /// Registry or identity token, sent as a bearer token
    Token(SecureString),
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Credentials::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn token(token: impl Into<SecureString>) -> Self {
        Credentials::Token(token.into())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }

    /// Short label safe for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::UsernamePassword { .. } => "username-password",
            Credentials::Token(_) => "token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::Token(_) => write!(f, "Token([REDACTED])"),
        }
    }
}
