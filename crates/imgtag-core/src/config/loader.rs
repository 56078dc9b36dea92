//! Configuration file loading and environment overrides

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "IMGTAG_CONFIG";

const NAMESPACE_ENV_VAR: &str = "IMGTAG_NAMESPACE";
const SERVICE_ACCOUNT_ENV_VAR: &str = "IMGTAG_SERVICE_ACCOUNT";
const TIMEOUT_ENV_VAR: &str = "IMGTAG_REQUEST_TIMEOUT_SECS";

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_SERVICE_ACCOUNT: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Settings shared by every resolution performed through one resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Namespace pull secrets are read from
    pub namespace: String,

    /// Service account whose `imagePullSecrets` are tried when no secret is named
    pub service_account: String,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,

    /// User-Agent sent to registries
    pub user_agent: String,

    /// Page size requested from the tag listing endpoint
    pub page_size: u32,

    /// Per-registry endpoint overrides
    pub registries: Vec<RegistryEndpoint>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("imgtag/{}", env!("CARGO_PKG_VERSION")),
            page_size: DEFAULT_PAGE_SIZE,
            registries: Vec::new(),
        }
    }
}

/// Endpoint override for one registry host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEndpoint {
    /// Registry host as it appears in image references (e.g. "registry.example.com:5000")
    pub host: String,

    /// Base URL of the registry API, when it differs from `https://<host>`
    #[serde(default)]
    pub api_url: Option<String>,

    /// Talk plain HTTP to this registry
    #[serde(default)]
    pub insecure: bool,
}

impl ResolverConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config(format!("configuration file not found: {path}"))
            } else {
                Error::config(format!("reading {path}: {e}"))
            }
        })?;

        let config: ResolverConfig = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::config(format!("parsing {path}: {e}")))?;
        config.validate()?;

        debug!("Loaded resolver configuration from {}", path);
        Ok(config)
    }

    /// Load from `IMGTAG_CONFIG` when set, otherwise defaults, then apply environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load(&Utf8PathBuf::from(path))?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(namespace) = std::env::var(NAMESPACE_ENV_VAR) {
            if !namespace.is_empty() {
                self.namespace = namespace;
            }
        }
        if let Ok(account) = std::env::var(SERVICE_ACCOUNT_ENV_VAR) {
            if !account.is_empty() {
                self.service_account = account;
            }
        }
        if let Ok(timeout) = std::env::var(TIMEOUT_ENV_VAR) {
            self.request_timeout_secs = timeout.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{TIMEOUT_ENV_VAR} must be a whole number of seconds, got {timeout:?}"
                ))
            })?;
        }
        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::config("namespace must not be empty"));
        }
        if self.page_size == 0 {
            return Err(Error::config("pageSize must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("requestTimeoutSecs must be greater than zero"));
        }
        for registry in &self.registries {
            if registry.host.is_empty() {
                return Err(Error::config("registry entry with empty host"));
            }
            if let Some(api_url) = &registry.api_url {
                Url::parse(api_url).map_err(|e| {
                    Error::config(format!(
                        "registry {}: invalid apiUrl {api_url:?}: {e}",
                        registry.host
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint override for `host`, if configured
    pub fn registry(&self, host: &str) -> Option<&RegistryEndpoint> {
        self.registries
            .iter()
            .find(|r| r.host.eq_ignore_ascii_case(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::NamedTempFile, Utf8PathBuf) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).unwrap();
        (file, path)
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.service_account, "default");
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("imgtag/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let (_file, path) = write_config(
            r#"
namespace: kargo
pageSize: 50
registries:
  - host: registry.internal:5000
    insecure: true
  - host: mirror.example.com
    apiUrl: https://mirror.example.com/proxy
"#,
        );

        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config.namespace, "kargo");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.service_account, "default");
        assert!(config.registry("registry.internal:5000").unwrap().insecure);
        assert_eq!(
            config.registry("MIRROR.example.com").unwrap().api_url.as_deref(),
            Some("https://mirror.example.com/proxy")
        );
        assert!(config.registry("docker.io").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ResolverConfig::load(Utf8Path::new("/nonexistent/imgtag.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let (_file, path) = write_config("pageSize: 0\n");
        assert!(ResolverConfig::load(&path).is_err());

        let (_file, path) = write_config("registries:\n  - host: x\n    apiUrl: not a url\n");
        assert!(ResolverConfig::load(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::remove_var(CONFIG_ENV_VAR);
        std::env::set_var(NAMESPACE_ENV_VAR, "argo");
        std::env::set_var(TIMEOUT_ENV_VAR, "5");

        let config = ResolverConfig::from_env().unwrap();
        assert_eq!(config.namespace, "argo");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        std::env::set_var(TIMEOUT_ENV_VAR, "soon");
        assert!(ResolverConfig::from_env().is_err());

        std::env::remove_var(NAMESPACE_ENV_VAR);
        std::env::remove_var(TIMEOUT_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_points_at_file() {
        let (_file, path) = write_config("namespace: from-file\n");
        std::env::set_var(CONFIG_ENV_VAR, path.as_str());

        let config = ResolverConfig::from_env().unwrap();
        assert_eq!(config.namespace, "from-file");

        std::env::remove_var(CONFIG_ENV_VAR);
    }
}
