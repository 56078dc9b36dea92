use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Accept header sent for manifest requests, most specific first
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.list.v2+json,\
application/vnd.oci.image.manifest.v1+json,\
application/vnd.docker.distribution.manifest.v2+json";

/// Platform entry of an index descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPlatform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Content descriptor as used by manifests and indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<DescriptorPlatform>,
}

/// Single-platform image manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(default)]
    pub schema_version: i32,
    #[serde(default)]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

/// Multi-platform image index (OCI) or manifest list (Docker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    #[serde(default)]
    pub schema_version: i32,
    #[serde(default)]
    pub media_type: String,
    pub manifests: Vec<Descriptor>,
}

/// A manifest document as returned by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    Index(ImageIndex),
    Image(ImageManifest),
}

impl Manifest {
    /// Decode a manifest body, using the response content type when the
    /// document does not declare its own media type
    pub fn from_slice(content_type: Option<&str>, body: &[u8]) -> anyhow::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;

        let declared = value
            .get("mediaType")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                content_type.map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
            })
            .unwrap_or_default();

        let is_index = declared == OCI_INDEX
            || declared == DOCKER_MANIFEST_LIST
            || (declared.is_empty() && value.get("manifests").is_some());

        if is_index {
            Ok(Manifest::Index(serde_json::from_value(value)?))
        } else if value.get("config").is_some() {
            Ok(Manifest::Image(serde_json::from_value(value)?))
        } else {
            anyhow::bail!("unsupported manifest media type {:?}", declared)
        }
    }
}

/// Manifest plus the digest the registry reports for it
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub digest: String,
    pub manifest: Manifest,
}

/// The subset of the image config blob used for platform and age checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}
