use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Registry host Docker Hub references normalize to
pub const DOCKER_HUB: &str = "docker.io";

const DOCKER_HUB_ALIASES: &[&str] = &[
    "index.docker.io",
    "registry-1.docker.io",
    "registry.hub.docker.com",
];

static REPOSITORY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$")
        .expect("repository path pattern is valid")
});

/// Container image reference with registry, repository, and tag/digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "library/nginx")
    pub repository: String,
    /// Tag (e.g., "1.25.3")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference like "nginx", "ghcr.io/org/app:v1" or "localhost:5000/app@sha256:..."
    pub fn parse(s: &str) -> Result<Self> {
        let input = s.trim();
        if input.is_empty() {
            return Err(Error::invalid_reference(s, "reference must not be empty"));
        }

        let (name_part, digest) = match input.split_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(Error::invalid_reference(s, "digest must be algorithm:hex"));
                }
                (name, Some(digest.to_string()))
            }
            None => (input, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port
        let last_slash = name_part.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name_part[last_slash..].rfind(':') {
            Some(idx) => {
                let split = last_slash + idx;
                let tag = &name_part[split + 1..];
                if tag.is_empty() {
                    return Err(Error::invalid_reference(s, "empty tag"));
                }
                (&name_part[..split], Some(tag.to_string()))
            }
            None => (name_part, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_ascii_lowercase(), rest.to_string())
            }
            _ => (DOCKER_HUB.to_string(), name.to_string()),
        };

        let registry = if DOCKER_HUB_ALIASES.contains(&registry.as_str()) {
            DOCKER_HUB.to_string()
        } else {
            registry
        };

        let repository = if registry == DOCKER_HUB && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository
        };

        if !REPOSITORY_PATH.is_match(&repository) {
            return Err(Error::invalid_reference(
                s,
                format!("invalid repository path {repository:?}"),
            ));
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Registry host and repository without tag or digest
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Strategy used to pick one tag out of a repository's tag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Highest semantic version satisfying the constraint
    #[default]
    #[serde(rename = "semver")]
    SemVer,
    /// Current digest of a mutable tag
    Digest,
    /// Lexically greatest tag
    Name,
    /// Most recently built image
    LatestTimestamp,
}

impl UpdateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStrategy::SemVer => "semver",
            UpdateStrategy::Digest => "digest",
            UpdateStrategy::Name => "name",
            UpdateStrategy::LatestTimestamp => "latest-timestamp",
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "semver" | "sem-ver" => Ok(UpdateStrategy::SemVer),
            "digest" => Ok(UpdateStrategy::Digest),
            "name" | "alphabetical" | "lexical" => Ok(UpdateStrategy::Name),
            "latest" | "newest-build" | "latest-timestamp" => Ok(UpdateStrategy::LatestTimestamp),
            other => Err(Error::config(format!(
                "unknown update strategy {other:?}. \
                 Valid strategies: semver, digest, name, latest-timestamp"
            ))),
        }
    }
}
