//! Platform descriptors (`os/arch[/variant]`)
//!
//! Input is lowercased and common aliases are folded onto the OCI names
//! (`x86_64` -> `amd64`, `aarch64` -> `arm64`, ...), then checked against a
//! fixed vocabulary. Anything else is rejected rather than defaulted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "freebsd", "illumos", "ios", "js", "linux", "netbsd", "openbsd",
    "plan9", "solaris", "wasip1", "windows",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
    "ppc64le", "riscv64", "s390x", "wasm",
];

/// Target platform of an image manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Create a platform without validation
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Whether a manifest entry advertising `os`/`arch`/`variant` satisfies this platform
    ///
    /// A requested variant must match the entry's variant, except that
    /// `arm64` treats a missing variant and `v8` as equal. When no variant is
    /// requested any entry variant is accepted.
    pub fn matches(&self, os: &str, arch: &str, variant: Option<&str>) -> bool {
        let os_lower = os.to_ascii_lowercase();
        let arch_lower = arch.to_ascii_lowercase();
        let os = normalize_os(&os_lower);
        let (arch, implied_variant) = normalize_arch(&arch_lower);
        if os != self.os || arch != self.arch {
            return false;
        }

        let Some(wanted) = self.variant.as_deref() else {
            return true;
        };
        let offered = variant
            .map(|v| v.to_ascii_lowercase())
            .or_else(|| implied_variant.map(str::to_string));

        match offered.as_deref() {
            Some(v) => v == wanted,
            None => self.arch == "arm64" && wanted == "v8",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.arch, variant),
            None => write!(f, "{}/{}", self.os, self.arch),
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_platform(s)?.ok_or_else(|| Error::invalid_platform(s, "platform must not be empty"))
    }
}

/// Parse a platform string
///
/// Returns `Ok(None)` for an empty string, meaning no platform restriction.
pub fn parse_platform(s: &str) -> Result<Option<Platform>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let lowered = trimmed.to_ascii_lowercase();
    let parts: Vec<&str> = lowered.split('/').collect();
    let (os, arch, variant) = match parts.as_slice() {
        [os, arch] => (*os, *arch, None),
        [os, arch, variant] => (*os, *arch, Some(*variant)),
        _ => {
            return Err(Error::invalid_platform(
                s,
                "expected the form os/arch or os/arch/variant",
            ))
        }
    };

    if os.is_empty() || arch.is_empty() || variant.is_some_and(str::is_empty) {
        return Err(Error::invalid_platform(s, "os, arch and variant must not be empty"));
    }

    let os = normalize_os(os);
    if !KNOWN_OS.contains(&os) {
        return Err(Error::invalid_platform(s, format!("unknown operating system {os:?}")));
    }

    let (arch, implied_variant) = normalize_arch(arch);
    if !KNOWN_ARCH.contains(&arch) {
        return Err(Error::invalid_platform(s, format!("unknown architecture {arch:?}")));
    }

    let variant = variant.map(str::to_string).or_else(|| implied_variant.map(str::to_string));

    Ok(Some(Platform {
        os: os.to_string(),
        arch: arch.to_string(),
        variant,
    }))
}

fn normalize_os(os: &str) -> &str {
    match os {
        "macos" | "osx" => "darwin",
        other => other,
    }
}

/// Fold architecture aliases, returning any variant the alias implies
fn normalize_arch(arch: &str) -> (&str, Option<&'static str>) {
    match arch {
        "x86_64" | "x86-64" | "x64" => ("amd64", None),
        "aarch64" => ("arm64", None),
        "armhf" => ("arm", Some("v7")),
        "armel" => ("arm", Some("v6")),
        "i386" | "i686" | "x86" => ("386", None),
        other => (other, None),
    }
}
