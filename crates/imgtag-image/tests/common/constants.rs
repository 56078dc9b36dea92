//! Shared test data

/// Repository served by the mock registry
pub const REPOSITORY: &str = "library/nginx";

pub const NAMESPACE: &str = "default";

pub const USERNAME: &str = "robot";
pub const PASSWORD: &str = "s3cr3t";
pub const BEARER_TOKEN: &str = "mock-bearer-token";
pub const REGISTRY_TOKEN: &str = "mock-registry-token";
pub const IDENTITY_TOKEN: &str = "mock-identity-token";

pub const LINUX_AMD64: &str = "linux/amd64";
pub const LINUX_ARM64: &str = "linux/arm64";

pub const JAN_2024: &str = "2024-01-15T10:00:00Z";
pub const MAR_2024: &str = "2024-03-15T10:00:00Z";
pub const JUN_2024: &str = "2024-06-15T10:00:00Z";
