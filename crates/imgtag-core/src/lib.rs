//! # imgtag-core
//!
//! Shared building blocks for resolving the latest eligible tag of a
//! container image:
//! - Error kinds every resolution failure maps onto
//! - Cancellation/deadline [`Context`] threaded through network calls
//! - Resolver configuration (YAML file plus environment overrides)
//! - Platform descriptors and image references
//! - Update strategy selection

pub mod config;
pub mod context;
pub mod error;
pub mod platform;
pub mod types;

pub use config::{RegistryEndpoint, ResolverConfig};
pub use context::{Context, Interrupt};
pub use error::{Error, ErrorKind, Result};
pub use platform::{parse_platform, Platform};
pub use types::{ImageReference, UpdateStrategy, DOCKER_HUB};
