//! Latest eligible container image tag resolution
//!
//! This crate provides functionality for:
//! - Querying OCI-compatible registries (tag listing, manifests, config blobs)
//! - Checking which tags publish an image for a given platform
//! - Choosing a tag with one of four update strategies
//!
//! # Example
//!
//! ```no_run
//! use imgtag_core::{Context, UpdateStrategy};
//! use imgtag_image::get_latest_tag;
//! use imgtag_secrets::KubeSecretStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = KubeSecretStore::try_default().await?;
//!     let ctx = Context::background().with_timeout(Duration::from_secs(60));
//!
//!     let tag = get_latest_tag(
//!         &ctx,
//!         &store,
//!         "ghcr.io/org/app",
//!         UpdateStrategy::SemVer,
//!         "^1.0.0",
//!         "",
//!         &["latest".to_string()],
//!         "linux/amd64",
//!         "",
//!     )
//!     .await?;
//!
//!     println!("Resolved to: {}", tag);
//!     Ok(())
//! }
//! ```

pub mod registry;
pub mod resolver;
pub mod strategy;
pub mod tags;
pub mod types;

pub use registry::{registry_base_url, RegistryClient};
pub use resolver::{get_latest_tag, RepositoryInspector, ResolveRequest, Resolver};
pub use strategy::{selector_for, SelectError, TagInspector, TagSelector};
pub use tags::{TagFilter, TagSet};
pub use types::{FetchedManifest, ImageConfig, Manifest};
