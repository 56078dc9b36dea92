//! Resolver configuration loading

mod loader;

pub use loader::{RegistryEndpoint, ResolverConfig, CONFIG_ENV_VAR};
