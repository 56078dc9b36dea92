//! Latest eligible tag resolution
//!
//! Inputs are validated in a fixed order before any network traffic:
//! platform, image reference, then constraint and filter patterns. After
//! that credentials are resolved, tags are listed and filtered (allow
//! pattern first, ignore list second) and the strategy picks the winner.

use crate::registry::RegistryClient;
use crate::strategy::{selector_for, SelectError, TagInspector};
use crate::tags::{TagFilter, TagSet};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgtag_core::{
    parse_platform, Context, Error, ImageReference, Interrupt, Platform, ResolverConfig, Result,
    UpdateStrategy,
};
use imgtag_secrets::{resolve_credentials, SecretStore};
use tracing::{debug, info};

/// Everything needed to resolve one image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Image reference without a meaningful tag, e.g. "ghcr.io/org/app"
    pub repo_url: String,
    pub strategy: UpdateStrategy,
    /// Strategy-specific constraint (version range, name pattern or tracked tag)
    pub constraint: String,
    /// Regex tags must match; an optional `regexp:` prefix is accepted
    pub allow_pattern: String,
    /// Tag names or globs to exclude
    pub ignore: Vec<String>,
    /// `os/arch[/variant]`; empty for no platform requirement
    pub platform: String,
    /// Pull secret name; empty for the service account default
    pub pull_secret: String,
}

impl ResolveRequest {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    pub fn with_allow_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.allow_pattern = pattern.into();
        self
    }

    pub fn with_ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = ignore.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_pull_secret(mut self, name: impl Into<String>) -> Self {
        self.pull_secret = name.into();
        self
    }
}

/// [`TagInspector`] backed by one repository of a registry
pub struct RepositoryInspector<'a> {
    client: &'a RegistryClient,
    repository: &'a str,
}

impl<'a> RepositoryInspector<'a> {
    pub fn new(client: &'a RegistryClient, repository: &'a str) -> Self {
        Self { client, repository }
    }
}

#[async_trait]
impl<'a> TagInspector for RepositoryInspector<'a> {
    async fn supports_platform(
        &self,
        ctx: &Context,
        tag: &str,
        platform: &Platform,
    ) -> AnyResult<bool> {
        self.client
            .supports_platform(ctx, self.repository, tag, platform)
            .await
    }

    async fn created_at(
        &self,
        ctx: &Context,
        tag: &str,
        platform: Option<&Platform>,
    ) -> AnyResult<Option<DateTime<Utc>>> {
        self.client.created_at(ctx, self.repository, tag, platform).await
    }

    async fn digest(&self, ctx: &Context, tag: &str) -> AnyResult<String> {
        self.client.manifest_digest(ctx, self.repository, tag).await
    }
}

/// Map a registry failure to its error kind, keeping interrupts distinct
fn registry_error(err: anyhow::Error, image: &str, stage: &str) -> Error {
    match err.downcast_ref::<Interrupt>() {
        Some(interrupt) => interrupt.into_error(image, stage),
        None => Error::tag_fetch_failed(image, &err),
    }
}

/// Resolves images against their registries with shared HTTP and config
#[derive(Debug, Clone)]
pub struct Resolver {
    http: reqwest::Client,
    config: ResolverConfig,
}

impl Resolver {
    /// Build a resolver, validating `config`
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Build a resolver around an existing HTTP client
    pub fn with_http_client(http: reqwest::Client, config: ResolverConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the latest eligible tag for `request`
    pub async fn resolve(
        &self,
        ctx: &Context,
        store: &dyn SecretStore,
        request: &ResolveRequest,
    ) -> Result<String> {
        let platform = parse_platform(&request.platform)?;
        let image = ImageReference::parse(&request.repo_url)?;
        let name = image.name();

        let filter = TagFilter::new(&request.allow_pattern, &request.ignore)
            .map_err(|e| Error::invalid_constraint(&name, format!("{e:#}")))?;
        let selector = selector_for(request.strategy, &request.constraint)
            .map_err(|e| Error::invalid_constraint(&name, format!("{e:#}")))?;

        debug!(
            "resolving {} (strategy {}, constraint {:?}, platform {:?})",
            name,
            request.strategy.as_str(),
            request.constraint,
            request.platform
        );

        let credentials =
            resolve_credentials(ctx, store, &self.config, &image, &request.pull_secret).await?;
        debug!("using {} credentials for {}", credentials.kind(), image.registry);

        let client = RegistryClient::for_image(self.http.clone(), &self.config, &image, credentials)
            .map_err(|e| Error::tag_fetch_failed(&name, &e))?;

        let listed: TagSet = client
            .list_tags(ctx, &image.repository)
            .await
            .map_err(|e| registry_error(e, &name, "listing tags"))?
            .into_iter()
            .collect();
        let listed_count = listed.len();
        let candidates = filter.apply(listed);
        debug!(
            "{} tags listed for {}, {} left after filtering",
            listed_count,
            name,
            candidates.len()
        );

        if candidates.is_empty() {
            return Err(Error::no_suitable_version(
                &name,
                &request.constraint,
                format!("no tags left after filtering ({} listed)", listed_count),
            ));
        }

        let inspector = RepositoryInspector::new(&client, &image.repository);
        match selector
            .select(ctx, &candidates, platform.as_ref(), &inspector)
            .await
        {
            Ok(tag) => {
                info!("resolved {} to {}", name, tag);
                Ok(tag)
            }
            Err(SelectError::NoSuitableTag(reason)) => {
                Err(Error::no_suitable_version(&name, &request.constraint, reason))
            }
            Err(SelectError::Inspect(e)) => Err(registry_error(e, &name, "inspecting manifests")),
        }
    }
}

/// Resolve the latest eligible tag of `repo_url` with default settings
///
/// Convenience wrapper over [`Resolver::resolve`] using
/// [`ResolverConfig::default`].
#[allow(clippy::too_many_arguments)]
pub async fn get_latest_tag(
    ctx: &Context,
    store: &dyn SecretStore,
    repo_url: &str,
    strategy: UpdateStrategy,
    constraint: &str,
    allow_pattern: &str,
    ignore: &[String],
    platform: &str,
    pull_secret: &str,
) -> Result<String> {
    let request = ResolveRequest::new(repo_url)
        .with_strategy(strategy)
        .with_constraint(constraint)
        .with_allow_pattern(allow_pattern)
        .with_ignore(ignore.iter().cloned())
        .with_platform(platform)
        .with_pull_secret(pull_secret);

    Resolver::new(ResolverConfig::default())?
        .resolve(ctx, store, &request)
        .await
}
