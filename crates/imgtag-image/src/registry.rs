//! OCI distribution API client
//!
//! Handles tag listing with `Link` pagination, manifest and config blob
//! retrieval, and the registry auth handshake: an unauthenticated request
//! that comes back `401` is retried once with a bearer token obtained from
//! the challenge's realm, or with basic auth when the registry asks for it.

use crate::types::{FetchedManifest, ImageConfig, Manifest, MANIFEST_ACCEPT};
use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use imgtag_core::{Context, ImageReference, Platform, ResolverConfig, DOCKER_HUB};
use imgtag_secrets::Credentials;
use reqwest::header::{ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use url::Url;

/// API host serving Docker Hub's distribution endpoints
const DOCKER_HUB_API: &str = "https://registry-1.docker.io/";

const MAX_PAGES: usize = 1000;
const MAX_ERROR_BODY: usize = 256;
const TOKEN_CLIENT_ID: &str = "imgtag";

/// Base URL of the distribution API for `registry`
///
/// Configured endpoints win. Otherwise Docker Hub maps to its API host,
/// loopback registries are spoken to over plain HTTP and everything else
/// over HTTPS.
pub fn registry_base_url(config: &ResolverConfig, registry: &str) -> Result<Url> {
    let raw = match config.registry(registry) {
        Some(endpoint) => match &endpoint.api_url {
            Some(api_url) => api_url.clone(),
            None if endpoint.insecure => format!("http://{}/", registry),
            None => format!("https://{}/", registry),
        },
        None if registry == DOCKER_HUB => DOCKER_HUB_API.to_string(),
        None if is_loopback(registry) => format!("http://{}/", registry),
        None => format!("https://{}/", registry),
    };

    let mut url = Url::parse(&raw).with_context(|| format!("invalid registry URL {:?}", raw))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn is_loopback(registry: &str) -> bool {
    let host = match registry.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => registry.split(':').next().unwrap_or(registry),
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Authentication state negotiated with the registry
#[derive(Debug, Clone, Default)]
enum Session {
    #[default]
    Unauthenticated,
    Bearer(String),
    Basic,
}

/// Parsed `WWW-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
enum Challenge {
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    Basic,
}

impl Challenge {
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_challenge_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        realm.map(|realm| Challenge::Bearer {
            realm,
            service,
            scope,
        })
    }
}

/// Split `key="value",key=value` pairs, keeping commas inside quotes
fn parse_challenge_params(params: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = params.trim();

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().to_ascii_lowercase();
        let after = rest[eq + 1..].trim_start();

        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            },
            None => match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            },
        };

        out.push((key, value.trim().to_string()));
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    out
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Client for one registry's distribution API
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    page_size: u32,
    session: RwLock<Session>,
}

impl RegistryClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            credentials: Credentials::Anonymous,
            page_size: 1000,
            session: RwLock::new(Session::default()),
        }
    }

    /// Create a client for the registry hosting `image`
    pub fn for_image(
        client: reqwest::Client,
        config: &ResolverConfig,
        image: &ImageReference,
        credentials: Credentials,
    ) -> Result<Self> {
        let base_url = registry_base_url(config, &image.registry)?;
        Ok(Self::new(client, base_url)
            .with_credentials(credentials)
            .with_page_size(config.page_size))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid registry path {:?}", path))
    }

    async fn request(&self, url: &Url, accept: Option<&str>) -> RequestBuilder {
        let mut request = self.client.get(url.clone());
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        match (&*self.session.read().await, &self.credentials) {
            (Session::Bearer(token), _) => request.bearer_auth(token),
            (Session::Basic, Credentials::UsernamePassword { username, password }) => {
                request.basic_auth(username, Some(password.expose()))
            }
            (_, Credentials::Token(token)) => request.bearer_auth(token.expose()),
            _ => request,
        }
    }

    /// GET `url`, answering one authentication challenge if the registry sends it
    async fn send(&self, repository: &str, url: &Url, accept: Option<&str>) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .request(url, accept)
            .await
            .send()
            .await
            .with_context(|| format!("failed to connect to registry at {}", url))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(Challenge::parse);

        match challenge {
            Some(Challenge::Bearer {
                realm,
                service,
                scope,
            }) => {
                let token = self
                    .fetch_bearer_token(&realm, service.as_deref(), scope.as_deref(), repository)
                    .await?;
                *self.session.write().await = Session::Bearer(token);
            }
            Some(Challenge::Basic)
                if matches!(self.credentials, Credentials::UsernamePassword { .. }) =>
            {
                *self.session.write().await = Session::Basic;
            }
            _ => return Ok(response),
        }

        debug!("retrying {} after authentication challenge", url);
        self.request(url, accept)
            .await
            .send()
            .await
            .with_context(|| format!("failed to connect to registry at {}", url))
    }

    /// Exchange credentials for a bearer token at the challenge's realm
    async fn fetch_bearer_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: Option<&str>,
        repository: &str,
    ) -> Result<String> {
        let mut url =
            Url::parse(realm).with_context(|| format!("invalid token realm {:?}", realm))?;
        let scope = scope
            .map(str::to_string)
            .unwrap_or_else(|| format!("repository:{}:pull", repository));

        debug!(
            "requesting bearer token from {} (scope {}, credentials {})",
            url,
            scope,
            self.credentials.kind()
        );

        let request = match &self.credentials {
            Credentials::Token(token) => {
                let mut form = url::form_urlencoded::Serializer::new(String::new());
                form.append_pair("grant_type", "refresh_token")
                    .append_pair("refresh_token", token.expose())
                    .append_pair("client_id", TOKEN_CLIENT_ID)
                    .append_pair("scope", &scope);
                if let Some(service) = service {
                    form.append_pair("service", service);
                }
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form.finish())
            }
            credentials => {
                {
                    let mut query = url.query_pairs_mut();
                    if let Some(service) = service {
                        query.append_pair("service", service);
                    }
                    query.append_pair("scope", &scope);
                }
                let request = self.client.get(url);
                match credentials {
                    Credentials::UsernamePassword { username, password } => {
                        request.basic_auth(username, Some(password.expose()))
                    }
                    _ => request,
                }
            }
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to request token from {}", realm))?;

        let status = response.status();
        if !status.is_success() {
            bail!("token request to {} failed ({})", realm, status);
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("failed to parse token response")?;

        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("token response from {} carried no token", realm))
    }

    /// List every tag of `repository`, following `Link` pagination
    pub async fn list_tags(&self, ctx: &Context, repository: &str) -> Result<Vec<String>> {
        ctx.run(self.fetch_tags(repository)).await?
    }

    async fn fetch_tags(&self, repository: &str) -> Result<Vec<String>> {
        let mut url = self.endpoint(&format!("v2/{}/tags/list", repository))?;
        url.query_pairs_mut()
            .append_pair("n", &self.page_size.to_string());

        let mut all_tags = Vec::new();
        for _ in 0..MAX_PAGES {
            let response = self.send(repository, &url, None).await?;
            let response = ensure_success(response, &url).await?;

            let next = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| parse_link_header(link, &url));

            let page: TagsResponse = response
                .json()
                .await
                .context("failed to parse tags response")?;
            all_tags.extend(page.tags.unwrap_or_default());

            match next {
                Some(next) if next != url => url = next,
                _ => {
                    trace!("found {} tags for {}", all_tags.len(), repository);
                    return Ok(all_tags);
                }
            }
        }

        bail!("tag listing for {} exceeded {} pages", repository, MAX_PAGES)
    }

    /// Fetch the manifest (or index) for a tag or digest
    pub async fn get_manifest(
        &self,
        ctx: &Context,
        repository: &str,
        reference: &str,
    ) -> Result<FetchedManifest> {
        ctx.run(self.fetch_manifest(repository, reference)).await?
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<FetchedManifest> {
        let url = self.endpoint(&format!("v2/{}/manifests/{}", repository, reference))?;
        let response = self.send(repository, &url, Some(MANIFEST_ACCEPT)).await?;
        let response = ensure_success(response, &url).await?;

        let header_digest = response
            .headers()
            .get("docker-content-digest")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read manifest {}:{}", repository, reference))?;

        let digest = header_digest
            .unwrap_or_else(|| format!("sha256:{}", hex::encode(Sha256::digest(&body))));
        let manifest = Manifest::from_slice(content_type.as_deref(), &body)
            .with_context(|| format!("failed to parse manifest {}:{}", repository, reference))?;

        Ok(FetchedManifest { digest, manifest })
    }

    async fn fetch_config(&self, repository: &str, digest: &str) -> Result<ImageConfig> {
        let url = self.endpoint(&format!("v2/{}/blobs/{}", repository, digest))?;
        let response = self.send(repository, &url, None).await?;
        let response = ensure_success(response, &url).await?;

        response
            .json()
            .await
            .with_context(|| format!("failed to parse config blob {}", digest))
    }

    /// Content digest of the manifest `reference` points at
    pub async fn manifest_digest(
        &self,
        ctx: &Context,
        repository: &str,
        reference: &str,
    ) -> Result<String> {
        Ok(self.get_manifest(ctx, repository, reference).await?.digest)
    }

    /// Whether `tag` publishes an image for `platform`
    pub async fn supports_platform(
        &self,
        ctx: &Context,
        repository: &str,
        tag: &str,
        platform: &Platform,
    ) -> Result<bool> {
        ctx.run(self.check_platform(repository, tag, platform)).await?
    }

    async fn check_platform(
        &self,
        repository: &str,
        tag: &str,
        platform: &Platform,
    ) -> Result<bool> {
        match self.fetch_manifest(repository, tag).await?.manifest {
            Manifest::Index(index) => Ok(index.manifests.iter().any(|d| {
                d.platform
                    .as_ref()
                    .is_some_and(|p| platform.matches(&p.os, &p.architecture, p.variant.as_deref()))
            })),
            Manifest::Image(image) => {
                let config = self.fetch_config(repository, &image.config.digest).await?;
                Ok(config_matches(&config, platform))
            }
        }
    }

    /// Build time of `tag`, taken from its config blob
    ///
    /// For an index the entry matching `platform` is used, or the first real
    /// image entry when no platform is given. `None` means the tag has no
    /// image for the platform or its config records no creation time.
    pub async fn created_at(
        &self,
        ctx: &Context,
        repository: &str,
        tag: &str,
        platform: Option<&Platform>,
    ) -> Result<Option<DateTime<Utc>>> {
        ctx.run(self.fetch_created(repository, tag, platform)).await?
    }

    async fn fetch_created(
        &self,
        repository: &str,
        tag: &str,
        platform: Option<&Platform>,
    ) -> Result<Option<DateTime<Utc>>> {
        let image = match self.fetch_manifest(repository, tag).await?.manifest {
            Manifest::Image(image) => image,
            Manifest::Index(index) => {
                let entry = index.manifests.iter().find(|d| match (platform, &d.platform) {
                    (Some(want), Some(p)) => {
                        want.matches(&p.os, &p.architecture, p.variant.as_deref())
                    }
                    (Some(_), None) => false,
                    (None, Some(p)) => p.os != "unknown",
                    (None, None) => true,
                });
                let Some(entry) = entry else {
                    return Ok(None);
                };
                match self.fetch_manifest(repository, &entry.digest).await?.manifest {
                    Manifest::Image(image) => image,
                    Manifest::Index(_) => {
                        bail!("nested index {} in {}:{}", entry.digest, repository, tag)
                    }
                }
            }
        };

        let config = self.fetch_config(repository, &image.config.digest).await?;
        if platform.is_some_and(|p| !config_matches(&config, p)) {
            return Ok(None);
        }
        Ok(config.created)
    }
}

fn config_matches(config: &ImageConfig, platform: &Platform) -> bool {
    platform.matches(
        config.os.as_deref().unwrap_or_default(),
        config.architecture.as_deref().unwrap_or_default(),
        config.variant.as_deref(),
    )
}

async fn ensure_success(response: Response, url: &Url) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    let body = match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None if body.is_empty() => "(no response body)".to_string(),
        None => body.to_string(),
    };
    Err(anyhow!("registry returned {} for {}: {}", status, url, body))
}

/// Parse the `rel="next"` target of a `Link` header, resolved against `current`
///
/// Format: `</v2/repo/tags/list?n=100&last=tag>; rel="next"`
fn parse_link_header(link: &str, current: &Url) -> Option<Url> {
    link.split(',')
        .map(str::trim)
        .filter(|part| part.contains("rel=\"next\"") || part.contains("rel=next"))
        .find_map(|part| {
            let start = part.find('<')?;
            let end = part[start..].find('>')? + start;
            current.join(&part[start + 1..end]).ok()
        })
}
