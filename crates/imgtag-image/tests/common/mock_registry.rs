//! Mock distribution API helpers
//!
//! Each helper mounts the endpoints one registry feature needs on a wiremock
//! server. Images are addressed as `127.0.0.1:<port>/library/nginx`, which
//! the resolver talks to over plain HTTP.

use super::constants::*;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Image reference for the mock repository on `server`
pub fn image_ref(server: &MockServer) -> String {
    format!("{}/{}", server.address(), REPOSITORY)
}

/// Registry host (with port) of `server`
pub fn registry_host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Deterministic fake digest derived from `seed`
pub fn digest_of(seed: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(seed.as_bytes())))
}

pub fn tags_path() -> String {
    format!("/v2/{}/tags/list", REPOSITORY)
}

pub fn manifest_path(reference: &str) -> String {
    format!("/v2/{}/manifests/{}", REPOSITORY, reference)
}

pub fn blob_path(digest: &str) -> String {
    format!("/v2/{}/blobs/{}", REPOSITORY, digest)
}

fn tags_body(tags: &[&str]) -> serde_json::Value {
    json!({ "name": REPOSITORY, "tags": tags })
}

/// Serve `tags` from the tag listing endpoint in one page
pub async fn mock_tags(server: &MockServer, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(tags)))
        .mount(server)
        .await;
}

/// Serve `tags` only after `delay`
pub async fn mock_slow_tags(server: &MockServer, tags: &[&str], delay: Duration) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tags_body(tags))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serve `first` with a `Link` to a second page holding `second`
pub async fn mock_paginated_tags(server: &MockServer, first: &[&str], second: &[&str]) {
    let last = first.last().copied().unwrap_or_default();

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(query_param("last", last))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(second)))
        .expect(1)
        .mount(server)
        .await;

    let link = format!("<{}?n={}&last={}>; rel=\"next\"", tags_path(), first.len(), last);
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tags_body(first))
                .insert_header("link", link.as_str()),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn index_body(tag: &str, platforms: &[&str]) -> serde_json::Value {
    let manifests: Vec<serde_json::Value> = platforms
        .iter()
        .map(|p| {
            let mut parts = p.split('/');
            let os = parts.next().unwrap_or_default();
            let arch = parts.next().unwrap_or_default();
            let mut platform = json!({ "os": os, "architecture": arch });
            if let Some(variant) = parts.next() {
                platform["variant"] = json!(variant);
            }
            json!({
                "mediaType": OCI_MANIFEST,
                "digest": digest_of(&format!("{}-{}", tag, p)),
                "size": 1024,
                "platform": platform,
            })
        })
        .collect();

    json!({
        "schemaVersion": 2,
        "mediaType": OCI_INDEX,
        "manifests": manifests,
    })
}

fn manifest_response(body: &serde_json::Value, media_type: &str, digest: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body.to_string(), media_type)
        .insert_header("docker-content-digest", digest)
}

/// Serve a multi-platform index for `tag`
pub async fn mock_index(server: &MockServer, tag: &str, platforms: &[&str]) {
    let body = index_body(tag, platforms);
    Mock::given(method("GET"))
        .and(path(manifest_path(tag)))
        .respond_with(manifest_response(&body, OCI_INDEX, &digest_of(tag)))
        .mount(server)
        .await;
}

/// Like [`mock_index`], but fail the test if the tag is ever probed
pub async fn mock_index_never_probed(server: &MockServer, tag: &str, platforms: &[&str]) {
    let body = index_body(tag, platforms);
    Mock::given(method("GET"))
        .and(path(manifest_path(tag)))
        .respond_with(manifest_response(&body, OCI_INDEX, &digest_of(tag)))
        .expect(0)
        .mount(server)
        .await;
}

/// Serve an image manifest at `reference` plus its config blob
async fn mount_image(server: &MockServer, reference: &str, platform: &str, created: Option<&str>) {
    let config_digest = digest_of(&format!("config-{}", reference));
    let manifest = json!({
        "schemaVersion": 2,
        "mediaType": OCI_MANIFEST,
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "digest": config_digest,
            "size": 512,
        },
        "layers": [],
    });
    let digest = if reference.starts_with("sha256:") {
        reference.to_string()
    } else {
        digest_of(reference)
    };
    Mock::given(method("GET"))
        .and(path(manifest_path(reference)))
        .respond_with(manifest_response(&manifest, OCI_MANIFEST, &digest))
        .mount(server)
        .await;

    let mut parts = platform.split('/');
    let mut config = json!({
        "os": parts.next().unwrap_or_default(),
        "architecture": parts.next().unwrap_or_default(),
    });
    if let Some(variant) = parts.next() {
        config["variant"] = json!(variant);
    }
    if let Some(created) = created {
        config["created"] = json!(created);
    }
    Mock::given(method("GET"))
        .and(path(blob_path(&config_digest)))
        .respond_with(ResponseTemplate::new(200).set_body_json(config))
        .mount(server)
        .await;
}

/// Serve a single-platform manifest for `tag` plus its config blob
pub async fn mock_single_image(
    server: &MockServer,
    tag: &str,
    platform: &str,
    created: Option<&str>,
) {
    mount_image(server, tag, platform, created).await;
}

/// Serve a multi-platform index for `tag` whose entries resolve to real images
///
/// Each `(platform, created)` pair becomes an index entry, an image manifest
/// and a config blob.
pub async fn mock_index_with_images(
    server: &MockServer,
    tag: &str,
    images: &[(&str, Option<&str>)],
) {
    let platforms: Vec<&str> = images.iter().map(|(p, _)| *p).collect();
    mock_index(server, tag, &platforms).await;

    for (platform, created) in images {
        let entry = digest_of(&format!("{}-{}", tag, platform));
        mount_image(server, &entry, platform, *created).await;
    }
}

/// Number of requests `server` received for `request_path`
pub async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

/// Fail manifest requests for `tag` with a server error
pub async fn mock_broken_manifest(server: &MockServer, tag: &str) {
    Mock::given(method("GET"))
        .and(path(manifest_path(tag)))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(server)
        .await;
}

/// Require a bearer token for the tag listing, issued by `/token`
///
/// With `basic` set, the token endpoint only answers requests carrying
/// those credentials.
pub async fn mock_bearer_auth(server: &MockServer, tags: &[&str], basic: Option<(&str, &str)>) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(header("authorization", format!("Bearer {}", BEARER_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(tags)))
        .mount(server)
        .await;

    let challenge = format!(
        r#"Bearer realm="http://{}/token",service="mock-registry",scope="repository:{}:pull""#,
        server.address(),
        REPOSITORY
    );
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(401).insert_header("www-authenticate", challenge.as_str()),
        )
        .mount(server)
        .await;

    let token = ResponseTemplate::new(200).set_body_json(json!({ "token": BEARER_TOKEN }));
    let token_mock = Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("service", "mock-registry"))
        .and(query_param("scope", format!("repository:{}:pull", REPOSITORY).as_str()));
    match basic {
        Some((user, pass)) => {
            let encoded = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                format!("{}:{}", user, pass),
            );
            token_mock
                .and(header("authorization", format!("Basic {}", encoded).as_str()))
                .respond_with(token)
                .expect(1)
                .mount(server)
                .await;
        }
        None => {
            token_mock.respond_with(token).expect(1).mount(server).await;
        }
    }
}

/// Require basic auth for the tag listing
pub async fn mock_basic_auth(server: &MockServer, tags: &[&str], user: &str, pass: &str) {
    let encoded = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        format!("{}:{}", user, pass),
    );
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(header("authorization", format!("Basic {}", encoded).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(tags)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("www-authenticate", r#"Basic realm="mock-registry""#),
        )
        .mount(server)
        .await;
}

/// Accept only `Bearer <token>` for the tag listing; no challenge is offered
pub async fn mock_static_token_auth(server: &MockServer, tags: &[&str], token: &str) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(tags)))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(server)
        .await;
}

/// Require a bearer token obtained through an OAuth2 refresh-token grant
///
/// The token endpoint answers with `access_token` rather than `token`.
pub async fn mock_refresh_token_auth(server: &MockServer, tags: &[&str], refresh_token: &str) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(header("authorization", format!("Bearer {}", BEARER_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(tags)))
        .mount(server)
        .await;

    let challenge = format!(
        r#"Bearer realm="http://{}/token",service="mock-registry",scope="repository:{}:pull""#,
        server.address(),
        REPOSITORY
    );
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(401).insert_header("www-authenticate", challenge.as_str()),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={}", refresh_token).as_str()))
        .and(body_string_contains("service=mock-registry"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": BEARER_TOKEN, "expires_in": 300 })),
        )
        .expect(1)
        .mount(server)
        .await;
}
