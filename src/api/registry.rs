use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_json::Value;

use crate::api::auth::Auth;
use crate::api::error::ApiError;
use crate::api::request::handle_manifest_response;
use crate::manifest::Manifest;

pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json,\
application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.v2+json,\
application/vnd.docker.distribution.manifest.list.v2+json";

const MAX_ATTEMPTS: u32 = 3;

/// Connection details for a single `owner/package` registry repository.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub host: String,
    pub owner: String,
    pub package: String,
}

impl RegistryConfig {
    pub fn new(host: impl Into<String>, owner: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            package: package.into(),
        }
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!(
            "https://{}/v2/{}/{}/manifests/{reference}",
            self.host, self.owner, self.package
        )
    }
}

/// Authenticated client to the OCI distribution API, memoising manifests
/// fetched by digest for the lifetime of one cleanup task.
pub struct RegistryClient {
    config: Arc<RegistryConfig>,
    auth: Auth,
    client: Client,
    cache: HashMap<String, Manifest>,
}

impl RegistryClient {
    pub fn new(config: Arc<RegistryConfig>, credential: Option<String>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.append(
            ACCEPT,
            HeaderValue::from_str(MANIFEST_ACCEPT)
                .map_err(|_| ApiError::InvalidHeaderValue(String::from(MANIFEST_ACCEPT)))?,
        );
        let client = ClientBuilder::new().default_headers(headers).build()?;
        Ok(Self {
            config,
            auth: Auth::new(credential),
            client,
            cache: HashMap::new(),
        })
    }

    /// Fetch and parse a manifest by its content digest. Results are
    /// cached for the lifetime of this client since every fetch counts as
    /// a registry pull.
    pub async fn get_manifest_by_digest(&mut self, digest: &str) -> Result<Manifest, ApiError> {
        if let Some(manifest) = self.cache.get(digest) {
            return Ok(manifest.clone());
        }

        let body = self.fetch(digest).await?;
        let manifest = Manifest::parse(&body)?;
        self.cache.insert(digest.to_string(), manifest.clone());
        Ok(manifest)
    }

    /// Resolve a manifest by tag via the package index's tag-to-digest
    /// mapping and delegate to [`Self::get_manifest_by_digest`].
    pub async fn get_manifest_by_tag(
        &mut self,
        tag: &str,
        digest: &str,
    ) -> Result<Manifest, ApiError> {
        self.get_manifest_by_digest(digest).await.map_err(|err| {
            warn!("Unable to fetch manifest for tag '{tag}' (digest '{digest}'). Reason: {err}");
            err
        })
    }

    /// Look up a manifest already in the cache, without fetching. Used
    /// only to supply `child_label` with the referrer/attestation
    /// manifest it inspects for logging.
    pub fn cached(&self, digest: &str) -> Option<&Manifest> {
        self.cache.get(digest)
    }

    /// Upload a substitute manifest under `tag`. The registry computes a
    /// new digest and rebinds `tag` to it; any cached entry under the
    /// tag's previous digest becomes stale and is left to expire
    /// naturally (digests are content-addressed, so nothing reuses it).
    pub async fn put_manifest(&mut self, tag: &str, manifest: &Manifest) -> Result<(), ApiError> {
        let url = self.config.manifest_url(tag);
        let body = manifest.to_body();
        let content_type = manifest.media_type().to_string();

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let token = self.auth.cached_token();
            let mut request = self
                .client
                .put(&url)
                .header(CONTENT_TYPE, content_type.clone())
                .json(&body);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                self.auth.authenticate(&self.client, &response).await?;
                continue;
            }
            if response.status().is_success() {
                return Ok(());
            }
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            last_err = Some(ApiError::RegistryError(format!("{status}: {}", body.trim())));
            if attempt < MAX_ATTEMPTS && status.is_server_error() {
                continue;
            }
            break;
        }
        Err(last_err.unwrap_or(ApiError::RegistryError(String::from("put_manifest failed"))))
    }

    async fn fetch(&mut self, reference: &str) -> Result<Value, ApiError> {
        let url = self.config.manifest_url(reference);

        for attempt in 1..=MAX_ATTEMPTS {
            let token = self.auth.cached_token();
            let mut request = self.client.get(&url);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                self.auth.authenticate(&self.client, &response).await?;
                continue;
            }

            let response = match handle_manifest_response(response).await {
                Ok(response) => response,
                Err(ApiError::NotFound) => return Err(ApiError::NotFound),
                Err(err) if attempt < MAX_ATTEMPTS => {
                    debug!("Retrying manifest fetch for '{reference}' after error: {err}");
                    continue;
                }
                Err(err) => return Err(err),
            };

            return Ok(response.json::<Value>().await?);
        }

        Err(ApiError::RegistryError(format!(
            "exhausted retries fetching manifest '{reference}'"
        )))
    }
}

#[cfg(test)]
impl RegistryClient {
    /// Pre-populate the manifest cache directly, letting tests exercise
    /// `get_manifest_by_digest` and its callers without a live registry.
    pub fn seed_cache(&mut self, digest: impl Into<String>, manifest: Manifest) {
        self.cache.insert(digest.into(), manifest);
    }
}
