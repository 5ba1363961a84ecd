//! ReadMe API client
//!
//! Talks to the ReadMe v1 API:
//! - `GET  /version/{version}` / `POST /version` to make sure the version exists
//! - `GET  /api-specification` (scoped by `x-readme-version`) to find a document
//! - `POST /api-specification` or `PUT /api-specification/{id}` to upsert it
//!
//! Transport failures, unreadable bodies and 5xx responses are retried per
//! [`RetryPolicy`]; 401/403 become [`PublishError::Authentication`] and other
//! 4xx responses are surfaced immediately. A retried create looks the
//! resource up first and never posts it twice once it exists.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::PublishConfig;
use crate::error::{PublishError, PublishResult};
use crate::retry::{retry_with_backoff, AttemptError, RetryPolicy};
use crate::source::SpecFile;
use crate::upload::{DocsPlatform, UploadAction, UploadResult};

/// Page size for document listing.
pub const PER_PAGE: usize = 100;

/// Upper bound on listing pages fetched while looking for a document.
const MAX_PAGES: usize = 50;

/// Header scoping a request to a ReadMe version.
pub const VERSION_HEADER: &str = "x-readme-version";

/// Which part of the upload a call belongs to; decides the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Version,
    Document,
}

impl Phase {
    fn error(self, status: Option<u16>, body: String) -> PublishError {
        match self {
            Phase::Version => PublishError::VersionApi { status, body },
            Phase::Document => PublishError::UploadRejected { status, body },
        }
    }
}

#[derive(Debug)]
struct ApiResponse {
    status: u16,
    body: String,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Serialize)]
struct CreateVersionRequest<'a> {
    version: &'a str,
    is_stable: bool,
    from: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiSpecSummary {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiSpecCreated {
    #[serde(rename = "_id")]
    id: Option<String>,
}

/// ReadMe API client
pub struct ReadmeClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
    create_missing_version: bool,
    fork_source: String,
}

impl ReadmeClient {
    /// Build a client from configuration. Never touches the network.
    pub fn new(config: &PublishConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("specpub/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(config.api_base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid ReadMe API base URL: {}", config.api_base_url))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            retry: config.retry.clone(),
            create_missing_version: config.create_missing_version,
            fork_source: config.version_fork_source.clone(),
        })
    }

    fn key(&self) -> PublishResult<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PublishError::Authentication(
                "README_API_KEY is not set".to_string(),
            )),
        }
    }

    /// Endpoint under the base URL. Each segment is percent-encoded, so a
    /// version like `2025/1` stays a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Authenticated request builder.
    fn request(&self, method: reqwest::Method, segments: &[&str]) -> PublishResult<RequestBuilder> {
        let key = self.key()?;
        Ok(self
            .http
            .request(method, self.endpoint(segments))
            .basic_auth(key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// One round trip, classified for [`retry_with_backoff`].
    async fn attempt(
        &self,
        phase: Phase,
        request: PublishResult<RequestBuilder>,
    ) -> Result<ApiResponse, AttemptError<PublishError>> {
        let request = request.map_err(AttemptError::Fatal)?;
        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(phase.error(None, e.to_string())))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            AttemptError::Transient(phase.error(
                Some(status),
                format!("failed to read response body: {}", e),
            ))
        })?;
        debug!(status, bytes = body.len(), "ReadMe response");

        match status {
            401 | 403 => Err(AttemptError::Fatal(PublishError::Authentication(format!(
                "ReadMe refused the API key (status {}): {}",
                status, body
            )))),
            500..=599 => Err(AttemptError::Transient(phase.error(Some(status), body))),
            _ => Ok(ApiResponse { status, body }),
        }
    }

    /// Send with retries. Returns any non-5xx response; callers interpret it.
    /// Only for idempotent requests; creates go through the `*_attempt` helpers.
    async fn send<F>(&self, label: &str, phase: Phase, build: F) -> PublishResult<ApiResponse>
    where
        F: Fn() -> PublishResult<RequestBuilder>,
    {
        retry_with_backoff(&self.retry, label, || self.attempt(phase, build())).await
    }

    /// Make sure `version` exists. Returns `true` when it was created.
    #[instrument(skip(self))]
    pub async fn ensure_version(&self, version: &str) -> PublishResult<bool> {
        let lookup = self
            .send("version lookup", Phase::Version, || {
                self.request(reqwest::Method::GET, &["version", version])
            })
            .await?;

        if lookup.is_success() {
            info!(version, "version already exists");
            return Ok(false);
        }
        if lookup.status != 404 {
            return Err(Phase::Version.error(Some(lookup.status), lookup.body));
        }

        if !self.create_missing_version {
            return Err(PublishError::VersionApi {
                status: Some(404),
                body: format!(
                    "version '{}' does not exist and version creation is disabled",
                    version
                ),
            });
        }

        info!(version, from = %self.fork_source, "version not found, creating it");
        let mut attempts = 0u32;
        let created = retry_with_backoff(&self.retry, "version create", || {
            attempts += 1;
            self.create_version_attempt(version, attempts > 1)
        })
        .await?;

        match created {
            Created::Response(response) if response.is_success() => {
                info!(version, status = response.status, "version created");
                Ok(true)
            }
            Created::Response(response) => {
                Err(Phase::Version.error(Some(response.status), response.body))
            }
            Created::Existing(_) => {
                info!(version, "version appeared after an unanswered create");
                Ok(true)
            }
        }
    }

    /// A retried create first checks whether the previous attempt landed.
    async fn create_version_attempt(
        &self,
        version: &str,
        recheck: bool,
    ) -> Result<Created, AttemptError<PublishError>> {
        if recheck {
            let lookup = self
                .attempt(
                    Phase::Version,
                    self.request(reqwest::Method::GET, &["version", version]),
                )
                .await?;
            if lookup.is_success() {
                return Ok(Created::Existing(None));
            }
        }

        let payload = CreateVersionRequest {
            version,
            is_stable: false,
            from: &self.fork_source,
        };
        let response = self
            .attempt(
                Phase::Version,
                self.request(reqwest::Method::POST, &["version"])
                    .map(|r| r.json(&payload)),
            )
            .await?;
        Ok(Created::Response(response))
    }

    /// Id of the document titled `title` under `version`, if any.
    #[instrument(skip(self))]
    pub async fn find_document(&self, title: &str, version: &str) -> PublishResult<Option<String>> {
        for page in 1..=MAX_PAGES {
            let listing = self
                .send("document lookup", Phase::Document, || {
                    Ok(self
                        .request(reqwest::Method::GET, &["api-specification"])?
                        .header(VERSION_HEADER, version)
                        .query(&[("perPage", PER_PAGE), ("page", page)]))
                })
                .await?;

            if listing.status == 404 {
                return Ok(None);
            }
            if !listing.is_success() {
                return Err(Phase::Document.error(Some(listing.status), listing.body));
            }

            let specs: Vec<ApiSpecSummary> =
                serde_json::from_str(&listing.body).map_err(|e| PublishError::UploadRejected {
                    status: Some(listing.status),
                    body: format!("unexpected document listing: {}", e),
                })?;

            if let Some(found) = specs.iter().find(|s| s.title == title) {
                debug!(id = %found.id, "matched existing document");
                return Ok(Some(found.id.clone()));
            }
            if specs.len() < PER_PAGE {
                break;
            }
        }

        Ok(None)
    }

    async fn upsert_document(
        &self,
        spec: &SpecFile,
        version: &str,
        existing: Option<&str>,
    ) -> PublishResult<(Upserted, UploadAction)> {
        if let Some(id) = existing {
            let replaced = self
                .send("document replace", Phase::Document, || {
                    Ok(self
                        .request(reqwest::Method::PUT, &["api-specification", id])?
                        .header(VERSION_HEADER, version)
                        .multipart(spec_form(spec)))
                })
                .await?;

            if replaced.is_success() {
                return Ok((Upserted::from_response(replaced), UploadAction::Replaced));
            }
            if replaced.status != 404 {
                return Err(Phase::Document.error(Some(replaced.status), replaced.body));
            }
            warn!(id, "document vanished before replace, creating it instead");
        }

        let mut attempts = 0u32;
        let created = retry_with_backoff(&self.retry, "document create", || {
            attempts += 1;
            self.create_document_attempt(spec, version, attempts > 1)
        })
        .await?;

        match created {
            Created::Response(response) if response.is_success() => {
                Ok((Upserted::from_response(response), UploadAction::Created))
            }
            Created::Response(response) => {
                Err(Phase::Document.error(Some(response.status), response.body))
            }
            Created::Existing(id) => {
                info!(id = ?id, "document appeared after an unanswered create");
                Ok((Upserted { status: 201, id }, UploadAction::Created))
            }
        }
    }

    /// A retried create first looks the document up so an earlier attempt
    /// that landed without a response is not duplicated.
    async fn create_document_attempt(
        &self,
        spec: &SpecFile,
        version: &str,
        recheck: bool,
    ) -> Result<Created, AttemptError<PublishError>> {
        if recheck {
            let found = self
                .find_document(&spec.title(), version)
                .await
                .map_err(AttemptError::Fatal)?;
            if found.is_some() {
                return Ok(Created::Existing(found));
            }
        }

        let response = self
            .attempt(
                Phase::Document,
                self.request(reqwest::Method::POST, &["api-specification"])
                    .map(|r| r.header(VERSION_HEADER, version).multipart(spec_form(spec))),
            )
            .await?;
        Ok(Created::Response(response))
    }
}

fn spec_form(spec: &SpecFile) -> Form {
    Form::new().part(
        "spec",
        Part::text(spec.content().to_string()).file_name(format!("{}.yaml", spec.name())),
    )
}

/// Result of a create call that may have been retried.
#[derive(Debug)]
enum Created {
    Response(ApiResponse),
    /// An earlier attempt created the resource; carries the document id if known.
    Existing(Option<String>),
}

/// Successful upsert, reduced to what the upload result needs.
#[derive(Debug)]
struct Upserted {
    status: u16,
    id: Option<String>,
}

impl Upserted {
    fn from_response(response: ApiResponse) -> Self {
        let id = serde_json::from_str::<ApiSpecCreated>(&response.body)
            .ok()
            .and_then(|c| c.id);
        Self {
            status: response.status,
            id,
        }
    }
}

#[async_trait]
impl DocsPlatform for ReadmeClient {
    fn check_credentials(&self) -> PublishResult<()> {
        self.key().map(|_| ())
    }

    #[instrument(skip(self, spec), fields(spec_name = %spec.name()))]
    async fn publish(&self, spec: &SpecFile, version: &str) -> PublishResult<UploadResult> {
        self.check_credentials()?;

        let version_created = self.ensure_version(version).await?;
        let title = spec.title();
        let existing = self.find_document(&title, version).await?;
        if existing.is_none() {
            info!(title = %title, "no document with this title yet, uploading as new");
        }

        let (upserted, action) = self
            .upsert_document(spec, version, existing.as_deref())
            .await?;
        let document_id = upserted.id.or(existing);

        info!(status = upserted.status, ?action, version, "upload complete");
        Ok(UploadResult {
            status: upserted.status,
            action,
            version_created,
            document_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> PublishConfig {
        let mut config = PublishConfig::from_lookup(|key| match key {
            "HOME" => Some("/home/dev".to_string()),
            "README_API_BASE_URL" => Some("http://127.0.0.1:9/api/v1/".to_string()),
            _ => None,
        })
        .unwrap();
        config.api_key = api_key.map(str::to_string);
        config
    }

    #[test]
    fn test_missing_key_fails_credential_check() {
        let client = ReadmeClient::new(&config(None)).unwrap();
        assert!(matches!(
            client.check_credentials(),
            Err(PublishError::Authentication(_))
        ));
    }

    #[test]
    fn test_present_key_passes_credential_check() {
        let client = ReadmeClient::new(&config(Some("rdme_abc"))).unwrap();
        assert!(client.check_credentials().is_ok());
    }

    #[test]
    fn test_endpoint_joining() {
        let client = ReadmeClient::new(&config(Some("k"))).unwrap();
        assert_eq!(
            client.endpoint(&["version", "1.0"]).as_str(),
            "http://127.0.0.1:9/api/v1/version/1.0"
        );
        assert_eq!(
            client.endpoint(&["api-specification"]).as_str(),
            "http://127.0.0.1:9/api/v1/api-specification"
        );
    }

    #[test]
    fn test_version_is_a_single_path_segment() {
        let client = ReadmeClient::new(&config(Some("k"))).unwrap();
        let url = client.endpoint(&["version", "2025/1?beta#x"]);
        assert_eq!(url.path(), "/api/v1/version/2025%2F1%3Fbeta%23x");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_phase_error_mapping() {
        assert!(matches!(
            Phase::Version.error(Some(500), String::new()),
            PublishError::VersionApi { .. }
        ));
        assert!(matches!(
            Phase::Document.error(None, String::new()),
            PublishError::UploadRejected { .. }
        ));
    }
}
