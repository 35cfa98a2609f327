//! HTTP client for the GitHub contents API.
//!
//! [`GitHubClient`] lists directories through
//! `GET {api}/repos/{owner}/{name}/contents/{path}[?ref=...]` and fetches file
//! bytes from each entry's `download_url`. Every request goes through the
//! shared [`RateLimiter`] and is retried according to the [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_API_URL, GITHUB_JSON_ACCEPT, RATE_LIMIT_REMAINING_HEADER,
    RATE_LIMIT_RESET_HEADER, READ_TIMEOUT_SECS,
};
use super::rate_limiter::{RateLimiter, parse_rate_limit_reset, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::{Credential, EntryKind, RemoteError, RemoteTree, TreeEntry};
use crate::locator::RepoCoordinate;
use crate::user_agent;

/// Contents API client.
///
/// Cheap to clone; clones share the connection pool and rate limiter.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    credential: Option<Credential>,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

/// Builder for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubClientBuilder {
    api_url: String,
    credential: Option<Credential>,
    connect_timeout: Duration,
    read_timeout: Duration,
    retry_policy: RetryPolicy,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl Default for GitHubClientBuilder {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credential: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            retry_policy: RetryPolicy::default(),
            rate_limiter: None,
        }
    }
}

impl GitHubClientBuilder {
    /// Base URL of the API (scheme + host, optionally a path prefix).
    #[must_use]
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Bearer token sent as `Authorization: token <value>`.
    #[must_use]
    pub fn credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    /// Connect and total request timeouts.
    #[must_use]
    pub fn timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Retry policy for transient and rate-limited failures.
    #[must_use]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Shared rate limiter. Defaults to one with no minimum spacing.
    #[must_use]
    pub fn rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if the API URL does not parse, or
    /// [`RemoteError::ClientBuild`] if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<GitHubClient, RemoteError> {
        let api_url =
            Url::parse(&self.api_url).map_err(|_| RemoteError::invalid_url(&self.api_url))?;
        if api_url.cannot_be_a_base() {
            return Err(RemoteError::invalid_url(self.api_url));
        }

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| RemoteError::ClientBuild { source })?;

        debug!(
            api_url = %api_url,
            authenticated = self.credential.is_some(),
            max_attempts = self.retry_policy.max_attempts(),
            "built contents API client"
        );

        Ok(GitHubClient {
            client,
            api_url,
            credential: self.credential,
            retry_policy: self.retry_policy,
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::disabled())),
        })
    }
}

/// One item of a contents API response.
#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    item_type: String,
    path: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// A contents response is an array for directories and an object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Many(Vec<ContentItem>),
    One(ContentItem),
}

impl ContentItem {
    fn into_entry(self) -> Option<TreeEntry> {
        let kind = match self.item_type.as_str() {
            "file" => EntryKind::File,
            "dir" => EntryKind::Directory,
            other => {
                debug!(path = %self.path, kind = other, "skipping non-file, non-directory entry");
                return None;
            }
        };
        Some(TreeEntry {
            path: self.path,
            kind,
            content_ref: match kind {
                EntryKind::File => self.download_url,
                EntryKind::Directory => None,
            },
        })
    }
}

impl GitHubClient {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::default()
    }

    /// Whether requests carry a credential.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Builds the listing URL for `path` in `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if the API URL cannot take path segments.
    pub fn contents_url(&self, coord: &RepoCoordinate, path: &str) -> Result<Url, RemoteError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::invalid_url(self.api_url.as_str()))?
            .pop_if_empty()
            .extend(["repos", coord.owner(), coord.name(), "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        if let Some(git_ref) = coord.git_ref() {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        Ok(url)
    }

    /// GETs `url` and returns the whole body, retrying per policy.
    async fn get_bytes(&self, url: &str, accept_json: bool) -> Result<Vec<u8>, RemoteError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.rate_limiter.acquire(url).await;

            let error = match self.get_bytes_once(url, accept_json).await {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            let server_delay = (failure_type == FailureType::RateLimited)
                .then(|| error.retry_after())
                .flatten();
            if let Some(delay) = server_delay {
                self.rate_limiter.record_rate_limit(url, delay).await;
            }

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = server_delay.unwrap_or(backoff_delay).as_millis(),
                        using_server_delay = server_delay.is_some(),
                        error = %error,
                        "retrying request"
                    );
                    // A recorded server hold is enforced by the next `acquire`.
                    if server_delay.is_none() {
                        tokio::time::sleep(backoff_delay).await;
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, attempts = attempt, "not retrying request");
                    return Err(error);
                }
            }
        }
    }

    async fn get_bytes_once(&self, url: &str, accept_json: bool) -> Result<Vec<u8>, RemoteError> {
        let mut request = self.client.get(url);
        if accept_json {
            request = request.header(ACCEPT, GITHUB_JSON_ACCEPT);
        }
        if let Some(credential) = &self.credential {
            request = request.header(AUTHORIZATION, credential.authorization_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, &response));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;
        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "request complete");
        Ok(body.to_vec())
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::timeout(url)
    } else {
        RemoteError::network(url, error)
    }
}

/// Maps a non-2xx response to an error, capturing any server-mandated delay.
fn status_error(url: &str, response: &reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let retry_after = header(RETRY_AFTER.as_str()).and_then(|v| parse_retry_after(&v));
    let quota_exhausted = matches!(status, 403 | 429)
        && header(RATE_LIMIT_REMAINING_HEADER).is_some_and(|v| v.trim() == "0");

    if quota_exhausted {
        let delay = retry_after
            .or_else(|| header(RATE_LIMIT_RESET_HEADER).and_then(|v| parse_rate_limit_reset(&v)));
        RemoteError::quota_exhausted(url, status, delay)
    } else {
        RemoteError::http_status_with_retry_after(url, status, retry_after)
    }
}

#[async_trait]
impl RemoteTree for GitHubClient {
    #[instrument(skip(self), fields(coordinate = %coord))]
    async fn list_directory(
        &self,
        coord: &RepoCoordinate,
        path: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        let url = self.contents_url(coord, path)?;
        let body = self.get_bytes(url.as_str(), true).await?;
        let listing: ListingBody =
            serde_json::from_slice(&body).map_err(|e| RemoteError::decode(url.as_str(), e))?;

        let items = match listing {
            ListingBody::Many(items) => items,
            ListingBody::One(item) => vec![item],
        };
        let entries: Vec<TreeEntry> = items.into_iter().filter_map(ContentItem::into_entry).collect();
        debug!(entries = entries.len(), "listed directory");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, content_ref: &str) -> Result<Vec<u8>, RemoteError> {
        Url::parse(content_ref).map_err(|_| RemoteError::invalid_url(content_ref))?;
        self.get_bytes(content_ref, false).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, credential: Option<Credential>) -> GitHubClient {
        GitHubClient::builder()
            .api_url(server.uri())
            .credential(credential)
            .retry_policy(RetryPolicy::no_retry())
            .build()
            .unwrap()
    }

    fn coord() -> RepoCoordinate {
        RepoCoordinate::new("octo", "demo").unwrap()
    }

    #[test]
    fn test_contents_url_root_and_nested() {
        let client = GitHubClient::builder()
            .api_url("https://api.example.com")
            .build()
            .unwrap();
        assert_eq!(
            client.contents_url(&coord(), "").unwrap().as_str(),
            "https://api.example.com/repos/octo/demo/contents"
        );
        assert_eq!(
            client.contents_url(&coord(), "src/bin").unwrap().as_str(),
            "https://api.example.com/repos/octo/demo/contents/src/bin"
        );
    }

    #[test]
    fn test_contents_url_keeps_prefix_and_ref() {
        let client = GitHubClient::builder()
            .api_url("https://ghe.example.com/api/v3/")
            .build()
            .unwrap();
        let url = client
            .contents_url(&coord().with_ref("release/1.0"), "docs")
            .unwrap();
        assert_eq!(url.path(), "/api/v3/repos/octo/demo/contents/docs");
        assert_eq!(url.query(), Some("ref=release%2F1.0"));
    }

    #[test]
    fn test_build_rejects_bad_api_url() {
        let result = GitHubClient::builder().api_url("not a url").build();
        assert!(matches!(result, Err(RemoteError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_list_directory_maps_kinds_and_skips_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents"))
            .and(header("accept", GITHUB_JSON_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"type": "file", "path": "a.go", "download_url": "https://raw/a.go"},
                {"type": "dir", "path": "src", "download_url": null},
                {"type": "submodule", "path": "vendor/x", "download_url": null},
                {"type": "symlink", "path": "link", "download_url": "https://raw/link"}
            ])))
            .mount(&server)
            .await;

        let entries = client_for(&server, None)
            .list_directory(&coord(), "")
            .await
            .unwrap();

        assert_eq!(
            entries,
            vec![
                TreeEntry::file("a.go", "https://raw/a.go"),
                TreeEntry::directory("src"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_directory_single_object_is_one_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/README.md"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
                {"type": "file", "path": "README.md", "download_url": "https://raw/README.md"}
            )))
            .mount(&server)
            .await;

        let entries = client_for(&server, None)
            .list_directory(&coord().with_ref("main"), "README.md")
            .await
            .unwrap();
        assert_eq!(entries, vec![TreeEntry::file("README.md", "https://raw/README.md")]);
    }

    #[tokio::test]
    async fn test_credential_sent_as_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw/file.txt"))
            .and(header("authorization", "token s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Credential::new("s3cret"));
        let body = client
            .fetch_content(&format!("{}/raw/file.txt", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let body = client_for(&server, None)
            .fetch_content(&format!("{}/f", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = client_for(&server, None)
            .list_directory(&coord(), "missing")
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let error = client_for(&server, None)
            .list_directory(&coord(), "")
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("retry-after", "0"),
            )
            .mount(&server)
            .await;

        let error = client_for(&server, None)
            .list_directory(&coord(), "")
            .await
            .unwrap_err();
        assert_eq!(classify_error(&error), FailureType::RateLimited);
        assert_eq!(error.retry_after(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".to_vec()))
            .mount(&server)
            .await;

        let client = GitHubClient::builder()
            .api_url(server.uri())
            .retry_policy(RetryPolicy::new(
                2,
                Duration::from_millis(10),
                Duration::from_millis(10),
                1.0,
            ))
            .build()
            .unwrap();

        let body = client
            .fetch_content(&format!("{}/f", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"second");
    }

    #[tokio::test]
    async fn test_rate_limited_response_retried_after_server_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let client = GitHubClient::builder()
            .api_url(server.uri())
            .retry_policy(RetryPolicy::with_max_attempts(2))
            .build()
            .unwrap();

        let start = std::time::Instant::now();
        let body = client
            .fetch_content(&format!("{}/f", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
        // Retry-After: 0 replaces the 1s backoff.
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_fetch_content_rejects_non_url_ref() {
        let server = MockServer::start().await;
        let error = client_for(&server, None)
            .fetch_content("not a url")
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::InvalidUrl { .. }));
    }
}
