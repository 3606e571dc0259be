use reqwest::header::{HeaderMap, ACCEPT, IF_NONE_MATCH, LINK, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, ErrorCode, Result};
use crate::retry::{parse_retry_after, RetryPolicy};

use super::rate_limit::{self, RateLimitSignal};

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE_JSON: &str = "application/vnd.github+json";

/// GitHub REST client bound to one organization
pub struct GithubClient {
    /// HTTP client for REST API calls
    http_client: Client,
    /// API root (e.g., "https://api.github.com" or "https://ghe.example.com/api/v3")
    base_url: Url,
    /// Installation or personal access token
    token: String,
    /// Organization login every org-scoped endpoint refers to
    org: String,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// * `base_url` - The API root
    /// * `token` - Bearer token
    /// * `org` - Organization login
    pub fn new(base_url: &str, token: impl Into<String>, org: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::new(ErrorCode::InvalidArgument, format!("Invalid URL: {e}")))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::new(ErrorCode::NetworkError, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            token: token.into(),
            org: org.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Absolute URL of the API path made of `segments`.
    ///
    /// Each segment is percent-encoded, so a login or slug containing `/`,
    /// `?` or `#` stays a single path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::invalid_argument(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    /// Build the full API URL for a given endpoint
    pub fn api_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let endpoint = endpoint.trim_start_matches('/');
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{endpoint}")
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.request_accepting(method, endpoint, MEDIA_TYPE_JSON)
    }

    fn request_accepting(&self, method: Method, endpoint: &str, media_type: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.api_url(endpoint))
            .bearer_auth(&self.token)
            .header(ACCEPT, media_type)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, concat!("teamsync/", env!("CARGO_PKG_VERSION")))
    }

    /// Send a request, waiting out rate limits and transient failures.
    ///
    /// `build` is called once per attempt. Rate-limited responses are
    /// retried after the advised delay (or backoff) up to the policy's
    /// limit, and so are network errors, timeouts and gateway failures
    /// (502, 503, 504). Once retries run out a gateway failure is returned
    /// as is. A plain 403 whose body had to be read to tell it apart from a
    /// secondary rate limit is returned as an error.
    pub(crate) async fn execute<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = match build().send().await {
                Ok(response) => response,
                Err(e) => {
                    let error = Error::from(e);
                    if !error.is_transient() || attempt >= self.retry.max_retries {
                        return Err(error);
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(org = %self.org, attempt, ?delay, error = %error, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            if is_gateway_failure(status) {
                if attempt >= self.retry.max_retries {
                    return Ok(response);
                }
                let advised = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let delay = self.retry.delay_for(attempt, advised);
                warn!(org = %self.org, attempt, status = status.as_u16(), ?delay, "Server unavailable, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            let signal = rate_limit::classify(status, &headers, &body, chrono::Utc::now().timestamp());

            let Some(signal) = signal else {
                return Err(error_for(status, &headers, &body));
            };
            if attempt >= self.retry.max_retries {
                return Err(Error::new(
                    ErrorCode::RateLimited,
                    format!("Rate limit still exceeded after {attempt} retries"),
                )
                .with_http_status(status.as_u16()));
            }

            let delay = self.retry.delay_for(attempt, signal.advised_delay());
            match signal {
                RateLimitSignal::Secondary(_) => {
                    warn!(org = %self.org, attempt, ?delay, "Secondary rate limit hit, retrying")
                }
                RateLimitSignal::Primary(_) => {
                    warn!(org = %self.org, attempt, ?delay, "Rate limit exceeded, waiting")
                }
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Make a GET request to the GitHub API
    pub async fn get(&self, endpoint: &str) -> Result<reqwest::Response> {
        self.execute(|| self.request(Method::GET, endpoint)).await
    }

    /// GET with `If-None-Match`
    pub async fn get_conditional(&self, endpoint: &str, etag: Option<&str>) -> Result<reqwest::Response> {
        self.execute(|| {
            let request = self.request(Method::GET, endpoint);
            match etag {
                Some(etag) => request.header(IF_NONE_MATCH, etag),
                None => request,
            }
        })
        .await
    }

    /// GET a file's raw content
    pub async fn get_raw(&self, endpoint: &str) -> Result<reqwest::Response> {
        self.execute(|| self.request_accepting(Method::GET, endpoint, "application/vnd.github.raw"))
            .await
    }

    /// Make a POST request to the GitHub API
    pub async fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<reqwest::Response> {
        self.execute(|| self.request(Method::POST, endpoint).json(body)).await
    }

    /// Make a PUT request to the GitHub API
    pub async fn put<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<reqwest::Response> {
        self.execute(|| self.request(Method::PUT, endpoint).json(body)).await
    }

    /// Make a PATCH request to the GitHub API
    pub async fn patch<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<reqwest::Response> {
        self.execute(|| self.request(Method::PATCH, endpoint).json(body)).await
    }

    /// Make a DELETE request to the GitHub API
    pub async fn delete(&self, endpoint: &str) -> Result<reqwest::Response> {
        self.execute(|| self.request(Method::DELETE, endpoint)).await
    }

    /// Check if the response is successful and extract the JSON body
    pub async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| Error::new(ErrorCode::ParseError, format!("Failed to parse response: {e}")))
        } else {
            Err(self.error_from(response).await)
        }
    }

    /// Check if the response is successful, ignoring any body
    pub async fn handle_empty(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from(response).await)
        }
    }

    pub(crate) async fn error_from(&self, response: reqwest::Response) -> Error {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        error_for(status, &headers, &body)
    }

    /// Follow `Link: rel="next"` until the last page
    pub async fn get_paginated<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(with_per_page(endpoint));
        while let Some(url) = next {
            let response = self.get(&url).await?;
            next = next_link(response.headers());
            let page: Vec<T> = self.handle_response(response).await?;
            items.extend(page);
        }
        debug!(org = %self.org, endpoint, count = items.len(), "Fetched paginated listing");
        Ok(items)
    }
}

fn is_gateway_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

pub(crate) fn with_per_page(endpoint: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}per_page=100")
}

/// Extract the `rel="next"` target of a `Link` header
pub(crate) fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|s| s.trim() == "rel=\"next\"");
        is_next.then(|| target.trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

fn error_for(status: StatusCode, headers: &HeaderMap, body: &str) -> Error {
    let code = match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::UNAUTHORIZED => ErrorCode::AuthenticationFailed,
        StatusCode::FORBIDDEN => ErrorCode::PermissionDenied,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => ErrorCode::InvalidArgument,
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => ErrorCode::Timeout,
        _ => ErrorCode::NetworkError,
    };
    let mut error = Error::new(code, format!("API request failed with status {status}: {body}"))
        .with_http_status(status.as_u16());
    if let Some(id) = headers.get("x-github-request-id").and_then(|v| v.to_str().ok()) {
        error = error.with_request_id(id.to_string());
    }
    error
}
