//! Microsoft Graph backed directory

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, ErrorCode, Result};
use crate::retry::{parse_retry_after, RetryPolicy};
use crate::types::DirectoryMember;

use super::DirectorySource;

/// Paginated Graph response
#[derive(Debug, Deserialize)]
struct ODataPage<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphGroup {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
}

impl From<GraphUser> for DirectoryMember {
    fn from(user: GraphUser) -> Self {
        let email = user
            .mail
            .filter(|m| !m.is_empty())
            .or(user.user_principal_name)
            .unwrap_or_default();
        DirectoryMember {
            display_name: user.display_name.unwrap_or_default(),
            email,
            directory_id: user.id,
        }
    }
}

/// Directory source reading group members from Microsoft Graph.
///
/// Groups are looked up by display name; membership is transitive, so
/// members of nested groups are included. The access token is supplied by
/// the caller.
pub struct GraphDirectory {
    http_client: Client,
    base_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl GraphDirectory {
    /// # Arguments
    /// * `base_url` - Graph endpoint including version, e.g. `https://graph.microsoft.com/v1.0`
    /// * `token` - Bearer token with `GroupMember.Read.All`
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::new(ErrorCode::NetworkError, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut attempt = 0;
        loop {
            let response = self
                .http_client
                .get(url)
                .query(query)
                .bearer_auth(&self.token)
                .header("ConsistencyLevel", "eventual")
                .send()
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.json().await?);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::SERVICE_UNAVAILABLE
                || status == StatusCode::GATEWAY_TIMEOUT;
            if retryable && attempt < self.retry.max_retries {
                let advised = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let delay = self.retry.delay_for(attempt, advised);
                warn!(%status, attempt, ?delay, "Graph request throttled, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let code = match status {
                StatusCode::NOT_FOUND => ErrorCode::NotFound,
                StatusCode::UNAUTHORIZED => ErrorCode::AuthenticationFailed,
                StatusCode::FORBIDDEN => ErrorCode::PermissionDenied,
                StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
                _ => ErrorCode::NetworkError,
            };
            return Err(Error::new(code, format!("Graph request failed with status {status}: {body}"))
                .with_http_status(status.as_u16()));
        }
    }

    async fn find_group_id(&self, group: &str) -> Result<String> {
        let filter = format!("displayName eq '{}'", group.replace('\'', "''"));
        let page: ODataPage<GraphGroup> = self
            .get_json(&self.endpoint("/groups"), &[("$filter", filter.as_str()), ("$select", "id,displayName")])
            .await?;

        let mut groups = page.value.into_iter();
        let found = groups
            .next()
            .ok_or_else(|| Error::not_found(format!("Directory group '{group}' does not exist")))?;
        if groups.next().is_some() {
            return Err(Error::invalid_state(format!(
                "Directory group name '{group}' is ambiguous"
            )));
        }
        Ok(found.id)
    }
}

#[async_trait]
impl DirectorySource for GraphDirectory {
    async fn fetch_members(&self, group: &str) -> Result<Vec<DirectoryMember>> {
        let group_id = self.find_group_id(group).await?;

        let mut members = Vec::new();
        let first = self.endpoint(&format!("/groups/{group_id}/transitiveMembers/microsoft.graph.user"));
        let mut page: ODataPage<GraphUser> = self
            .get_json(&first, &[("$select", "id,displayName,mail,userPrincipalName"), ("$top", "999")])
            .await?;

        loop {
            members.extend(page.value.into_iter().map(DirectoryMember::from));
            match page.next_link {
                // nextLink already carries the query
                Some(next) => page = self.get_json(&next, &[]).await?,
                None => break,
            }
        }

        debug!(group, count = members.len(), "Fetched directory group members");
        Ok(members)
    }
}
