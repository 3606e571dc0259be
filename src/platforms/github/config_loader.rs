use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

use crate::config::{ConfigLoader, ConfigOutcome};
use crate::error::Result;

use super::client::GithubClient;

/// Reads the organization's configuration file from its control repository.
///
/// A missing repository or file, and a token without access to it, all
/// mean the organization is not onboarded.
pub struct RepoConfigLoader {
    client: Arc<GithubClient>,
    repo: String,
    path: String,
}

impl RepoConfigLoader {
    pub fn new(client: Arc<GithubClient>, repo: impl Into<String>, path: impl Into<String>) -> Self {
        RepoConfigLoader {
            client,
            repo: repo.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl ConfigLoader for RepoConfigLoader {
    async fn org_config(&self) -> Result<ConfigOutcome> {
        let mut segments = vec!["repos", self.client.org(), self.repo.as_str(), "contents"];
        segments.extend(self.path.split('/').filter(|s| !s.is_empty()));
        let endpoint = self.client.endpoint(&segments)?;
        let response = match self.client.get_raw(&endpoint).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() || e.http_status() == Some(403) => {
                debug!(org = self.client.org(), error = %e, "Configuration not readable");
                return Ok(ConfigOutcome::NoConfig);
            }
            Err(e) => return Err(e),
        };

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                debug!(org = self.client.org(), repo = %self.repo, path = %self.path, "No configuration file");
                Ok(ConfigOutcome::NoConfig)
            }
            status if status.is_success() => {
                let raw = response.text().await?;
                Ok(ConfigOutcome::from_yaml(&raw))
            }
            _ => Err(self.client.error_from(response).await),
        }
    }
}
