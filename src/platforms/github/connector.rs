use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::sync::{OrgClients, OrgConnector};

use super::client::GithubClient;
use super::config_loader::RepoConfigLoader;
use super::platform_impl::GithubPlatform;

/// Connects to every organization with one pre-issued token.
///
/// The organizations are the configured list, or every organization the
/// token can see when none are configured.
pub struct StaticTokenConnector {
    api_url: String,
    token: String,
    organizations: Vec<String>,
    config_repo: String,
    config_path: String,
    retry: RetryPolicy,
}

impl StaticTokenConnector {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        let defaults = AppConfig::default();
        StaticTokenConnector {
            api_url: api_url.into(),
            token: token.into(),
            organizations: Vec::new(),
            config_repo: defaults.config_repo,
            config_path: defaults.config_path,
            retry: defaults.retry,
        }
    }

    /// Everything from the application config; fails without a token
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let token = config
            .github_token
            .clone()
            .ok_or_else(|| Error::invalid_argument("GITHUB_TOKEN is not set"))?;
        Ok(StaticTokenConnector {
            api_url: config.github_api_url.clone(),
            token,
            organizations: config.organizations.clone(),
            config_repo: config.config_repo.clone(),
            config_path: config.config_path.clone(),
            retry: config.retry,
        })
    }

    pub fn with_organizations(mut self, organizations: Vec<String>) -> Self {
        self.organizations = organizations;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn client(&self, org: &str) -> Result<GithubClient> {
        Ok(GithubClient::new(&self.api_url, self.token.as_str(), org)?.with_retry_policy(self.retry))
    }
}

#[async_trait]
impl OrgConnector for StaticTokenConnector {
    async fn organizations(&self) -> Result<Vec<String>> {
        if !self.organizations.is_empty() {
            return Ok(self.organizations.clone());
        }
        let orgs = self.client("")?.get_user_orgs().await?;
        Ok(orgs.into_iter().map(|o| o.login).collect())
    }

    async fn connect(&self, org: &str) -> Result<OrgClients> {
        let api = GithubPlatform::new(self.client(org)?);
        let loader = RepoConfigLoader::new(
            Arc::new(self.client(org)?),
            self.config_repo.as_str(),
            self.config_path.as_str(),
        );
        Ok(OrgClients {
            api: Arc::new(api),
            config: Arc::new(loader),
        })
    }
}
