//! Configuration
//!
//! Two layers: [`AppConfig`] is static for the whole process and comes from
//! the environment; [`OrgConfig`] is read from each organization's control
//! repository at the start of that organization's pass.

mod app;
mod org;

pub use app::AppConfig;
pub use org::OrgConfig;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of loading an organization's configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    Loaded(OrgConfig),
    /// No readable configuration: the organization is not onboarded
    NoConfig,
    /// A configuration exists but cannot be used; carries the diagnostic
    BadConfig(String),
}

impl ConfigOutcome {
    /// Parse raw YAML into an outcome; parse and validation errors become
    /// `BadConfig`
    pub fn from_yaml(raw: &str) -> Self {
        match OrgConfig::from_yaml(raw) {
            Ok(config) => ConfigOutcome::Loaded(config),
            Err(e) => ConfigOutcome::BadConfig(e.message),
        }
    }
}

/// Reads and parses one organization's configuration
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn org_config(&self) -> Result<ConfigOutcome>;
}
