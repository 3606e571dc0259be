//! Process-wide configuration from environment variables

use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CachePolicies, TtlPolicy};
use crate::error::{Error, Result};
use crate::identity::{IdentityMapper, RewriteRule};
use crate::retry::RetryPolicy;

/// Static application configuration.
///
/// | Variable | Default |
/// |----------|---------|
/// | `GITHUB_API_URL` | `https://api.github.com` |
/// | `GITHUB_TOKEN` | none |
/// | `GITHUB_ORGS` | none (comma separated) |
/// | `GRAPH_API_URL` | `https://graph.microsoft.com/v1.0` |
/// | `GRAPH_TOKEN` | none |
/// | `IDENTITY_REPLACE` | none (`search=replace;...`) |
/// | `IDENTITY_PREPEND` / `IDENTITY_APPEND` | empty |
/// | `IGNORED_TEAMS` / `IGNORED_ORGS` | none (comma separated) |
/// | `SECURITY_MANAGER_GROUPS` | none (comma separated) |
/// | `CONFIG_REPO` / `CONFIG_PATH` | `teamsync-config` / `teamsync.yml` |
/// | `TEAM_DESCRIPTION` | see [`AppConfig::DEFAULT_DESCRIPTION`] |
/// | `MAX_CONCURRENT_TEAMS` / `MAX_CONCURRENT_MUTATIONS` | `8` / `10` |
/// | `USER_CACHE_TTL_SECS` / `USER_CACHE_NEGATIVE_TTL_SECS` | 7 days / 10 min |
/// | `MEMBER_CACHE_TTL_SECS` / `MEMBER_CACHE_NEGATIVE_TTL_SECS` | 1 day / 10 min |
/// | `TEAM_CACHE_TTL_SECS` | 1 day |
/// | `API_MAX_RETRIES` | `5` |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub organizations: Vec<String>,
    pub graph_api_url: String,
    pub graph_token: Option<String>,
    pub identity: IdentityMapper,
    pub ignored_teams: Vec<String>,
    pub ignored_orgs: Vec<String>,
    /// Groups synced as security-manager teams before the org config loads
    pub security_manager_groups: Vec<String>,
    pub config_repo: String,
    pub config_path: String,
    /// Team description; `{group}` is replaced by the source group name
    pub team_description: String,
    pub max_concurrent_teams: usize,
    pub max_concurrent_mutations: usize,
    pub cache: CachePolicies,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            github_api_url: "https://api.github.com".to_string(),
            github_token: None,
            organizations: Vec::new(),
            graph_api_url: "https://graph.microsoft.com/v1.0".to_string(),
            graph_token: None,
            identity: IdentityMapper::default(),
            ignored_teams: Vec::new(),
            ignored_orgs: Vec::new(),
            security_manager_groups: Vec::new(),
            config_repo: "teamsync-config".to_string(),
            config_path: "teamsync.yml".to_string(),
            team_description: Self::DEFAULT_DESCRIPTION.to_string(),
            max_concurrent_teams: 8,
            max_concurrent_mutations: 10,
            cache: CachePolicies::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub const DEFAULT_DESCRIPTION: &'static str =
        "Membership synced from directory group \"{group}\". Manual changes are reverted.";

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset or empty values keep their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AppConfig::default();

        let identity = IdentityMapper {
            rules: get("IDENTITY_REPLACE")
                .map(|raw| RewriteRule::parse_list(&raw))
                .unwrap_or_default(),
            prepend: get("IDENTITY_PREPEND").unwrap_or_default(),
            append: get("IDENTITY_APPEND").unwrap_or_default(),
        };

        let user_exists = TtlPolicy::new(
            seconds(&get, "USER_CACHE_TTL_SECS", defaults.cache.user_exists.positive)?,
            seconds(&get, "USER_CACHE_NEGATIVE_TTL_SECS", defaults.cache.user_exists.negative)?,
        );
        let org_member = TtlPolicy::new(
            seconds(&get, "MEMBER_CACHE_TTL_SECS", defaults.cache.org_member.positive)?,
            seconds(&get, "MEMBER_CACHE_NEGATIVE_TTL_SECS", defaults.cache.org_member.negative)?,
        );
        let team_members = seconds(&get, "TEAM_CACHE_TTL_SECS", defaults.cache.team_members)?;

        let retry = RetryPolicy {
            max_retries: number(&get, "API_MAX_RETRIES", defaults.retry.max_retries)?,
            ..defaults.retry
        };

        let config = AppConfig {
            github_api_url: get("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_token: get("GITHUB_TOKEN"),
            organizations: list(get("GITHUB_ORGS")),
            graph_api_url: get("GRAPH_API_URL").unwrap_or(defaults.graph_api_url),
            graph_token: get("GRAPH_TOKEN"),
            identity,
            ignored_teams: list(get("IGNORED_TEAMS")),
            ignored_orgs: list(get("IGNORED_ORGS")),
            security_manager_groups: list(get("SECURITY_MANAGER_GROUPS")),
            config_repo: get("CONFIG_REPO").unwrap_or(defaults.config_repo),
            config_path: get("CONFIG_PATH").unwrap_or(defaults.config_path),
            team_description: get("TEAM_DESCRIPTION").unwrap_or(defaults.team_description),
            max_concurrent_teams: number(&get, "MAX_CONCURRENT_TEAMS", defaults.max_concurrent_teams)?,
            max_concurrent_mutations: number(
                &get,
                "MAX_CONCURRENT_MUTATIONS",
                defaults.max_concurrent_mutations,
            )?,
            cache: CachePolicies {
                user_exists,
                org_member,
                team_members,
            },
            retry,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_teams == 0 || self.max_concurrent_mutations == 0 {
            return Err(Error::invalid_argument("concurrency limits must be at least 1"));
        }
        if self.config_repo.is_empty() || self.config_path.is_empty() {
            return Err(Error::invalid_argument("CONFIG_REPO and CONFIG_PATH must not be empty"));
        }
        Ok(())
    }

    /// Render the team description for a source group
    pub fn describe_team(&self, source_group: &str) -> String {
        self.team_description.replace("{group}", source_group)
    }

    pub fn is_ignored_org(&self, org: &str) -> bool {
        self.ignored_orgs.iter().any(|o| o.eq_ignore_ascii_case(org))
    }
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::invalid_argument(format!("{key} must be a non-negative integer, got '{raw}'"))),
        None => Ok(default),
    }
}

fn seconds<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    number(get, key, default.as_secs()).map(Duration::from_secs)
}
