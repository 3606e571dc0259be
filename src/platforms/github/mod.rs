//! GitHub platform adapter
//!
//! REST client for the organization, team and membership endpoints the
//! sync drives, with rate limit handling, `Link` pagination and
//! conditional member listings.

mod client;
mod config_loader;
mod connector;
mod orgs;
mod platform_impl;
mod rate_limit;
mod teams;
mod types;
mod users;

pub use client::GithubClient;
pub use config_loader::RepoConfigLoader;
pub use connector::StaticTokenConnector;
pub use platform_impl::GithubPlatform;
pub use rate_limit::RateLimitSignal;
pub use types::*;
