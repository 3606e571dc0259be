//! teamsync: reconcile directory group membership onto platform teams
//!
//! A directory (Microsoft Graph) is the source of truth for group
//! membership; a collaboration platform (GitHub) holds the teams and
//! organization memberships that should mirror it. Each pass computes the
//! difference per team and applies it, recording every change and every
//! member it could not handle in a [`FleetSyncResult`].
//!
//! The entry point is [`sync::FleetSync`], built from a [`SyncContext`], a
//! [`directory::DirectorySource`] and a [`sync::OrgConnector`].

// Core modules
pub mod cache;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod identity;
pub mod notify;
pub mod platforms;
pub mod retry;
pub mod sync;
pub mod types;

// Re-exports for convenience
pub use config::{AppConfig, ConfigLoader, ConfigOutcome, OrgConfig};
pub use context::{EventSink, LogLevel, SyncContext, SyncEvent, TracingSink};
pub use error::{Error, ErrorCode, Result};
pub use identity::IdentityMapper;
pub use platforms::{CachingTeamApi, MemberListing, PendingInvite, TeamApi};
pub use types::{
    DirectoryMember, FleetSyncResult, IssueReason, OrgSyncResult, PlatformId, SyncIssue, SyncStatus,
    TeamDefinition, TeamSyncResult,
};

/// Library version
pub const VERSION_STRING: &str = concat!(env!("CARGO_PKG_VERSION"), " (teamsync)");
