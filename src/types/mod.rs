//! Core types for teamsync
//!
//! This module contains the data model shared by the directory side, the
//! platform side and the orchestrators.

pub mod member;
pub mod report;
pub mod team;

// Re-export for convenience
pub use member::{DirectoryMember, IssueReason, PlatformId, SyncIssue};
pub use report::{CopilotResult, FleetSyncResult, OrgSyncResult, StepError, SyncStatus, TeamSyncResult};
pub use team::{sanitize_team_name, OrgRole, PlatformTeam, Team, TeamDefinition, TeamPrivacy};
