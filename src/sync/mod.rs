//! Reconciliation engine
//!
//! Bottom-up: [`reconcile`] computes and applies one team's diff,
//! [`team`] drives a team from directory group to platform roster,
//! [`org`] runs one organization pass and [`fleet`] runs every
//! organization concurrently.

pub mod fleet;
pub mod org;
pub mod reconcile;
pub mod resolve;
pub mod team;

pub use fleet::{FleetSync, OrgClients, OrgConnector};
pub use org::OrgSyncOrchestrator;
pub use reconcile::{apply, diff, ApplyOutcome, MembershipDiff};
pub use resolve::{MemberResolver, ResolvedGroup, ResolvedMember};
pub use team::{OrgMembershipGate, PendingInvites, TeamSyncCoordinator};
