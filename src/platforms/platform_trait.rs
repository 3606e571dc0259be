//! Platform trait defining the team/org membership operations the sync drives

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{OrgRole, PlatformId, PlatformTeam, TeamPrivacy};

/// Response of a conditional team member listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberListing {
    /// Fresh member logins, with the etag to send next time (if the
    /// platform offered one that covers the whole listing)
    Changed {
        members: Vec<String>,
        etag: Option<String>,
    },
    /// The etag sent with the request still matches
    NotModified,
}

/// An organization invitation that has not been accepted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvite {
    /// Invited account; absent for invitations sent by email only
    pub login: Option<String>,
    pub email: Option<String>,
}

impl PendingInvite {
    pub fn for_login(login: impl Into<String>) -> Self {
        PendingInvite {
            login: Some(login.into()),
            email: None,
        }
    }
}

/// Team and organization membership operations of one organization.
///
/// Each implementation is bound to a single organization. Mutating methods
/// take `&PlatformId`: only logins returned by the platform can be added,
/// removed or promoted.
#[async_trait]
pub trait TeamApi: Send + Sync {
    /// Organization this client operates on
    fn org(&self) -> &str;

    /// Canonical login of the account `candidate` names, or `None` when no
    /// such account exists. Lookups may ignore case; the returned login is
    /// the one team listings use.
    async fn find_user(&self, candidate: &str) -> Result<Option<String>>;

    /// Whether the account is a (non-pending) member of the organization
    async fn is_org_member(&self, user: &PlatformId) -> Result<bool>;

    /// Add the account to the organization. Platforms that require consent
    /// create an invitation instead.
    async fn add_org_member(&self, user: &PlatformId) -> Result<()>;

    /// All teams of the organization
    async fn list_org_teams(&self) -> Result<Vec<PlatformTeam>>;

    /// Team member logins, conditional on `etag` when one is given
    async fn list_team_members(&self, team: &str, etag: Option<&str>) -> Result<MemberListing>;

    async fn add_team_member(&self, team: &str, user: &PlatformId) -> Result<()>;

    async fn remove_team_member(&self, team: &str, user: &PlatformId) -> Result<()>;

    async fn create_team(&self, name: &str, description: &str, privacy: TeamPrivacy) -> Result<PlatformTeam>;

    /// Overwrite the team's description and visibility
    async fn update_team(&self, team: &str, description: &str, privacy: TeamPrivacy) -> Result<()>;

    async fn list_pending_invites(&self) -> Result<Vec<PendingInvite>>;

    async fn set_org_role(&self, user: &PlatformId, role: OrgRole) -> Result<()>;

    /// Grant the security-manager role to a team
    async fn add_security_manager_team(&self, team: &str) -> Result<()>;

    /// Assign Copilot seats to every member of the given teams. Returns the
    /// number of seats newly created.
    async fn assign_copilot_seats(&self, teams: &[String]) -> Result<u64>;
}
