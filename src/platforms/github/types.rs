//! GitHub REST payloads

use serde::{Deserialize, Serialize};

use crate::platforms::platform_trait::PendingInvite;
use crate::types::{OrgRole, PlatformTeam, TeamPrivacy};

/// A team as returned by `/orgs/{org}/teams`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubTeam {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Option<String>,
}

impl From<GithubTeam> for PlatformTeam {
    fn from(team: GithubTeam) -> Self {
        PlatformTeam {
            id: team.id,
            name: team.name,
            slug: team.slug,
            description: team.description.filter(|d| !d.is_empty()),
        }
    }
}

/// Minimal user object (team members, org listings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
}

/// Organization listing entry of `/user/orgs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubOrg {
    pub login: String,
}

/// Pending organization invitation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubInvitation {
    pub id: u64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<GithubInvitation> for PendingInvite {
    fn from(invite: GithubInvitation) -> Self {
        PendingInvite {
            login: invite.login,
            email: invite.email,
        }
    }
}

/// `/orgs/{org}/memberships/{user}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubMembership {
    /// `active` or `pending`
    pub state: String,
    pub role: String,
}

impl GithubMembership {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

#[derive(Debug, Serialize)]
pub struct MembershipRequest {
    pub role: &'static str,
}

impl MembershipRequest {
    pub fn org(role: OrgRole) -> Self {
        MembershipRequest { role: role.as_str() }
    }

    pub fn team_member() -> Self {
        MembershipRequest { role: "member" }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTeamRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub privacy: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UpdateTeamRequest<'a> {
    pub description: &'a str,
    pub privacy: &'static str,
}

impl<'a> UpdateTeamRequest<'a> {
    pub fn new(description: &'a str, privacy: TeamPrivacy) -> Self {
        UpdateTeamRequest {
            description,
            privacy: privacy.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CopilotTeamsRequest<'a> {
    pub selected_teams: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct CopilotSeatsResponse {
    pub seats_created: u64,
}
