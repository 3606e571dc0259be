//! Organization membership, roles and org-level features

use reqwest::StatusCode;

use crate::error::Result;
use crate::types::OrgRole;

use super::client::GithubClient;
use super::types::{
    CopilotSeatsResponse, CopilotTeamsRequest, GithubInvitation, GithubMembership, MembershipRequest,
};

impl GithubClient {
    /// Membership of a user in the organization
    ///
    /// # Returns
    /// `None` when the user is neither a member nor invited
    ///
    /// # API Endpoint
    /// GET /orgs/{org}/memberships/{username}
    pub async fn get_org_membership(&self, username: &str) -> Result<Option<GithubMembership>> {
        let endpoint = self.endpoint(&["orgs", self.org(), "memberships", username])?;
        let response = self.get(&endpoint).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    /// Add a user to the organization or change their role. Non-members
    /// receive an invitation.
    ///
    /// # API Endpoint
    /// PUT /orgs/{org}/memberships/{username}
    pub async fn set_org_membership(&self, username: &str, role: OrgRole) -> Result<GithubMembership> {
        let endpoint = self.endpoint(&["orgs", self.org(), "memberships", username])?;
        let response = self.put(&endpoint, &MembershipRequest::org(role)).await?;
        self.handle_response(response).await
    }

    /// Pending organization invitations
    ///
    /// # API Endpoint
    /// GET /orgs/{org}/invitations
    pub async fn get_invitations(&self) -> Result<Vec<GithubInvitation>> {
        let endpoint = self.endpoint(&["orgs", self.org(), "invitations"])?;
        self.get_paginated(&endpoint).await
    }

    /// Grant the security manager role to a team
    ///
    /// # API Endpoint
    /// PUT /orgs/{org}/security-managers/teams/{team_slug}
    pub async fn add_security_manager_team(&self, team_slug: &str) -> Result<()> {
        let endpoint = self.endpoint(&["orgs", self.org(), "security-managers", "teams", team_slug])?;
        let response = self.put(&endpoint, &serde_json::json!({})).await?;
        self.handle_empty(response).await
    }

    /// Assign Copilot seats to every member of the given teams
    ///
    /// # API Endpoint
    /// POST /orgs/{org}/copilot/billing/selected_teams
    pub async fn add_copilot_teams(&self, team_slugs: &[String]) -> Result<u64> {
        let endpoint = self.endpoint(&["orgs", self.org(), "copilot", "billing", "selected_teams"])?;
        let body = CopilotTeamsRequest {
            selected_teams: team_slugs,
        };
        let response = self.post(&endpoint, &body).await?;
        let created: CopilotSeatsResponse = self.handle_response(response).await?;
        Ok(created.seats_created)
    }
}
