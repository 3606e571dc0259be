use async_trait::async_trait;

use crate::error::Result;
use crate::platforms::platform_trait::{MemberListing, PendingInvite, TeamApi};
use crate::types::{OrgRole, PlatformId, PlatformTeam, TeamPrivacy};

use super::client::GithubClient;

/// Wrapper struct that implements the TeamApi trait for GitHub
pub struct GithubPlatform {
    client: GithubClient,
}

impl GithubPlatform {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    /// Get the underlying client (for accessing GitHub-specific methods)
    pub fn client(&self) -> &GithubClient {
        &self.client
    }
}

#[async_trait]
impl TeamApi for GithubPlatform {
    fn org(&self) -> &str {
        self.client.org()
    }

    async fn find_user(&self, candidate: &str) -> Result<Option<String>> {
        let user = self.client.get_user(candidate).await?;
        Ok(user.map(|u| u.login).filter(|login| !login.is_empty()))
    }

    async fn is_org_member(&self, user: &PlatformId) -> Result<bool> {
        let membership = self.client.get_org_membership(user.as_str()).await?;
        Ok(membership.is_some_and(|m| m.is_active()))
    }

    async fn add_org_member(&self, user: &PlatformId) -> Result<()> {
        self.client
            .set_org_membership(user.as_str(), OrgRole::Member)
            .await
            .map(|_| ())
    }

    async fn list_org_teams(&self) -> Result<Vec<PlatformTeam>> {
        let teams = self.client.get_teams().await?;
        Ok(teams.into_iter().map(PlatformTeam::from).collect())
    }

    async fn list_team_members(&self, team: &str, etag: Option<&str>) -> Result<MemberListing> {
        self.client.get_team_members(team, etag).await
    }

    async fn add_team_member(&self, team: &str, user: &PlatformId) -> Result<()> {
        self.client.add_team_membership(team, user.as_str()).await
    }

    async fn remove_team_member(&self, team: &str, user: &PlatformId) -> Result<()> {
        self.client.remove_team_membership(team, user.as_str()).await
    }

    async fn create_team(&self, name: &str, description: &str, privacy: TeamPrivacy) -> Result<PlatformTeam> {
        let team = self.client.create_team(name, description, privacy).await?;
        Ok(team.into())
    }

    async fn update_team(&self, team: &str, description: &str, privacy: TeamPrivacy) -> Result<()> {
        self.client.update_team(team, description, privacy).await
    }

    async fn list_pending_invites(&self) -> Result<Vec<PendingInvite>> {
        let invitations = self.client.get_invitations().await?;
        Ok(invitations.into_iter().map(PendingInvite::from).collect())
    }

    async fn set_org_role(&self, user: &PlatformId, role: OrgRole) -> Result<()> {
        self.client
            .set_org_membership(user.as_str(), role)
            .await
            .map(|_| ())
    }

    async fn add_security_manager_team(&self, team: &str) -> Result<()> {
        self.client.add_security_manager_team(team).await
    }

    async fn assign_copilot_seats(&self, teams: &[String]) -> Result<u64> {
        self.client.add_copilot_teams(teams).await
    }
}
