//! Team management operations for GitHub

use reqwest::header::ETAG;
use reqwest::StatusCode;

use crate::error::Result;
use crate::platforms::platform_trait::MemberListing;
use crate::types::TeamPrivacy;

use super::client::{next_link, with_per_page, GithubClient};
use super::types::{CreateTeamRequest, GithubTeam, GithubUser, MembershipRequest, UpdateTeamRequest};

impl GithubClient {
    /// Get all teams of the organization
    ///
    /// # API Endpoint
    /// GET /orgs/{org}/teams
    pub async fn get_teams(&self) -> Result<Vec<GithubTeam>> {
        let endpoint = self.endpoint(&["orgs", self.org(), "teams"])?;
        self.get_paginated(&endpoint).await
    }

    /// Create a team
    ///
    /// # API Endpoint
    /// POST /orgs/{org}/teams
    pub async fn create_team(&self, name: &str, description: &str, privacy: TeamPrivacy) -> Result<GithubTeam> {
        let endpoint = self.endpoint(&["orgs", self.org(), "teams"])?;
        let body = CreateTeamRequest {
            name,
            description,
            privacy: privacy.as_str(),
        };
        let response = self.post(&endpoint, &body).await?;
        self.handle_response(response).await
    }

    /// Overwrite description and privacy
    ///
    /// # API Endpoint
    /// PATCH /orgs/{org}/teams/{team_slug}
    pub async fn update_team(&self, team_slug: &str, description: &str, privacy: TeamPrivacy) -> Result<()> {
        let endpoint = self.endpoint(&["orgs", self.org(), "teams", team_slug])?;
        let response = self
            .patch(&endpoint, &UpdateTeamRequest::new(description, privacy))
            .await?;
        self.handle_empty(response).await
    }

    /// List direct team members, conditional on `etag`.
    ///
    /// A single-page listing carries the response's etag. When the team
    /// spans several pages no etag is returned: one page's etag does not
    /// cover the others.
    ///
    /// # API Endpoint
    /// GET /orgs/{org}/teams/{team_slug}/members
    pub async fn get_team_members(&self, team_slug: &str, etag: Option<&str>) -> Result<MemberListing> {
        let endpoint = with_per_page(&self.endpoint(&["orgs", self.org(), "teams", team_slug, "members"])?);
        let response = self.get_conditional(&endpoint, etag).await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(MemberListing::NotModified);
        }

        let fresh_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut next = next_link(response.headers());
        let first: Vec<GithubUser> = self.handle_response(response).await?;
        let mut members: Vec<String> = first.into_iter().map(|u| u.login).collect();

        if next.is_none() {
            return Ok(MemberListing::Changed {
                members,
                etag: fresh_etag,
            });
        }
        while let Some(url) = next {
            let response = self.get(&url).await?;
            next = next_link(response.headers());
            let page: Vec<GithubUser> = self.handle_response(response).await?;
            members.extend(page.into_iter().map(|u| u.login));
        }
        Ok(MemberListing::Changed { members, etag: None })
    }

    /// Add or update a team membership
    ///
    /// # API Endpoint
    /// PUT /orgs/{org}/teams/{team_slug}/memberships/{username}
    pub async fn add_team_membership(&self, team_slug: &str, username: &str) -> Result<()> {
        let endpoint = self.endpoint(&["orgs", self.org(), "teams", team_slug, "memberships", username])?;
        let response = self.put(&endpoint, &MembershipRequest::team_member()).await?;
        self.handle_empty(response).await
    }

    /// Remove a team membership
    ///
    /// # API Endpoint
    /// DELETE /orgs/{org}/teams/{team_slug}/memberships/{username}
    pub async fn remove_team_membership(&self, team_slug: &str, username: &str) -> Result<()> {
        let endpoint = self.endpoint(&["orgs", self.org(), "teams", team_slug, "memberships", username])?;
        let response = self.delete(&endpoint).await?;
        self.handle_empty(response).await
    }
}
