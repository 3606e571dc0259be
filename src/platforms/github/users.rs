use reqwest::StatusCode;

use crate::error::Result;

use super::client::GithubClient;
use super::types::{GithubOrg, GithubUser};

impl GithubClient {
    /// Get a user by login
    ///
    /// # Returns
    /// `None` when no such account exists
    ///
    /// # API Endpoint
    /// GET /users/{username}
    pub async fn get_user(&self, username: &str) -> Result<Option<GithubUser>> {
        let endpoint = self.endpoint(&["users", username])?;
        let response = self.get(&endpoint).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    /// Organizations the token can see
    ///
    /// # API Endpoint
    /// GET /user/orgs
    pub async fn get_user_orgs(&self) -> Result<Vec<GithubOrg>> {
        self.get_paginated("/user/orgs").await
    }
}
