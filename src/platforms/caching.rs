//! Cache policy composed with a raw [`TeamApi`] client
//!
//! Read operations that the sync repeats on every pass go through here:
//! existence checks and org-membership checks use the read-through TTL
//! cache, team member lists use etag records. Mutations are not wrapped;
//! callers use [`CachingTeamApi::inner`] for them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{self, keys, CachePolicies, MembershipCache};
use crate::error::{Error, Result};
use crate::types::{PlatformId, PlatformTeam, Team};

use super::platform_trait::{MemberListing, TeamApi};

/// Etag and member list of one team, stored as a single entry so the two
/// are always written together
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EtagRecord {
    etag: String,
    members: Vec<String>,
}

/// A platform client with named cache policies per operation
#[derive(Clone)]
pub struct CachingTeamApi {
    inner: Arc<dyn TeamApi>,
    cache: Arc<dyn MembershipCache>,
    policies: CachePolicies,
}

impl CachingTeamApi {
    pub fn new(inner: Arc<dyn TeamApi>, cache: Arc<dyn MembershipCache>, policies: CachePolicies) -> Self {
        CachingTeamApi {
            inner,
            cache,
            policies,
        }
    }

    /// The uncached client, for mutations
    pub fn inner(&self) -> &dyn TeamApi {
        self.inner.as_ref()
    }

    pub fn org(&self) -> &str {
        self.inner.org()
    }

    /// Existence check for a candidate id.
    ///
    /// Returns the [`PlatformId`] of the account's canonical login, which
    /// may differ in case from the candidate, or `None` when no such
    /// account exists. Empty candidates are rejected without a platform
    /// call.
    pub async fn validate_candidate(&self, candidate: &str) -> Result<Option<PlatformId>> {
        if candidate.trim().is_empty() {
            return Ok(None);
        }
        let policy = self.policies.user_exists;
        let login = cache::get_or_compute(
            self.cache.as_ref(),
            &keys::user_exists(candidate),
            |login: &Option<String>| policy.ttl_for(login.is_some()),
            || self.inner.find_user(candidate),
        )
        .await?;
        Ok(login.map(PlatformId::new))
    }

    pub async fn is_org_member(&self, user: &PlatformId) -> Result<bool> {
        let policy = self.policies.org_member;
        cache::get_or_compute(
            self.cache.as_ref(),
            &keys::org_member(self.org(), user.as_str()),
            |member: &bool| policy.ttl_for(*member),
            || self.inner.is_org_member(user),
        )
        .await
    }

    /// Drop the cached org-membership answer for `user`
    pub async fn forget_org_member(&self, user: &PlatformId) {
        self.cache
            .invalidate(&keys::org_member(self.org(), user.as_str()))
            .await;
    }

    /// Current members of a team, served from the etag record when the
    /// platform confirms nothing changed.
    ///
    /// Fails closed: if the freshness check errors, nothing is served.
    pub async fn team_members(&self, team: &str) -> Result<BTreeSet<PlatformId>> {
        let key = keys::team_members(self.org(), team);

        if let Some(record) = self.load_record(&key).await {
            match self.inner.list_team_members(team, Some(&record.etag)).await? {
                MemberListing::NotModified => {
                    debug!(org = self.org(), team, "Team members unchanged, serving cached list");
                    self.cache.touch(&key, self.policies.team_members).await;
                    return Ok(to_platform_ids(record.members));
                }
                MemberListing::Changed { members, etag } => {
                    return Ok(self.store_record(&key, members, etag).await);
                }
            }
        }

        match self.inner.list_team_members(team, None).await? {
            MemberListing::Changed { members, etag } => Ok(self.store_record(&key, members, etag).await),
            MemberListing::NotModified => Err(Error::invalid_state(format!(
                "platform reported no changes for an unconditional listing of team {team}"
            ))),
        }
    }

    /// Listing plus current members
    pub async fn snapshot(&self, team: &PlatformTeam) -> Result<Team> {
        let members = self.team_members(&team.slug).await?;
        Ok(Team::new(team.clone(), members))
    }

    /// Drop the cached member list of a team
    pub async fn forget_team(&self, team: &str) {
        self.cache.invalidate(&keys::team_members(self.org(), team)).await;
    }

    async fn load_record(&self, key: &str) -> Option<EtagRecord> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str::<EtagRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, error = %e, "Inconsistent team member cache entry, refetching");
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    async fn store_record(&self, key: &str, members: Vec<String>, etag: Option<String>) -> BTreeSet<PlatformId> {
        match etag {
            Some(etag) => {
                let record = EtagRecord {
                    etag,
                    members: members.clone(),
                };
                match serde_json::to_string(&record) {
                    Ok(raw) => self.cache.set(key, raw, self.policies.team_members).await,
                    Err(e) => warn!(key, error = %e, "Failed to encode team member cache entry"),
                }
            }
            None => {
                self.cache.invalidate(key).await;
            }
        }
        to_platform_ids(members)
    }
}

fn to_platform_ids(members: Vec<String>) -> BTreeSet<PlatformId> {
    members.into_iter().map(PlatformId::new).collect()
}
