//! Per-team reconciliation

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{LogLevel, SyncContext, SyncEvent};
use crate::error::Result;
use crate::notify::{ChangeEvent, ChangeKind};
use crate::platforms::{CachingTeamApi, PendingInvite};
use crate::types::{IssueReason, PlatformId, SyncIssue, SyncStatus, TeamDefinition, TeamPrivacy, TeamSyncResult};

use super::reconcile;
use super::resolve::MemberResolver;

/// How a team sync decides whether a candidate may join the organization's
/// teams
#[derive(Debug, Clone)]
pub enum OrgMembershipGate {
    /// Adding to a team grants org access; no check
    AssumedViaTeams,
    /// The resolved members group is the source of truth
    Authoritative(Arc<BTreeSet<PlatformId>>),
    /// Ask the platform (cached) per candidate
    Verify,
}

impl OrgMembershipGate {
    async fn admits(&self, api: &CachingTeamApi, user: &PlatformId) -> Result<bool> {
        match self {
            OrgMembershipGate::AssumedViaTeams => Ok(true),
            OrgMembershipGate::Authoritative(members) => Ok(members.contains(user)),
            OrgMembershipGate::Verify => api.is_org_member(user).await,
        }
    }
}

/// Accounts with an organization invitation that has not been accepted.
///
/// Logins are compared case-insensitively, the way the platform treats them.
#[derive(Debug, Clone, Default)]
pub struct PendingInvites {
    logins: BTreeSet<String>,
}

impl PendingInvites {
    pub fn from_invites(invites: &[PendingInvite]) -> Self {
        PendingInvites {
            logins: invites
                .iter()
                .filter_map(|invite| invite.login.as_deref())
                .map(str::to_ascii_lowercase)
                .collect(),
        }
    }

    pub fn contains(&self, user: &PlatformId) -> bool {
        self.logins.contains(&user.as_str().to_ascii_lowercase())
    }

    /// Record an invitation sent during this pass
    pub fn insert(&mut self, user: &PlatformId) {
        self.logins.insert(user.as_str().to_ascii_lowercase());
    }

    pub fn len(&self) -> usize {
        self.logins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }
}

/// Drives one team from its directory group to its platform roster.
///
/// Everything shared by the teams of an org pass is borrowed: the resolver
/// (so each group is read once), the pending invitations and the gate.
pub struct TeamSyncCoordinator<'a> {
    pub(crate) ctx: &'a SyncContext,
    pub(crate) api: &'a CachingTeamApi,
    pub(crate) resolver: &'a MemberResolver,
    pub(crate) invites: &'a PendingInvites,
    pub(crate) gate: &'a OrgMembershipGate,
    pub(crate) correlation_id: Uuid,
}

impl<'a> TeamSyncCoordinator<'a> {
    /// Reconcile `team`, addressed on the platform as `slug`.
    ///
    /// Ends `skipped` if the source group cannot be read, `failed` if the
    /// team's own member list cannot be read or a step did not complete,
    /// `completed` otherwise. Per-member failures are issues and never stop
    /// the other members.
    pub async fn sync(&self, team: &TeamDefinition, slug: &str) -> TeamSyncResult {
        let org = self.api.org();
        let mut result = TeamSyncResult::new(&team.team_name, &team.source_group);

        let resolved = match self.resolver.resolve(&team.source_group).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(org, team = %team.team_name, group = %team.source_group, error = %e, "Directory lookup failed, skipping team");
                result.record_error("resolve_members", e.to_string());
                let result = result.finish_with(SyncStatus::Skipped);
                self.emit(&result, LogLevel::Warning, Some(e.to_string()));
                return result;
            }
        };
        result.issues.extend(resolved.issues.iter().cloned());

        // invited accounts are neither added nor removed until they accept
        let mut candidates = Vec::new();
        for member in &resolved.members {
            if self.invites.contains(&member.id) {
                result.deferred.insert(member.id.clone());
            } else {
                candidates.push(member);
            }
        }

        let (api, gate) = (self.api, self.gate);
        let verdicts: Vec<_> = stream::iter(candidates)
            .map(move |member| async move { (member, gate.admits(api, &member.id).await) })
            .buffered(self.ctx.config.max_concurrent_mutations.max(1))
            .boxed()
            .collect()
            .await;

        let mut desired = BTreeSet::new();
        for (member, verdict) in verdicts {
            match verdict {
                Ok(true) => {
                    desired.insert(member.id.clone());
                }
                Ok(false) => result.issues.push(SyncIssue::new(
                    member.email.as_str(),
                    member.id.as_str(),
                    IssueReason::NotOrgMember,
                )),
                Err(e) => result.issues.push(
                    SyncIssue::new(member.email.as_str(), member.id.as_str(), IssueReason::LookupFailed)
                        .with_detail(e.to_string()),
                ),
            }
        }

        let actual = match self.api.team_members(slug).await {
            Ok(actual) => actual,
            Err(e) => {
                warn!(org, team = slug, error = %e, "Failed to list team members");
                result.record_error("list_team_members", e.to_string());
                let result = result.finish_with(SyncStatus::Failed);
                self.emit(&result, LogLevel::Error, Some(e.to_string()));
                return result;
            }
        };

        let (actual, invited) = self.split_invited(actual);
        result.deferred.extend(invited);

        let diff = reconcile::diff(&desired, &actual);
        if !diff.is_empty() {
            debug!(
                org,
                team = slug,
                to_add = diff.to_add.len(),
                to_remove = diff.to_remove.len(),
                "Applying membership changes"
            );
            let outcome =
                reconcile::apply(self.api.inner(), slug, &diff, self.ctx.config.max_concurrent_mutations).await;
            result.added = outcome.added;
            result.removed = outcome.removed;
            if !outcome.issues.is_empty() {
                result.record_error(
                    "apply_changes",
                    format!("{} membership changes failed", outcome.issues.len()),
                );
                result.issues.extend(outcome.issues);
            }
            self.api.forget_team(slug).await;
        }

        let description = self.ctx.config.describe_team(&team.source_group);
        if let Err(e) = self
            .api
            .inner()
            .update_team(slug, &description, TeamPrivacy::Closed)
            .await
        {
            warn!(org, team = slug, error = %e, "Failed to update team metadata");
            result.record_error("update_team", e.to_string());
        }

        if !result.added.is_empty() {
            self.ctx
                .notifier
                .notify(ChangeEvent::new(ChangeKind::MembersAdded, org, &team.team_name))
                .await;
        }
        if !result.removed.is_empty() {
            self.ctx
                .notifier
                .notify(ChangeEvent::new(ChangeKind::MembersRemoved, org, &team.team_name))
                .await;
        }

        let result = result.finish();
        info!(
            org,
            team = %result.team,
            status = result.status.as_str(),
            added = result.added.len(),
            removed = result.removed.len(),
            deferred = result.deferred.len(),
            issues = result.issues.len(),
            "Team sync finished"
        );
        let level = if result.status == SyncStatus::Completed {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        self.emit(&result, level, None);
        result
    }

    fn split_invited(&self, ids: BTreeSet<PlatformId>) -> (BTreeSet<PlatformId>, BTreeSet<PlatformId>) {
        let (invited, rest): (BTreeSet<_>, BTreeSet<_>) = ids.into_iter().partition(|id| self.invites.contains(id));
        (rest, invited)
    }

    fn emit(&self, result: &TeamSyncResult, level: LogLevel, detail: Option<String>) {
        let mut event = SyncEvent::new(
            level,
            "team_sync",
            self.api.org(),
            result.status.as_str(),
            self.correlation_id,
        )
        .with_team(&result.team);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.ctx.emit(event);
    }
}
