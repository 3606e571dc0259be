//! One organization pass
//!
//! The preparatory steps run in order because every team depends on their
//! results: pending invitations and existing teams, security-manager teams,
//! the organization's configuration, team creation and the org membership
//! gate. Only then are the managed teams reconciled concurrently, followed
//! by owner promotion and Copilot seat assignment.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigLoader, ConfigOutcome, OrgConfig};
use crate::context::{LogLevel, SyncContext, SyncEvent};
use crate::directory::DirectorySource;
use crate::error::{Error, Result};
use crate::notify::{ChangeEvent, ChangeKind};
use crate::platforms::{CachingTeamApi, TeamApi};
use crate::types::{
    CopilotResult, IssueReason, OrgRole, OrgSyncResult, PlatformId, PlatformTeam, SyncIssue, SyncStatus,
    TeamDefinition, TeamPrivacy, TeamSyncResult,
};

use super::resolve::MemberResolver;
use super::team::{OrgMembershipGate, PendingInvites, TeamSyncCoordinator};

enum OrgMemberAdd {
    Added(PlatformId),
    AlreadyMember,
    Failed(SyncIssue),
}

/// Reconciles every managed team of one organization
pub struct OrgSyncOrchestrator {
    ctx: SyncContext,
    directory: Arc<dyn DirectorySource>,
    api: CachingTeamApi,
    loader: Arc<dyn ConfigLoader>,
    correlation_id: Uuid,
}

impl OrgSyncOrchestrator {
    pub fn new(
        ctx: SyncContext,
        directory: Arc<dyn DirectorySource>,
        api: Arc<dyn TeamApi>,
        loader: Arc<dyn ConfigLoader>,
    ) -> Self {
        let api = CachingTeamApi::new(api, ctx.cache.clone(), ctx.config.cache);
        OrgSyncOrchestrator {
            ctx,
            directory,
            api,
            loader,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Use a correlation id chosen by the caller
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Run one pass. Never fails: every problem ends up in the result.
    pub async fn run(&self) -> OrgSyncResult {
        let span = info_span!("org_sync", org = %self.api.org(), correlation_id = %self.correlation_id);
        self.run_steps().instrument(span).await
    }

    async fn run_steps(&self) -> OrgSyncResult {
        let mut result = OrgSyncResult::new(self.api.org(), self.correlation_id);
        info!("Starting organization sync");

        let pending = match self.api.inner().list_pending_invites().await {
            Ok(pending) => pending,
            Err(e) => return self.abort(result, "list_pending_invites", e),
        };
        let mut existing = match self.api.inner().list_org_teams().await {
            Ok(teams) => teams,
            Err(e) => return self.abort(result, "list_org_teams", e),
        };
        let mut invites = PendingInvites::from_invites(&pending);
        info!(
            pending_invites = invites.len(),
            existing_teams = existing.len(),
            "Loaded organization state"
        );

        let resolver = MemberResolver::new(
            self.directory.clone(),
            self.api.clone(),
            self.ctx.config.identity.clone(),
            self.ctx.config.max_concurrent_mutations,
        );

        let static_security: Vec<TeamDefinition> = self
            .ctx
            .config
            .security_manager_groups
            .iter()
            .map(|group| TeamDefinition::new(group.as_str()))
            .filter(|team| !self.is_ignored(team))
            .collect();
        self.sync_security_managers(&static_security, &resolver, &invites, &mut existing, &mut result)
            .await;

        let config = match self.loader.org_config().await {
            Ok(ConfigOutcome::Loaded(config)) => config,
            Ok(ConfigOutcome::NoConfig) => return self.end_early(result, SyncStatus::NoConfig, None),
            Err(e) if e.is_not_found() => return self.end_early(result, SyncStatus::NoConfig, None),
            Ok(ConfigOutcome::BadConfig(message)) => {
                return self.end_early(result, SyncStatus::BadConfig, Some(message))
            }
            Err(e) => {
                result.record_error("load_config", e.to_string());
                return self.end_early(result, SyncStatus::Failed, Some(e.to_string()));
            }
        };

        let required = config.required_teams(&self.ctx.config.ignored_teams);
        let mut platform_teams: BTreeMap<String, PlatformTeam> = BTreeMap::new();
        for team in &required {
            match self.ensure_team(team, &mut existing, &mut result).await {
                Ok(found) => {
                    platform_teams.insert(team.team_name.clone(), found);
                }
                Err(e) => {
                    error!(team = %team.team_name, error = %e, "Failed to create team");
                    result.record_error("create_team", format!("{}: {e}", team.team_name));
                }
            }
        }

        let config_security: Vec<TeamDefinition> = config
            .security_manager_teams()
            .into_iter()
            .filter(|team| !self.is_ignored(team))
            .filter(|team| !static_security.iter().any(|s| s.matches(&team.team_name)))
            .collect();
        self.sync_security_managers(&config_security, &resolver, &invites, &mut existing, &mut result)
            .await;

        let gate = self.select_gate(&config, &resolver, &mut invites, &mut result).await;

        let targets: Vec<&TeamDefinition> = required
            .iter()
            .filter(|team| {
                !static_security
                    .iter()
                    .chain(config_security.iter())
                    .any(|s| s.matches(&team.team_name))
            })
            .collect();
        info!(teams = targets.len(), "Reconciling teams");

        let coordinator = TeamSyncCoordinator {
            ctx: &self.ctx,
            api: &self.api,
            resolver: &resolver,
            invites: &invites,
            gate: &gate,
            correlation_id: self.correlation_id,
        };
        let coordinator = &coordinator;
        let platform_teams_ref = &platform_teams;
        let mut teams: Vec<TeamSyncResult> = stream::iter(targets)
            .map(move |team| async move {
                match platform_teams_ref.get(&team.team_name) {
                    Some(found) => coordinator.sync(team, &found.slug).await,
                    None => {
                        let mut missing = TeamSyncResult::new(&team.team_name, &team.source_group);
                        missing.record_error("create_team", "team does not exist on the platform");
                        missing.finish_with(SyncStatus::Failed)
                    }
                }
            })
            .buffer_unordered(self.ctx.config.max_concurrent_teams)
            .boxed()
            .collect()
            .await;
        teams.sort_by(|a, b| a.team.cmp(&b.team));
        result.teams = teams;

        if let Some(owners) = config.owners_team().filter(|team| !self.is_ignored(team)) {
            self.promote_owners(&owners, &platform_teams, &mut result).await;
        }

        self.assign_copilot(&config, &platform_teams, &mut result).await;

        let result = result.finish();
        let failed_teams = result
            .teams
            .iter()
            .filter(|t| t.status != SyncStatus::Completed)
            .count();
        info!(
            status = result.status.as_str(),
            teams = result.teams.len(),
            failed_teams,
            created = result.created_teams.len(),
            "Organization sync finished"
        );
        let level = if result.status == SyncStatus::Completed {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        self.ctx.emit(self.event(level, "org_sync", result.status.as_str()));
        result
    }

    fn is_ignored(&self, team: &TeamDefinition) -> bool {
        self.ctx.config.ignored_teams.iter().any(|name| team.matches(name))
    }

    fn event(&self, level: LogLevel, operation: &'static str, status: &str) -> SyncEvent {
        SyncEvent::new(level, operation, self.api.org(), status, self.correlation_id)
    }

    /// A preparatory step every team depends on failed
    fn abort(&self, mut result: OrgSyncResult, step: &str, e: Error) -> OrgSyncResult {
        error!(step, error = %e, "Organization sync aborted");
        result.record_error(step, e.to_string());
        result.message = Some(e.to_string());
        self.ctx
            .emit(self.event(LogLevel::Error, "org_sync", SyncStatus::Failed.as_str()).with_detail(e.to_string()));
        result.finish_with(SyncStatus::Failed)
    }

    /// End the pass at the configuration step
    fn end_early(&self, mut result: OrgSyncResult, status: SyncStatus, message: Option<String>) -> OrgSyncResult {
        let security_failed = !result.errors.is_empty()
            || result
                .security_manager_teams
                .iter()
                .any(|t| t.status != SyncStatus::Completed);
        let status = if status == SyncStatus::NoConfig && security_failed {
            SyncStatus::Failed
        } else {
            status
        };

        let level = match status {
            SyncStatus::NoConfig => {
                info!("No configuration found, organization is not onboarded");
                LogLevel::Info
            }
            _ => {
                warn!(status = status.as_str(), message = message.as_deref().unwrap_or(""), "Organization configuration unusable");
                LogLevel::Warning
            }
        };
        let mut event = self.event(level, "org_config", status.as_str());
        if let Some(message) = &message {
            event = event.with_detail(message.as_str());
        }
        self.ctx.emit(event);

        result.message = message;
        result.finish_with(status)
    }

    /// Find the team among the existing ones or create it
    async fn ensure_team(
        &self,
        team: &TeamDefinition,
        existing: &mut Vec<PlatformTeam>,
        result: &mut OrgSyncResult,
    ) -> Result<PlatformTeam> {
        if let Some(found) = existing
            .iter()
            .find(|t| team.matches(&t.slug) || team.matches(&t.name))
        {
            return Ok(found.clone());
        }

        let description = self.ctx.config.describe_team(&team.source_group);
        let created = self
            .api
            .inner()
            .create_team(&team.team_name, &description, TeamPrivacy::Closed)
            .await?;
        info!(team = %team.team_name, slug = %created.slug, "Created team");

        result.created_teams.push(team.team_name.clone());
        self.ctx
            .notifier
            .notify(ChangeEvent::new(ChangeKind::TeamCreated, self.api.org(), &team.team_name))
            .await;
        self.ctx
            .emit(self.event(LogLevel::Info, "create_team", "completed").with_team(&team.team_name));

        existing.push(created.clone());
        Ok(created)
    }

    /// Ensure, reconcile and grant the security-manager role, team by team
    async fn sync_security_managers(
        &self,
        teams: &[TeamDefinition],
        resolver: &MemberResolver,
        invites: &PendingInvites,
        existing: &mut Vec<PlatformTeam>,
        result: &mut OrgSyncResult,
    ) {
        // the org config may not be trusted yet, so ask the platform
        let gate = OrgMembershipGate::Verify;
        for team in teams {
            let slug = match self.ensure_team(team, existing, result).await {
                Ok(found) => found.slug,
                Err(e) => {
                    error!(team = %team.team_name, error = %e, "Failed to create security manager team");
                    let mut failed = TeamSyncResult::new(&team.team_name, &team.source_group);
                    failed.record_error("create_team", e.to_string());
                    result.security_manager_teams.push(failed.finish_with(SyncStatus::Failed));
                    continue;
                }
            };

            let coordinator = TeamSyncCoordinator {
                ctx: &self.ctx,
                api: &self.api,
                resolver,
                invites,
                gate: &gate,
                correlation_id: self.correlation_id,
            };
            result.security_manager_teams.push(coordinator.sync(team, &slug).await);

            if let Err(e) = self.api.inner().add_security_manager_team(&slug).await {
                error!(team = %slug, error = %e, "Failed to grant security manager role");
                result.record_error("security_manager_role", format!("{slug}: {e}"));
            }
        }
    }

    async fn select_gate(
        &self,
        config: &OrgConfig,
        resolver: &MemberResolver,
        invites: &mut PendingInvites,
        result: &mut OrgSyncResult,
    ) -> OrgMembershipGate {
        if config.assume_membership_via_teams {
            let mut roster = BTreeSet::new();
            for team in config.managed_teams().iter().filter(|t| !self.is_ignored(t)) {
                // unreadable groups are reported by their team sync
                if let Ok(resolved) = resolver.resolve(&team.source_group).await {
                    roster.extend(resolved.ids());
                }
            }
            self.add_org_members(&roster, invites, result, "").await;
            return OrgMembershipGate::AssumedViaTeams;
        }

        let Some(members) = config.members_team() else {
            return OrgMembershipGate::Verify;
        };
        match resolver.resolve(&members.source_group).await {
            Ok(resolved) => {
                let ids = resolved.ids();
                self.add_org_members(&ids, invites, result, &members.team_name).await;
                OrgMembershipGate::Authoritative(Arc::new(ids))
            }
            Err(e) => {
                error!(group = %members.source_group, error = %e, "Failed to resolve organization members group");
                result.record_error("members_group", e.to_string());
                OrgMembershipGate::Verify
            }
        }
    }

    /// Add every id that is neither a member nor invited yet. Platforms
    /// answer with an invitation, so added ids join the pending set.
    async fn add_org_members(
        &self,
        ids: &BTreeSet<PlatformId>,
        invites: &mut PendingInvites,
        result: &mut OrgSyncResult,
        team: &str,
    ) {
        let candidates: Vec<&PlatformId> = ids.iter().filter(|id| !invites.contains(id)).collect();
        let api = &self.api;
        let outcomes: Vec<OrgMemberAdd> = stream::iter(candidates)
            .map(move |id| async move {
                match api.is_org_member(id).await {
                    Ok(true) => OrgMemberAdd::AlreadyMember,
                    Ok(false) => match api.inner().add_org_member(id).await {
                        Ok(()) => {
                            api.forget_org_member(id).await;
                            OrgMemberAdd::Added(id.clone())
                        }
                        Err(e) => OrgMemberAdd::Failed(
                            SyncIssue::new("", id.as_str(), IssueReason::OrgAddFailed).with_detail(e.to_string()),
                        ),
                    },
                    Err(e) => OrgMemberAdd::Failed(
                        SyncIssue::new("", id.as_str(), IssueReason::LookupFailed).with_detail(e.to_string()),
                    ),
                }
            })
            .buffer_unordered(self.ctx.config.max_concurrent_mutations)
            .boxed()
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                OrgMemberAdd::Added(id) => {
                    invites.insert(&id);
                    result.org_members_added.insert(id);
                }
                OrgMemberAdd::AlreadyMember => {}
                OrgMemberAdd::Failed(issue) => {
                    warn!(user = %issue.candidate_id, reason = ?issue.reason, "Failed to add organization member");
                    result.issues.push(issue);
                }
            }
        }

        if !result.org_members_added.is_empty() {
            info!(added = result.org_members_added.len(), "Added organization members");
            self.ctx
                .notifier
                .notify(ChangeEvent::new(ChangeKind::OrgMembersAdded, self.api.org(), team))
                .await;
        }
    }

    /// Grant the owner role to the freshly reconciled owners team
    async fn promote_owners(
        &self,
        owners: &TeamDefinition,
        platform_teams: &BTreeMap<String, PlatformTeam>,
        result: &mut OrgSyncResult,
    ) {
        let synced = result
            .team(&owners.team_name)
            .map(|t| t.status == SyncStatus::Completed)
            .unwrap_or(false);
        let Some(found) = platform_teams.get(&owners.team_name).filter(|_| synced) else {
            warn!(team = %owners.team_name, "Owners team did not sync, not promoting owners");
            result.record_error("promote_owners", format!("owners team {} did not sync", owners.team_name));
            return;
        };

        let snapshot = match self.api.snapshot(found).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(team = %found.slug, error = %e, "Failed to list owners team");
                result.record_error("promote_owners", e.to_string());
                return;
            }
        };
        debug!(team = %snapshot.slug, team_id = snapshot.id, owners = snapshot.members.len(), "Promoting owners");

        for user in snapshot.members {
            match self.api.inner().set_org_role(&user, OrgRole::Admin).await {
                Ok(()) => {
                    result.owners_promoted.insert(user);
                }
                Err(e) => {
                    error!(user = %user, error = %e, "Failed to promote owner");
                    result.record_error("promote_owners", format!("{user}: {e}"));
                }
            }
        }

        if !result.owners_promoted.is_empty() {
            info!(owners = result.owners_promoted.len(), "Promoted organization owners");
            self.ctx
                .notifier
                .notify(ChangeEvent::new(ChangeKind::OwnersPromoted, self.api.org(), &owners.team_name))
                .await;
        }
    }

    async fn assign_copilot(
        &self,
        config: &OrgConfig,
        platform_teams: &BTreeMap<String, PlatformTeam>,
        result: &mut OrgSyncResult,
    ) {
        let teams = config
            .managed_teams()
            .into_iter()
            .filter(|team| config.is_copilot_team(team) && !self.is_ignored(team));

        for team in teams {
            let outcome = match platform_teams.get(&team.team_name) {
                None => Err(Error::not_found("team does not exist on the platform")),
                Some(found) => {
                    self.api
                        .inner()
                        .assign_copilot_seats(std::slice::from_ref(&found.slug))
                        .await
                }
            };
            let copilot = match outcome {
                Ok(seats) => {
                    info!(team = %team.team_name, seats, "Assigned Copilot seats");
                    CopilotResult {
                        team: team.team_name.clone(),
                        status: SyncStatus::Completed,
                        seats_created: Some(seats),
                        message: None,
                    }
                }
                Err(e) => {
                    warn!(team = %team.team_name, error = %e, "Failed to assign Copilot seats");
                    CopilotResult {
                        team: team.team_name.clone(),
                        status: SyncStatus::Failed,
                        seats_created: None,
                        message: Some(e.to_string()),
                    }
                }
            };
            result.copilot.push(copilot);
        }
    }
}
