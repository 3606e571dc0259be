//! Hierarchical sync report
//!
//! Each orchestration level creates its result when it starts, fills it in
//! as steps finish and hands it back to the caller when done:
//! [`TeamSyncResult`] inside [`OrgSyncResult`] inside [`FleetSyncResult`].
//! Everything serializes to JSON for operator review.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::member::{PlatformId, SyncIssue};

/// Outcome of a sync at any level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The pass has started but not finished
    Running,
    Completed,
    /// The team's source group could not be read; nothing was changed
    Skipped,
    Failed,
    /// The organization has no readable configuration
    NoConfig,
    /// The organization's configuration exists but is invalid
    BadConfig,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Skipped => "skipped",
            SyncStatus::Failed => "failed",
            SyncStatus::NoConfig => "no_config",
            SyncStatus::BadConfig => "bad_config",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncStatus::Failed | SyncStatus::BadConfig)
    }
}

/// A step that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub step: String,
    pub message: String,
}

impl StepError {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        StepError {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result of one team reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct TeamSyncResult {
    pub team: String,
    pub source_group: String,
    pub status: SyncStatus,
    pub added: BTreeSet<PlatformId>,
    pub removed: BTreeSet<PlatformId>,
    /// Members deferred because an organization invitation is pending
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub deferred: BTreeSet<PlatformId>,
    pub issues: Vec<SyncIssue>,
    pub errors: Vec<StepError>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TeamSyncResult {
    pub fn new(team: impl Into<String>, source_group: impl Into<String>) -> Self {
        TeamSyncResult {
            team: team.into(),
            source_group: source_group.into(),
            status: SyncStatus::Running,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            deferred: BTreeSet::new(),
            issues: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn record_error(&mut self, step: &str, message: impl Into<String>) {
        self.errors.push(StepError::new(step, message));
    }

    /// Close the result with an explicit terminal status
    pub(crate) fn finish_with(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Close the result: completed unless a step failed
    pub(crate) fn finish(self) -> Self {
        let status = if self.errors.is_empty() {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed
        };
        self.finish_with(status)
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Copilot seat assignment outcome for one team
#[derive(Debug, Clone, Serialize)]
pub struct CopilotResult {
    pub team: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_created: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of one organization pass
#[derive(Debug, Clone, Serialize)]
pub struct OrgSyncResult {
    pub org: String,
    pub correlation_id: Uuid,
    pub status: SyncStatus,
    /// Diagnostic for `bad_config` and fatal failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub security_manager_teams: Vec<TeamSyncResult>,
    pub created_teams: Vec<String>,
    pub org_members_added: BTreeSet<PlatformId>,
    pub teams: Vec<TeamSyncResult>,
    pub owners_promoted: BTreeSet<PlatformId>,
    pub copilot: Vec<CopilotResult>,
    pub issues: Vec<SyncIssue>,
    pub errors: Vec<StepError>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrgSyncResult {
    pub fn new(org: impl Into<String>, correlation_id: Uuid) -> Self {
        OrgSyncResult {
            org: org.into(),
            correlation_id,
            status: SyncStatus::Running,
            message: None,
            security_manager_teams: Vec::new(),
            created_teams: Vec::new(),
            org_members_added: BTreeSet::new(),
            teams: Vec::new(),
            owners_promoted: BTreeSet::new(),
            copilot: Vec::new(),
            issues: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A result for an organization whose pass never got going
    pub fn failed(org: impl Into<String>, correlation_id: Uuid, message: impl Into<String>) -> Self {
        let mut result = OrgSyncResult::new(org, correlation_id);
        result.message = Some(message.into());
        result.finish_with(SyncStatus::Failed)
    }

    pub(crate) fn record_error(&mut self, step: &str, message: impl Into<String>) {
        self.errors.push(StepError::new(step, message));
    }

    pub(crate) fn finish_with(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Completed only if every step and every team succeeded
    pub(crate) fn finish(self) -> Self {
        let team_failed = self
            .security_manager_teams
            .iter()
            .chain(self.teams.iter())
            .any(|t| t.status != SyncStatus::Completed);
        let copilot_failed = self.copilot.iter().any(|c| c.status != SyncStatus::Completed);
        let status = if self.errors.is_empty() && !team_failed && !copilot_failed {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed
        };
        self.finish_with(status)
    }

    pub fn team(&self, name: &str) -> Option<&TeamSyncResult> {
        self.teams
            .iter()
            .chain(self.security_manager_teams.iter())
            .find(|t| t.team.eq_ignore_ascii_case(name))
    }
}

/// Result of a pass over every authorized organization
#[derive(Debug, Clone, Serialize)]
pub struct FleetSyncResult {
    pub correlation_id: Uuid,
    pub status: SyncStatus,
    pub orgs: Vec<OrgSyncResult>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FleetSyncResult {
    pub fn new(correlation_id: Uuid) -> Self {
        FleetSyncResult {
            correlation_id,
            status: SyncStatus::Running,
            orgs: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Orgs without configuration count as success; they are simply not onboarded
    pub(crate) fn finish(mut self) -> Self {
        self.orgs.sort_by(|a, b| a.org.cmp(&b.org));
        self.status = if self.orgs.iter().any(|o| o.status.is_failure()) {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn org(&self, name: &str) -> Option<&OrgSyncResult> {
        self.orgs.iter().find(|o| o.org.eq_ignore_ascii_case(name))
    }

    pub fn failed_orgs(&self) -> impl Iterator<Item = &OrgSyncResult> {
        self.orgs.iter().filter(|o| o.status.is_failure())
    }
}
