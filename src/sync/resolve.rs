//! Directory group to verified platform ids

use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::directory::DirectorySource;
use crate::error::Result;
use crate::identity::IdentityMapper;
use crate::platforms::CachingTeamApi;
use crate::types::{IssueReason, PlatformId, SyncIssue};

/// A directory member whose candidate id exists on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    pub email: String,
    pub id: PlatformId,
}

/// Outcome of resolving one directory group
#[derive(Debug, Clone, Default)]
pub struct ResolvedGroup {
    pub members: Vec<ResolvedMember>,
    /// Members that could not be mapped to an existing account
    pub issues: Vec<SyncIssue>,
}

impl ResolvedGroup {
    pub fn ids(&self) -> BTreeSet<PlatformId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }
}

/// Resolves directory groups for one organization pass.
///
/// Each group is resolved at most once per pass; the result is shared by
/// every team fed from the same group. Directory failures are not
/// remembered, so a later caller retries.
pub struct MemberResolver {
    directory: Arc<dyn DirectorySource>,
    api: CachingTeamApi,
    mapper: IdentityMapper,
    max_concurrency: usize,
    resolved: Mutex<HashMap<String, Arc<ResolvedGroup>>>,
}

impl MemberResolver {
    pub fn new(
        directory: Arc<dyn DirectorySource>,
        api: CachingTeamApi,
        mapper: IdentityMapper,
        max_concurrency: usize,
    ) -> Self {
        MemberResolver {
            directory,
            api,
            mapper,
            max_concurrency: max_concurrency.max(1),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Members of `group` that exist on the platform.
    ///
    /// Only a failure to read the group itself is an error. Members whose
    /// candidate id does not exist, or whose check failed, are reported as
    /// issues and left out.
    pub async fn resolve(&self, group: &str) -> Result<Arc<ResolvedGroup>> {
        if let Some(hit) = self.resolved.lock().await.get(group) {
            return Ok(hit.clone());
        }

        let members = self.directory.fetch_members(group).await?;

        let checked: Vec<_> = stream::iter(members)
            .map(move |member| async move {
                let candidate = self.mapper.to_platform_id(&member.email);
                let verdict = self.api.validate_candidate(&candidate).await;
                (member.email, candidate, verdict)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut resolved = ResolvedGroup::default();
        let mut seen = BTreeSet::new();
        for (email, candidate, verdict) in checked {
            match verdict {
                Ok(Some(id)) => {
                    // nested groups can list the same person twice
                    if seen.insert(id.clone()) {
                        resolved.members.push(ResolvedMember { email, id });
                    }
                }
                Ok(None) => resolved
                    .issues
                    .push(SyncIssue::new(email, candidate, IssueReason::UserNotFound)),
                Err(e) => resolved
                    .issues
                    .push(SyncIssue::new(email, candidate, IssueReason::LookupFailed).with_detail(e.to_string())),
            }
        }

        debug!(
            org = self.api.org(),
            group,
            members = resolved.members.len(),
            issues = resolved.issues.len(),
            "Resolved directory group"
        );

        let resolved = Arc::new(resolved);
        self.resolved
            .lock()
            .await
            .insert(group.to_string(), resolved.clone());
        Ok(resolved)
    }
}
