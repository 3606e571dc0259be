//! Membership diff and application

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::platforms::TeamApi;
use crate::types::{IssueReason, PlatformId, SyncIssue};

/// Changes needed to turn `actual` into `desired`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<PlatformId>,
    pub to_remove: BTreeSet<PlatformId>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// `to_add = desired - actual`, `to_remove = actual - desired`.
///
/// Inputs are collected into ordered sets first, so the result does not
/// depend on the order in which either side was produced.
pub fn diff<'a, D, A>(desired: D, actual: A) -> MembershipDiff
where
    D: IntoIterator<Item = &'a PlatformId>,
    A: IntoIterator<Item = &'a PlatformId>,
{
    let desired: BTreeSet<&PlatformId> = desired.into_iter().collect();
    let actual: BTreeSet<&PlatformId> = actual.into_iter().collect();

    MembershipDiff {
        to_add: desired.difference(&actual).map(|id| (*id).clone()).collect(),
        to_remove: actual.difference(&desired).map(|id| (*id).clone()).collect(),
    }
}

/// What actually happened when a diff was applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub added: BTreeSet<PlatformId>,
    pub removed: BTreeSet<PlatformId>,
    pub issues: Vec<SyncIssue>,
}

#[derive(Clone, Copy)]
enum Mutation<'a> {
    Add(&'a PlatformId),
    Remove(&'a PlatformId),
}

/// Issue every removal and addition of `diff` against `team`.
///
/// Calls run concurrently, up to `max_concurrency` at a time, and each one
/// is issued exactly once. A failed call becomes a [`SyncIssue`] and does
/// not stop the others. Returns only after every call has finished.
pub async fn apply(api: &dyn TeamApi, team: &str, diff: &MembershipDiff, max_concurrency: usize) -> ApplyOutcome {
    let mutations = diff
        .to_remove
        .iter()
        .map(Mutation::Remove)
        .chain(diff.to_add.iter().map(Mutation::Add));

    let results: Vec<_> = stream::iter(mutations)
        .map(|mutation| async move {
            match mutation {
                Mutation::Add(user) => (mutation, api.add_team_member(team, user).await),
                Mutation::Remove(user) => (mutation, api.remove_team_member(team, user).await),
            }
        })
        .buffer_unordered(max_concurrency.max(1))
        .boxed()
        .collect()
        .await;

    let mut outcome = ApplyOutcome::default();
    for (mutation, result) in results {
        match (mutation, result) {
            (Mutation::Add(user), Ok(())) => {
                debug!(org = api.org(), team, user = %user, "Added team member");
                outcome.added.insert(user.clone());
            }
            (Mutation::Remove(user), Ok(())) => {
                debug!(org = api.org(), team, user = %user, "Removed team member");
                outcome.removed.insert(user.clone());
            }
            (Mutation::Add(user), Err(e)) => {
                warn!(org = api.org(), team, user = %user, error = %e, "Failed to add team member");
                outcome
                    .issues
                    .push(SyncIssue::new("", user.as_str(), IssueReason::AddFailed).with_detail(e.to_string()));
            }
            (Mutation::Remove(user), Err(e)) => {
                warn!(org = api.org(), team, user = %user, error = %e, "Failed to remove team member");
                outcome
                    .issues
                    .push(SyncIssue::new("", user.as_str(), IssueReason::RemoveFailed).with_detail(e.to_string()));
            }
        }
    }
    outcome
}
