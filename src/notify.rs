//! Change notifications
//!
//! After a team's membership changes, downstream consumers (pub/sub topics,
//! chat notifications) receive one event per change class. The payload is
//! just `{team, org}`; consumers look up details themselves.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// Class of change, one topic each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TeamCreated,
    MembersAdded,
    MembersRemoved,
    OrgMembersAdded,
    OwnersPromoted,
}

impl ChangeKind {
    pub fn topic(&self) -> &'static str {
        match self {
            ChangeKind::TeamCreated => "team-created",
            ChangeKind::MembersAdded => "team-members-added",
            ChangeKind::MembersRemoved => "team-members-removed",
            ChangeKind::OrgMembersAdded => "org-members-added",
            ChangeKind::OwnersPromoted => "org-owners-promoted",
        }
    }
}

/// Wire payload of a change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePayload {
    pub team: String,
    pub org: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub payload: ChangePayload,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, org: impl Into<String>, team: impl Into<String>) -> Self {
        ChangeEvent {
            kind,
            payload: ChangePayload {
                team: team.into(),
                org: org.into(),
            },
        }
    }
}

/// Publishes change events. Failures are the notifier's to log; they never
/// affect the sync result.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify(&self, event: ChangeEvent);
}

/// Logs events at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ChangeNotifier for LogNotifier {
    async fn notify(&self, event: ChangeEvent) {
        info!(
            topic = event.kind.topic(),
            org = %event.payload.org,
            team = %event.payload.team,
            "membership change"
        );
    }
}

/// Forwards events into a channel, for in-process consumers
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelNotifier { sender }, receiver)
    }
}

#[async_trait]
impl ChangeNotifier for ChannelNotifier {
    async fn notify(&self, event: ChangeEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("change event receiver dropped");
        }
    }
}
