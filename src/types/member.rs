//! Identity types shared by the directory and platform sides of a sync

use serde::{Deserialize, Serialize};
use std::fmt;

/// A member of a directory group, as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMember {
    /// Display name shown in the directory
    pub display_name: String,
    /// Primary email (or user principal name when no mail is set)
    pub email: String,
    /// Directory object identifier
    pub directory_id: String,
}

impl DirectoryMember {
    pub fn new(
        display_name: impl Into<String>,
        email: impl Into<String>,
        directory_id: impl Into<String>,
    ) -> Self {
        DirectoryMember {
            display_name: display_name.into(),
            email: email.into(),
            directory_id: directory_id.into(),
        }
    }
}

/// A platform account identifier known to exist on the platform.
///
/// Values are only created by the crate itself, always from a login the
/// platform returned: the canonical login of an existence check, or an
/// entry of a listing. Unverified identifiers are plain strings ("candidate ids") and
/// cannot be passed to the mutating [`TeamApi`](crate::platforms::TeamApi)
/// methods, which all take `&PlatformId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlatformId(String);

impl PlatformId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        PlatformId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlatformId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PlatformId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PlatformId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Why a member could not be brought into sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    /// The candidate id does not exist on the platform
    UserNotFound,
    /// The existence or membership check itself failed
    LookupFailed,
    /// The candidate is not a member of the organization
    NotOrgMember,
    /// Adding the account to the team failed
    AddFailed,
    /// Removing the account from the team failed
    RemoveFailed,
    /// Adding the account to the organization failed
    OrgAddFailed,
}

/// A member who could not be resolved or applied; never silently dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIssue {
    /// Directory email, empty when the issue originates on the platform side
    pub email: String,
    pub candidate_id: String,
    pub reason: IssueReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncIssue {
    pub fn new(
        email: impl Into<String>,
        candidate_id: impl Into<String>,
        reason: IssueReason,
    ) -> Self {
        SyncIssue {
            email: email.into(),
            candidate_id: candidate_id.into(),
            reason,
            detail: None,
        }
    }

    /// Attach a diagnostic message
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
