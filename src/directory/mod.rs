//! Directory side of the sync
//!
//! The directory is the source of truth for who belongs to which group.
//! The sync only needs one operation from it: list the members of a group
//! by name.

mod graph;

pub use graph::GraphDirectory;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DirectoryMember;

/// Source of group membership.
///
/// A failed lookup must be returned as `Err`, never as an empty list: an
/// empty group legitimately removes everyone from the team, a failed
/// lookup must not.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_members(&self, group: &str) -> Result<Vec<DirectoryMember>>;
}
