/// Platform side of the sync
///
/// The [`TeamApi`] trait is everything the reconciliation engine asks of a
/// collaboration platform; [`github`] implements it over the GitHub REST
/// API and [`CachingTeamApi`] puts the membership cache in front of it.

mod caching;
mod platform_trait;

pub mod github;

// Re-export platform trait and related types
pub use caching::CachingTeamApi;
pub use platform_trait::{MemberListing, PendingInvite, TeamApi};
