//! Team types
//!
//! A [`TeamDefinition`] describes a team the sync manages: which directory
//! group feeds it and which platform team it maps onto. A [`PlatformTeam`]
//! is the platform's own view of a team at the moment it was listed.

use serde::{Deserialize, Serialize};

use super::member::PlatformId;
use std::collections::BTreeSet;

/// Convert a directory group name into an API-safe team slug.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `-`, runs of `-`
/// collapse into one and trailing dashes are dropped.
pub fn sanitize_team_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            ch
        } else {
            '-'
        };
        if ch == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(ch);
    }
    let trimmed = slug.trim_end_matches('-').len();
    slug.truncate(trimmed);
    slug
}

/// A team managed by the sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDefinition {
    /// Directory group that is the source of truth for this team
    pub source_group: String,
    /// Sanitized platform team name
    pub team_name: String,
    /// Optional human-facing name the team was configured under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl TeamDefinition {
    /// Define a team named after its source group
    pub fn new(source_group: impl Into<String>) -> Self {
        let source_group = source_group.into();
        TeamDefinition {
            team_name: sanitize_team_name(&source_group),
            source_group,
            display_name: None,
        }
    }

    /// Define a team whose platform name comes from a display name rather
    /// than from the source group
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.team_name = sanitize_team_name(&display_name);
        self.display_name = Some(display_name);
        self
    }

    /// Case-insensitive comparison against a platform team name or slug
    pub fn matches(&self, name: &str) -> bool {
        self.team_name.eq_ignore_ascii_case(name)
            || sanitize_team_name(name).eq_ignore_ascii_case(&self.team_name)
    }
}

/// Team visibility on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamPrivacy {
    /// Visible to every organization member
    #[default]
    Closed,
    /// Visible only to team members and owners
    Secret,
}

impl TeamPrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamPrivacy::Closed => "closed",
            TeamPrivacy::Secret => "secret",
        }
    }
}

/// Organization-level role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Member,
    Admin,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Member => "member",
            OrgRole::Admin => "admin",
        }
    }
}

/// A team as listed by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTeam {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl PlatformTeam {
    pub fn new(id: u64, name: impl Into<String>, slug: impl Into<String>) -> Self {
        PlatformTeam {
            id,
            name: name.into(),
            slug: slug.into(),
            description: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Point-in-time snapshot of a team and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub members: BTreeSet<PlatformId>,
}

impl Team {
    pub fn new(listing: PlatformTeam, members: BTreeSet<PlatformId>) -> Self {
        Team {
            id: listing.id,
            name: listing.name,
            slug: listing.slug,
            description: listing.description,
            members,
        }
    }
}
