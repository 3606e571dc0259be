//! Per-organization configuration file

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::types::{sanitize_team_name, TeamDefinition};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TeamEntry {
    /// Just the directory group name
    Group(String),
    Detailed {
        source: String,
        #[serde(default)]
        display_name: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOrgConfig {
    #[serde(default)]
    teams: Vec<TeamEntry>,
    #[serde(default)]
    owners_group: Option<String>,
    #[serde(default)]
    members_group: Option<String>,
    #[serde(default)]
    security_manager_groups: Vec<String>,
    #[serde(default)]
    copilot_teams: Vec<String>,
    #[serde(default)]
    assume_membership_via_teams: bool,
    #[serde(default)]
    display_name_to_source: BTreeMap<String, String>,
}

/// Parsed configuration of one organization.
///
/// Example:
///
/// ```yaml
/// teams:
///   - Engineering
///   - source: SG-Platform-Eng
///     display_name: Platform
/// owners_group: Org Owners
/// members_group: All Engineers
/// security_manager_groups: [Security Team]
/// copilot_teams: [Engineering]
/// assume_membership_via_teams: false
/// display_name_to_source:
///   Data Science: SG-DataSci-Members
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    pub teams: Vec<TeamDefinition>,
    pub owners_group: Option<String>,
    pub members_group: Option<String>,
    pub security_manager_groups: Vec<String>,
    pub copilot_teams: Vec<String>,
    pub assume_membership_via_teams: bool,
    pub display_name_to_source: BTreeMap<String, String>,
}

impl OrgConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::parse("configuration file is empty"));
        }
        let raw: RawOrgConfig = serde_yml::from_str(raw)?;

        let teams = raw
            .teams
            .into_iter()
            .map(|entry| match entry {
                TeamEntry::Group(source) => TeamDefinition::new(source.trim()),
                TeamEntry::Detailed { source, display_name } => {
                    let team = TeamDefinition::new(source.trim());
                    match display_name {
                        Some(name) => team.with_display_name(name.trim()),
                        None => team,
                    }
                }
            })
            .collect();

        let config = OrgConfig {
            teams,
            owners_group: trimmed(raw.owners_group),
            members_group: trimmed(raw.members_group),
            security_manager_groups: raw.security_manager_groups,
            copilot_teams: raw.copilot_teams,
            assume_membership_via_teams: raw.assume_membership_via_teams,
            display_name_to_source: raw.display_name_to_source,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for team in self.all_teams() {
            if team.source_group.is_empty() {
                return Err(Error::parse("a team has an empty source group"));
            }
            if team.team_name.is_empty() {
                return Err(Error::parse(format!(
                    "group '{}' does not yield a usable team name",
                    team.source_group
                )));
            }
            let key = team.team_name.to_ascii_lowercase();
            if !seen.insert(key) {
                // the same group may be both owners and a managed team
                let same_source = self
                    .all_teams()
                    .filter(|t| t.team_name.eq_ignore_ascii_case(&team.team_name))
                    .all(|t| t.source_group == team.source_group);
                if !same_source {
                    return Err(Error::parse(format!(
                        "team name '{}' is produced by more than one group",
                        team.team_name
                    )));
                }
            }
        }
        for name in &self.copilot_teams {
            if !self.managed_teams().iter().any(|t| t.matches(name)) {
                return Err(Error::parse(format!(
                    "copilot team '{name}' is not a managed team"
                )));
            }
        }
        Ok(())
    }

    /// Teams whose membership is reconciled: the `teams` list plus every
    /// display-name mapping
    pub fn managed_teams(&self) -> Vec<TeamDefinition> {
        let mapped = self
            .display_name_to_source
            .iter()
            .map(|(display, source)| TeamDefinition::new(source.as_str()).with_display_name(display.as_str()));
        let mut teams: Vec<TeamDefinition> = Vec::new();
        for team in self.teams.iter().cloned().chain(mapped) {
            if !teams.iter().any(|t| t.team_name.eq_ignore_ascii_case(&team.team_name)) {
                teams.push(team);
            }
        }
        teams
    }

    pub fn owners_team(&self) -> Option<TeamDefinition> {
        self.owners_group.as_deref().map(TeamDefinition::new)
    }

    pub fn members_team(&self) -> Option<TeamDefinition> {
        self.members_group.as_deref().map(TeamDefinition::new)
    }

    pub fn security_manager_teams(&self) -> Vec<TeamDefinition> {
        self.security_manager_groups
            .iter()
            .map(|g| TeamDefinition::new(g.as_str()))
            .collect()
    }

    fn all_teams(&self) -> impl Iterator<Item = TeamDefinition> + '_ {
        self.managed_teams()
            .into_iter()
            .chain(self.owners_team())
            .chain(self.members_team())
            .chain(self.security_manager_teams())
    }

    /// Every team that must exist on the platform, minus ignored names
    pub fn required_teams(&self, ignored: &[String]) -> Vec<TeamDefinition> {
        let mut required: Vec<TeamDefinition> = Vec::new();
        for team in self.all_teams() {
            if ignored.iter().any(|name| team.matches(name)) {
                continue;
            }
            if !required.iter().any(|t| t.team_name.eq_ignore_ascii_case(&team.team_name)) {
                required.push(team);
            }
        }
        required
    }

    /// Slug-insensitive lookup of a Copilot team name
    pub fn is_copilot_team(&self, team: &TeamDefinition) -> bool {
        self.copilot_teams.iter().any(|name| team.matches(name))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
