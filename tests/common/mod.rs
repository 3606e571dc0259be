//! In-memory platform, directory and config fakes for orchestration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use teamsync::config::{AppConfig, ConfigLoader, ConfigOutcome};
use teamsync::context::{EventSink, SyncEvent};
use teamsync::directory::DirectorySource;
use teamsync::error::{Error, ErrorCode, Result};
use teamsync::identity::IdentityMapper;
use teamsync::platforms::{MemberListing, PendingInvite, TeamApi};
use teamsync::sync::{OrgClients, OrgConnector};
use teamsync::types::{DirectoryMember, OrgRole, PlatformId, PlatformTeam, TeamPrivacy};

#[derive(Debug)]
pub struct FakeTeam {
    pub team: PlatformTeam,
    pub members: BTreeSet<String>,
    pub version: u64,
    pub privacy: Option<TeamPrivacy>,
}

#[derive(Debug, Default)]
pub struct PlatformState {
    pub accounts: BTreeSet<String>,
    pub org_members: BTreeSet<String>,
    pub invites: BTreeSet<String>,
    pub teams: BTreeMap<String, FakeTeam>,
    pub admins: BTreeSet<String>,
    pub security_manager_teams: Vec<String>,
    pub copilot_teams: Vec<String>,
    /// Logins whose team additions fail
    pub failing_adds: BTreeSet<String>,
    /// Team slugs whose member listing fails
    pub failing_listings: BTreeSet<String>,
    /// `list_pending_invites` panics
    pub panic_on_invites: bool,
    /// Every mutating call, in order
    pub mutations: Vec<String>,
    /// Etag sent with each member listing, per team
    pub etags_sent: Vec<(String, Option<String>)>,
    /// Each org-membership check waits this long before answering
    pub membership_check_delay: Option<Duration>,
    pub membership_checks_in_flight: usize,
    pub max_membership_checks_in_flight: usize,
    next_id: u64,
}

/// One organization on an in-memory platform
pub struct FakePlatform {
    org: String,
    pub state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new(org: &str) -> Arc<Self> {
        Arc::new(FakePlatform {
            org: org.to_string(),
            state: Mutex::new(PlatformState::default()),
        })
    }

    /// Accounts that exist and are org members
    pub fn with_members(self: Arc<Self>, logins: &[&str]) -> Arc<Self> {
        {
            let mut state = self.state.lock().unwrap();
            for login in logins {
                state.accounts.insert(login.to_string());
                state.org_members.insert(login.to_string());
            }
        }
        self
    }

    /// Accounts that exist but are not org members
    pub fn with_accounts(self: Arc<Self>, logins: &[&str]) -> Arc<Self> {
        {
            let mut state = self.state.lock().unwrap();
            for login in logins {
                state.accounts.insert(login.to_string());
            }
        }
        self
    }

    pub fn with_team(self: Arc<Self>, name: &str, members: &[&str]) -> Arc<Self> {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let slug = name.to_ascii_lowercase();
            let team = FakeTeam {
                team: PlatformTeam::new(state.next_id, name, slug.as_str()),
                members: members.iter().map(|m| m.to_string()).collect(),
                version: 1,
                privacy: None,
            };
            state.teams.insert(slug, team);
        }
        self
    }

    pub fn with_invite(self: Arc<Self>, login: &str) -> Arc<Self> {
        self.state.lock().unwrap().invites.insert(login.to_string());
        self
    }

    pub fn team_members(&self, slug: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .teams
            .get(slug)
            .map(|t| t.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_team(&self, slug: &str) -> bool {
        self.state.lock().unwrap().teams.contains_key(slug)
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.state.lock().unwrap().mutations.clear();
    }

    /// The invitation was accepted
    pub fn accept_invite(&self, login: &str) {
        let mut state = self.state.lock().unwrap();
        state.invites.remove(login);
        state.org_members.insert(login.to_string());
    }
}

fn etag_of(team: &FakeTeam) -> String {
    format!("\"v{}\"", team.version)
}

#[async_trait]
impl TeamApi for FakePlatform {
    fn org(&self) -> &str {
        &self.org
    }

    /// Logins match regardless of case; the stored spelling is canonical
    async fn find_user(&self, candidate: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .find(|login| login.eq_ignore_ascii_case(candidate))
            .cloned())
    }

    async fn is_org_member(&self, user: &PlatformId) -> Result<bool> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.membership_checks_in_flight += 1;
            state.max_membership_checks_in_flight = state
                .max_membership_checks_in_flight
                .max(state.membership_checks_in_flight);
            state.membership_check_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.membership_checks_in_flight -= 1;
        Ok(state.org_members.contains(user.as_str()))
    }

    async fn add_org_member(&self, user: &PlatformId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("add_org_member:{user}"));
        state.invites.insert(user.to_string());
        Ok(())
    }

    async fn list_org_teams(&self) -> Result<Vec<PlatformTeam>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .teams
            .values()
            .map(|t| t.team.clone())
            .collect())
    }

    async fn list_team_members(&self, team: &str, etag: Option<&str>) -> Result<MemberListing> {
        let mut state = self.state.lock().unwrap();
        state.etags_sent.push((team.to_string(), etag.map(str::to_string)));
        if state.failing_listings.contains(team) {
            return Err(Error::new(ErrorCode::NetworkError, format!("listing {team} failed")));
        }
        let found = state
            .teams
            .get(team)
            .ok_or_else(|| Error::not_found(format!("team {team}")))?;
        let current = etag_of(found);
        if etag == Some(current.as_str()) {
            return Ok(MemberListing::NotModified);
        }
        Ok(MemberListing::Changed {
            members: found.members.iter().cloned().collect(),
            etag: Some(current),
        })
    }

    async fn add_team_member(&self, team: &str, user: &PlatformId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("add_team_member:{team}:{user}"));
        if state.failing_adds.contains(user.as_str()) {
            return Err(Error::new(ErrorCode::InvalidArgument, "add rejected"));
        }
        let found = state
            .teams
            .get_mut(team)
            .ok_or_else(|| Error::not_found(format!("team {team}")))?;
        found.members.insert(user.to_string());
        found.version += 1;
        Ok(())
    }

    async fn remove_team_member(&self, team: &str, user: &PlatformId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("remove_team_member:{team}:{user}"));
        let found = state
            .teams
            .get_mut(team)
            .ok_or_else(|| Error::not_found(format!("team {team}")))?;
        found.members.remove(user.as_str());
        found.version += 1;
        Ok(())
    }

    async fn create_team(&self, name: &str, description: &str, privacy: TeamPrivacy) -> Result<PlatformTeam> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("create_team:{name}"));
        state.next_id += 1;
        let slug = name.to_ascii_lowercase();
        let team = PlatformTeam::new(state.next_id, name, slug.as_str()).with_description(description);
        state.teams.insert(
            slug,
            FakeTeam {
                team: team.clone(),
                members: BTreeSet::new(),
                version: 1,
                privacy: Some(privacy),
            },
        );
        Ok(team)
    }

    async fn update_team(&self, team: &str, description: &str, privacy: TeamPrivacy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("update_team:{team}"));
        let found = state
            .teams
            .get_mut(team)
            .ok_or_else(|| Error::not_found(format!("team {team}")))?;
        found.team.description = Some(description.to_string());
        found.privacy = Some(privacy);
        Ok(())
    }

    async fn list_pending_invites(&self) -> Result<Vec<PendingInvite>> {
        let state = self.state.lock().unwrap();
        if state.panic_on_invites {
            panic!("platform client crashed");
        }
        Ok(state.invites.iter().map(PendingInvite::for_login).collect())
    }

    async fn set_org_role(&self, user: &PlatformId, role: OrgRole) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("set_org_role:{user}:{}", role.as_str()));
        if role == OrgRole::Admin {
            state.admins.insert(user.to_string());
        }
        Ok(())
    }

    async fn add_security_manager_team(&self, team: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("add_security_manager_team:{team}"));
        state.security_manager_teams.push(team.to_string());
        Ok(())
    }

    async fn assign_copilot_seats(&self, teams: &[String]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!("assign_copilot_seats:{}", teams.join(",")));
        state.copilot_teams.extend(teams.iter().cloned());
        let seats = teams
            .iter()
            .filter_map(|t| state.teams.get(t))
            .map(|t| t.members.len() as u64)
            .sum();
        Ok(seats)
    }
}

/// Directory with fixed groups
#[derive(Default)]
pub struct FakeDirectory {
    groups: Mutex<HashMap<String, Vec<DirectoryMember>>>,
    failing: Mutex<BTreeSet<String>>,
    pub fetches: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeDirectory::default())
    }

    pub fn with_group(self: Arc<Self>, group: &str, emails: &[&str]) -> Arc<Self> {
        let members = emails
            .iter()
            .enumerate()
            .map(|(i, email)| DirectoryMember::new(*email, *email, format!("{group}-{i}")))
            .collect();
        self.groups.lock().unwrap().insert(group.to_string(), members);
        self
    }

    pub fn with_failing_group(self: Arc<Self>, group: &str) -> Arc<Self> {
        self.failing.lock().unwrap().insert(group.to_string());
        self
    }

    pub fn fetch_count(&self, group: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|g| *g == group).count()
    }
}

#[async_trait]
impl DirectorySource for FakeDirectory {
    async fn fetch_members(&self, group: &str) -> Result<Vec<DirectoryMember>> {
        self.fetches.lock().unwrap().push(group.to_string());
        if self.failing.lock().unwrap().contains(group) {
            return Err(Error::new(ErrorCode::NetworkError, format!("directory unavailable for {group}")));
        }
        self.groups
            .lock()
            .unwrap()
            .get(group)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("group {group}")))
    }
}

/// Config loader answering with a fixed outcome
pub struct FakeConfig(pub Result<ConfigOutcome>);

impl FakeConfig {
    pub fn yaml(raw: &str) -> Arc<Self> {
        Arc::new(FakeConfig(Ok(ConfigOutcome::from_yaml(raw))))
    }

    pub fn outcome(outcome: ConfigOutcome) -> Arc<Self> {
        Arc::new(FakeConfig(Ok(outcome)))
    }

    pub fn error(error: Error) -> Arc<Self> {
        Arc::new(FakeConfig(Err(error)))
    }
}

#[async_trait]
impl ConfigLoader for FakeConfig {
    async fn org_config(&self) -> Result<ConfigOutcome> {
        self.0.clone()
    }
}

/// Connector over a fixed set of fake organizations
#[derive(Default)]
pub struct FakeConnector {
    orgs: Vec<String>,
    clients: HashMap<String, (Arc<FakePlatform>, Arc<FakeConfig>)>,
}

impl FakeConnector {
    pub fn new() -> Self {
        FakeConnector::default()
    }

    pub fn with_org(mut self, platform: Arc<FakePlatform>, config: Arc<FakeConfig>) -> Self {
        let org = platform.org().to_string();
        self.orgs.push(org.clone());
        self.clients.insert(org, (platform, config));
        self
    }

    /// Listed, but connecting fails
    pub fn with_unreachable_org(mut self, org: &str) -> Self {
        self.orgs.push(org.to_string());
        self
    }
}

#[async_trait]
impl OrgConnector for FakeConnector {
    async fn organizations(&self) -> Result<Vec<String>> {
        Ok(self.orgs.clone())
    }

    async fn connect(&self, org: &str) -> Result<OrgClients> {
        let (api, config) = self
            .clients
            .get(org)
            .cloned()
            .ok_or_else(|| Error::new(ErrorCode::AuthenticationFailed, format!("no credentials for {org}")))?;
        Ok(OrgClients { api, config })
    }
}

/// Keeps every emitted event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn operations(&self, operation: &str) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.operation == operation)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &SyncEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Strips the corporate domain: `alice@corp.com` maps to `alice`
pub fn app_config() -> AppConfig {
    AppConfig {
        identity: IdentityMapper::new().with_rule("@corp.com", ""),
        ..AppConfig::default()
    }
}

pub fn names<'a>(ids: impl IntoIterator<Item = &'a PlatformId>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}
