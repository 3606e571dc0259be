mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{app_config, names, FakeConfig, FakeDirectory, FakePlatform, RecordingSink};
use teamsync::config::{AppConfig, ConfigOutcome};
use teamsync::error::Error;
use teamsync::identity::IdentityMapper;
use teamsync::notify::{ChangeKind, ChannelNotifier};
use teamsync::sync::OrgSyncOrchestrator;
use teamsync::{IssueReason, OrgSyncResult, SyncContext, SyncStatus};

const ENGINEERING: &str = "teams:\n  - Engineering\n";

async fn run_pass(
    ctx: &SyncContext,
    directory: &Arc<FakeDirectory>,
    platform: &Arc<FakePlatform>,
    config: &Arc<FakeConfig>,
) -> OrgSyncResult {
    OrgSyncOrchestrator::new(ctx.clone(), directory.clone(), platform.clone(), config.clone())
        .run()
        .await
}

fn engineering_fixture() -> (Arc<FakeDirectory>, Arc<FakePlatform>) {
    let directory = FakeDirectory::new().with_group(
        "Engineering",
        &["alice@corp.com", "bob@corp.com", "ghost@corp.com"],
    );
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob", "carol"])
        .with_team("Engineering", &["bob", "carol"]);
    (directory, platform)
}

#[tokio::test]
async fn test_team_converges_on_directory_group() {
    let (directory, platform) = engineering_fixture();
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Completed);
    let team = result.team("Engineering").unwrap();
    assert_eq!(team.status, SyncStatus::Completed);
    assert_eq!(names(&team.added), vec!["alice"]);
    assert_eq!(names(&team.removed), vec!["carol"]);
    assert_eq!(team.issues.len(), 1);
    assert_eq!(team.issues[0].email, "ghost@corp.com");
    assert_eq!(team.issues[0].candidate_id, "ghost");
    assert_eq!(team.issues[0].reason, IssueReason::UserNotFound);
    assert_eq!(platform.team_members("engineering"), vec!["alice", "bob"]);
    assert!(result.created_teams.is_empty());
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let (directory, platform) = engineering_fixture();
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    run_pass(&ctx, &directory, &platform, &config).await;
    platform.clear_mutations();
    let second = run_pass(&ctx, &directory, &platform, &config).await;

    let team = second.team("Engineering").unwrap();
    assert_eq!(team.status, SyncStatus::Completed);
    assert!(!team.has_changes());
    assert_eq!(platform.mutations(), vec!["update_team:engineering"]);
}

#[tokio::test]
async fn test_unchanged_team_is_served_from_etag_record() {
    let (directory, platform) = engineering_fixture();
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    for _ in 0..3 {
        run_pass(&ctx, &directory, &platform, &config).await;
    }

    let etags: Vec<Option<String>> = platform
        .state
        .lock()
        .unwrap()
        .etags_sent
        .iter()
        .filter(|(team, _)| team == "engineering")
        .map(|(_, etag)| etag.clone())
        .collect();
    // the first pass changed the team, so its record was dropped
    assert_eq!(etags, vec![None, None, Some("\"v3\"".to_string())]);
}

#[tokio::test]
async fn test_identity_suffix_candidate_not_found() {
    let directory = FakeDirectory::new().with_group("Engineering", &["a.b@x.com"]);
    let platform = FakePlatform::new("acme").with_team("Engineering", &[]);
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(AppConfig {
        identity: IdentityMapper::new().with_append("-ghe"),
        ..AppConfig::default()
    });

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    let team = result.team("Engineering").unwrap();
    assert!(team.added.is_empty());
    assert_eq!(team.issues.len(), 1);
    assert_eq!(team.issues[0].candidate_id, "a.b@x.com-ghe");
    assert_eq!(team.issues[0].reason, IssueReason::UserNotFound);
}

#[tokio::test]
async fn test_missing_config_touches_no_team() {
    let (directory, platform) = engineering_fixture();
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &FakeConfig::error(Error::not_found("teamsync.yml"))).await;
    assert_eq!(result.status, SyncStatus::NoConfig);
    assert!(result.teams.is_empty());

    let result = run_pass(&ctx, &directory, &platform, &FakeConfig::outcome(ConfigOutcome::NoConfig)).await;
    assert_eq!(result.status, SyncStatus::NoConfig);

    assert!(platform.mutations().is_empty());
    assert_eq!(platform.team_members("engineering"), vec!["bob", "carol"]);
}

#[tokio::test]
async fn test_bad_config_carries_diagnostic() {
    let (directory, platform) = engineering_fixture();
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &FakeConfig::yaml("teams: [Engineering]\nunknown: 1\n")).await;

    assert_eq!(result.status, SyncStatus::BadConfig);
    assert!(result.message.as_deref().is_some_and(|m| m.contains("unknown")));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn test_pending_invite_defers_member() {
    let directory = FakeDirectory::new().with_group("Engineering", &["bob@corp.com", "dave@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["bob"])
        .with_accounts(&["dave", "erin"])
        .with_team("Engineering", &["bob", "erin"])
        .with_invite("dave")
        .with_invite("erin");
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    let first = run_pass(&ctx, &directory, &platform, &config).await;
    let team = first.team("Engineering").unwrap();
    assert_eq!(team.status, SyncStatus::Completed);
    assert!(team.added.is_empty());
    // erin is not in the group, but is invited and so not removed either
    assert!(team.removed.is_empty());
    assert_eq!(names(&team.deferred), vec!["dave", "erin"]);
    assert!(team.issues.is_empty());

    platform.accept_invite("dave");
    let second = run_pass(&ctx, &directory, &platform, &config).await;
    let team = second.team("Engineering").unwrap();
    assert_eq!(names(&team.added), vec!["dave"]);
    assert_eq!(names(&team.deferred), vec!["erin"]);
}

#[tokio::test]
async fn test_mixed_case_email_matches_canonical_login() {
    let directory = FakeDirectory::new().with_group("Engineering", &["Alice@corp.com", "BOB@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob"])
        .with_team("Engineering", &["alice"]);
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    let first = run_pass(&ctx, &directory, &platform, &config).await;
    let team = first.team("Engineering").unwrap();
    assert_eq!(names(&team.added), vec!["bob"]);
    assert!(team.removed.is_empty());

    platform.clear_mutations();
    let second = run_pass(&ctx, &directory, &platform, &config).await;
    assert!(!second.team("Engineering").unwrap().has_changes());
    assert_eq!(platform.mutations(), vec!["update_team:engineering"]);
    assert_eq!(platform.team_members("engineering"), vec!["alice", "bob"]);
}

#[tokio::test(start_paused = true)]
async fn test_org_membership_checks_run_concurrently() {
    let directory = FakeDirectory::new().with_group(
        "Engineering",
        &["alice@corp.com", "bob@corp.com", "carol@corp.com", "dave@corp.com"],
    );
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob", "carol", "dave"])
        .with_team("Engineering", &[]);
    platform.state.lock().unwrap().membership_check_delay = Some(Duration::from_secs(1));
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    let team = result.team("Engineering").unwrap();
    assert_eq!(names(&team.added), vec!["alice", "bob", "carol", "dave"]);
    assert_eq!(platform.state.lock().unwrap().max_membership_checks_in_flight, 4);
}

#[tokio::test]
async fn test_unreadable_group_skips_only_its_team() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["alice@corp.com"])
        .with_failing_group("Ops");
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "oscar"])
        .with_team("Engineering", &[])
        .with_team("Ops", &["oscar"]);
    let config = FakeConfig::yaml("teams: [Engineering, Ops]\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Failed);
    assert_eq!(result.team("Engineering").unwrap().status, SyncStatus::Completed);
    let ops = result.team("Ops").unwrap();
    assert_eq!(ops.status, SyncStatus::Skipped);
    assert_eq!(ops.errors[0].step, "resolve_members");
    // a failed lookup never empties the team
    assert_eq!(platform.team_members("ops"), vec!["oscar"]);
}

#[tokio::test]
async fn test_unlistable_team_fails_alone() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["alice@corp.com"])
        .with_group("Ops", &["alice@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice"])
        .with_team("Engineering", &[])
        .with_team("Ops", &[]);
    platform.state.lock().unwrap().failing_listings.insert("ops".to_string());
    let config = FakeConfig::yaml("teams: [Engineering, Ops]\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Failed);
    let ops = result.team("Ops").unwrap();
    assert_eq!(ops.status, SyncStatus::Failed);
    assert_eq!(ops.errors[0].step, "list_team_members");
    assert_eq!(names(&result.team("Engineering").unwrap().added), vec!["alice"]);
}

#[tokio::test]
async fn test_failed_add_does_not_stop_other_adds() {
    let directory = FakeDirectory::new().with_group(
        "Engineering",
        &["alice@corp.com", "bob@corp.com", "dave@corp.com"],
    );
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob", "dave"])
        .with_team("Engineering", &[]);
    platform.state.lock().unwrap().failing_adds.insert("alice".to_string());
    let config = FakeConfig::yaml(ENGINEERING);
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    let team = result.team("Engineering").unwrap();
    assert_eq!(team.status, SyncStatus::Failed);
    assert_eq!(names(&team.added), vec!["bob", "dave"]);
    assert_eq!(team.issues.len(), 1);
    assert_eq!(team.issues[0].candidate_id, "alice");
    assert_eq!(team.issues[0].reason, IssueReason::AddFailed);
    let attempts = platform
        .mutations()
        .iter()
        .filter(|m| m.starts_with("add_team_member:"))
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_missing_team_is_created() {
    let directory = FakeDirectory::new().with_group("Data Science", &["alice@corp.com"]);
    let platform = FakePlatform::new("acme").with_members(&["alice"]);
    let config = FakeConfig::yaml("teams: [Data Science]\n");
    let (notifier, mut events) = ChannelNotifier::new();
    let ctx = SyncContext::new(app_config()).with_notifier(Arc::new(notifier));

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Completed);
    assert_eq!(result.created_teams, vec!["Data-Science"]);
    assert!(platform.has_team("data-science"));
    assert_eq!(platform.team_members("data-science"), vec!["alice"]);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.payload.org, "acme");
        assert_eq!(event.payload.team, "Data-Science");
        kinds.push(event.kind);
    }
    assert_eq!(kinds, vec![ChangeKind::TeamCreated, ChangeKind::MembersAdded]);
}

#[tokio::test]
async fn test_change_events_per_class() {
    let (directory, platform) = engineering_fixture();
    let config = FakeConfig::yaml(ENGINEERING);
    let (notifier, mut events) = ChannelNotifier::new();
    let ctx = SyncContext::new(app_config()).with_notifier(Arc::new(notifier));

    run_pass(&ctx, &directory, &platform, &config).await;

    let mut kinds = BTreeSet::new();
    while let Ok(event) = events.try_recv() {
        kinds.insert(event.kind.topic());
    }
    assert_eq!(
        kinds.into_iter().collect::<Vec<_>>(),
        vec!["team-members-added", "team-members-removed"]
    );
}

#[tokio::test]
async fn test_assumed_membership_invites_to_org() {
    let directory = FakeDirectory::new().with_group("Engineering", &["frank@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_accounts(&["frank"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nassume_membership_via_teams: true\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(names(&result.org_members_added), vec!["frank"]);
    let team = result.team("Engineering").unwrap();
    // the invitation was just sent; the team add waits for acceptance
    assert_eq!(names(&team.deferred), vec!["frank"]);
    assert!(team.added.is_empty());
    assert_eq!(platform.mutations()[0], "add_org_member:frank");
    assert!(!platform
        .mutations()
        .iter()
        .any(|m| m.starts_with("add_team_member:")));
}

#[tokio::test]
async fn test_accepted_org_invite_is_not_sent_again() {
    let directory = FakeDirectory::new().with_group("Engineering", &["frank@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_accounts(&["frank"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nassume_membership_via_teams: true\n");
    let ctx = SyncContext::new(app_config());

    run_pass(&ctx, &directory, &platform, &config).await;
    platform.accept_invite("frank");
    platform.clear_mutations();

    let second = run_pass(&ctx, &directory, &platform, &config).await;

    assert!(second.org_members_added.is_empty());
    assert!(!platform.mutations().iter().any(|m| m.starts_with("add_org_member:")));
    assert_eq!(names(&second.team("Engineering").unwrap().added), vec!["frank"]);
    assert_eq!(platform.team_members("engineering"), vec!["frank"]);
}

#[tokio::test]
async fn test_members_group_is_authoritative() {
    let directory = FakeDirectory::new()
        .with_group("All Staff", &["alice@corp.com"])
        .with_group("Engineering", &["alice@corp.com", "bob@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nmembers_group: All Staff\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    let team = result.team("Engineering").unwrap();
    assert_eq!(names(&team.added), vec!["alice"]);
    assert_eq!(team.issues.len(), 1);
    assert_eq!(team.issues[0].candidate_id, "bob");
    assert_eq!(team.issues[0].reason, IssueReason::NotOrgMember);
    assert_eq!(names(&result.team("All-Staff").unwrap().added), vec!["alice"]);
    assert!(result.org_members_added.is_empty());
    // both teams read the members group through one directory call
    assert_eq!(directory.fetch_count("All Staff"), 1);
}

#[tokio::test]
async fn test_owners_team_members_are_promoted() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["bob@corp.com"])
        .with_group("Org Owners", &["alice@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nowners_group: Org Owners\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Completed);
    assert_eq!(names(&result.owners_promoted), vec!["alice"]);
    assert!(platform.state.lock().unwrap().admins.contains("alice"));
    assert!(platform.mutations().contains(&"set_org_role:alice:admin".to_string()));
}

#[tokio::test]
async fn test_owners_not_promoted_when_owners_team_skipped() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["bob@corp.com"])
        .with_failing_group("Org Owners");
    let platform = FakePlatform::new("acme")
        .with_members(&["bob"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nowners_group: Org Owners\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Failed);
    assert!(result.owners_promoted.is_empty());
    assert!(result.errors.iter().any(|e| e.step == "promote_owners"));
    assert!(!platform.mutations().iter().any(|m| m.starts_with("set_org_role:")));
}

#[tokio::test]
async fn test_security_manager_teams_sync_without_config() {
    let directory = FakeDirectory::new().with_group("Security Team", &["alice@corp.com"]);
    let platform = FakePlatform::new("acme").with_members(&["alice"]);
    let ctx = SyncContext::new(AppConfig {
        security_manager_groups: vec!["Security Team".to_string()],
        ..app_config()
    });

    let result = run_pass(&ctx, &directory, &platform, &FakeConfig::outcome(ConfigOutcome::NoConfig)).await;

    assert_eq!(result.status, SyncStatus::NoConfig);
    assert_eq!(result.security_manager_teams.len(), 1);
    assert_eq!(result.security_manager_teams[0].status, SyncStatus::Completed);
    assert_eq!(platform.team_members("security-team"), vec!["alice"]);
    assert_eq!(
        platform.state.lock().unwrap().security_manager_teams,
        vec!["security-team"]
    );
}

#[tokio::test]
async fn test_configured_security_group_kept_out_of_team_list() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["bob@corp.com"])
        .with_group("AppSec", &["alice@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob"])
        .with_team("Engineering", &[]);
    let config = FakeConfig::yaml("teams: [Engineering]\nsecurity_manager_groups: [AppSec]\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.status, SyncStatus::Completed);
    assert_eq!(result.teams.len(), 1);
    assert_eq!(result.security_manager_teams[0].team, "AppSec");
    assert_eq!(names(&result.security_manager_teams[0].added), vec!["alice"]);
    assert_eq!(platform.state.lock().unwrap().security_manager_teams, vec!["appsec"]);
}

#[tokio::test]
async fn test_copilot_seats_for_configured_teams() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["alice@corp.com", "bob@corp.com"])
        .with_group("Ops", &["carol@corp.com"]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "bob", "carol"])
        .with_team("Engineering", &[])
        .with_team("Ops", &[]);
    let config = FakeConfig::yaml("teams: [Engineering, Ops]\ncopilot_teams: [Engineering]\n");
    let ctx = SyncContext::new(app_config());

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert_eq!(result.copilot.len(), 1);
    assert_eq!(result.copilot[0].team, "Engineering");
    assert_eq!(result.copilot[0].status, SyncStatus::Completed);
    assert_eq!(result.copilot[0].seats_created, Some(2));
    assert_eq!(platform.state.lock().unwrap().copilot_teams, vec!["engineering"]);
}

#[tokio::test]
async fn test_ignored_team_is_left_alone() {
    let directory = FakeDirectory::new()
        .with_group("Engineering", &["alice@corp.com"])
        .with_group("Legacy", &[]);
    let platform = FakePlatform::new("acme")
        .with_members(&["alice", "zed"])
        .with_team("Engineering", &[])
        .with_team("Legacy", &["zed"]);
    let config = FakeConfig::yaml("teams: [Engineering, Legacy]\n");
    let ctx = SyncContext::new(AppConfig {
        ignored_teams: vec!["legacy".to_string()],
        ..app_config()
    });

    let result = run_pass(&ctx, &directory, &platform, &config).await;

    assert!(result.team("Legacy").is_none());
    assert_eq!(platform.team_members("legacy"), vec!["zed"]);
    assert_eq!(directory.fetch_count("Legacy"), 0);
}

#[tokio::test]
async fn test_events_carry_correlation_id() {
    let (directory, platform) = engineering_fixture();
    let config = FakeConfig::yaml(ENGINEERING);
    let sink = Arc::new(RecordingSink::default());
    let ctx = SyncContext::new(app_config()).with_events(sink.clone());

    let orchestrator = OrgSyncOrchestrator::new(ctx, directory, platform, config);
    let correlation_id = orchestrator.correlation_id();
    let result = orchestrator.run().await;

    assert_eq!(result.correlation_id, correlation_id);
    let team_events = sink.operations("team_sync");
    assert_eq!(team_events.len(), 1);
    assert_eq!(team_events[0].team.as_deref(), Some("Engineering"));
    assert_eq!(team_events[0].status, "completed");
    let org_events = sink.operations("org_sync");
    assert_eq!(org_events.len(), 1);
    assert!(sink
        .events
        .lock()
        .unwrap()
        .iter()
        .all(|e| e.correlation_id == correlation_id));
}
