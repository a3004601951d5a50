// End-to-end tests over the public API: league lifecycle, scheduling,
// results, standings and calendar sync working against one database.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use leaguekeeper_core::calendar::CalendarDate;
use leaguekeeper_core::config::{ensure_config_files, load_config_from};
use leaguekeeper_core::db::Database;
use leaguekeeper_core::league::roster::{join_team, roster};
use leaguekeeper_core::league::{
    change_phase, create_league, create_team, create_user, delete_league, delete_team,
    joinable_leagues, list_teams,
};
use leaguekeeper_core::model::{Actor, League, NewLeague, Phase, Role, Team};
use leaguekeeper_core::schedule::{
    generate_schedule, league_schedule, parse_scores, submit_score, Pacing,
};
use leaguekeeper_core::standings::{league_standings, SortKey};
use leaguekeeper_core::sync::{
    BackendError, CalendarBackend, CalendarEvent, DeleteOutcome, SyncLedger, SyncOutcome,
    SyncResult,
};
use leaguekeeper_core::{EngineError, Rejection};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ===========================================================================
// Test helpers
// ===========================================================================

fn date(y: i32, m: u32, d: u32) -> CalendarDate {
    CalendarDate::new(y, m, d).unwrap()
}

/// League "Test" (max 10 teams) administered by a fresh user, with teams
/// T1..T`teams`.
fn setup(teams: usize) -> (Arc<Database>, Actor, League, Vec<Team>) {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let admin = Actor::from(&create_user(&db, "testuser", "Test User", Role::User).unwrap());
    let league = create_league(
        &db,
        &admin,
        NewLeague {
            name: "Test".into(),
            sport: "Soccer".into(),
            max_teams: 10,
        },
    )
    .unwrap();
    let teams = (1..=teams)
        .map(|i| create_team(&db, &admin, league.id, &format!("T{i}"), admin.user_id).unwrap())
        .collect();
    (db, admin, league, teams)
}

#[derive(Default)]
struct RecordingCalendar {
    pushes: AtomicUsize,
    live: Mutex<Vec<String>>,
}

#[async_trait]
impl CalendarBackend for RecordingCalendar {
    async fn push_event(&self, event: &CalendarEvent) -> Result<String, BackendError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let id = format!("cal-{}", event.fixture_id);
        self.live.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<DeleteOutcome, BackendError> {
        let mut live = self.live.lock().unwrap();
        let before = live.len();
        live.retain(|e| e != event_id);
        if live.len() < before {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::AlreadyGone)
        }
    }
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[test]
fn worked_scenario() {
    let (db, admin, league, teams) = setup(3);

    change_phase(&db, &admin, league.id, Phase::Active).unwrap();

    let mut rng = StdRng::seed_from_u64(2025);
    let outcome = generate_schedule(
        &db,
        &admin,
        league.id,
        date(2025, 1, 1),
        Pacing::weekly(2),
        &mut rng,
    )
    .unwrap();
    assert_eq!(outcome.fixture_count(), 6);

    let fixtures = league_schedule(&db, league.id).unwrap();
    assert_eq!(fixtures[0].kickoff.date(), date(2025, 1, 1).to_naive());
    assert_eq!(fixtures[1].kickoff.date(), date(2025, 1, 1).to_naive());
    assert_eq!(fixtures[2].kickoff.date(), date(2025, 1, 8).to_naive());

    let first = &fixtures[0];
    submit_score(&db, &admin, first.id, 10, 5).unwrap();

    let table = league_standings(&db, league.id, SortKey::Wins).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table[0].team_id, first.home_team_id);
    assert_eq!(table[0].wins, 1);
    let loser = table.iter().find(|s| s.team_id == first.away_team_id).unwrap();
    assert_eq!(loser.losses, 1);
    assert!(teams.iter().any(|t| t.id == first.home_team_id));
}

#[test]
fn split_results_between_two_teams() {
    let (db, admin, league, teams) = setup(3);
    let mut rng = StdRng::seed_from_u64(4);
    generate_schedule(&db, &admin, league.id, date(2025, 3, 1), Pacing::default(), &mut rng)
        .unwrap();

    let (a, b) = (teams[0].id, teams[1].id);
    let fixtures = league_schedule(&db, league.id).unwrap();
    let a_home = fixtures.iter().find(|f| f.home_team_id == a && f.away_team_id == b).unwrap();
    let b_home = fixtures.iter().find(|f| f.home_team_id == b && f.away_team_id == a).unwrap();

    let score = parse_scores("10", "5").unwrap();
    submit_score(&db, &admin, a_home.id, score.home.into(), score.away.into()).unwrap();
    submit_score(&db, &admin, b_home.id, 7, 5).unwrap();

    let table = league_standings(&db, league.id, SortKey::Registration).unwrap();
    for id in [a, b] {
        let row = table.iter().find(|s| s.team_id == id).unwrap();
        assert_eq!((row.wins, row.losses), (1, 1));
    }
    let idle = table.iter().find(|s| s.team_id == teams[2].id).unwrap();
    assert_eq!(idle.played(), 0);
}

#[test]
fn team_deletion_depends_on_phase() {
    let (db, admin, league, teams) = setup(3);
    let player = Actor::from(&create_user(&db, "player", "Player", Role::User).unwrap());
    join_team(&db, &player, teams[0].id).unwrap();

    change_phase(&db, &admin, league.id, Phase::Active).unwrap();
    let err = delete_team(&db, &admin, teams[0].id).unwrap_err();
    assert!(matches!(err.rejection(), Some(Rejection::WrongPhase { .. })));
    assert_eq!(roster(&db, teams[0].id).unwrap().len(), 1);

    change_phase(&db, &admin, league.id, Phase::Signup).unwrap();
    delete_team(&db, &admin, teams[0].id).unwrap();
    assert_eq!(list_teams(&db, league.id).unwrap().len(), 2);
    assert!(roster(&db, teams[0].id).unwrap_err().is_not_found());
    // The membership went with the team.
    join_team(&db, &player, teams[1].id).unwrap();
}

#[test]
fn activation_needs_three_teams() {
    let (db, admin, league, _) = setup(2);
    let err = change_phase(&db, &admin, league.id, Phase::Active).unwrap_err();
    assert!(err.to_string().starts_with("League does not have enough teams"));

    create_team(&db, &admin, league.id, "T3", admin.user_id).unwrap();
    change_phase(&db, &admin, league.id, Phase::Active).unwrap();
    assert!(joinable_leagues(&db, None).unwrap().is_empty());
}

#[test]
fn site_admin_overrides_league_ownership() {
    let (db, _, league, _) = setup(1);
    let root = Actor::from(&create_user(&db, "root", "Root", Role::Admin).unwrap());
    let stranger = Actor::from(&create_user(&db, "stranger", "Stranger", Role::User).unwrap());

    assert!(matches!(
        delete_league(&db, &stranger, league.id),
        Err(EngineError::Forbidden(_))
    ));
    delete_league(&db, &root, league.id).unwrap();
}

// ===========================================================================
// Calendar sync
// ===========================================================================

#[tokio::test]
async fn sync_is_idempotent_and_regeneration_retires_events() {
    let (db, admin, league, _) = setup(3);
    let mut rng = StdRng::seed_from_u64(8);
    generate_schedule(&db, &admin, league.id, date(2025, 1, 1), Pacing::weekly(2), &mut rng)
        .unwrap();

    let calendar = Arc::new(RecordingCalendar::default());
    let ledger = SyncLedger::new(db.clone(), calendar.clone(), 7);

    let first = league_schedule(&db, league.id).unwrap()[0].id;
    assert!(matches!(ledger.sync(first).await.unwrap(), SyncResult::Pushed { .. }));
    assert!(matches!(
        ledger.sync(first).await.unwrap(),
        SyncResult::AlreadySynced { .. }
    ));
    assert_eq!(calendar.pushes.load(Ordering::SeqCst), 1);

    assert_eq!(ledger.sync_window(date(2025, 1, 1)).await.unwrap(), SyncOutcome::Synced(3));
    assert_eq!(calendar.live.lock().unwrap().len(), 4);

    // Replacing the schedule retires the old events; the next pass deletes
    // them and publishes the new fixtures in the window.
    generate_schedule(&db, &admin, league.id, date(2025, 1, 1), Pacing::weekly(2), &mut rng)
        .unwrap();
    assert_eq!(ledger.synced_count().unwrap(), 0);
    assert_eq!(ledger.sync_window(date(2025, 1, 1)).await.unwrap(), SyncOutcome::Synced(4));

    let live = calendar.live.lock().unwrap().clone();
    assert_eq!(live.len(), 4);
    let current: Vec<String> = league_schedule(&db, league.id)
        .unwrap()
        .iter()
        .map(|f| format!("cal-{}", f.id))
        .collect();
    assert!(live.iter().all(|e| current.contains(e)));
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn shipped_defaults_load() {
    let workspace = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    let tmp = std::env::temp_dir().join("lk_integration_defaults");
    let _ = std::fs::remove_dir_all(&tmp);
    std::fs::create_dir_all(tmp.join("defaults")).unwrap();
    for file in ["leaguekeeper.toml", "credentials.toml.example"] {
        std::fs::copy(workspace.join("defaults").join(file), tmp.join("defaults").join(file))
            .unwrap();
    }

    let copied = ensure_config_files(&tmp).unwrap();
    assert_eq!(copied.len(), 1);
    let config = load_config_from(&tmp).unwrap();
    assert_eq!(config.pacing(), Pacing::weekly(2));
    assert!(config.credentials.calendar.is_none());

    let _ = std::fs::remove_dir_all(&tmp);
}
