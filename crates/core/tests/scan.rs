use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use scoreboard_core::{
    clients::{CabinetScore, CabinetSource, LeaderboardScore, LeaderboardSource},
    models::ActivityReport,
    CabinetId, ClientError, ScanEvent, ScanOptions, Scanner, Score, ScoreModel, ScoreStatus,
    TableDetails, WebTableId,
};
use tokio::sync::mpsc;

const OWNER: &str = "DMK";

fn unavailable(what: &str) -> ClientError {
    ClientError::Status {
        url: what.to_string(),
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn details(id: i64, web_id: &str, rom: &str, disabled: bool) -> TableDetails {
    serde_json::from_value(serde_json::json!({
        "gameName": format!("Table {id}"),
        "gameDisplayName": format!("Table {id} (Williams 1992)"),
        "extTableId": web_id,
        "id": id,
        "highscoreType": "NVRam",
        "rom": rom,
        "nvOffset": 0,
        "disabled": disabled
    }))
    .unwrap()
}

#[derive(Default)]
struct FakeCabinet {
    tables: Vec<TableDetails>,
    scores: HashMap<CabinetId, Vec<CabinetScore>>,
    failing: Vec<CabinetId>,
    statuses: HashMap<CabinetId, ScoreStatus>,
    activity: Mutex<Vec<ActivityReport>>,
    score_requests: Mutex<Vec<CabinetId>>,
    status_requests: Mutex<Vec<CabinetId>>,
}

impl FakeCabinet {
    fn score_requests(&self) -> Vec<CabinetId> {
        let mut ids = self.score_requests.lock().unwrap().clone();
        ids.sort();
        ids
    }
}

#[async_trait]
impl CabinetSource for FakeCabinet {
    async fn tables(&self) -> Result<Vec<TableDetails>, ClientError> {
        Ok(self.tables.clone())
    }

    async fn scores(&self, id: &CabinetId) -> Result<Vec<CabinetScore>, ClientError> {
        self.score_requests.lock().unwrap().push(id.clone());
        if self.failing.contains(id) {
            return Err(unavailable("scores"));
        }
        Ok(self.scores.get(id).cloned().unwrap_or_default())
    }

    async fn score_status(&self, id: &CabinetId) -> Result<ScoreStatus, ClientError> {
        self.status_requests.lock().unwrap().push(id.clone());
        Ok(self
            .statuses
            .get(id)
            .copied()
            .unwrap_or(ScoreStatus::NoScore))
    }

    async fn activity(&self) -> Result<Vec<ActivityReport>, ClientError> {
        Ok(self.activity.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeLeaderboard {
    scores: HashMap<WebTableId, Vec<LeaderboardScore>>,
}

#[async_trait]
impl LeaderboardSource for FakeLeaderboard {
    async fn scores(&self, web_id: &WebTableId) -> Result<Vec<LeaderboardScore>, ClientError> {
        self.scores
            .get(web_id)
            .cloned()
            .ok_or_else(|| unavailable("leaderboard"))
    }
}

fn remote(initials: &str, score: i64) -> LeaderboardScore {
    LeaderboardScore {
        score,
        initials: initials.to_string(),
        display_name: initials.to_lowercase(),
        creation_date: Utc.with_ymd_and_hms(2024, 7, 30, 3, 58, 39).unwrap(),
    }
}

fn cabinet() -> FakeCabinet {
    let mut cabinet = FakeCabinet {
        tables: vec![
            details(1, "wA", "afm_113b", false),
            details(2, "wB", "tz_94h", false),
            details(3, "wC", "mm_109c", true),
        ],
        ..FakeCabinet::default()
    };
    cabinet.scores.insert(
        CabinetId::new("1"),
        vec![
            CabinetScore::new(OWNER, "1,000,000"),
            CabinetScore::new(OWNER, "2,500,000"),
            CabinetScore::new("XYZ", "9,000,000"),
        ],
    );
    cabinet
        .statuses
        .insert(CabinetId::new("2"), ScoreStatus::NoFile);
    cabinet
}

fn scanner<C: CabinetSource, L: LeaderboardSource>(cabinet: C, leaderboard: L) -> Scanner<C, L> {
    let mut options = ScanOptions::new(OWNER);
    options.concurrency = 2;
    Scanner::new(cabinet, leaderboard, options)
}

#[tokio::test]
async fn scans_tables_then_scores() {
    let scanner = scanner(cabinet(), FakeLeaderboard::default());
    let mut model = ScoreModel::new();

    let tables = scanner.scan_tables(&mut model).await.unwrap();
    assert_eq!(tables.total, 3);
    assert_eq!(tables.changes.len(), 3);
    assert!(tables.changes[0].starts_with("New "));

    let scores = scanner.scan_scores(&mut model).await;
    assert_eq!(scores.total, 2);
    assert!(scores.failures.is_empty());

    let afm = model.table(&CabinetId::new("1")).unwrap().clone();
    let board = model.scoreboard_for(&afm);
    assert_eq!(board.entries(), &[Score::new(OWNER, 2_500_000)]);
    assert_eq!(afm.score_status, Some(ScoreStatus::Ok));

    let tz = model.table(&CabinetId::new("2")).unwrap();
    assert_eq!(tz.score_status, Some(ScoreStatus::NoFile));

    // the disabled table is never queried
    assert_eq!(
        scanner.cabinet().score_requests(),
        vec![CabinetId::new("1"), CabinetId::new("2")]
    );
}

#[tokio::test]
async fn rescanning_is_idempotent() {
    let scanner = scanner(cabinet(), FakeLeaderboard::default());
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();
    assert!(scanner.scan_scores(&mut model).await.changed());

    let again = scanner.scan_scores(&mut model).await;
    assert!(!again.changed());
    assert!(scanner.scan_tables(&mut model).await.unwrap().changes.is_empty());

    // status is only fetched while the table has none
    let status_requests = scanner.cabinet().status_requests.lock().unwrap().clone();
    assert_eq!(status_requests, vec![CabinetId::new("2")]);
}

#[tokio::test]
async fn one_failing_table_does_not_stop_the_scan() {
    let mut cabinet = cabinet();
    cabinet.failing.push(CabinetId::new("1"));
    let scanner = scanner(cabinet, FakeLeaderboard::default());
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();

    let report = scanner.scan_scores(&mut model).await;
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].starts_with("Table 1"));
    assert_eq!(
        model.table(&CabinetId::new("2")).unwrap().score_status,
        Some(ScoreStatus::NoFile)
    );
    assert!(model.table(&CabinetId::new("1")).unwrap().score_status.is_none());
}

#[tokio::test]
async fn misattributed_tables_are_skipped() {
    let mut cabinet = cabinet();
    cabinet.tables.push(details(4, "wD", "afm_113b", false));
    cabinet.scores.insert(
        CabinetId::new("4"),
        vec![CabinetScore::new(OWNER, "7,000,000")],
    );
    let scanner = scanner(cabinet, FakeLeaderboard::default());
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();

    let afm = model.table(&CabinetId::new("1")).unwrap().clone();
    model.set_scores_web_id(&afm);

    let report = scanner.scan_scores(&mut model).await;
    assert_eq!(report.total, 2);
    assert!(!scanner.cabinet().score_requests().contains(&CabinetId::new("4")));
    assert_eq!(
        model.scoreboard_for(&afm).entries(),
        &[Score::new(OWNER, 2_500_000)]
    );
}

#[tokio::test]
async fn leaderboard_merge_keeps_local_scores() {
    let mut leaderboard = FakeLeaderboard::default();
    leaderboard.scores.insert(
        WebTableId::new("wA"),
        vec![remote("ABC", 5_000_000), remote(OWNER, 9_000_000), remote("ABC", 5_000_000)],
    );
    let scanner = scanner(cabinet(), leaderboard);
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();
    scanner.scan_scores(&mut model).await;

    let report = scanner.scan_leaderboard(&mut model).await;
    assert!(report.changed());
    assert!(report.failures.is_empty());

    let afm = model.table(&CabinetId::new("1")).unwrap().clone();
    let board = model.scoreboard_for(&afm);
    assert_eq!(
        board.entries(),
        &[Score::new("ABC", 5_000_000), Score::new(OWNER, 2_500_000)]
    );

    let again = scanner.scan_leaderboard(&mut model).await;
    assert!(!again.changed());
}

#[tokio::test]
async fn activity_needs_a_baseline() {
    let cabinet = cabinet();
    let first = Utc.with_ymd_and_hms(2024, 9, 1, 20, 0, 0).unwrap();
    *cabinet.activity.lock().unwrap() = vec![ActivityReport {
        game_id: CabinetId::new("1"),
        last_played: first,
        number_of_plays: 10,
        time_played_secs: 3_000,
    }];
    let scanner = scanner(cabinet, FakeLeaderboard::default());
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();

    let baseline = scanner.scan_activity(&mut model).await.unwrap();
    assert!(!baseline.changed());
    assert!(model.activity().days().is_empty());

    let later = Utc.with_ymd_and_hms(2024, 9, 2, 20, 0, 0).unwrap();
    *scanner.cabinet().activity.lock().unwrap() = vec![ActivityReport {
        game_id: CabinetId::new("1"),
        last_played: later,
        number_of_plays: 12,
        time_played_secs: 3_600,
    }];
    let report = scanner.scan_activity(&mut model).await.unwrap();
    assert!(report.changed());

    let days = model.activity().days();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].total().0, 600);
}

#[tokio::test]
async fn progress_and_messages_are_reported() {
    let (sender, mut receiver) = mpsc::channel(64);
    let scanner = scanner(cabinet(), FakeLeaderboard::default()).with_events(sender);
    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();
    scanner.scan_scores(&mut model).await;

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }

    assert!(events
        .iter()
        .any(|event| matches!(event, ScanEvent::Message(text) if text.starts_with("New "))));
    assert_eq!(
        events
            .iter()
            .rev()
            .find(|event| matches!(event, ScanEvent::Progress { .. })),
        Some(&ScanEvent::Progress { done: 2, total: 2 })
    );
}

#[tokio::test]
async fn progress_is_throttled_but_always_finishes() {
    let cabinet = FakeCabinet {
        tables: (1..=5)
            .map(|id| details(id, &format!("w{id}"), &format!("rom{id}"), false))
            .collect(),
        ..FakeCabinet::default()
    };
    let mut options = ScanOptions::new(OWNER);
    options.concurrency = 2;
    options.progress_interval = Duration::from_secs(3600);
    let (sender, mut receiver) = mpsc::channel(64);
    let scanner = Scanner::new(cabinet, FakeLeaderboard::default(), options).with_events(sender);

    let mut model = ScoreModel::new();
    scanner.scan_tables(&mut model).await.unwrap();
    let report = scanner.scan_scores(&mut model).await;
    assert_eq!(report.total, 5);

    let mut progress = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if matches!(event, ScanEvent::Progress { .. }) {
            progress.push(event);
        }
    }
    assert_eq!(
        progress,
        vec![
            ScanEvent::Progress { done: 1, total: 5 },
            ScanEvent::Progress { done: 5, total: 5 },
        ]
    );
}

#[tokio::test]
async fn scan_all_runs_every_stage() {
    let scanner = scanner(cabinet(), FakeLeaderboard::default());
    let mut model = ScoreModel::new();
    let report = scanner.scan_all(&mut model).await.unwrap();
    assert_eq!(model.tables().len(), 3);
    assert!(report.changed());
    assert!(report.failures.is_empty());
    assert_eq!(model.scoreboards().len(), 1);
}
