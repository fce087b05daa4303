//! Pulling tables, scores, leaderboards and play statistics from the
//! collaborators into a [`ScoreModel`].

use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    clients::{best_score, CabinetSource, CatalogSource, LeaderboardSource, TableCatalog},
    config::AppConfig,
    error::ClientError,
    models::{Score, ScoreId, ScoreStatus, Table, TableInfo, WebTableId},
    store::ScoreModel,
};

/// Events emitted while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Items finished so far.
    Progress {
        /// Finished items.
        done: usize,
        /// Items in this scan.
        total: usize,
    },
    /// Human readable change or failure.
    Message(String),
}

/// Knobs for a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Initials whose cabinet scores are imported.
    pub owner_initials: String,
    /// Requests in flight at once.
    pub concurrency: usize,
    /// Minimum spacing between progress events.
    pub progress_interval: Duration,
}

impl ScanOptions {
    /// Options for `owner` with the default limits.
    pub fn new(owner_initials: impl Into<String>) -> Self {
        Self {
            owner_initials: owner_initials.into(),
            concurrency: 8,
            progress_interval: Duration::from_millis(250),
        }
    }

    /// Options taken from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            owner_initials: config.owner_initials.clone(),
            concurrency: config.scan_concurrency.max(1),
            progress_interval: config.progress_interval(),
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Items examined.
    pub total: usize,
    /// Changes applied to the model.
    pub changes: Vec<String>,
    /// Items that could not be fetched.
    pub failures: Vec<String>,
}

impl ScanReport {
    /// The model was modified.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    fn extend(&mut self, other: ScanReport) {
        self.total += other.total;
        self.changes.extend(other.changes);
        self.failures.extend(other.failures);
    }
}

enum ScoreOutcome {
    Score(Score),
    Status(ScoreStatus),
    Unchanged,
}

struct Progress<'a> {
    done: usize,
    total: usize,
    interval: Duration,
    next: Instant,
    events: Option<&'a mpsc::Sender<ScanEvent>>,
}

impl<'a> Progress<'a> {
    fn new(total: usize, interval: Duration, events: Option<&'a mpsc::Sender<ScanEvent>>) -> Self {
        Self {
            done: 0,
            total,
            interval,
            next: Instant::now(),
            events,
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        let now = Instant::now();
        if now >= self.next {
            self.next = now + self.interval;
            self.send();
        }
    }

    fn finish(&self) {
        self.send();
    }

    fn send(&self) {
        if let Some(events) = self.events {
            let _ = events.try_send(ScanEvent::Progress {
                done: self.done,
                total: self.total,
            });
        }
    }
}

/// Applies collaborator data to a model.
///
/// Fetches fan out up to [`ScanOptions::concurrency`] at a time; results are
/// applied to the model one by one as they arrive. A failed fetch is
/// reported and skipped, the rest of the scan carries on.
pub struct Scanner<C, L> {
    cabinet: C,
    leaderboard: L,
    options: ScanOptions,
    events: Option<mpsc::Sender<ScanEvent>>,
}

impl<C: CabinetSource, L: LeaderboardSource> Scanner<C, L> {
    /// Scanner over the given collaborators.
    pub fn new(cabinet: C, leaderboard: L, options: ScanOptions) -> Self {
        Self {
            cabinet,
            leaderboard,
            options,
            events: None,
        }
    }

    /// Send progress and messages to `sender`. Events are dropped when the
    /// channel is full.
    pub fn with_events(mut self, sender: mpsc::Sender<ScanEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// The cabinet collaborator.
    pub fn cabinet(&self) -> &C {
        &self.cabinet
    }

    /// The leaderboard collaborator.
    pub fn leaderboard(&self) -> &L {
        &self.leaderboard
    }

    /// Scan options in use.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn message(&self, text: &str) {
        if let Some(events) = &self.events {
            let _ = events.try_send(ScanEvent::Message(text.to_string()));
        }
    }

    fn changed(&self, report: &mut ScanReport, text: String) {
        info!("{text}");
        self.message(&text);
        report.changes.push(text);
    }

    fn failed(&self, report: &mut ScanReport, text: String) {
        warn!("{text}");
        self.message(&text);
        report.failures.push(text);
    }

    /// Merge the cabinet's table list into the model.
    pub async fn scan_tables(&self, model: &mut ScoreModel) -> Result<ScanReport, ClientError> {
        let details = self.cabinet.tables().await?;
        let mut report = ScanReport {
            total: details.len(),
            ..ScanReport::default()
        };
        for change in model.merge_table_details(&details) {
            self.changed(&mut report, change.to_string());
        }
        debug!("table scan: {} tables, {} changes", report.total, report.changes.len());
        Ok(report)
    }

    /// Import the owner's best cabinet score for every enabled, correctly
    /// attributed table. Tables without a score and without a status get
    /// their status fetched instead.
    pub async fn scan_scores(&self, model: &mut ScoreModel) -> ScanReport {
        let tables = model
            .tables()
            .values()
            .filter(|table| !table.disabled && !model.has_misconfigured_scores(table))
            .cloned()
            .collect::<Vec<_>>();

        let mut report = ScanReport {
            total: tables.len(),
            ..ScanReport::default()
        };
        let mut progress = Progress::new(
            tables.len(),
            self.options.progress_interval,
            self.events.as_ref(),
        );

        let cabinet = &self.cabinet;
        let owner = self.options.owner_initials.as_str();
        let mut results = stream::iter(tables)
            .map(move |table| async move {
                let outcome = fetch_table_score(cabinet, &table, owner).await;
                (table, outcome)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        while let Some((table, outcome)) = results.next().await {
            progress.tick();
            match outcome {
                Ok(ScoreOutcome::Score(score)) => {
                    let value = score.score;
                    if model.record_score(&table, score) {
                        self.changed(&mut report, format!("{}: new score {value}", table.name));
                    }
                }
                Ok(ScoreOutcome::Status(status)) => {
                    model.set_score_status(&table.cabinet_id, status);
                    if status != ScoreStatus::Ok {
                        let text = format!("{}: score status {status}", table.name);
                        self.changed(&mut report, text);
                    }
                }
                Ok(ScoreOutcome::Unchanged) => {}
                Err(err) => self.failed(&mut report, format!("{}: {err}", table.name)),
            }
        }
        progress.finish();
        report
    }

    /// Refresh every scoreboard's remote entries from the leaderboard.
    pub async fn scan_leaderboard(&self, model: &mut ScoreModel) -> ScanReport {
        let boards = model
            .scoreboards()
            .iter()
            .map(|(score_id, scoreboard)| (score_id.clone(), scoreboard.web_id.clone()))
            .collect::<Vec<(ScoreId, WebTableId)>>();

        let mut report = ScanReport {
            total: boards.len(),
            ..ScanReport::default()
        };
        let mut progress = Progress::new(
            boards.len(),
            self.options.progress_interval,
            self.events.as_ref(),
        );

        let leaderboard = &self.leaderboard;
        let mut results = stream::iter(boards)
            .map(move |(score_id, web_id)| async move {
                let scores = leaderboard.scores(&web_id).await;
                (score_id, scores)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let owner = self.options.owner_initials.as_str();
        while let Some((score_id, scores)) = results.next().await {
            progress.tick();
            match scores {
                Ok(scores) => {
                    let before = model.scoreboard(&score_id).cloned();
                    let remote = scores.into_iter().map(|s| s.into_score()).collect();
                    model.merge_leaderboard(&score_id, remote, owner);
                    if model.scoreboard(&score_id) != before.as_ref() {
                        self.changed(&mut report, format!("{score_id}: leaderboard updated"));
                    }
                }
                Err(err) => self.failed(&mut report, format!("{score_id}: {err}")),
            }
        }
        progress.finish();
        report
    }

    /// Fold the cabinet's cumulative play statistics into the activity log.
    pub async fn scan_activity(&self, model: &mut ScoreModel) -> Result<ScanReport, ClientError> {
        let reports = self.cabinet.activity().await?;
        let mut report = ScanReport {
            total: reports.len(),
            ..ScanReport::default()
        };
        if model.record_activity(&reports) {
            self.changed(&mut report, format!("activity recorded for {} tables", reports.len()));
        }
        Ok(report)
    }

    /// Tables, then scores, then activity.
    pub async fn scan_all(&self, model: &mut ScoreModel) -> Result<ScanReport, ClientError> {
        let mut report = self.scan_tables(model).await?;
        report.extend(self.scan_scores(model).await);
        match self.scan_activity(model).await {
            Ok(activity) => report.extend(activity),
            Err(err) => self.failed(&mut report, format!("activity: {err}")),
        }
        Ok(report)
    }

    /// Remember catalog titles for every design present on the cabinet.
    pub async fn refresh_catalog_names<S: CatalogSource + 'static>(
        &self,
        model: &mut ScoreModel,
        catalog: &TableCatalog<S>,
    ) -> Result<ScanReport, ClientError> {
        let web_ids = model
            .tables()
            .values()
            .map(|table| table.web_id.clone())
            .collect::<BTreeSet<_>>();

        let mut report = ScanReport {
            total: web_ids.len(),
            ..ScanReport::default()
        };
        for web_id in web_ids {
            let Some(entry) = catalog.find_id(&web_id).await? else {
                continue;
            };
            let name = entry.title();
            if model.set_table_info(web_id.clone(), TableInfo { name: name.clone() }) {
                self.changed(&mut report, format!("{web_id}: {name}"));
            }
        }
        Ok(report)
    }
}

async fn fetch_table_score<C: CabinetSource>(
    cabinet: &C,
    table: &Table,
    owner: &str,
) -> Result<ScoreOutcome, ClientError> {
    let scores = cabinet.scores(&table.cabinet_id).await?;
    if let Some(best) = best_score(&scores, owner) {
        return Ok(ScoreOutcome::Score(Score::new(owner, best.numeric_score)));
    }
    if table.score_status.is_none() {
        let status = cabinet.score_status(&table.cabinet_id).await?;
        return Ok(ScoreOutcome::Status(status));
    }
    Ok(ScoreOutcome::Unchanged)
}
