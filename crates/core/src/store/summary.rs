use chrono::{DateTime, Utc};

use crate::models::{CabinetId, Table};

use super::model::ScoreModel;

/// Per-table numbers shown in table listings.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    /// The table.
    pub table: Table,
    /// Number of the owner's scores.
    pub score_count: usize,
    /// Owner's best score, 0 when none.
    pub score: i64,
    /// Owner's rank, 0 when unranked.
    pub rank: usize,
    /// Other players plus one.
    pub rank_count: usize,
    /// Date of the owner's best score.
    pub last_score_date: Option<DateTime<Utc>>,
}

impl TableSummary {
    /// Summarise `table` for `owner`.
    pub fn new(table: &Table, model: &ScoreModel, owner: &str) -> Self {
        let scoreboard = model.scoreboard(&table.score_id);
        let best = scoreboard.and_then(|s| s.best(owner));
        Self {
            table: table.clone(),
            score_count: scoreboard.map(|s| s.local_count(owner)).unwrap_or(0),
            score: best.map(|s| s.score).unwrap_or(0),
            rank: scoreboard.and_then(|s| s.rank(owner)).unwrap_or(0),
            rank_count: scoreboard.map(|s| s.rank_count(owner)).unwrap_or(0),
            last_score_date: best.map(|s| s.date),
        }
    }

    /// Cabinet id of the summarised table.
    pub fn id(&self) -> &CabinetId {
        &self.table.cabinet_id
    }

    /// Summaries for every table in listing order.
    pub fn all(model: &ScoreModel, owner: &str) -> Vec<TableSummary> {
        let mut summaries = model
            .tables()
            .values()
            .map(|table| TableSummary::new(table, model, owner))
            .collect::<Vec<_>>();
        summaries.sort_by(|a, b| Table::display_order(&a.table, &b.table));
        summaries
    }
}
