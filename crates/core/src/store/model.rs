use std::{
    borrow::Cow,
    collections::{btree_map::Entry, BTreeMap, HashMap, HashSet},
    fmt,
    hash::Hash,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    Activity, ActivityReport, CabinetId, Score, ScoreId, ScoreStatus, Table, TableDetails,
    TableInfo, TableScoreboard, WebTableId,
};

/// In-memory store of cabinet tables, their scoreboards and play activity.
///
/// `tables` is the source of truth. The two lookup indexes hold cabinet ids
/// and are maintained on every table write; they are never persisted and are
/// rebuilt when a model is deserialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredModel")]
pub struct ScoreModel {
    table_info: BTreeMap<WebTableId, TableInfo>,
    scores: BTreeMap<ScoreId, TableScoreboard>,
    tables: BTreeMap<CabinetId, Table>,
    activity: Activity,
    #[serde(skip)]
    tables_by_web_id: HashMap<WebTableId, Vec<CabinetId>>,
    #[serde(skip)]
    tables_by_score_id: HashMap<ScoreId, Vec<CabinetId>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredModel {
    #[serde(default)]
    table_info: BTreeMap<WebTableId, TableInfo>,
    #[serde(default)]
    scores: BTreeMap<ScoreId, TableScoreboard>,
    #[serde(default)]
    tables: BTreeMap<CabinetId, Table>,
    #[serde(default)]
    activity: Activity,
}

impl From<StoredModel> for ScoreModel {
    fn from(stored: StoredModel) -> Self {
        let mut model = ScoreModel {
            table_info: stored.table_info,
            scores: stored.scores,
            tables: BTreeMap::new(),
            activity: stored.activity,
            tables_by_web_id: HashMap::new(),
            tables_by_score_id: HashMap::new(),
        };
        for table in stored.tables.into_values() {
            model.index_table(&table);
            model.tables.insert(table.cabinet_id.clone(), table);
        }
        model
    }
}

/// Change applied while merging a cabinet table list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    /// First time this cabinet id was seen.
    Added {
        /// Cabinet row id.
        id: CabinetId,
        /// Display name.
        name: String,
    },
    /// Metadata changed.
    Updated {
        /// Cabinet row id.
        id: CabinetId,
        /// Display name.
        name: String,
    },
    /// No longer reported by the cabinet.
    Disabled {
        /// Cabinet row id.
        id: CabinetId,
        /// Display name.
        name: String,
    },
}

impl fmt::Display for TableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableChange::Added { name, .. } => write!(f, "New {name}"),
            TableChange::Updated { name, .. } => write!(f, "Update {name}"),
            TableChange::Disabled { name, .. } => write!(f, "Deleted (disabled) {name}"),
        }
    }
}

impl ScoreModel {
    /// Empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// All tables keyed by cabinet id.
    pub fn tables(&self) -> &BTreeMap<CabinetId, Table> {
        &self.tables
    }

    /// Table by cabinet id.
    pub fn table(&self, id: &CabinetId) -> Option<&Table> {
        self.tables.get(id)
    }

    /// Insert or replace a table, keeping both indexes and the scoreboards in step.
    /// Returns the previous value.
    pub fn set(&mut self, table: Table) -> Option<Table> {
        let previous = self.tables.insert(table.cabinet_id.clone(), table.clone());
        self.update_index(previous.as_ref(), &table);
        previous
    }

    /// Edit a table in place through the indexed write path.
    pub fn modify<R>(&mut self, id: &CabinetId, f: impl FnOnce(&mut Table) -> R) -> Option<R> {
        let mut table = self.tables.get(id)?.clone();
        let result = f(&mut table);
        self.set(table);
        Some(result)
    }

    /// Tables sharing a table design.
    pub fn tables_with_web_id<'a>(
        &'a self,
        web_id: &WebTableId,
    ) -> impl Iterator<Item = &'a Table> + 'a {
        self.resolve(self.tables_by_web_id.get(web_id))
    }

    /// Tables whose scores live in the same place.
    pub fn tables_with_score_id<'a>(
        &'a self,
        score_id: &ScoreId,
    ) -> impl Iterator<Item = &'a Table> + 'a {
        self.resolve(self.tables_by_score_id.get(score_id))
    }

    fn resolve<'a>(
        &'a self,
        bucket: Option<&'a Vec<CabinetId>>,
    ) -> impl Iterator<Item = &'a Table> + 'a {
        bucket
            .into_iter()
            .flatten()
            .filter_map(move |id| self.tables.get(id))
    }

    /// All scoreboards keyed by score id.
    pub fn scoreboards(&self) -> &BTreeMap<ScoreId, TableScoreboard> {
        &self.scores
    }

    /// Scoreboard stored under `score_id`.
    pub fn scoreboard(&self, score_id: &ScoreId) -> Option<&TableScoreboard> {
        self.scores.get(score_id)
    }

    /// Store a scoreboard directly.
    pub fn set_scoreboard(&mut self, score_id: ScoreId, scoreboard: TableScoreboard) {
        self.scores.insert(score_id, scoreboard);
    }

    /// Scoreboard for `table`, or an empty one attributed to it.
    ///
    /// The empty default is not stored.
    pub fn scoreboard_for(&self, table: &Table) -> Cow<'_, TableScoreboard> {
        match self.scores.get(&table.score_id) {
            Some(scoreboard) => Cow::Borrowed(scoreboard),
            None => Cow::Owned(TableScoreboard::new(table)),
        }
    }

    /// Mutable scoreboard for `table`, stored on first access.
    pub fn scoreboard_mut(&mut self, table: &Table) -> &mut TableScoreboard {
        self.scores
            .entry(table.score_id.clone())
            .or_insert_with(|| TableScoreboard::new(table))
    }

    /// True when the scores at `table`'s score id are attributed to another design.
    pub fn has_misconfigured_scores(&self, table: &Table) -> bool {
        self.scores
            .get(&table.score_id)
            .map(|scores| scores.web_id != table.web_id)
            .unwrap_or(false)
    }

    /// True when a scoreboard exists at `table`'s score id and is attributed to it.
    pub fn has_attributed_scores(&self, table: &Table) -> bool {
        self.scores
            .get(&table.score_id)
            .map(|scores| scores.web_id == table.web_id)
            .unwrap_or(false)
    }

    /// Attribute the scores at `table`'s score id to `table`'s design.
    pub fn set_scores_web_id(&mut self, table: &Table) {
        self.scoreboard_mut(table).web_id = table.web_id.clone();
    }

    /// Canonical table to show for a score id.
    ///
    /// Prefers an enabled table of the design the scoreboard is attributed to,
    /// then any table of that design, then any enabled table, then any table.
    /// Within a tier the lowest cabinet id wins.
    pub fn representative(&self, score_id: &ScoreId) -> Option<&Table> {
        let first = |keep: &dyn Fn(&Table) -> bool| {
            self.tables_with_score_id(score_id)
                .filter(|&t| keep(t))
                .min_by(|a, b| a.cabinet_id.cmp(&b.cabinet_id))
        };

        if let Some(scores) = self.scores.get(score_id) {
            let web_id = &scores.web_id;
            if let Some(table) = first(&|t| !t.disabled && &t.web_id == web_id) {
                return Some(table);
            }
            if let Some(table) = first(&|t| &t.web_id == web_id) {
                return Some(table);
            }
        }

        first(&|t| !t.disabled).or_else(|| first(&|_| true))
    }

    /// Remove `score` from `table`'s scoreboard. Returns whether anything was removed.
    pub fn remove_score(&mut self, table: &Table, score: &Score) -> bool {
        self.scores
            .get_mut(&table.score_id)
            .map(|scoreboard| scoreboard.remove(score))
            .unwrap_or(false)
    }

    /// Catalog metadata for a design.
    pub fn table_info(&self, web_id: &WebTableId) -> Option<&TableInfo> {
        self.table_info.get(web_id)
    }

    /// Remember catalog metadata for a design. Returns whether it changed.
    pub fn set_table_info(&mut self, web_id: WebTableId, info: TableInfo) -> bool {
        self.table_info.insert(web_id, info.clone()) != Some(info)
    }

    /// Play activity.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Fold cumulative activity reports into the day records.
    pub fn record_activity(&mut self, reports: &[ActivityReport]) -> bool {
        self.activity.record(reports, &self.tables)
    }

    /// Merge a cabinet table list: create new tables, update changed ones and
    /// disable tables the cabinet no longer reports.
    pub fn merge_table_details(&mut self, details: &[TableDetails]) -> Vec<TableChange> {
        let mut changes = Vec::new();

        for detail in details {
            match self.tables.get(&detail.cabinet_id) {
                Some(existing) => {
                    let mut table = existing.clone();
                    if table.update(detail) {
                        debug!("table {} changed", table.cabinet_id);
                        changes.push(TableChange::Updated {
                            id: table.cabinet_id.clone(),
                            name: table.long_display_name().to_string(),
                        });
                        self.set(table);
                    }
                }
                None => {
                    let table = Table::from_details(detail);
                    changes.push(TableChange::Added {
                        id: table.cabinet_id.clone(),
                        name: table.long_display_name().to_string(),
                    });
                    self.set(table);
                }
            }
        }

        let reported = details
            .iter()
            .map(|detail| &detail.cabinet_id)
            .collect::<HashSet<_>>();
        let missing = self
            .tables
            .values()
            .filter(|table| !table.disabled && !reported.contains(&table.cabinet_id))
            .map(|table| table.cabinet_id.clone())
            .collect::<Vec<_>>();

        for id in missing {
            if let Some(name) = self.modify(&id, |table| {
                table.disabled = true;
                table.long_display_name().to_string()
            }) {
                changes.push(TableChange::Disabled { id, name });
            }
        }

        changes
    }

    /// Add a score to `table`'s scoreboard, marking the table's status ok when it is new.
    pub fn record_score(&mut self, table: &Table, score: Score) -> bool {
        let added = self.scoreboard_mut(table).add(score);
        if added {
            self.set_score_status(&table.cabinet_id, ScoreStatus::Ok);
        }
        added
    }

    /// Set the score status of a table.
    pub fn set_score_status(&mut self, id: &CabinetId, status: ScoreStatus) {
        self.modify(id, |table| table.score_status = Some(status));
    }

    /// Clear every status other than ok so the next scan asks again.
    pub fn reset_score_status(&mut self) -> usize {
        let stale = self
            .tables
            .values()
            .filter(|table| table.score_status.is_some_and(|s| s != ScoreStatus::Ok))
            .map(|table| table.cabinet_id.clone())
            .collect::<Vec<_>>();
        for id in &stale {
            self.modify(id, |table| table.score_status = None);
        }
        stale.len()
    }

    /// Replace the remote entries of a scoreboard with a leaderboard snapshot.
    /// Returns false when no scoreboard exists for `score_id`.
    pub fn merge_leaderboard(
        &mut self,
        score_id: &ScoreId,
        remote: Vec<Score>,
        owner: &str,
    ) -> bool {
        match self.scores.get_mut(score_id) {
            Some(scoreboard) => {
                scoreboard.merge_leaderboard_scores(remote, owner);
                true
            }
            None => false,
        }
    }

    fn index_table(&mut self, table: &Table) {
        self.tables_by_web_id
            .entry(table.web_id.clone())
            .or_default()
            .push(table.cabinet_id.clone());
        self.tables_by_score_id
            .entry(table.score_id.clone())
            .or_default()
            .push(table.cabinet_id.clone());
    }

    fn update_index(&mut self, old: Option<&Table>, new: &Table) {
        let Some(old) = old else {
            self.index_table(new);
            return;
        };

        if old.web_id != new.web_id {
            remove_from_bucket(&mut self.tables_by_web_id, &old.web_id, &old.cabinet_id);
            self.tables_by_web_id
                .entry(new.web_id.clone())
                .or_default()
                .push(new.cabinet_id.clone());
        }

        if old.score_id != new.score_id {
            remove_from_bucket(&mut self.tables_by_score_id, &old.score_id, &old.cabinet_id);
            self.tables_by_score_id
                .entry(new.score_id.clone())
                .or_default()
                .push(new.cabinet_id.clone());
            self.relocate_scores(old, new);
        }
    }

    /// Move the scoreboard along with a table whose score id changed.
    ///
    /// Only done when the old score id was manual or the scores are attributed
    /// to the moving table's design; otherwise they belong to another table
    /// still sharing the old slot and stay where they are.
    fn relocate_scores(&mut self, old: &Table, new: &Table) {
        let belongs_to_table = match self.scores.get(&old.score_id) {
            Some(scores) => old.score_id.is_manual() || scores.web_id == old.web_id,
            None => return,
        };
        if !belongs_to_table {
            debug!(
                "scores at {} stay put, attributed to another design than {}",
                old.score_id, old.web_id
            );
            return;
        }

        let Some(mut scoreboard) = self.scores.remove(&old.score_id) else {
            return;
        };
        debug!("moving scores {} -> {}", old.score_id, new.score_id);
        scoreboard.web_id = new.web_id.clone();
        match self.scores.entry(new.score_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(scoreboard);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.web_id = new.web_id.clone();
                existing.absorb(scoreboard);
            }
        }
    }
}

fn remove_from_bucket<K>(index: &mut HashMap<K, Vec<CabinetId>>, key: &K, id: &CabinetId)
where
    K: Hash + Eq + fmt::Display,
{
    let bucket = index.get_mut(key);
    let position = bucket
        .as_ref()
        .and_then(|bucket| bucket.iter().position(|entry| entry == id));
    assert!(
        position.is_some(),
        "table {id} missing from index bucket {key}"
    );
    if let (Some(bucket), Some(position)) = (bucket, position) {
        bucket.remove(position);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}
