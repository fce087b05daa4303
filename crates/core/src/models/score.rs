//! Score entries and per-store scoreboards.

use std::{
    cmp::Ordering,
    collections::HashSet,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ids::WebTableId, table::Table};

/// A single high score.
///
/// Two scores are the same entry when initials and value match; the date is
/// informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    /// Player initials as shown on the machine.
    pub initials: String,
    /// Score value.
    pub score: i64,
    /// When the score was recorded.
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

impl Score {
    /// Create a score recorded now.
    pub fn new(initials: impl Into<String>, score: i64) -> Self {
        Self {
            initials: initials.into(),
            score,
            date: Utc::now(),
        }
    }

    /// Create a score with an explicit timestamp.
    pub fn at(initials: impl Into<String>, score: i64, date: DateTime<Utc>) -> Self {
        Self {
            initials: initials.into(),
            score,
            date,
        }
    }

    /// True when the score belongs to `owner`.
    pub fn is_local(&self, owner: &str) -> bool {
        self.initials == owner
    }

    /// Best-first ordering: higher score first, initials break ties.
    pub fn ranking(a: &Score, b: &Score) -> Ordering {
        b.score
            .cmp(&a.score)
            .then_with(|| a.initials.cmp(&b.initials))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.initials == other.initials && self.score == other.score
    }
}

impl Eq for Score {}

impl Hash for Score {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.initials.hash(state);
        self.score.hash(state);
    }
}

/// Scores stored under one [`ScoreId`](super::ScoreId).
///
/// `web_id` records which table design the list is attributed to. Entries are
/// always kept best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableScoreboard {
    /// Table design that owns this score list.
    pub web_id: WebTableId,
    /// Name of the table when the list was created.
    pub name: String,
    #[serde(default)]
    entries: Vec<Score>,
}

impl TableScoreboard {
    /// Empty scoreboard attributed to `table`.
    pub fn new(table: &Table) -> Self {
        Self {
            web_id: table.web_id.clone(),
            name: table.name.clone(),
            entries: Vec::new(),
        }
    }

    /// Entries, best first.
    pub fn entries(&self) -> &[Score] {
        &self.entries
    }

    /// True when no scores are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries belonging to `owner`.
    pub fn local_count(&self, owner: &str) -> usize {
        self.entries.iter().filter(|s| s.is_local(owner)).count()
    }

    /// 1-based position of the best entry for `initials`.
    pub fn rank(&self, initials: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|s| s.initials == initials)
            .map(|index| index + 1)
    }

    /// Entries from other players plus one, i.e. the "of N" in "rank X of N".
    pub fn rank_count(&self, initials: &str) -> usize {
        self.entries
            .iter()
            .filter(|s| s.initials != initials)
            .count()
            + 1
    }

    /// Highest entry for `initials`.
    pub fn best(&self, initials: &str) -> Option<&Score> {
        self.entries.iter().find(|s| s.initials == initials)
    }

    /// Insert unless an identical entry already exists. Returns whether it was inserted.
    pub fn add(&mut self, score: Score) -> bool {
        if self.entries.contains(&score) {
            return false;
        }
        self.entries.push(score);
        self.entries.sort_by(Score::ranking);
        true
    }

    /// Remove entries matching `score`. Returns whether any were removed.
    pub fn remove(&mut self, score: &Score) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s != score);
        self.entries.len() != before
    }

    /// Replace every non-local entry with the de-duplicated `remote` set.
    ///
    /// Entries belonging to `owner` are kept as they are and remote entries
    /// carrying the owner's initials are ignored.
    pub fn merge_leaderboard_scores<I>(&mut self, remote: I, owner: &str)
    where
        I: IntoIterator<Item = Score>,
    {
        let mut seen = HashSet::new();
        let remote = remote
            .into_iter()
            .filter(|s| !s.is_local(owner))
            .filter(|s| seen.insert(s.clone()))
            .collect::<Vec<_>>();

        self.entries.retain(|s| s.is_local(owner));
        self.entries.extend(remote);
        self.entries.sort_by(Score::ranking);
    }

    /// Fold every entry of `other` into this list.
    pub(crate) fn absorb(&mut self, other: TableScoreboard) {
        for score in other.entries {
            self.add(score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CabinetId, ScoreId, Vr};

    const OWNER: &str = "DMK";

    fn scoreboard() -> TableScoreboard {
        let table = Table {
            cabinet_id: CabinetId::new("1"),
            web_id: WebTableId::new("w1"),
            name: "Medieval Madness".to_string(),
            long_name: None,
            score_id: ScoreId::new("mm_109c", 0),
            score_type: None,
            score_status: None,
            disabled: false,
            vr: Vr::Flat,
        };
        TableScoreboard::new(&table)
    }

    #[test]
    fn add_is_idempotent() {
        let mut board = scoreboard();
        assert!(board.add(Score::new("AA", 1000)));
        assert!(!board.add(Score::new("AA", 1000)));
        assert_eq!(board.entries().len(), 1);
    }

    #[test]
    fn entries_stay_sorted_and_rank_follows_best() {
        let mut board = scoreboard();
        board.add(Score::new("BOB", 500));
        board.add(Score::new(OWNER, 700));
        board.add(Score::new("ZED", 9000));
        board.add(Score::new(OWNER, 100));

        let values = board.entries().iter().map(|s| s.score).collect::<Vec<_>>();
        assert_eq!(values, vec![9000, 700, 500, 100]);

        let best = board.best(OWNER).unwrap();
        assert_eq!(best.score, 700);
        let index = board.entries().iter().position(|s| s == best).unwrap();
        assert_eq!(board.rank(OWNER), Some(index + 1));
        assert_eq!(board.rank("NOPE"), None);
        assert_eq!(board.rank_count(OWNER), 3);
        assert_eq!(board.rank_count("NOPE"), 5);
        assert_eq!(board.local_count(OWNER), 2);
    }

    #[test]
    fn remove_matches_initials_and_value_only() {
        let mut board = scoreboard();
        board.add(Score::new("AA", 10));
        board.add(Score::new("AA", 20));
        assert!(board.remove(&Score::new("AA", 10)));
        assert!(!board.remove(&Score::new("AA", 10)));
        assert_eq!(board.entries().len(), 1);
        assert_eq!(board.entries()[0].score, 20);
    }

    #[test]
    fn leaderboard_merge_is_idempotent_and_keeps_local_entries() {
        let mut board = scoreboard();
        board.add(Score::new(OWNER, 4200));
        board.add(Score::new("OLD", 1));

        let remote = vec![
            Score::new("AAA", 5000),
            Score::new("AAA", 5000),
            Score::new("BBB", 3000),
            Score::new(OWNER, 99999),
        ];

        board.merge_leaderboard_scores(remote.clone(), OWNER);
        let once = board.entries().to_vec();
        board.merge_leaderboard_scores(remote, OWNER);

        assert_eq!(board.entries(), once.as_slice());
        let values = once
            .iter()
            .map(|s| (s.initials.as_str(), s.score))
            .collect::<Vec<_>>();
        assert_eq!(values, vec![("AAA", 5000), (OWNER, 4200), ("BBB", 3000)]);
    }

    #[test]
    fn score_equality_ignores_date() {
        let a = Score::at("AA", 1, DateTime::<Utc>::MIN_UTC);
        let b = Score::new("AA", 1);
        assert_eq!(a, b);
    }
}
