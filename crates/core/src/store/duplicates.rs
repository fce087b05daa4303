//! Tables that share a physical score store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{ScoreId, Table, WebTableId};

use super::model::ScoreModel;

/// Classification of a group of tables sharing a score id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplicateDisposition {
    /// Every table is the same design.
    AllMatch,
    /// Every enabled table is the same design; disabled ones may differ.
    AllEnabledMatch,
    /// Nothing in the group is enabled.
    AllDisabled,
    /// Designs differ but the scores are already attributed to one of them.
    NeedsPrimary,
    /// Designs differ and nothing claims the scores; an operator has to pick.
    Mismatch,
}

impl DuplicateDisposition {
    /// Worth showing in a duplicates listing.
    pub fn needs_work(self) -> bool {
        matches!(
            self,
            DuplicateDisposition::NeedsPrimary | DuplicateDisposition::Mismatch
        )
    }

    /// Requires an operator decision.
    pub fn requires_action(self) -> bool {
        self == DuplicateDisposition::Mismatch
    }
}

/// Tables sharing one score id, viewed against the model they came from.
#[derive(Debug, Clone)]
pub struct DuplicateTables<'a> {
    model: &'a ScoreModel,
    tables: Vec<&'a Table>,
}

impl<'a> DuplicateTables<'a> {
    fn new(model: &'a ScoreModel) -> Self {
        Self {
            model,
            tables: Vec::new(),
        }
    }

    /// Tables in the group.
    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    /// Number of tables in the group.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True for an empty group.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// More than one table maps here.
    pub fn is_duplicated(&self) -> bool {
        self.tables.len() > 1
    }

    /// First table whose scores are attributed to it.
    pub fn primary_table(&self) -> Option<&'a Table> {
        self.tables
            .iter()
            .copied()
            .find(|table| self.model.has_attributed_scores(table))
    }

    /// Design of the primary table.
    pub fn primary_web_id(&self) -> Option<&'a WebTableId> {
        self.primary_table().map(|table| &table.web_id)
    }

    /// Current classification; changes as scores are re-attributed.
    pub fn disposition(&self) -> DuplicateDisposition {
        let web_ids = self
            .tables
            .iter()
            .map(|table| &table.web_id)
            .collect::<BTreeSet<_>>();
        if web_ids.len() == 1 {
            return DuplicateDisposition::AllMatch;
        }

        let enabled_web_ids = self
            .tables
            .iter()
            .filter(|table| !table.disabled)
            .map(|table| &table.web_id)
            .collect::<BTreeSet<_>>();
        match enabled_web_ids.len() {
            1 => return DuplicateDisposition::AllEnabledMatch,
            0 => return DuplicateDisposition::AllDisabled,
            _ => {}
        }

        if self.primary_table().is_some() {
            DuplicateDisposition::NeedsPrimary
        } else {
            DuplicateDisposition::Mismatch
        }
    }

    fn push(&mut self, table: &'a Table) {
        self.tables.push(table);
    }
}

/// Group every table by score id.
///
/// A table with offset 0 also joins the group of every positive offset under
/// the same name, since it can read any of them.
pub fn build_duplicates(model: &ScoreModel) -> BTreeMap<ScoreId, DuplicateTables<'_>> {
    let mut offsets_by_name: HashMap<&str, BTreeSet<&ScoreId>> = HashMap::new();
    for table in model.tables().values() {
        if table.score_id.offset > 0 {
            offsets_by_name
                .entry(table.score_id.name.as_str())
                .or_default()
                .insert(&table.score_id);
        }
    }

    let mut result: BTreeMap<ScoreId, DuplicateTables<'_>> = BTreeMap::new();
    for table in model.tables().values() {
        result
            .entry(table.score_id.clone())
            .or_insert_with(|| DuplicateTables::new(model))
            .push(table);

        if table.score_id.is_wildcard() {
            let linked = offsets_by_name
                .get(table.score_id.name.as_str())
                .into_iter()
                .flatten();
            for score_id in linked {
                result
                    .entry((*score_id).clone())
                    .or_insert_with(|| DuplicateTables::new(model))
                    .push(table);
            }
        }
    }

    result
}

/// The group for a single score id, including offset-0 tables of the same name.
pub fn duplicates_for<'a>(model: &'a ScoreModel, score_id: &ScoreId) -> DuplicateTables<'a> {
    let mut group = DuplicateTables::new(model);
    for table in model.tables_with_score_id(score_id) {
        group.push(table);
    }
    if score_id.offset > 0 {
        for table in model.tables_with_score_id(&score_id.with_offset(0)) {
            group.push(table);
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CabinetId, Vr};

    fn table(id: &str, web_id: &str, score_id: ScoreId) -> Table {
        Table {
            cabinet_id: CabinetId::new(id),
            web_id: WebTableId::new(web_id),
            name: format!("Table {id}"),
            long_name: None,
            score_id,
            score_type: None,
            score_status: None,
            disabled: false,
            vr: Vr::Flat,
        }
    }

    fn ids(group: &DuplicateTables<'_>) -> Vec<String> {
        group
            .tables()
            .iter()
            .map(|t| t.cabinet_id.to_string())
            .collect()
    }

    #[test]
    fn zero_offset_joins_offset_groups() {
        let mut model = ScoreModel::new();
        model.set(table("1", "wA", ScoreId::new("x", 0)));
        model.set(table("2", "wB", ScoreId::new("x", 5)));
        model.set(table("3", "wC", ScoreId::new("y", 5)));

        let groups = build_duplicates(&model);
        let group = &groups[&ScoreId::new("x", 5)];
        assert_eq!(ids(group), vec!["1", "2"]);
        assert_eq!(ids(&groups[&ScoreId::new("x", 0)]), vec!["1"]);
        assert!(!groups[&ScoreId::new("y", 5)].is_duplicated());

        let single = duplicates_for(&model, &ScoreId::new("x", 5));
        assert_eq!(ids(&single), vec!["2", "1"]);
    }

    #[test]
    fn disagreeing_group_resolves_once_scores_are_attributed() {
        let mut model = ScoreModel::new();
        let rom = ScoreId::new("rom1", 0);
        let a = table("1", "wA", rom.clone());
        let b = table("2", "wB", rom.clone());
        model.set(a.clone());
        model.set(b.clone());

        {
            let groups = build_duplicates(&model);
            let group = &groups[&rom];
            assert_eq!(group.len(), 2);
            assert_eq!(groups.len(), 1);
            assert_eq!(group.disposition(), DuplicateDisposition::Mismatch);
            assert!(group.disposition().requires_action());
            assert!(group.primary_table().is_none());
        }

        model.set_scores_web_id(&a);

        let groups = build_duplicates(&model);
        let group = &groups[&rom];
        assert_eq!(group.disposition(), DuplicateDisposition::NeedsPrimary);
        assert_eq!(group.primary_table().unwrap().cabinet_id, a.cabinet_id);
        assert_eq!(group.primary_web_id(), Some(&a.web_id));
        assert!(model.has_misconfigured_scores(&b));
    }

    #[test]
    fn dispositions_for_matching_and_disabled_groups() {
        let rom = ScoreId::new("rom1", 0);

        let mut model = ScoreModel::new();
        model.set(table("1", "wA", rom.clone()));
        model.set(table("2", "wA", rom.clone()));
        assert_eq!(
            duplicates_for(&model, &rom).disposition(),
            DuplicateDisposition::AllMatch
        );

        let mut disabled = table("3", "wB", rom.clone());
        disabled.disabled = true;
        model.set(disabled);
        assert_eq!(
            duplicates_for(&model, &rom).disposition(),
            DuplicateDisposition::AllEnabledMatch
        );

        let mut model = ScoreModel::new();
        for (id, web_id) in [("1", "wA"), ("2", "wB")] {
            let mut t = table(id, web_id, rom.clone());
            t.disabled = true;
            model.set(t);
        }
        let disposition = duplicates_for(&model, &rom).disposition();
        assert_eq!(disposition, DuplicateDisposition::AllDisabled);
        assert!(!disposition.needs_work());
    }
}
