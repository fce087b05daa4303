//! Cabinet tables and the table-detail records they are built from.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use super::ids::{CabinetId, ScoreId, WebTableId};

/// How a table stores its high scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HighScoreType {
    /// Rom NVRAM, addressed by rom plus offset.
    #[serde(rename = "NVRam")]
    NvRam,
    /// Electro-mechanical table writing a text file.
    #[serde(rename = "EM")]
    Em,
    /// Entry in the VPReg.stg store.
    #[serde(rename = "VPReg")]
    VpReg,
    /// No known store.
    #[serde(rename = "N/A")]
    Na,
}

/// Coarse reason a table has (or lacks) a score, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreStatus {
    /// Scores were read.
    #[serde(rename = "ok")]
    Ok,
    /// Another table already claims the rom.
    #[serde(rename = "duplicate")]
    Duplicate,
    /// Store exists but holds no score for the owner yet.
    #[serde(rename = "no score")]
    NoScore,
    /// VPReg entry without any high score entries.
    #[serde(rename = "empty")]
    Empty,
    /// No nvram, VPReg entry or high score file.
    #[serde(rename = "no file")]
    NoFile,
    /// The nvram format cannot be decoded.
    #[serde(rename = "not supported")]
    NotSupported,
    /// Anything else.
    #[serde(rename = "unknown")]
    Unknown,
}

impl ScoreStatus {
    /// Wire text, e.g. `"no file"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreStatus::Ok => "ok",
            ScoreStatus::Duplicate => "duplicate",
            ScoreStatus::NoScore => "no score",
            ScoreStatus::Empty => "empty",
            ScoreStatus::NoFile => "no file",
            ScoreStatus::NotSupported => "not supported",
            ScoreStatus::Unknown => "unknown",
        }
    }

    /// Classify the status text reported by a score rescan.
    pub fn from_scan_text(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return ScoreStatus::NoScore;
        };
        if status.starts_with("Found VPReg entry, but no highscore entries in it") {
            ScoreStatus::Empty
        } else if status.starts_with("No nvram file") {
            ScoreStatus::NoFile
        } else if status.starts_with("The NV ram file") {
            ScoreStatus::NotSupported
        } else {
            tracing::warn!("unknown score status: {status}");
            ScoreStatus::Unknown
        }
    }
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VR support advertised by a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Vr {
    /// Built for VR.
    Full,
    /// Playable in VR.
    Partial,
    /// Desktop/cabinet only.
    Flat,
}

impl Vr {
    /// Derived from the display-name suffix convention (`VR`, `VROK`).
    pub fn from_display_name(name: Option<&str>) -> Self {
        let name = name.unwrap_or_default();
        if name.ends_with("VROK") {
            Vr::Partial
        } else if name.ends_with("VR") {
            Vr::Full
        } else {
            Vr::Flat
        }
    }

    /// Whether a table of this kind satisfies a filter for `other`.
    pub fn matches(self, other: Vr) -> bool {
        matches!(
            (self, other),
            (Vr::Full, Vr::Full) | (Vr::Full, Vr::Partial) | (Vr::Partial, Vr::Partial) | (_, Vr::Flat)
        )
    }
}

/// Table record as reported by the cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetails {
    /// Short name.
    pub game_name: String,
    /// Long name with author/version.
    #[serde(default)]
    pub game_display_name: Option<String>,
    /// Catalog id.
    #[serde(rename = "extTableId")]
    pub web_id: WebTableId,
    /// Cabinet row id.
    #[serde(rename = "id")]
    pub cabinet_id: CabinetId,
    /// Storage kind, if known.
    #[serde(default)]
    pub highscore_type: Option<HighScoreType>,
    /// Rom name.
    #[serde(default)]
    pub rom: String,
    /// EM high score file name.
    #[serde(default)]
    pub hs_file_name: Option<String>,
    /// NVRAM offset.
    #[serde(default)]
    pub nv_offset: i64,
    /// Disabled in the cabinet front end.
    #[serde(default)]
    pub disabled: bool,
}

impl TableDetails {
    /// Physical score identity implied by the storage kind.
    pub fn score_id(&self) -> ScoreId {
        match self.highscore_type {
            Some(HighScoreType::NvRam) => ScoreId::new(self.rom.clone(), self.nv_offset),
            Some(HighScoreType::Em) => {
                let name = self
                    .hs_file_name
                    .clone()
                    .unwrap_or_else(|| self.rom.clone());
                ScoreId::new(name, 0)
            }
            Some(HighScoreType::VpReg) => ScoreId::new(self.rom.clone(), 0),
            Some(HighScoreType::Na) | None => ScoreId::manual(&self.web_id),
        }
    }

    /// VR classification from the display name.
    pub fn vr(&self) -> Vr {
        Vr::from_display_name(self.game_display_name.as_deref())
    }
}

/// One table installed on the cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Cabinet row id.
    pub cabinet_id: CabinetId,
    /// Catalog id of the table design.
    pub web_id: WebTableId,
    /// Short name, e.g. `2001 (Gottlieb 1971)`.
    pub name: String,
    /// Long name, e.g. `2001 (Gottlieb 1971) Wrd1972 0.99a`.
    #[serde(default)]
    pub long_name: Option<String>,
    /// Where the high scores live.
    pub score_id: ScoreId,
    /// Storage kind reported by the cabinet.
    #[serde(default)]
    pub score_type: Option<HighScoreType>,
    /// Result of the last score scan.
    #[serde(default)]
    pub score_status: Option<ScoreStatus>,
    /// Disabled or no longer present on the cabinet.
    #[serde(default)]
    pub disabled: bool,
    /// VR support.
    #[serde(default = "flat")]
    pub vr: Vr,
}

fn flat() -> Vr {
    Vr::Flat
}

impl Table {
    /// Build a table from a cabinet record.
    pub fn from_details(details: &TableDetails) -> Self {
        Self {
            cabinet_id: details.cabinet_id.clone(),
            web_id: details.web_id.clone(),
            name: details.game_name.clone(),
            long_name: details.game_display_name.clone(),
            score_id: details.score_id(),
            score_type: details.highscore_type,
            score_status: None,
            disabled: details.disabled,
            vr: details.vr(),
        }
    }

    /// Apply changed fields from a fresh cabinet record. Returns whether anything changed.
    pub fn update(&mut self, details: &TableDetails) -> bool {
        let mut changed = false;
        changed |= assign(&mut self.name, &details.game_name);
        changed |= assign(&mut self.long_name, &details.game_display_name);
        changed |= assign(&mut self.web_id, &details.web_id);
        changed |= assign(&mut self.disabled, &details.disabled);
        changed |= assign(&mut self.score_type, &details.highscore_type);
        changed |= assign(&mut self.score_id, &details.score_id());
        changed |= assign(&mut self.vr, &details.vr());
        changed
    }

    /// Long name when known, else the short name.
    pub fn long_display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.name)
    }

    /// Lowercased name without leading articles/author prefixes.
    pub fn sort_key(&self) -> String {
        self.name
            .to_lowercase()
            .replace("the ", "")
            .replace("jp's ", "")
    }

    /// Listing order by [`Table::sort_key`].
    pub fn display_order(a: &Table, b: &Table) -> Ordering {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.cabinet_id.cmp(&b.cabinet_id))
    }

    /// Status used when sorting; unset sorts as unknown.
    pub fn comparable_score_status(&self) -> ScoreStatus {
        self.score_status.unwrap_or(ScoreStatus::Unknown)
    }

    /// Storage kind used when sorting; unset sorts as n/a.
    pub fn comparable_score_type(&self) -> HighScoreType {
        self.score_type.unwrap_or(HighScoreType::Na)
    }
}

fn assign<V: PartialEq + Clone>(target: &mut V, value: &V) -> bool {
    if target != value {
        *target = value.clone();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> TableDetails {
        serde_json::from_str(
            r#"{
                "gameName": "Attack from Mars (Bally 1995)",
                "gameDisplayName": "Attack from Mars (Bally 1995) VPW 1.0",
                "extTableId": "afm",
                "id": 17,
                "highscoreType": "NVRam",
                "rom": "afm_113b",
                "hsFileName": null,
                "nvOffset": 2,
                "disabled": false
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn score_id_follows_storage_type() {
        let mut d = details();
        assert_eq!(d.score_id(), ScoreId::new("afm_113b", 2));

        d.highscore_type = Some(HighScoreType::Em);
        assert_eq!(d.score_id(), ScoreId::new("afm_113b", 0));
        d.hs_file_name = Some("AFM.txt".to_string());
        assert_eq!(d.score_id(), ScoreId::new("AFM.txt", 0));

        d.highscore_type = Some(HighScoreType::VpReg);
        assert_eq!(d.score_id(), ScoreId::new("afm_113b", 0));

        d.highscore_type = None;
        assert!(d.score_id().is_manual());
        assert_eq!(d.score_id().name, "afm");
        d.highscore_type = Some(HighScoreType::Na);
        assert_eq!(d.score_id(), ScoreId::new("afm", -1));
    }

    #[test]
    fn vr_classification_and_matching() {
        assert_eq!(Vr::from_display_name(Some("Table VR")), Vr::Full);
        assert_eq!(Vr::from_display_name(Some("Table VROK")), Vr::Partial);
        assert_eq!(Vr::from_display_name(None), Vr::Flat);

        assert!(Vr::Full.matches(Vr::Partial));
        assert!(!Vr::Partial.matches(Vr::Full));
        assert!(Vr::Flat.matches(Vr::Flat));
        assert!(Vr::Partial.matches(Vr::Flat));
        assert!(!Vr::Flat.matches(Vr::Partial));
    }

    #[test]
    fn update_reports_only_real_changes() {
        let d = details();
        let mut table = Table::from_details(&d);
        assert!(!table.update(&d));

        let mut renamed = d.clone();
        renamed.game_display_name = Some("Attack from Mars VR".to_string());
        renamed.nv_offset = 3;
        assert!(table.update(&renamed));
        assert_eq!(table.vr, Vr::Full);
        assert_eq!(table.score_id, ScoreId::new("afm_113b", 3));
        assert!(!table.update(&renamed));
    }

    #[test]
    fn statuses_sort_in_display_order() {
        let mut statuses = vec![ScoreStatus::Unknown, ScoreStatus::NoFile, ScoreStatus::Ok];
        statuses.sort();
        assert_eq!(
            statuses,
            vec![ScoreStatus::Ok, ScoreStatus::NoFile, ScoreStatus::Unknown]
        );
        assert_eq!(
            serde_json::to_string(&ScoreStatus::NotSupported).unwrap(),
            r#""not supported""#
        );
    }

    #[test]
    fn scan_text_classification() {
        assert_eq!(ScoreStatus::from_scan_text(None), ScoreStatus::NoScore);
        assert_eq!(
            ScoreStatus::from_scan_text(Some(
                "No nvram file, VPReg.stg entry or highscore text file found."
            )),
            ScoreStatus::NoFile
        );
        assert_eq!(
            ScoreStatus::from_scan_text(Some("The NV ram file \"x.nv\" is not supported")),
            ScoreStatus::NotSupported
        );
        assert_eq!(
            ScoreStatus::from_scan_text(Some(
                "Found VPReg entry, but no highscore entries in it."
            )),
            ScoreStatus::Empty
        );
        assert_eq!(
            ScoreStatus::from_scan_text(Some("something new")),
            ScoreStatus::Unknown
        );
    }

    #[test]
    fn sort_key_drops_articles() {
        let mut d = details();
        d.game_name = "The Addams Family".to_string();
        assert_eq!(Table::from_details(&d).sort_key(), "addams family");
        d.game_name = "JP's Star Trek".to_string();
        assert_eq!(Table::from_details(&d).sort_key(), "star trek");
    }
}
