//! Play-time tracking built from cumulative cabinet snapshots.

use std::{
    collections::BTreeMap,
    fmt,
    iter::Sum,
    ops::{Add, Sub},
};

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ids::{CabinetId, WebTableId},
    table::Table,
};

/// Calendar day encoded as `yyyymmdd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(pub i32);

impl Day {
    /// Day of `date` in the local time zone.
    pub fn from_datetime(date: DateTime<Utc>) -> Self {
        Self::from(date.with_timezone(&Local).date_naive())
    }

    /// Four digit year.
    pub fn year(self) -> i32 {
        self.0 / 10_000
    }

    /// Month, 1-12.
    pub fn month(self) -> u32 {
        ((self.0 % 10_000) / 100) as u32
    }

    /// Day of month, 1-31.
    pub fn day(self) -> u32 {
        (self.0 % 100) as u32
    }

    /// Calendar date, if the code is valid.
    pub fn date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year(), self.month(), self.day())
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Day(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.month(), self.day(), self.year())
    }
}

/// A duration in whole seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Seconds(pub i64);

impl Add for Seconds {
    type Output = Seconds;

    fn add(self, rhs: Seconds) -> Seconds {
        Seconds(self.0 + rhs.0)
    }
}

impl Sub for Seconds {
    type Output = Seconds;

    fn sub(self, rhs: Seconds) -> Seconds {
        Seconds(self.0 - rhs.0)
    }
}

impl Sum for Seconds {
    fn sum<I: Iterator<Item = Seconds>>(iter: I) -> Seconds {
        iter.fold(Seconds::default(), Add::add)
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.0 / 60;
        let seconds = self.0 % 60;
        if minutes == 0 {
            write!(f, "{seconds} s")
        } else {
            write!(f, "{minutes:02} m {seconds:02} s")
        }
    }
}

/// Cumulative play statistics for one table as reported by the cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    /// Cabinet row id.
    pub game_id: CabinetId,
    /// Last time the table was started.
    pub last_played: DateTime<Utc>,
    /// Total number of plays.
    pub number_of_plays: i64,
    /// Total seconds played.
    pub time_played_secs: i64,
}

/// Last-known cumulative numbers for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Day of the last play.
    pub last_played: Day,
    /// Total number of plays.
    pub number_of_plays: i64,
    /// Total seconds played.
    pub time_played_secs: i64,
}

impl From<&ActivityReport> for Snapshot {
    fn from(report: &ActivityReport) -> Self {
        Self {
            last_played: Day::from_datetime(report.last_played),
            number_of_plays: report.number_of_plays,
            time_played_secs: report.time_played_secs,
        }
    }
}

/// Time attributed to one table design on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    /// Seconds played.
    pub time_played_secs: i64,
}

/// Everything played on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    /// The day.
    pub date_code: Day,
    /// Distinct table designs played.
    pub tables_played: usize,
    /// Sum of all plays.
    pub seconds_played: i64,
    /// Per-design breakdown.
    #[serde(default)]
    pub plays: BTreeMap<WebTableId, Play>,
}

impl DayRecord {
    fn new(day: Day) -> Self {
        Self {
            date_code: day,
            tables_played: 0,
            seconds_played: 0,
            plays: BTreeMap::new(),
        }
    }

    fn record(&mut self, web_id: &WebTableId, seconds: i64) {
        self.plays.entry(web_id.clone()).or_default().time_played_secs += seconds;
        self.tables_played = self.plays.len();
        self.seconds_played = self.plays.values().map(|p| p.time_played_secs).sum();
    }

    /// Total time for the day.
    pub fn total(&self) -> Seconds {
        Seconds(self.seconds_played)
    }
}

/// Snapshot history and the per-day records derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    snapshots: BTreeMap<CabinetId, Snapshot>,
    #[serde(default)]
    days: Vec<DayRecord>,
}

impl Activity {
    /// Day records in date order.
    pub fn days(&self) -> &[DayRecord] {
        &self.days
    }

    /// Record for a single day.
    pub fn day(&self, day: Day) -> Option<&DayRecord> {
        self.days
            .binary_search_by(|record| record.date_code.cmp(&day))
            .ok()
            .map(|index| &self.days[index])
    }

    /// Records with `from <= day <= to`.
    pub fn days_between(&self, from: Day, to: Day) -> impl Iterator<Item = &DayRecord> {
        self.days
            .iter()
            .filter(move |record| record.date_code >= from && record.date_code <= to)
    }

    /// Last cumulative snapshot for a table.
    pub fn snapshot(&self, id: &CabinetId) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    /// Fold a fresh set of cumulative reports into the day records.
    ///
    /// The very first call only stores a baseline. Afterwards each changed or
    /// new snapshot adds its time delta to the day it was last played on,
    /// attributed to the table's web id. Reports for unknown tables are ignored.
    /// Returns whether any day record changed.
    pub fn record(
        &mut self,
        reports: &[ActivityReport],
        tables: &BTreeMap<CabinetId, Table>,
    ) -> bool {
        if self.snapshots.is_empty() {
            for report in reports {
                self.snapshots.insert(report.game_id.clone(), report.into());
            }
            tracing::debug!("stored activity baseline for {} tables", reports.len());
            return false;
        }

        let mut days = self
            .days
            .drain(..)
            .map(|record| (record.date_code, record))
            .collect::<BTreeMap<_, _>>();
        let mut changed = false;

        for report in reports {
            let Some(table) = tables.get(&report.game_id) else {
                continue;
            };
            let snapshot = Snapshot::from(report);
            let previous = self.snapshots.insert(report.game_id.clone(), snapshot);
            if previous == Some(snapshot) {
                continue;
            }

            let seconds = snapshot.time_played_secs
                - previous.map(|p| p.time_played_secs).unwrap_or_default();
            days.entry(snapshot.last_played)
                .or_insert_with(|| DayRecord::new(snapshot.last_played))
                .record(&table.web_id, seconds);
            changed = true;
        }

        self.days = days.into_values().collect();
        changed
    }
}
