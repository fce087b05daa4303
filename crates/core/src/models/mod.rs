//! Shared domain models.

pub mod activity;
pub mod ids;
pub mod score;
pub mod table;

pub use activity::{Activity, ActivityReport, Day, DayRecord, Play, Seconds, Snapshot};
pub use ids::{CabinetId, ParseScoreIdError, ScoreId, WebTableId};
pub use score::{Score, TableScoreboard};
pub use table::{HighScoreType, ScoreStatus, Table, TableDetails, Vr};

use serde::{Deserialize, Serialize};

/// Catalog metadata remembered for a table design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Catalog title.
    pub name: String,
}
