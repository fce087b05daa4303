#![warn(clippy::all, missing_docs)]

//! Core of the pinball scoreboard.
//!
//! Tracks the tables installed on a virtual pinball cabinet, works out which
//! of them share a physical high score store, and merges scores from manual
//! entry, cabinet scans and the global leaderboard into one model. The
//! clients for the cabinet, the leaderboard and the table catalog, the scan
//! coordinator and JSON persistence live here too.

pub mod capture;
pub mod clients;
pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod scan;
pub mod store;

pub use config::AppConfig;
pub use document::ScoreboardDocument;
pub use error::ClientError;
pub use models::{
    Activity, CabinetId, Day, HighScoreType, Score, ScoreId, ScoreStatus, Seconds, Table,
    TableDetails, TableScoreboard, Vr, WebTableId,
};
pub use scan::{ScanEvent, ScanOptions, ScanReport, Scanner};
pub use store::{
    build_duplicates, duplicates_for, DuplicateDisposition, DuplicateTables, ScoreModel,
    TableChange, TableSummary,
};
