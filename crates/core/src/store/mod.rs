//! The score model and the views derived from it.

/// Duplicate-table grouping and classification.
pub mod duplicates;
mod model;
mod summary;

pub use duplicates::{build_duplicates, duplicates_for, DuplicateDisposition, DuplicateTables};
pub use model::{ScoreModel, TableChange};
pub use summary::TableSummary;
