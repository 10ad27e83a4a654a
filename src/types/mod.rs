//! Type definitions for the fraud dashboard

pub mod listing;
pub mod scored;

pub use listing::{ListingColumns, RawTable, REQUIRED_COLUMNS};
pub use scored::{PredictedLabel, ScoredBatch, ScoredRow, ScoredTable};
