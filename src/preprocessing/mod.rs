//! Preprocessing between the filtered table and model training
//!
//! - Correlation-based feature selection against the outcome
//! - Stratified train/test partition

pub mod feature_selection;
pub mod split;

pub use feature_selection::CorrelationSelector;
pub use split::{Partition, StratifiedSplit};
