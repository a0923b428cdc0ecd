//! liftsense - weight lifting exercise recognition from wearable sensors
//!
//! A one-shot study over the public Weight Lifting Exercise dataset:
//! - Column filtering by sensor name and missingness
//! - Pearson correlation matrix with t-test p-values
//! - Correlation-based feature selection and a stratified 75/25 partition
//! - Random forest, stochastic gradient boosting and bagged CART, tuned on
//!   the same stratified 10-fold cross-validation
//! - Confusion matrices on the held-out partition, model comparison, and
//!   quiz predictions with the best model
//!
//! # Modules
//!
//! - [`config`] - Study parameters and TOML overrides
//! - [`data`] - Sources, CSV loading, column filtering, label encoding
//! - [`stats`] - Correlation and distribution functions
//! - [`preprocessing`] - Feature selection and partitioning
//! - [`training`] - Tree ensembles, cross-validation, confusion matrices
//! - [`report`] - Console tables, SVG charts, JSON summary
//! - [`study`] - Phase driver
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod config;
pub mod data;
pub mod preprocessing;
pub mod stats;
pub mod training;

pub mod report;
pub mod study;

pub mod cli;
pub mod utils;

pub use error::{LiftError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::StudyConfig;
    pub use crate::data::{ClassLabels, ColumnFilter, DataLoader, DataSource};
    pub use crate::error::{LiftError, Result};
    pub use crate::preprocessing::{CorrelationSelector, Partition, StratifiedSplit};
    pub use crate::report::StudyReport;
    pub use crate::stats::CorrelationMatrix;
    pub use crate::study::Study;
    pub use crate::training::{
        BaggedTrees, Classifier, ConfusionMatrix, CrossValidator, GradientBoostingClassifier,
        ModelType, RandomForest, TrainEngine,
    };
    pub use crate::utils::WorkerPool;
}
