//! Model training module
//!
//! Provides the three compared classifiers and the machinery around them:
//! - Histogram-binned CART trees
//! - Random forest and bagged CART
//! - Multinomial stochastic gradient boosting
//! - Stratified k-fold cross-validation
//! - Confusion matrix statistics

pub mod bagging;
pub mod binning;
pub mod cross_validation;
pub mod decision_tree;
mod engine;
pub mod gradient_boosting;
pub mod metrics;
mod models;
pub mod random_forest;

pub use bagging::BaggedTrees;
pub use binning::{BinnedMatrix, FeatureBins, MAX_BINS};
pub use cross_validation::{cross_validate, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{
    ComparisonRow, Evaluation, ModelComparison, ModelParams, ModelType, TrainEngine, TrainedModel,
    TrainingRun, TuningCandidate,
};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use metrics::{ClassStats, ConfusionMatrix};
pub use models::{accuracy, argmax_rows, Classifier};
pub use random_forest::{MaxFeatures, RandomForest};
