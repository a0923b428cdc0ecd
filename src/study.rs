//! Study driver: runs the analysis phases in order
//!
//! 1. output directory
//! 2. worker pool
//! 3. ingestion and column filtering
//! 4. correlation matrix (and heat map)
//! 5. feature selection and stratified partition
//! 6. three models tuned on the same folds
//! 7. comparison on the held-out partition
//! 8. worker pool teardown
//! 9. quiz predictions with the best model

use crate::config::StudyConfig;
use crate::data::{
    columns_to_array2, restrict_to, save_csv, ClassLabels, ColumnFilter, DataLoader, DataSource,
    FilteredTable, MedianImputer,
};
use crate::error::{LiftError, Result};
use crate::preprocessing::{CorrelationSelector, StratifiedSplit};
use crate::report::{self, console, AccuracySeries, ModelReport, QuizPrediction, StudyReport};
use crate::stats::CorrelationMatrix;
use crate::training::{
    CVStrategy, CrossValidator, Evaluation, ModelComparison, ModelType, TrainEngine, TrainedModel,
    TrainingRun,
};
use crate::utils::WorkerPool;
use chrono::Utc;
use ndarray::{s, Array1, Array2};
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub const REPORT_FILE: &str = "report.json";
pub const QUIZ_FILE: &str = "quiz_predictions.csv";
pub const CORRELATION_PLOT: &str = "correlation.svg";
pub const ACCURACY_PLOT: &str = "accuracy.svg";

/// Filtered table, outcome encoding and the correlation-selected predictors
#[derive(Debug, Clone)]
pub struct FeatureSelection {
    pub filtered: FilteredTable,
    pub labels: ClassLabels,
    /// Class id per training row
    pub classes: Array1<usize>,
    pub correlation: CorrelationMatrix,
    pub selector: CorrelationSelector,
    pub selected: Vec<String>,
    /// Outcome column followed by the selected predictors
    pub table: DataFrame,
}

/// One full analysis run
pub struct Study {
    config: StudyConfig,
    loader: DataLoader,
}

impl Study {
    pub fn new(config: StudyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loader: DataLoader::new(),
        })
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output.directory
    }

    /// Run every phase against the configured sources
    pub async fn run(&self) -> Result<StudyReport> {
        self.prepare_output()?;
        let pool = WorkerPool::new(self.config.n_workers)?;
        console::banner(
            &self.config.training_source,
            &self.config.quiz_source,
            self.config.seed,
            pool.n_threads(),
        );

        let training = self.load(&self.config.training_source, "Training table").await?;
        let quiz = self.load(&self.config.quiz_source, "Quiz table").await?;
        self.analyse(pool, training, quiz)
    }

    /// Phases 3 to 5 only: print the correlation table and selected predictors
    pub async fn select(&self) -> Result<FeatureSelection> {
        let pool = WorkerPool::new(self.config.n_workers)?;
        let training = self.load(&self.config.training_source, "Training table").await?;
        let selection = pool.install(|| self.select_features(&training))?;
        if let Some(correlations) = selection.selector.correlations() {
            console::selection_table(correlations, &selection.selected);
        }
        Ok(selection)
    }

    fn prepare_output(&self) -> Result<()> {
        std::fs::create_dir_all(self.output_dir())?;
        info!(dir = %self.output_dir().display(), "Output directory ready");
        Ok(())
    }

    async fn load(&self, location: &str, label: &str) -> Result<DataFrame> {
        let bytes = DataSource::parse(location).fetch().await?;
        let df = self.loader.load_csv_bytes(bytes)?;
        info!(table = label, rows = df.height(), cols = df.width(), "Loaded table");
        console::table_summary(label, df.height(), df.width());
        Ok(df)
    }

    /// Filter columns, correlate them with the outcome and select predictors
    pub fn select_features(&self, training: &DataFrame) -> Result<FeatureSelection> {
        let outcome = &self.config.outcome;
        let filter = ColumnFilter::new(self.config.column_regex()?, self.config.filter.min_non_missing);
        let filtered = filter.apply(training, outcome)?;

        let outcome_col = filtered
            .frame
            .column(outcome)
            .map_err(|_| LiftError::ColumnNotFound(outcome.clone()))?;
        let labels = ClassLabels::fit(outcome_col)?;
        let classes = labels.encode(outcome_col)?;

        // Outcome code first, then the predictors in table order
        let predictors = columns_to_array2(&filtered.frame, &filtered.predictors)?;
        let mut data = Array2::zeros((predictors.nrows(), predictors.ncols() + 1));
        data.column_mut(0).assign(&labels.codes(&classes));
        data.slice_mut(s![.., 1..]).assign(&predictors);

        let mut names = Vec::with_capacity(filtered.predictors.len() + 1);
        names.push(outcome.clone());
        names.extend(filtered.predictors.iter().cloned());

        let start = Instant::now();
        let correlation = CorrelationMatrix::compute(&data, names)?;
        info!(
            columns = correlation.names().len(),
            secs = start.elapsed().as_secs_f64(),
            "Correlation matrix computed"
        );

        let mut selector = CorrelationSelector::from_config(&self.config.selection);
        selector.fit(&correlation, outcome)?;
        let selected = selector.selected_names().ok_or(LiftError::ModelNotFitted)?;
        let table = selector.transform_frame(&filtered.frame, outcome)?;

        Ok(FeatureSelection {
            filtered,
            labels,
            classes,
            correlation,
            selector,
            selected,
            table,
        })
    }

    /// Phases 4 to 9 on loaded tables; consumes the worker pool and drops it before the quiz.
    ///
    /// Quiz prediction runs on the calling thread once the pool is gone.
    pub fn analyse(&self, pool: WorkerPool, training: DataFrame, quiz: DataFrame) -> Result<StudyReport> {
        let config = &self.config;
        let output = self.output_dir().to_path_buf();
        std::fs::create_dir_all(&output)?;

        // Phases 3-5: filtering, correlation and selection
        let selection = pool.install(|| self.select_features(&training))?;
        console::filter_summary(&selection.filtered);
        if let Some(correlations) = selection.selector.correlations() {
            console::selection_table(correlations, &selection.selected);
        }
        if config.output.plots {
            let path = output.join(CORRELATION_PLOT);
            report::correlation_heatmap(&selection.correlation, &path)?;
            console::step_ok(&format!("Correlation heat map → {}", path.display()));
        }

        let classes = &selection.classes;
        let partition = StratifiedSplit::new(config.split.train_fraction, config.seed).split(classes)?;

        let mut x = columns_to_array2(&selection.table, &selection.selected)?;
        let mut imputer = MedianImputer::new();
        imputer.fit(&partition.train_rows(&x));
        let imputed_values = imputer.transform(&mut x)?;
        if imputed_values > 0 {
            warn!(values = imputed_values, "Filled missing predictor values with training medians");
        }

        // Phase 6: same folds for every model
        let x_train = partition.train_rows(&x);
        let y_train = partition.train_labels(classes);
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: config.cv.n_folds,
            shuffle: true,
        })
        .with_random_state(config.seed)
        .split(x_train.nrows(), Some(&y_train))?;

        let engine = TrainEngine::new(config, selection.labels.len());
        let mut results: Vec<(TrainingRun, Evaluation)> = Vec::with_capacity(ModelType::ALL.len());
        for model_type in ModelType::ALL {
            let run = pool.install(|| engine.train(model_type, &x_train, &y_train, &splits))?;
            console::training_run(&run);
            let evaluation = pool.install(|| {
                engine.evaluate(&run, &x, classes, &partition.test, selection.labels.names())
            })?;
            console::confusion_matrix(model_type.display_name(), &evaluation.confusion);
            results.push((run, evaluation));
        }

        // Phase 7
        let comparison = ModelComparison::new(&results)?;
        console::comparison(&comparison);
        if config.output.plots {
            let series: Vec<AccuracySeries> = results
                .iter()
                .map(|(run, eval)| AccuracySeries {
                    label: run.model_type().method().to_string(),
                    fold_accuracies: run.cv.scores.clone(),
                    test_accuracy: eval.confusion.accuracy,
                })
                .collect();
            let path = output.join(ACCURACY_PLOT);
            report::accuracy_density(&series, &path)?;
            console::step_ok(&format!("Accuracy density → {}", path.display()));
        }

        // Phase 8
        drop(pool);

        // Phase 9
        let best_index = comparison.best_index();
        let best_model = &results[best_index].0.model;
        let quiz_predictions = self.predict_quiz(&quiz, &selection, &imputer, best_model)?;
        console::quiz_predictions(&quiz_predictions);
        write_quiz_predictions(&quiz_predictions, &config.quiz_id_column, &output.join(QUIZ_FILE))?;

        let report = StudyReport {
            generated_at: Utc::now(),
            seed: config.seed,
            training_rows: training.height(),
            training_columns: training.width(),
            filtered_predictors: selection.filtered.predictors.clone(),
            dropped_columns: selection.filtered.dropped.len(),
            correlations: selection.selector.correlations().map(<[_]>::to_vec).unwrap_or_default(),
            selected_features: selection.selected.clone(),
            class_labels: selection.labels.names().to_vec(),
            n_train: partition.train.len(),
            n_test: partition.test.len(),
            imputed_values,
            models: results
                .iter()
                .map(|(run, eval)| ModelReport {
                    model_type: run.model_type(),
                    params: run.params.clone(),
                    cv: run.cv.clone(),
                    candidates: run.candidates.clone(),
                    oob_accuracy: run.model.oob_accuracy(),
                    confusion: eval.confusion.clone(),
                    training_time_secs: run.training_time_secs,
                })
                .collect(),
            best_model: comparison.best().model_type,
            comparison,
            quiz_predictions,
        };
        report.write_json(&output.join(REPORT_FILE))?;

        Ok(report)
    }

    /// Restrict the quiz table to the selected predictors and label every row.
    ///
    /// The id column is read from the unrestricted table so the predictor
    /// frame holds training columns only.
    pub fn predict_quiz(
        &self,
        quiz: &DataFrame,
        selection: &FeatureSelection,
        imputer: &MedianImputer,
        model: &TrainedModel,
    ) -> Result<Vec<QuizPrediction>> {
        let restricted = restrict_to(quiz, &selection.selected)?;
        let mut x_quiz = columns_to_array2(&restricted, &selection.selected)?;
        imputer.transform(&mut x_quiz)?;

        let ids = quiz_ids(quiz, &self.config.quiz_id_column)?;
        let predictions = model.predict(&x_quiz)?;
        info!(rows = x_quiz.nrows(), model = %model.model_type(), "Predicted quiz rows");

        Ok(ids
            .into_iter()
            .zip(predictions.iter())
            .map(|(id, &class)| QuizPrediction {
                id,
                label: selection.labels.name(class).to_string(),
            })
            .collect())
    }
}

/// Row identifiers from `id_column`, or 1-based row numbers when it is absent
fn quiz_ids(df: &DataFrame, id_column: &str) -> Result<Vec<String>> {
    match df.column(id_column) {
        Ok(col) => {
            let as_str = col.cast(&DataType::String)?;
            Ok(as_str
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect())
        }
        Err(_) => Ok((1..=df.height()).map(|i| i.to_string()).collect()),
    }
}

fn write_quiz_predictions(predictions: &[QuizPrediction], id_column: &str, path: &Path) -> Result<()> {
    let ids: Vec<String> = predictions.iter().map(|p| p.id.clone()).collect();
    let labels: Vec<String> = predictions.iter().map(|p| p.label.clone()).collect();
    let mut df = DataFrame::new(vec![
        Column::from(Series::new(id_column.into(), ids)),
        Column::from(Series::new("prediction".into(), labels)),
    ])?;
    save_csv(&mut df, path)?;
    info!(path = %path.display(), rows = predictions.len(), "Quiz predictions written");
    Ok(())
}
