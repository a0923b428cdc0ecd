//! Integration test: full study (load → filter → correlate → select → train → compare → quiz)

mod common;

use common::{quiz_csv, training_csv, write_file, DENSE_SENSORS, LABELS};
use liftsense::config::StudyConfig;
use liftsense::data::DataLoader;
use liftsense::error::LiftError;
use liftsense::study::{Study, QUIZ_FILE, REPORT_FILE};
use liftsense::training::ModelType;
use liftsense::utils::WorkerPool;
use std::path::Path;

fn small_config(dir: &Path) -> StudyConfig {
    let training = write_file(dir, "pml-training.csv", &training_csv(40));
    let (quiz, _) = quiz_csv(&DENSE_SENSORS);
    let quiz = write_file(dir, "pml-testing.csv", &quiz);

    let mut config = StudyConfig::default()
        .with_training_source(training.display().to_string())
        .with_quiz_source(quiz.display().to_string())
        .with_output_dir(dir.join("report"))
        .with_plots(false)
        .with_workers(2)
        .with_folds(3);
    config.random_forest.n_trees = 15;
    config.boosting.depth_grid = vec![1, 2];
    config.boosting.n_trees_grid = vec![10, 20];
    config.boosting.min_samples_leaf = 3;
    config.bagging.n_bags = 5;
    config
}

#[tokio::test]
async fn test_study_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let study = Study::new(config.clone()).unwrap();
    let report = study.run().await.unwrap();

    // Filtering drops identifiers and sparse columns
    assert_eq!(report.training_rows, 200);
    assert!(!report.filtered_predictors.contains(&"kurtosis_roll_belt".to_string()));
    assert!(!report.filtered_predictors.contains(&"max_picth_arm".to_string()));
    assert!(!report.filtered_predictors.contains(&"user_name".to_string()));
    assert_eq!(report.filtered_predictors.len(), 5);

    // Every selected predictor passes both thresholds
    for name in &report.selected_features {
        let c = report.correlations.iter().find(|c| &c.name == name).unwrap();
        assert!(c.p_value < 0.05 && c.r.abs() > 0.05, "{} r={} p={}", name, c.r, c.p_value);
    }
    assert!(report.selected_features.contains(&"roll_belt".to_string()));

    // 75/25 per class: ceil(0.75 * 40) = 30
    assert_eq!(report.n_train, 150);
    assert_eq!(report.n_test, 50);
    assert_eq!(report.imputed_values, 8);

    // Confusion matrices cover the test partition only
    assert_eq!(report.models.len(), 3);
    for model in &report.models {
        assert_eq!(model.confusion.total(), report.n_test);
        assert_eq!(model.cv.n_folds, 3);
        assert!(model.confusion.accuracy > 0.8, "{:?}", model.model_type);
    }
    assert_eq!(report.models[0].model_type, ModelType::RandomForest);
    assert_eq!(report.models[1].model_type, ModelType::GradientBoosting);
    assert_eq!(report.models[2].model_type, ModelType::BaggedTrees);

    let best = report.comparison.best();
    assert_eq!(best.model_type, report.best_model);
    assert!(report.comparison.rows.iter().all(|r| r.test_accuracy <= best.test_accuracy));

    // Quiz
    let (_, truth) = quiz_csv(&DENSE_SENSORS);
    assert_eq!(report.quiz_predictions.len(), 20);
    let correct = report
        .quiz_predictions
        .iter()
        .zip(&truth)
        .filter(|(p, t)| p.label == **t)
        .count();
    assert!(correct >= 18, "only {} of 20 quiz rows correct", correct);
    assert_eq!(report.quiz_predictions[0].id, "1");
    assert!(report.quiz_predictions.iter().all(|p| LABELS.contains(&p.label.as_str())));

    // Files
    let out = dir.path().join("report");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join(REPORT_FILE)).unwrap()).unwrap();
    assert_eq!(json["n_test"], 50);
    let predictions = DataLoader::new().load_csv(&out.join(QUIZ_FILE)).unwrap();
    assert_eq!(predictions.height(), 20);
    assert_eq!(predictions.width(), 2);
}

#[tokio::test]
async fn test_same_seed_same_study() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let a = Study::new(small_config(dir_a.path())).unwrap().run().await.unwrap();
    let b = Study::new(small_config(dir_b.path())).unwrap().run().await.unwrap();

    assert_eq!(a.selected_features, b.selected_features);
    assert_eq!(a.quiz_predictions, b.quiz_predictions);
    for (ma, mb) in a.models.iter().zip(&b.models) {
        assert_eq!(ma.cv.scores, mb.cv.scores);
        assert_eq!(ma.params, mb.params);
        assert_eq!(ma.confusion.counts, mb.confusion.counts);
    }
}

#[tokio::test]
async fn test_quiz_missing_columns_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    // Quiz lacks roll_belt, which is always selected
    let (quiz, _) = quiz_csv(&DENSE_SENSORS[1..]);
    let loader = DataLoader::new();
    let training = loader.load_csv(Path::new(&config.training_source)).unwrap();
    let quiz_path = write_file(dir.path(), "short-quiz.csv", &quiz);
    let quiz = loader.load_csv(&quiz_path).unwrap();

    let study = Study::new(config).unwrap();
    let pool = WorkerPool::new(Some(2)).unwrap();
    match study.analyse(pool, training, quiz) {
        Err(LiftError::ColumnMismatch { missing }) => assert_eq!(missing, vec!["roll_belt".to_string()]),
        other => panic!("expected ColumnMismatch, got {:?}", other.map(|r| r.best_model)),
    }
}

#[tokio::test]
async fn test_select_mode() {
    let dir = tempfile::tempdir().unwrap();
    let study = Study::new(small_config(dir.path())).unwrap();
    let selection = study.select().await.unwrap();

    assert_eq!(selection.labels.names(), &LABELS.map(String::from)[..]);
    assert_eq!(selection.classes.len(), 200);
    assert!(!selection.selected.is_empty());
    assert!(selection.selected.iter().all(|s| selection.filtered.predictors.contains(s)));
    // Outcome first, then the filtered predictors
    assert_eq!(selection.correlation.names()[0], "classe");

    // Selected-feature table: outcome then the selected predictors
    let table_names: Vec<String> = selection
        .table
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(table_names[0], "classe");
    assert_eq!(&table_names[1..], &selection.selected[..]);
    assert_eq!(selection.table.height(), 200);
}

#[tokio::test]
async fn test_missing_training_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).with_training_source(dir.path().join("nope.csv").display().to_string());
    let study = Study::new(config).unwrap();
    assert!(matches!(study.run().await, Err(LiftError::Data(_))));
}
