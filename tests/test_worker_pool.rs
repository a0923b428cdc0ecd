//! Integration test: no threads are started after the worker pool is torn down
//!
//! Kept to a single test so the process thread count is not disturbed by
//! other tests running alongside it.

use liftsense::training::{
    BaggedTrees, Classifier, GradientBoostingClassifier, GradientBoostingConfig, RandomForest,
};
use liftsense::utils::{in_worker_pool, WorkerPool};
use ndarray::{Array1, Array2};
use std::time::{Duration, Instant};

fn two_class_data(n: usize) -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_fn((n, 3), |(r, c)| {
        let class = r % 2;
        let jitter = ((r * 11 + c * 3) % 7) as f64 / 7.0;
        if c == 0 {
            class as f64 * 4.0 + jitter
        } else {
            jitter * 5.0
        }
    });
    let y = (0..n).map(|r| r % 2).collect();
    (x, y)
}

#[cfg(target_os = "linux")]
fn thread_count() -> usize {
    std::fs::read_dir("/proc/self/task")
        .map(|dir| dir.count())
        .unwrap_or(0)
}

#[cfg(target_os = "linux")]
#[test]
fn test_prediction_after_teardown_starts_no_threads() {
    let baseline = thread_count();
    let (x, y) = two_class_data(80);

    let pool = WorkerPool::new(Some(2)).unwrap();
    let (rf, gbm, bag) = pool.install(|| {
        let mut rf = RandomForest::new(10).with_random_state(3);
        rf.fit(&x, &y, 2).unwrap();
        let mut gbm = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 10,
            min_samples_leaf: 3,
            random_state: Some(3),
            ..Default::default()
        });
        gbm.fit(&x, &y, 2).unwrap();
        let mut bag = BaggedTrees::new(5).with_random_state(3);
        bag.fit(&x, &y, 2).unwrap();
        (rf, gbm, bag)
    });
    let in_pool = pool.install(|| rf.predict(&x).unwrap());
    drop(pool);

    // Pool threads exit asynchronously after the drop
    let deadline = Instant::now() + Duration::from_secs(10);
    while thread_count() > baseline && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    let before = thread_count();
    assert!(before <= baseline, "worker threads still alive: {} > {}", before, baseline);
    assert!(!in_worker_pool());

    let predicted = rf.predict(&x).unwrap();
    gbm.predict(&x).unwrap();
    bag.predict_proba(&x).unwrap();

    assert_eq!(thread_count(), before);
    assert_eq!(predicted, in_pool);
}
