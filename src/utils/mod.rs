//! Utility functions and types

mod parallel;

pub use parallel::{default_worker_count, in_worker_pool, WorkerPool};
