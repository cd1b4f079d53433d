//! Experience collection.

pub mod sample_batch;
pub mod worker;
pub mod worker_set;

pub use sample_batch::SampleBatch;
pub use worker::RolloutWorker;
pub use worker_set::{WorkerMsg, WorkerSet};
