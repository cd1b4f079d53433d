//! Training results and logging.
//!
//! - [`TrainResult`]: what one `train()` call reports
//! - [`EpisodeWindow`]: rolling episode statistics
//! - [`ConsoleLogger`], [`CsvLogger`], [`MultiLogger`]: result sinks

pub mod logger;
pub mod result;

pub use logger::{ConsoleLogger, CsvLogger, MultiLogger, ResultLogger};
pub use result::{EpisodeWindow, LearnerStats, TrainResult, EPISODE_WINDOW};
