//! Result loggers.
//!
//! An [`Algorithm`](crate::Algorithm) hands every [`TrainResult`] to its
//! attached loggers after a successful `train()`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::result::TrainResult;

/// Sink for training results.
pub trait ResultLogger: Send {
    /// Log one iteration.
    fn log(&mut self, result: &TrainResult);

    /// Flush buffered output.
    fn flush(&mut self);
}

fn fmt_opt(value: Option<f32>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

/// Table-style console output every `log_interval` iterations.
pub struct ConsoleLogger {
    log_interval: usize,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a console logger.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            show_header: true,
        }
    }

    fn print_header(&self) {
        println!(
            "{:>6} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Iter", "Timesteps", "Episodes", "Reward", "Policy", "Value", "Entropy", "SPS"
        );
        println!("{}", "-".repeat(80));
    }
}

impl ResultLogger for ConsoleLogger {
    fn log(&mut self, result: &TrainResult) {
        if result.training_iteration % self.log_interval != 0 {
            return;
        }
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let sps = if result.time_this_iter_s > 0.0 {
            result.timesteps_this_iter as f64 / result.time_this_iter_s
        } else {
            0.0
        };

        println!(
            "{:>6} {:>10} {:>8} {:>10} {:>10.4} {:>10.4} {:>10.4} {:>8.0}",
            result.training_iteration,
            result.timesteps_total,
            result.episodes_total,
            fmt_opt(result.episode_reward_mean),
            result.learner.policy_loss,
            result.learner.vf_loss,
            result.learner.entropy,
            sps
        );
    }

    fn flush(&mut self) {}
}

/// One CSV row per iteration.
pub struct CsvLogger {
    writer: BufWriter<File>,
}

impl CsvLogger {
    /// Create the file and write the header.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "training_iteration,timesteps_total,episodes_total,episode_reward_mean,episode_len_mean,policy_loss,vf_loss,entropy,kl,time_this_iter_s"
        )?;
        Ok(Self { writer })
    }
}

impl ResultLogger for CsvLogger {
    fn log(&mut self, result: &TrainResult) {
        let opt = |v: Option<f32>| v.map(|v| v.to_string()).unwrap_or_default();
        let written = writeln!(
            self.writer,
            "{},{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.3}",
            result.training_iteration,
            result.timesteps_total,
            result.episodes_total,
            opt(result.episode_reward_mean),
            opt(result.episode_len_mean),
            result.learner.policy_loss,
            result.learner.vf_loss,
            result.learner.entropy,
            result.learner.kl,
            result.time_this_iter_s
        );
        if let Err(e) = written {
            log::warn!("CSV logger write failed: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("CSV logger flush failed: {}", e);
        }
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Fan-out to several loggers.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn ResultLogger>>,
}

impl MultiLogger {
    /// Create an empty multi-logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logger.
    pub fn add<L: ResultLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    /// Add a boxed logger in place.
    pub fn push(&mut self, logger: Box<dyn ResultLogger>) {
        self.loggers.push(logger);
    }

    /// Number of attached loggers.
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    /// Whether no logger is attached.
    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl ResultLogger for MultiLogger {
    fn log(&mut self, result: &TrainResult) {
        for logger in &mut self.loggers {
            logger.log(result);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
