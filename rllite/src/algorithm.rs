//! The trainable algorithm handle returned by `build()`.

use std::path::{Path, PathBuf};

use crate::checkpoint::{CheckpointInfo, Checkpointer};
use crate::config::AlgorithmConfig;
use crate::error::RlError;
use crate::framework::Framework;
use crate::metrics::{MultiLogger, ResultLogger, TrainResult};

/// A built, trainable algorithm.
///
/// Object safe so the registry can hand out `Box<dyn Trainable>` regardless of
/// the backend the framework resolved to.
pub trait Trainable {
    /// Registered algorithm name.
    fn name(&self) -> &str;

    /// Framework the policy runs on.
    fn framework(&self) -> Framework;

    /// Configuration the algorithm was built with.
    fn config(&self) -> &AlgorithmConfig;

    /// Completed training iterations.
    fn iteration(&self) -> usize;

    /// Run one training iteration.
    fn train(&mut self) -> Result<TrainResult, RlError>;

    /// Action for a single observation.
    fn compute_single_action(&mut self, obs: &[f32], explore: bool) -> Result<usize, RlError>;

    /// Write a checkpoint into `dir` and return its path.
    fn save_checkpoint(&self, dir: &Path) -> Result<PathBuf, RlError>;

    /// Load weights and counters from a checkpoint directory.
    fn restore_checkpoint(&mut self, dir: &Path) -> Result<(), RlError>;

    /// Release workers. Must be idempotent.
    fn stop(&mut self);
}

/// Handle over a [`Trainable`] with result logging and periodic checkpoints.
///
/// `stop()` is idempotent and runs on drop; every other call after it
/// returns [`RlError::Stopped`].
pub struct Algorithm {
    inner: Box<dyn Trainable>,
    loggers: MultiLogger,
    checkpointer: Option<Checkpointer>,
    stopped: bool,
}

impl Algorithm {
    /// Wrap a built trainable.
    pub fn new(inner: Box<dyn Trainable>) -> Self {
        Self {
            inner,
            loggers: MultiLogger::new(),
            checkpointer: None,
            stopped: false,
        }
    }

    /// Attach a result logger.
    pub fn with_logger<L: ResultLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    /// Save checkpoints through `checkpointer` after training iterations.
    pub fn with_checkpointer(mut self, checkpointer: Checkpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn framework(&self) -> Framework {
        self.inner.framework()
    }

    pub fn config(&self) -> &AlgorithmConfig {
        self.inner.config()
    }

    pub fn iteration(&self) -> usize {
        self.inner.iteration()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn ensure_running(&self) -> Result<(), RlError> {
        if self.stopped {
            return Err(RlError::Stopped);
        }
        Ok(())
    }

    /// Run one training iteration, log it and checkpoint if due.
    pub fn train(&mut self) -> Result<TrainResult, RlError> {
        self.ensure_running()?;
        let result = self.inner.train()?;

        self.loggers.log(&result);
        if let Some(checkpointer) = &mut self.checkpointer {
            if checkpointer.is_due(result.training_iteration) {
                checkpointer.save(self.inner.as_ref(), result.episode_reward_mean)?;
            }
        }

        Ok(result)
    }

    /// Action for a single observation. `explore = false` picks the mode.
    pub fn compute_single_action(&mut self, obs: &[f32], explore: bool) -> Result<usize, RlError> {
        self.ensure_running()?;
        self.inner.compute_single_action(obs, explore)
    }

    /// Write a checkpoint into `dir`.
    pub fn save_checkpoint(&self, dir: impl AsRef<Path>) -> Result<PathBuf, RlError> {
        self.ensure_running()?;
        self.inner.save_checkpoint(dir.as_ref())
    }

    /// Restore weights and counters from `dir`.
    pub fn restore_checkpoint(&mut self, dir: impl AsRef<Path>) -> Result<(), RlError> {
        self.ensure_running()?;
        self.inner.restore_checkpoint(dir.as_ref())
    }

    /// Restore from the newest checkpoint of the attached checkpointer.
    ///
    /// `Ok(None)` when no checkpointer is attached.
    pub fn resume(&mut self) -> Result<Option<CheckpointInfo>, RlError> {
        self.ensure_running()?;
        match &self.checkpointer {
            Some(checkpointer) => checkpointer.restore_latest(self.inner.as_mut()).map(Some),
            None => Ok(None),
        }
    }

    /// Stop rollout workers and flush loggers. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.inner.stop();
        self.loggers.flush();
        log::debug!("{} stopped after {} iterations", self.inner.name(), self.inner.iteration());
    }
}

impl Drop for Algorithm {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.inner.name())
            .field("framework", &self.inner.framework())
            .field("iteration", &self.inner.iteration())
            .field("stopped", &self.stopped)
            .finish()
    }
}
