//! Checkpoints taken while training.
//!
//! A checkpointer owns a root directory. Every `frequency` iterations it
//! writes `checkpoint_<iteration>/` (see [`files`](super::files)), prunes
//! all but the newest `num_to_keep`, and mirrors the highest mean episode
//! reward seen so far into `best/`.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use super::files::{policy_path, CheckpointError, STATE_FILE};
use crate::algorithm::Trainable;
use crate::error::RlError;

const BEST_DIR: &str = "best";
const PREFIX: &str = "checkpoint_";

/// When and where to checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointerConfig {
    pub root: PathBuf,
    /// Iterations between checkpoints. 0 disables periodic saves.
    pub frequency: usize,
    /// Periodic checkpoints kept on disk. `None` keeps all of them.
    pub num_to_keep: Option<usize>,
    /// Mirror the best-scoring iteration into `best/`.
    pub keep_best: bool,
}

impl CheckpointerConfig {
    /// Checkpoint under `root` every 10 iterations, keeping the last 5.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            frequency: 10,
            num_to_keep: Some(5),
            keep_best: true,
        }
    }

    pub fn every(mut self, iterations: usize) -> Self {
        self.frequency = iterations;
        self
    }

    pub fn keep(mut self, num_to_keep: Option<usize>) -> Self {
        self.num_to_keep = num_to_keep;
        self
    }

    pub fn keep_best(mut self, keep_best: bool) -> Self {
        self.keep_best = keep_best;
        self
    }
}

/// A checkpoint directory on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    pub iteration: usize,
    /// Mean episode reward when saved; `None` for checkpoints found by scanning.
    pub score: Option<f32>,
}

/// Periodic checkpoints of one training run.
#[derive(Debug)]
pub struct Checkpointer {
    config: CheckpointerConfig,
    saved: VecDeque<CheckpointInfo>,
    best: Option<CheckpointInfo>,
}

impl Checkpointer {
    /// Creates `config.root` if needed.
    pub fn new(config: CheckpointerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.root)?;
        Ok(Self {
            config,
            saved: VecDeque::new(),
            best: None,
        })
    }

    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    /// Whether iteration `iteration` is due for a checkpoint.
    pub fn is_due(&self, iteration: usize) -> bool {
        let every = self.config.frequency;
        every > 0 && iteration > 0 && iteration % every == 0
    }

    pub fn path_for(&self, iteration: usize) -> PathBuf {
        self.config.root.join(format!("{}{:06}", PREFIX, iteration))
    }

    pub fn best_path(&self) -> PathBuf {
        self.config.root.join(BEST_DIR)
    }

    /// Best checkpoint written by this checkpointer.
    pub fn best(&self) -> Option<&CheckpointInfo> {
        self.best.as_ref()
    }

    /// Checkpoint `algo` at its current iteration.
    pub fn save(&mut self, algo: &dyn Trainable, score: Option<f32>) -> Result<CheckpointInfo, RlError> {
        let iteration = algo.iteration();
        let info = CheckpointInfo {
            path: algo.save_checkpoint(&self.path_for(iteration))?,
            iteration,
            score,
        };
        log::debug!("checkpoint {} written to {}", iteration, info.path.display());

        let improved = match (score.filter(|s| s.is_finite()), &self.best) {
            (Some(s), Some(best)) => best.score.map_or(true, |b| s > b),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if self.config.keep_best && improved {
            let path = algo.save_checkpoint(&self.best_path())?;
            self.best = Some(CheckpointInfo { path, ..info.clone() });
        }

        self.saved.push_back(info.clone());
        self.prune();
        Ok(info)
    }

    /// Periodic checkpoints under the root, oldest first.
    pub fn scan(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.config.root)? {
            let path = entry?.path();
            let iteration = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(PREFIX))
                .and_then(|suffix| suffix.parse().ok());
            if let Some(iteration) = iteration.filter(|_| path.is_dir()) {
                found.push(CheckpointInfo {
                    path,
                    iteration,
                    score: None,
                });
            }
        }
        found.sort_by_key(|c| c.iteration);
        Ok(found)
    }

    pub fn latest(&self) -> Result<CheckpointInfo, CheckpointError> {
        self.scan()?.pop().ok_or(CheckpointError::NoCheckpoints)
    }

    /// Resume `algo` from the newest checkpoint under the root.
    pub fn restore_latest(&self, algo: &mut dyn Trainable) -> Result<CheckpointInfo, RlError> {
        let latest = self.latest()?;
        algo.restore_checkpoint(&latest.path)?;
        Ok(latest)
    }

    fn prune(&mut self) {
        let Some(keep) = self.config.num_to_keep else {
            return;
        };
        while self.saved.len() > keep {
            let Some(old) = self.saved.pop_front() else {
                break;
            };
            if let Err(e) = fs::remove_dir_all(&old.path) {
                log::warn!("could not prune {}: {}", old.path.display(), e);
            }
        }
    }
}

/// Whether `dir` holds both checkpoint files.
pub fn is_checkpoint_dir(dir: &Path) -> bool {
    policy_path(dir).is_file() && dir.join(STATE_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_builder() {
        let config = CheckpointerConfig::new("runs/a").every(5).keep(None).keep_best(false);
        assert_eq!(config.root, PathBuf::from("runs/a"));
        assert_eq!(config.frequency, 5);
        assert_eq!(config.num_to_keep, None);
        assert!(!config.keep_best);
    }

    #[test]
    fn test_is_due() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path()).every(2)).unwrap();
        let due: Vec<_> = (0..6).filter(|&i| checkpointer.is_due(i)).collect();
        assert_eq!(due, vec![2, 4]);

        let never = Checkpointer::new(CheckpointerConfig::new(dir.path()).every(0)).unwrap();
        assert!(!never.is_due(10));
    }

    #[test]
    fn test_scan_ignores_other_entries() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        assert!(matches!(checkpointer.latest(), Err(CheckpointError::NoCheckpoints)));

        fs::create_dir_all(checkpointer.path_for(10)).unwrap();
        fs::create_dir_all(checkpointer.path_for(2)).unwrap();
        fs::create_dir_all(checkpointer.best_path()).unwrap();
        fs::write(dir.path().join("checkpoint_000003"), b"not a dir").unwrap();

        let found = checkpointer.scan().unwrap();
        assert_eq!(found.iter().map(|c| c.iteration).collect::<Vec<_>>(), vec![2, 10]);
        assert_eq!(checkpointer.latest().unwrap().iteration, 10);
        // Empty directories are not checkpoints.
        assert!(!is_checkpoint_dir(&found[0].path));
    }

    #[test]
    fn test_creates_nested_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("runs/ppo/checkpoints");
        Checkpointer::new(CheckpointerConfig::new(&root)).unwrap();
        assert!(root.is_dir());
    }
}
