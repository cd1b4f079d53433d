//! On-disk layout of one checkpoint directory.
//!
//! ```text
//! <dir>/
//!   policy.bin             burn BinFileRecorder, full precision
//!   algorithm_state.json   config and counters
//! ```

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::AlgorithmConfig;

/// Policy weights file stem; the recorder appends `.bin`.
pub const POLICY_FILE: &str = "policy";
/// Algorithm state file.
pub const STATE_FILE: &str = "algorithm_state.json";

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// State file could not be (de)serialized.
    Json(String),
    /// Expected file or directory does not exist.
    Missing(PathBuf),
    /// Checkpoint belongs to a different algorithm or model shape.
    Incompatible(String),
    /// No checkpoints found.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Json(e) => write!(f, "JSON error: {}", e),
            CheckpointError::Missing(p) => write!(f, "missing {}", p.display()),
            CheckpointError::Incompatible(e) => write!(f, "incompatible checkpoint: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Everything besides the weights needed to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub algo: String,
    pub iteration: usize,
    pub timesteps_total: usize,
    pub episodes_total: usize,
    pub config: AlgorithmConfig,
}

/// Path of the policy file inside `dir`.
pub fn policy_path(dir: &Path) -> PathBuf {
    dir.join(POLICY_FILE).with_extension("bin")
}

/// Save `model` to `<dir>/policy.bin`, creating `dir`.
pub fn save_policy<B: Backend, M: Module<B>>(model: &M, dir: &Path) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(dir)?;
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(dir.join(POLICY_FILE), &recorder)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
    Ok(policy_path(dir))
}

/// Load `<dir>/policy.bin` into `template`.
pub fn load_policy<B: Backend, M: Module<B>>(
    template: M,
    dir: &Path,
    device: &B::Device,
) -> Result<M, CheckpointError> {
    let path = policy_path(dir);
    if !path.exists() {
        return Err(CheckpointError::Missing(path));
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    template
        .load_file(dir.join(POLICY_FILE), &recorder, device)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Write `<dir>/algorithm_state.json`, creating `dir`.
pub fn write_state(dir: &Path, state: &AlgorithmState) -> Result<(), CheckpointError> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(state).map_err(|e| CheckpointError::Json(e.to_string()))?;
    fs::write(dir.join(STATE_FILE), json)?;
    Ok(())
}

/// Read `<dir>/algorithm_state.json`.
pub fn read_state(dir: &Path) -> Result<AlgorithmState, CheckpointError> {
    let path = dir.join(STATE_FILE);
    if !path.exists() {
        return Err(CheckpointError::Missing(path));
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| CheckpointError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::model::{batch_tensor, read_floats, ActorCriticConfig};
    use crate::config::PPOConfig;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type B = NdArray<f32>;

    #[test]
    fn test_policy_roundtrip() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let shape = ActorCriticConfig::new(4, 2, vec![8]);
        let model = shape.init::<B>(&device);

        let path = save_policy(&model, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("policy.bin"));
        assert!(path.exists());

        let restored = load_policy(shape.init::<B>(&device), dir.path(), &device).unwrap();
        let obs = batch_tensor::<B>(&[0.1, 0.2, -0.1, 0.0], 4, &device);
        assert_eq!(
            read_floats(model.values(obs.clone())).unwrap(),
            read_floats(restored.values(obs)).unwrap()
        );
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = tempdir().unwrap();
        let state = AlgorithmState {
            algo: "PPO".to_string(),
            iteration: 3,
            timesteps_total: 6000,
            episodes_total: 250,
            config: PPOConfig::new().environment("CartPole-v1"),
        };
        write_state(dir.path(), &state).unwrap();
        assert_eq!(read_state(dir.path()).unwrap(), state);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(read_state(dir.path()), Err(CheckpointError::Missing(_))));

        let device = Default::default();
        let template = ActorCriticConfig::new(4, 2, vec![8]).init::<B>(&device);
        assert!(matches!(
            load_policy(template, dir.path(), &device),
            Err(CheckpointError::Missing(_))
        ));
    }
}
