//! Algorithm configuration.
//!
//! One flat [`AlgorithmConfig`] serves every registered algorithm. The
//! algorithm-specific constructors [`PPOConfig`] and [`A2CConfig`] only pick
//! defaults; the fluent methods then narrow the run down:
//!
//! ```ignore
//! let mut algo = PPOConfig::new()
//!     .environment("CartPole-v1")
//!     .framework(Framework::Torch)
//!     .rollouts(0)
//!     .build()?;
//! let result = algo.train()?;
//! algo.stop();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::algorithm::Algorithm;
use crate::error::RlError;
use crate::framework::Framework;
use crate::registry::{global_registry, AlgorithmRegistry};

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No environment was set.
    MissingEnvironment,
    /// A count parameter must be positive.
    InvalidCount { field: &'static str, value: usize },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Minibatch does not fit into the train batch.
    InvalidMinibatch { train_batch: usize, minibatch: usize },
    /// Hidden layer list is empty or contains a zero width.
    InvalidHiddens(Vec<usize>),
    /// JSON (de)serialization failed.
    Json(String),
    /// Reading a config file failed.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvironment => {
                write!(f, "no environment set, call `.environment(..)` first")
            }
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::InvalidMinibatch { train_batch, minibatch } => write!(
                f,
                "sgd_minibatch_size ({}) must be <= train_batch_size ({})",
                minibatch, train_batch
            ),
            ConfigError::InvalidHiddens(h) => {
                write!(f, "fcnet_hiddens must be non-empty with positive widths, got {:?}", h)
            }
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for an on-policy algorithm run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    /// Registered algorithm name ("PPO", "A2C").
    pub algo: String,
    /// Registered environment name.
    pub env: Option<String>,
    /// Backend the policy runs on.
    pub framework: Framework,

    // Rollouts
    /// Remote rollout worker threads. 0 samples in the calling thread.
    pub num_rollout_workers: usize,
    /// Steps per worker per sample call. Derived from the train batch when 0.
    pub rollout_fragment_length: usize,

    // Training
    /// Transitions collected per training iteration.
    pub train_batch_size: usize,
    /// Minibatch size for SGD.
    pub sgd_minibatch_size: usize,
    /// Passes over the train batch per iteration.
    pub num_sgd_iter: usize,
    /// Adam learning rate.
    pub lr: f64,
    /// Discount factor.
    pub gamma: f32,
    /// GAE lambda.
    pub lambda: f32,
    /// PPO surrogate clip.
    pub clip_param: f32,
    /// Value function clip (None = unclipped MSE).
    pub vf_clip_param: Option<f32>,
    /// Value loss coefficient.
    pub vf_loss_coeff: f32,
    /// Entropy bonus coefficient.
    pub entropy_coeff: f32,
    /// Max gradient norm (None = no clipping).
    pub grad_clip: Option<f32>,
    /// Approx-KL threshold that ends an epoch early (None = disabled).
    pub kl_target: Option<f32>,
    /// Normalize advantages per train batch.
    pub normalize_advantages: bool,

    // Model
    /// Hidden layer widths of actor and critic.
    pub fcnet_hiddens: Vec<usize>,

    // Debugging
    /// Seed for environments, sampling and shuffling.
    pub seed: Option<u64>,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            algo: "PPO".to_string(),
            env: None,
            framework: Framework::Torch,
            num_rollout_workers: 2,
            rollout_fragment_length: 0,
            train_batch_size: 2000,
            sgd_minibatch_size: 128,
            num_sgd_iter: 10,
            lr: 3e-4,
            gamma: 0.99,
            lambda: 0.95,
            clip_param: 0.2,
            vf_clip_param: Some(10.0),
            vf_loss_coeff: 1.0,
            entropy_coeff: 0.0,
            grad_clip: None,
            kl_target: None,
            normalize_advantages: true,
            fcnet_hiddens: vec![64, 64],
            seed: None,
        }
    }
}

/// PPO defaults.
pub struct PPOConfig;

impl PPOConfig {
    /// Default PPO configuration (no environment set).
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> AlgorithmConfig {
        AlgorithmConfig::default()
    }
}

/// A2C defaults.
pub struct A2CConfig;

impl A2CConfig {
    /// Default A2C configuration (no environment set).
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> AlgorithmConfig {
        AlgorithmConfig {
            algo: "A2C".to_string(),
            rollout_fragment_length: 10,
            train_batch_size: 200,
            sgd_minibatch_size: 200,
            num_sgd_iter: 1,
            lr: 1e-3,
            lambda: 1.0,
            vf_clip_param: None,
            vf_loss_coeff: 0.5,
            entropy_coeff: 0.01,
            grad_clip: Some(40.0),
            normalize_advantages: false,
            ..AlgorithmConfig::default()
        }
    }
}

impl AlgorithmConfig {
    /// Config for a registered algorithm name with generic defaults.
    pub fn for_algorithm(algo: impl Into<String>) -> Self {
        Self {
            algo: algo.into(),
            ..Self::default()
        }
    }

    /// Set the environment by registered name.
    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Select the framework.
    pub fn framework(mut self, framework: Framework) -> Self {
        self.framework = framework;
        self
    }

    /// Set the number of remote rollout workers.
    pub fn rollouts(mut self, num_rollout_workers: usize) -> Self {
        self.num_rollout_workers = num_rollout_workers;
        self
    }

    /// Seed everything that draws random numbers.
    pub fn debugging(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the rollout fragment length.
    pub fn with_rollout_fragment_length(mut self, len: usize) -> Self {
        self.rollout_fragment_length = len;
        self
    }

    /// Set the train batch size.
    pub fn with_train_batch_size(mut self, size: usize) -> Self {
        self.train_batch_size = size;
        self
    }

    /// Set the SGD minibatch size.
    pub fn with_sgd_minibatch_size(mut self, size: usize) -> Self {
        self.sgd_minibatch_size = size;
        self
    }

    /// Set the number of SGD passes per iteration.
    pub fn with_num_sgd_iter(mut self, n: usize) -> Self {
        self.num_sgd_iter = n;
        self
    }

    /// Set the learning rate.
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the discount factor.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the GAE lambda.
    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the PPO clip parameter.
    pub fn with_clip_param(mut self, clip: f32) -> Self {
        self.clip_param = clip;
        self
    }

    /// Set the value function clip.
    pub fn with_vf_clip_param(mut self, clip: Option<f32>) -> Self {
        self.vf_clip_param = clip;
        self
    }

    /// Set the value loss coefficient.
    pub fn with_vf_loss_coeff(mut self, coeff: f32) -> Self {
        self.vf_loss_coeff = coeff;
        self
    }

    /// Set the entropy coefficient.
    pub fn with_entropy_coeff(mut self, coeff: f32) -> Self {
        self.entropy_coeff = coeff;
        self
    }

    /// Set gradient norm clipping.
    pub fn with_grad_clip(mut self, clip: Option<f32>) -> Self {
        self.grad_clip = clip;
        self
    }

    /// Set the KL early-stop threshold.
    pub fn with_kl_target(mut self, kl: Option<f32>) -> Self {
        self.kl_target = kl;
        self
    }

    /// Enable or disable advantage normalization.
    pub fn with_normalize_advantages(mut self, normalize: bool) -> Self {
        self.normalize_advantages = normalize;
        self
    }

    /// Set the hidden layer widths.
    pub fn with_fcnet_hiddens(mut self, hiddens: Vec<usize>) -> Self {
        self.fcnet_hiddens = hiddens;
        self
    }

    /// Number of sampling units: remote workers, or the local worker alone.
    pub fn num_sampling_workers(&self) -> usize {
        self.num_rollout_workers.max(1)
    }

    /// Steps each sampling worker collects per sample call.
    pub fn effective_fragment_length(&self) -> usize {
        if self.rollout_fragment_length > 0 {
            self.rollout_fragment_length
        } else {
            self.train_batch_size.div_ceil(self.num_sampling_workers()).max(1)
        }
    }

    /// Effective minibatch size, capped by the train batch.
    pub fn effective_minibatch_size(&self) -> usize {
        self.sgd_minibatch_size.min(self.train_batch_size).max(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingEnvironment);
        }
        for (field, value) in [
            ("train_batch_size", self.train_batch_size),
            ("sgd_minibatch_size", self.sgd_minibatch_size),
            ("num_sgd_iter", self.num_sgd_iter),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }
        if self.sgd_minibatch_size > self.train_batch_size {
            return Err(ConfigError::InvalidMinibatch {
                train_batch: self.train_batch_size,
                minibatch: self.sgd_minibatch_size,
            });
        }
        if self.fcnet_hiddens.is_empty() || self.fcnet_hiddens.contains(&0) {
            return Err(ConfigError::InvalidHiddens(self.fcnet_hiddens.clone()));
        }

        check_range("lr", self.lr, 0.0, 1.0, false)?;
        check_range("gamma", self.gamma as f64, 0.0, 1.0, true)?;
        check_range("lambda", self.lambda as f64, 0.0, 1.0, true)?;
        check_range("clip_param", self.clip_param as f64, 0.0, 1.0, false)?;
        check_range("vf_loss_coeff", self.vf_loss_coeff as f64, 0.0, f64::MAX, true)?;
        check_range("entropy_coeff", self.entropy_coeff as f64, 0.0, f64::MAX, true)?;
        if let Some(clip) = self.vf_clip_param {
            check_range("vf_clip_param", clip as f64, 0.0, f64::MAX, false)?;
        }
        if let Some(clip) = self.grad_clip {
            check_range("grad_clip", clip as f64, 0.0, f64::MAX, false)?;
        }
        if let Some(kl) = self.kl_target {
            check_range("kl_target", kl as f64, 0.0, f64::MAX, false)?;
        }
        Ok(())
    }

    /// Parse from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Read from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Build the algorithm through the global registry.
    ///
    /// Built-in algorithms are registered on first use, so no prior
    /// `register_all()` call is needed.
    pub fn build(self) -> Result<Algorithm, RlError> {
        let registry = global_registry();
        if registry.read().is_empty() {
            let mut guard = registry.write();
            if guard.is_empty() {
                guard.register_builtins()?;
            }
        }
        let guard = registry.read();
        guard.build(self)
    }

    /// Build the algorithm through an explicit registry.
    pub fn build_in(self, registry: &AlgorithmRegistry) -> Result<Algorithm, RlError> {
        registry.build(self)
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    inclusive_min: bool,
) -> Result<(), ConfigError> {
    let above_min = if inclusive_min { value >= min } else { value > min };
    if !value.is_finite() || !above_min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}
