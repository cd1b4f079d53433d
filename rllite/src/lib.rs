//! # rllite: on-policy RL with lazily imported backends
//!
//! PPO and A2C on Burn, driven through an algorithm registry. A backend is
//! loaded only when an algorithm is built for it, and only the one the
//! config selects.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ register_all()        AlgorithmRegistry { PPO, A2C } + ImportContext│
//! │      │                         (no backend touched)                 │
//! │      ▼                                                              │
//! │ PPOConfig::new().environment(..).framework(..).rollouts(..).build() │
//! │      │                                                              │
//! │      ▼                                                              │
//! │ ImportContext::require(framework) ──► loaded-backend table + probe  │
//! │      │                                                              │
//! │      ▼                                                              │
//! │ OnPolicyTrainer<B, Loss, Adam>                                      │
//! │   ├── WorkerSet: local worker (+ remote worker threads)             │
//! │   │     └── weights as bytes through WeightsSlot                    │
//! │   └── train(): sample ─► GAE ─► minibatch SGD ─► sync weights       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frameworks
//!
//! | name    | backend                   | compiled                |
//! |---------|---------------------------|-------------------------|
//! | `torch` | `Autodiff<NdArray>` (CPU) | always                  |
//! | `tf`    | `Autodiff<Wgpu>`          | with the `wgpu` feature |
//!
//! Setting `RLLITE_TEST_NO_TF_IMPORT=1` before registration keeps `tf` out of
//! the guarded import path; [`register_all_with`] does the same without the
//! environment.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rllite::{register_all, Framework, PPOConfig};
//!
//! register_all()?;
//! let mut algo = PPOConfig::new()
//!     .environment("CartPole-v1")
//!     .framework(Framework::Torch)
//!     .rollouts(0)
//!     .build()?;
//! let result = algo.train()?;
//! println!("reward mean: {:?}", result.episode_reward_mean);
//! algo.stop();
//! ```

pub mod algorithm;
pub mod algorithms;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod environment;
pub mod error;
pub mod framework;
pub mod metrics;
pub mod registry;
pub mod rollout;
pub mod trainer;

pub use algorithm::{Algorithm, Trainable};
pub use checkpoint::{CheckpointError, Checkpointer, CheckpointerConfig};
pub use config::{A2CConfig, AlgorithmConfig, ConfigError, PPOConfig};
pub use environment::{make_env, CartPole, Env, EnvStep};
pub use error::{Result, RlError};
pub use framework::{
    ensure_not_imported, imported_backends, is_imported, Framework, ImportContext, ImportPolicy,
    RecordingProbe, NO_TF_IMPORT_ENV,
};
pub use metrics::{ConsoleLogger, CsvLogger, MultiLogger, ResultLogger, TrainResult};
pub use registry::{
    global_registry, register_all, register_all_with, AlgorithmEntry, AlgorithmRegistry,
    RegisterHook, RegistrationOptions,
};
pub use trainer::OnPolicyTrainer;
