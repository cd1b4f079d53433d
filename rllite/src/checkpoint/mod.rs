//! Checkpointing.
//!
//! - [`files`]: save/load of one checkpoint directory
//! - [`Checkpointer`]: periodic saves, pruning, best run, resume
//!
//! ```rust,ignore
//! let checkpointer = Checkpointer::new(
//!     CheckpointerConfig::new("./checkpoints").every(5),
//! )?;
//! let mut algo = PPOConfig::new()
//!     .environment("CartPole-v1")
//!     .build()?
//!     .with_checkpointer(checkpointer);
//! ```

pub mod checkpointer;
pub mod files;

pub use checkpointer::{is_checkpoint_dir, CheckpointInfo, Checkpointer, CheckpointerConfig};
pub use files::{
    load_policy, read_state, save_policy, write_state, AlgorithmState, CheckpointError, POLICY_FILE,
    STATE_FILE,
};
