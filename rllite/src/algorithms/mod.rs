//! Algorithm components.
//!
//! - `model`: actor-critic MLP
//! - `action_policy`: categorical distribution over discrete actions
//! - `gae`: Generalized Advantage Estimation
//! - `policy_loss`: loss terms (clipped surrogate, value loss, approx KL)
//! - `loss`: per-algorithm loss strategy (PPO, A2C)

pub mod action_policy;
pub mod gae;
pub mod loss;
pub mod model;
pub mod policy_loss;

pub use action_policy::CategoricalOutput;
pub use gae::{compute_gae, compute_gae_fragments, normalize_advantages, Fragment};
pub use loss::{A2cLoss, LossInput, LossOutput, PolicyLoss, PpoLoss};
pub use model::{ActorCriticConfig, ActorCriticNet};
pub use policy_loss::{approx_kl, policy_gradient_loss, ppo_clip_loss, value_loss};
