//! Loss strategy per algorithm.
//!
//! The trainer computes log-probs, entropy and values for a minibatch; a
//! [`PolicyLoss`] turns them into the scalar to backpropagate. This keeps PPO
//! and A2C on the same training loop.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::policy_loss::{approx_kl, policy_gradient_loss, ppo_clip_loss, value_loss};
use crate::config::AlgorithmConfig;

/// Minibatch tensors handed to a [`PolicyLoss`].
pub struct LossInput<B: Backend> {
    /// Current log π(a|s), `[batch]`.
    pub log_probs: Tensor<B, 1>,
    /// Current per-sample entropy, `[batch]`.
    pub entropy: Tensor<B, 1>,
    /// Current V(s), `[batch]`.
    pub values: Tensor<B, 1>,
    /// Behaviour log-probs, `[batch]`.
    pub old_log_probs: Tensor<B, 1>,
    /// Behaviour values, `[batch]`.
    pub old_values: Tensor<B, 1>,
    /// Advantages, `[batch]`.
    pub advantages: Tensor<B, 1>,
    /// Value targets, `[batch]`.
    pub returns: Tensor<B, 1>,
}

/// Total loss plus detached components for logging.
pub struct LossOutput<B: Backend> {
    /// Scalar to backpropagate.
    pub total: Tensor<B, 1>,
    /// Policy term.
    pub policy_loss: Tensor<B, 1>,
    /// Value term (before the coefficient).
    pub vf_loss: Tensor<B, 1>,
    /// Mean entropy.
    pub entropy: Tensor<B, 1>,
    /// Approximate KL to the behaviour policy.
    pub kl: Tensor<B, 1>,
}

/// Algorithm-specific loss.
pub trait PolicyLoss: Clone + Send + 'static {
    /// Registered algorithm name.
    fn name(&self) -> &'static str;

    /// Build from the shared config.
    fn from_config(config: &AlgorithmConfig) -> Self;

    /// Combine minibatch terms into the loss.
    fn compute<B: Backend>(&self, input: LossInput<B>) -> LossOutput<B>;
}

/// PPO: clipped surrogate, clipped value loss, entropy bonus.
#[derive(Debug, Clone, PartialEq)]
pub struct PpoLoss {
    pub clip_param: f32,
    pub vf_clip_param: Option<f32>,
    pub vf_loss_coeff: f32,
    pub entropy_coeff: f32,
}

impl PolicyLoss for PpoLoss {
    fn name(&self) -> &'static str {
        "PPO"
    }

    fn from_config(config: &AlgorithmConfig) -> Self {
        Self {
            clip_param: config.clip_param,
            vf_clip_param: config.vf_clip_param,
            vf_loss_coeff: config.vf_loss_coeff,
            entropy_coeff: config.entropy_coeff,
        }
    }

    fn compute<B: Backend>(&self, input: LossInput<B>) -> LossOutput<B> {
        let kl = approx_kl(input.log_probs.clone().detach(), input.old_log_probs.clone());
        let policy_loss = ppo_clip_loss(
            input.log_probs,
            input.old_log_probs,
            input.advantages,
            self.clip_param,
        );
        let vf_loss = value_loss(input.values, input.old_values, input.returns, self.vf_clip_param);
        let entropy = input.entropy.mean();

        let total = policy_loss.clone() + vf_loss.clone().mul_scalar(self.vf_loss_coeff)
            - entropy.clone().mul_scalar(self.entropy_coeff);

        LossOutput {
            total,
            policy_loss,
            vf_loss,
            entropy,
            kl,
        }
    }
}

/// A2C: advantage-weighted log-likelihood, MSE value loss, entropy bonus.
#[derive(Debug, Clone, PartialEq)]
pub struct A2cLoss {
    pub vf_loss_coeff: f32,
    pub entropy_coeff: f32,
}

impl PolicyLoss for A2cLoss {
    fn name(&self) -> &'static str {
        "A2C"
    }

    fn from_config(config: &AlgorithmConfig) -> Self {
        Self {
            vf_loss_coeff: config.vf_loss_coeff,
            entropy_coeff: config.entropy_coeff,
        }
    }

    fn compute<B: Backend>(&self, input: LossInput<B>) -> LossOutput<B> {
        let kl = approx_kl(input.log_probs.clone().detach(), input.old_log_probs);
        let policy_loss = policy_gradient_loss(input.log_probs, input.advantages);
        let vf_loss = value_loss(input.values, input.old_values, input.returns, None);
        let entropy = input.entropy.mean();

        let total = policy_loss.clone() + vf_loss.clone().mul_scalar(self.vf_loss_coeff)
            - entropy.clone().mul_scalar(self.entropy_coeff);

        LossOutput {
            total,
            policy_loss,
            vf_loss,
            entropy,
            kl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::model::read_scalar;
    use crate::config::{A2CConfig, PPOConfig};
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn t(data: &[f32]) -> Tensor<B, 1> {
        Tensor::from_floats(data, &Default::default())
    }

    fn input() -> LossInput<B> {
        LossInput {
            log_probs: t(&[-0.7, -0.7]),
            entropy: t(&[0.69, 0.69]),
            values: t(&[1.0, 1.0]),
            old_log_probs: t(&[-0.7, -0.7]),
            old_values: t(&[1.0, 1.0]),
            advantages: t(&[1.0, -1.0]),
            returns: t(&[2.0, 0.0]),
        }
    }

    #[test]
    fn test_ppo_components() {
        let loss = PpoLoss::from_config(&PPOConfig::new().with_entropy_coeff(0.1));
        assert_eq!(loss.name(), "PPO");

        let out = loss.compute(input());
        let policy = read_scalar(out.policy_loss).unwrap();
        let vf = read_scalar(out.vf_loss).unwrap();
        let entropy = read_scalar(out.entropy).unwrap();
        let total = read_scalar(out.total).unwrap();

        assert!(policy.abs() < 1e-6);
        assert!((vf - 1.0).abs() < 1e-6);
        assert!((entropy - 0.69).abs() < 1e-6);
        assert!((total - (policy + vf - 0.1 * entropy)).abs() < 1e-5);
        assert!(read_scalar(out.kl).unwrap().abs() < 1e-7);
    }

    #[test]
    fn test_a2c_components() {
        let config = A2CConfig::new();
        let loss = A2cLoss::from_config(&config);
        assert_eq!(loss.name(), "A2C");

        let out = loss.compute(input());
        let policy = read_scalar(out.policy_loss).unwrap();
        let vf = read_scalar(out.vf_loss).unwrap();
        let total = read_scalar(out.total).unwrap();
        let entropy = read_scalar(out.entropy).unwrap();

        // -(-0.7*1 + -0.7*-1)/2 = 0
        assert!(policy.abs() < 1e-6);
        assert!((total - (policy + config.vf_loss_coeff * vf - config.entropy_coeff * entropy)).abs() < 1e-5);
    }
}
