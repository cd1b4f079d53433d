//! Policy gradient loss terms.
//!
//! Importance ratios are computed as exp(log_ratio) with the log ratio clamped
//! to [-20, 20] so a stale or diverged policy cannot overflow.

use burn::tensor::{backend::Backend, Tensor};

const MAX_LOG_RATIO: f32 = 20.0;

/// PPO clipped surrogate loss (negated for minimization).
///
/// L = -E[min(r A, clip(r, 1-ε, 1+ε) A)],  r = π(a|s) / π_old(a|s)
pub fn ppo_clip_loss<B: Backend>(
    log_probs: Tensor<B, 1>,
    old_log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    clip_param: f32,
) -> Tensor<B, 1> {
    let ratio = (log_probs - old_log_probs)
        .clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO)
        .exp();
    let clipped = ratio.clone().clamp(1.0 - clip_param, 1.0 + clip_param);

    let surr1 = ratio * advantages.clone();
    let surr2 = clipped * advantages;

    -surr1.min_pair(surr2).mean()
}

/// Vanilla policy gradient loss: -E[log π(a|s) A].
pub fn policy_gradient_loss<B: Backend>(
    log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
) -> Tensor<B, 1> {
    -(log_probs * advantages).mean()
}

/// Value function loss, optionally clipped around the old predictions.
///
/// With `clip`, takes the elementwise max of the clipped and unclipped squared
/// errors, so the update is never more optimistic than the unclipped one.
pub fn value_loss<B: Backend>(
    values: Tensor<B, 1>,
    old_values: Tensor<B, 1>,
    returns: Tensor<B, 1>,
    clip: Option<f32>,
) -> Tensor<B, 1> {
    match clip {
        Some(clip) => {
            let clipped = old_values.clone() + (values.clone() - old_values).clamp(-clip, clip);
            let loss1 = (values - returns.clone()).powf_scalar(2.0);
            let loss2 = (clipped - returns).powf_scalar(2.0);
            loss1.max_pair(loss2).mean()
        }
        None => (values - returns).powf_scalar(2.0).mean(),
    }
}

/// Approximate KL(π_old || π) via E[(r - 1) - log r].
pub fn approx_kl<B: Backend>(log_probs: Tensor<B, 1>, old_log_probs: Tensor<B, 1>) -> Tensor<B, 1> {
    let log_ratio = (log_probs - old_log_probs).clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO);
    ((log_ratio.clone().exp() - 1.0) - log_ratio).mean()
}
