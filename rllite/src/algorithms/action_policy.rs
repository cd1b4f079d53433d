//! Categorical action distribution over discrete actions.
//!
//! Used two ways:
//! - Rollout collection: [`CategoricalOutput::sample`] (host-side, detached)
//! - Training: [`CategoricalOutput::log_prob`], [`CategoricalOutput::entropy`]
//!   (with gradient flow)

use burn::tensor::backend::Backend;
use burn::tensor::{activation::log_softmax, activation::softmax, Int, Tensor};

use super::model::read_floats;
use crate::error::RlError;

/// Logits of a categorical distribution, `[batch, n_actions]`.
#[derive(Debug, Clone)]
pub struct CategoricalOutput<B: Backend> {
    /// Unnormalized log probabilities.
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> CategoricalOutput<B> {
    /// Wrap a logits tensor.
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    /// Softmax probabilities.
    pub fn probs(&self) -> Tensor<B, 2> {
        softmax(self.logits.clone(), 1)
    }

    /// Number of actions.
    pub fn n_actions(&self) -> usize {
        self.logits.dims()[1]
    }

    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.logits.dims()[0]
    }

    /// Sample one action per row. Returns `(actions, log_probs)`.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> Result<(Vec<usize>, Vec<f32>), RlError> {
        let probs = read_floats(self.probs())?;
        let n_actions = self.n_actions();
        let batch_size = self.batch_size();

        let mut actions = Vec::with_capacity(batch_size);
        let mut log_probs = Vec::with_capacity(batch_size);

        for row in probs.chunks(n_actions).take(batch_size) {
            // Inverse CDF; the last action absorbs rounding so a row that sums
            // to slightly under 1.0 still yields a valid index.
            let u = rng.f32();
            let mut cumsum = 0.0;
            let mut selected = n_actions - 1;
            for (a, p) in row.iter().enumerate() {
                cumsum += p;
                if u < cumsum {
                    selected = a;
                    break;
                }
            }
            actions.push(selected);
            log_probs.push((row[selected] + 1e-8).ln());
        }

        Ok((actions, log_probs))
    }

    /// Most likely action per row.
    pub fn greedy(&self) -> Result<Vec<usize>, RlError> {
        let logits = read_floats(self.logits.clone())?;
        Ok(logits
            .chunks(self.n_actions())
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                    .0
            })
            .collect())
    }

    /// Log probability of `actions`, `[batch]`.
    pub fn log_prob(&self, actions: &[usize], device: &B::Device) -> Tensor<B, 1> {
        let batch_size = actions.len();
        let indices: Vec<i32> = actions.iter().map(|&a| a as i32).collect();
        let indices: Tensor<B, 2, Int> =
            Tensor::<B, 1, Int>::from_ints(indices.as_slice(), device).reshape([batch_size, 1]);

        log_softmax(self.logits.clone(), 1).gather(1, indices).flatten(0, 1)
    }

    /// Per-row entropy, `[batch]`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        let log_probs = log_softmax(self.logits.clone(), 1);
        let probs = log_probs.clone().exp();
        let neg_entropy: Tensor<B, 2> = (probs * log_probs).sum_dim(1);
        -neg_entropy.flatten(0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_sample_valid_actions() {
        let device = Default::default();
        let logits: Tensor<B, 2> = Tensor::from_floats([[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]], &device);
        let output = CategoricalOutput::new(logits);

        let mut rng = fastrand::Rng::with_seed(1);
        let (actions, log_probs) = output.sample(&mut rng).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(log_probs.len(), 2);
        assert!(actions.iter().all(|&a| a < 3));
        assert!(log_probs.iter().all(|&lp| lp <= 0.0 && lp.is_finite()));
    }

    #[test]
    fn test_peaked_distribution_samples_mode() {
        let device = Default::default();
        let logits: Tensor<B, 2> = Tensor::from_floats([[0.0, 30.0]], &device);
        let output = CategoricalOutput::new(logits);

        let mut rng = fastrand::Rng::with_seed(9);
        for _ in 0..20 {
            let (actions, _) = output.sample(&mut rng).unwrap();
            assert_eq!(actions, vec![1]);
        }
        assert_eq!(output.greedy().unwrap(), vec![1]);
    }

    #[test]
    fn test_log_prob_uniform() {
        let device = Default::default();
        let logits: Tensor<B, 2> = Tensor::from_floats([[0.0, 0.0], [0.0, 0.0]], &device);
        let output = CategoricalOutput::new(logits);

        let lp = read_floats(output.log_prob(&[0, 1], &device)).unwrap();
        for v in lp {
            assert!((v - 0.5f32.ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_entropy_ordering() {
        let device = Default::default();
        let uniform = CategoricalOutput::new(Tensor::<B, 2>::from_floats([[1.0, 1.0, 1.0]], &device));
        let peaked = CategoricalOutput::new(Tensor::<B, 2>::from_floats([[10.0, 0.0, 0.0]], &device));

        let h_uniform = read_floats(uniform.entropy()).unwrap()[0];
        let h_peaked = read_floats(peaked.entropy()).unwrap()[0];

        assert!((h_uniform - 3.0f32.ln()).abs() < 1e-4);
        assert!(h_uniform > h_peaked);
    }
}
