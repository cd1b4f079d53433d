//! Flat on-policy sample batch.

use crate::algorithms::gae::Fragment;

/// Transitions from one or more rollout fragments, stored column-wise.
///
/// `obs` is row-major `[len, obs_size]`. Each fragment is contiguous and
/// carries its own bootstrap value, so GAE never crosses a worker boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    pub obs_size: usize,
    pub obs: Vec<f32>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub log_probs: Vec<f32>,
    pub values: Vec<f32>,
    pub fragments: Vec<Fragment>,
    /// Returns of episodes that completed inside this batch.
    pub episode_returns: Vec<f32>,
    /// Lengths of episodes that completed inside this batch.
    pub episode_lengths: Vec<usize>,
}

impl SampleBatch {
    /// Empty batch for observations of `obs_size`.
    pub fn new(obs_size: usize) -> Self {
        Self {
            obs_size,
            ..Default::default()
        }
    }

    /// Empty batch with room for `capacity` steps.
    pub fn with_capacity(obs_size: usize, capacity: usize) -> Self {
        Self {
            obs_size,
            obs: Vec::with_capacity(capacity * obs_size),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Completed episodes in this batch.
    pub fn num_episodes(&self) -> usize {
        self.episode_returns.len()
    }

    /// Append one transition.
    pub fn push(&mut self, obs: &[f32], action: usize, reward: f32, done: bool, log_prob: f32, value: f32) {
        debug_assert_eq!(obs.len(), self.obs_size);
        self.obs.extend_from_slice(obs);
        self.actions.push(action);
        self.rewards.push(reward);
        self.dones.push(done);
        self.log_probs.push(log_prob);
        self.values.push(value);
    }

    /// Record a completed episode.
    pub fn push_episode(&mut self, episode_return: f32, length: usize) {
        self.episode_returns.push(episode_return);
        self.episode_lengths.push(length);
    }

    /// Close the open fragment with its bootstrap value.
    ///
    /// Does nothing when no transition was pushed since the last fragment.
    pub fn end_fragment(&mut self, last_value: f32) {
        let start = self.fragments.last().map_or(0, |f| f.start + f.len);
        let len = self.len() - start;
        if len > 0 {
            self.fragments.push(Fragment {
                start,
                len,
                last_value,
            });
        }
    }

    /// Concatenate batches, shifting fragment offsets.
    pub fn concat(batches: Vec<SampleBatch>) -> SampleBatch {
        let obs_size = batches.first().map_or(0, |b| b.obs_size);
        let total = batches.iter().map(SampleBatch::len).sum();
        let mut out = SampleBatch::with_capacity(obs_size, total);

        for batch in batches {
            debug_assert_eq!(batch.obs_size, obs_size);
            let offset = out.len();
            out.fragments.extend(batch.fragments.iter().map(|f| Fragment {
                start: f.start + offset,
                ..*f
            }));
            out.obs.extend(batch.obs);
            out.actions.extend(batch.actions);
            out.rewards.extend(batch.rewards);
            out.dones.extend(batch.dones);
            out.log_probs.extend(batch.log_probs);
            out.values.extend(batch.values);
            out.episode_returns.extend(batch.episode_returns);
            out.episode_lengths.extend(batch.episode_lengths);
        }
        out
    }

    /// Gather observation rows for `indices`, row-major.
    pub fn gather_obs(&self, indices: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(indices.len() * self.obs_size);
        for &i in indices {
            out.extend_from_slice(&self.obs[i * self.obs_size..(i + 1) * self.obs_size]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(steps: usize, last_value: f32) -> SampleBatch {
        let mut b = SampleBatch::new(2);
        for i in 0..steps {
            b.push(&[i as f32, -(i as f32)], i % 2, 1.0, false, -0.7, 0.5);
        }
        b.end_fragment(last_value);
        b
    }

    #[test]
    fn test_end_fragment() {
        let mut b = batch(3, 2.0);
        assert_eq!(b.fragments, vec![Fragment { start: 0, len: 3, last_value: 2.0 }]);

        // Nothing new pushed: no empty fragment.
        b.end_fragment(9.0);
        assert_eq!(b.fragments.len(), 1);

        b.push(&[0.0, 0.0], 0, 1.0, true, -0.7, 0.5);
        b.end_fragment(0.0);
        assert_eq!(b.fragments[1], Fragment { start: 3, len: 1, last_value: 0.0 });
    }

    #[test]
    fn test_concat_shifts_fragments() {
        let mut a = batch(3, 1.0);
        a.push_episode(10.0, 10);
        let b = batch(2, 5.0);

        let merged = SampleBatch::concat(vec![a, b]);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.obs.len(), 10);
        assert_eq!(merged.num_episodes(), 1);
        assert_eq!(
            merged.fragments,
            vec![
                Fragment { start: 0, len: 3, last_value: 1.0 },
                Fragment { start: 3, len: 2, last_value: 5.0 },
            ]
        );
    }

    #[test]
    fn test_gather_obs() {
        let b = batch(3, 0.0);
        assert_eq!(b.gather_obs(&[2, 0]), vec![2.0, -2.0, 0.0, 0.0]);
    }
}
