//! Per-iteration training results.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of recent episodes the reward statistics are computed over.
pub const EPISODE_WINDOW: usize = 100;

/// Sliding window over completed episodes.
///
/// Non-finite returns are counted but kept out of the statistics.
#[derive(Debug, Clone)]
pub struct EpisodeWindow {
    returns: VecDeque<f32>,
    lengths: VecDeque<usize>,
    capacity: usize,
    filtered: usize,
}

impl EpisodeWindow {
    /// Create a window holding the last `capacity` episodes.
    pub fn new(capacity: usize) -> Self {
        Self {
            returns: VecDeque::with_capacity(capacity),
            lengths: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            filtered: 0,
        }
    }

    /// Record a completed episode.
    pub fn push(&mut self, episode_return: f32, length: usize) {
        if !episode_return.is_finite() {
            self.filtered += 1;
            return;
        }
        if self.returns.len() == self.capacity {
            self.returns.pop_front();
            self.lengths.pop_front();
        }
        self.returns.push_back(episode_return);
        self.lengths.push_back(length);
    }

    /// Episodes currently in the window.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether no episode has completed yet.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Episodes dropped for a non-finite return.
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Mean return, `None` before the first episode.
    pub fn reward_mean(&self) -> Option<f32> {
        if self.returns.is_empty() {
            return None;
        }
        Some(self.returns.iter().sum::<f32>() / self.returns.len() as f32)
    }

    /// Minimum return.
    pub fn reward_min(&self) -> Option<f32> {
        self.returns.iter().copied().reduce(f32::min)
    }

    /// Maximum return.
    pub fn reward_max(&self) -> Option<f32> {
        self.returns.iter().copied().reduce(f32::max)
    }

    /// Mean episode length.
    pub fn len_mean(&self) -> Option<f32> {
        if self.lengths.is_empty() {
            return None;
        }
        Some(self.lengths.iter().sum::<usize>() as f32 / self.lengths.len() as f32)
    }
}

impl Default for EpisodeWindow {
    fn default() -> Self {
        Self::new(EPISODE_WINDOW)
    }
}

/// Learner statistics averaged over the minibatches of one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub policy_loss: f32,
    pub vf_loss: f32,
    pub entropy: f32,
    pub kl: f32,
    pub total_loss: f32,
    /// SGD steps actually taken (KL early stop can cut this short).
    pub num_sgd_steps: usize,
}

/// Result of one `train()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    pub algo: String,
    pub framework: String,
    pub training_iteration: usize,
    pub timesteps_this_iter: usize,
    pub timesteps_total: usize,
    pub episodes_this_iter: usize,
    pub episodes_total: usize,
    pub episode_reward_mean: Option<f32>,
    pub episode_reward_min: Option<f32>,
    pub episode_reward_max: Option<f32>,
    pub episode_len_mean: Option<f32>,
    pub learner: LearnerStats,
    pub time_this_iter_s: f64,
    pub time_total_s: f64,
}

impl TrainResult {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_statistics() {
        let mut window = EpisodeWindow::new(3);
        assert!(window.reward_mean().is_none());
        assert!(window.len_mean().is_none());

        window.push(10.0, 10);
        window.push(20.0, 20);
        window.push(30.0, 30);
        assert_eq!(window.reward_mean(), Some(20.0));
        assert_eq!(window.reward_min(), Some(10.0));
        assert_eq!(window.reward_max(), Some(30.0));

        // Oldest episode falls out.
        window.push(40.0, 40);
        assert_eq!(window.len(), 3);
        assert_eq!(window.reward_mean(), Some(30.0));
        assert_eq!(window.len_mean(), Some(30.0));
    }

    #[test]
    fn test_window_filters_non_finite() {
        let mut window = EpisodeWindow::default();
        window.push(f32::NAN, 5);
        window.push(f32::INFINITY, 5);
        window.push(1.0, 5);
        assert_eq!(window.len(), 1);
        assert_eq!(window.filtered(), 2);
        assert_eq!(window.reward_mean(), Some(1.0));
    }

    #[test]
    fn test_result_json() {
        let result = TrainResult {
            algo: "PPO".to_string(),
            framework: "torch".to_string(),
            training_iteration: 1,
            timesteps_this_iter: 200,
            timesteps_total: 200,
            episodes_this_iter: 9,
            episodes_total: 9,
            episode_reward_mean: Some(22.2),
            episode_reward_min: Some(9.0),
            episode_reward_max: Some(51.0),
            episode_len_mean: Some(22.2),
            learner: LearnerStats::default(),
            time_this_iter_s: 0.5,
            time_total_s: 0.5,
        };
        let parsed: TrainResult = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(parsed, result);
    }
}
