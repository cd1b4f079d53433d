//! Generalized Advantage Estimation.
//!
//! A_t = Σ_l (γλ)^l δ_{t+l},  δ_t = r_t + γ V(s_{t+1}) - V(s_t)
//!
//! λ = 0 gives one-step TD, λ = 1 gives Monte Carlo returns minus baseline.

/// A contiguous fragment inside a concatenated batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    /// First index in the batch.
    pub start: usize,
    /// Number of steps.
    pub len: usize,
    /// Bootstrap value after the last step.
    pub last_value: f32,
}

impl Fragment {
    fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Backward GAE recursion writing into `advantages` and `returns`.
fn gae_into(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    (gamma, lambda): (f32, f32),
    advantages: &mut [f32],
    returns: &mut [f32],
) {
    let mut running = 0.0f32;
    let mut next_value = last_value;

    for t in (0..rewards.len()).rev() {
        // A done step neither bootstraps nor accumulates past itself.
        let mask = f32::from(u8::from(!dones[t]));
        let td_error = rewards[t] + gamma * mask * next_value - values[t];
        running = td_error + gamma * lambda * mask * running;

        advantages[t] = running;
        returns[t] = running + values[t];
        next_value = values[t];
    }
}

/// Advantages and value targets for one contiguous trajectory fragment.
///
/// `last_value` bootstraps the step after the fragment and is ignored when the
/// final step is done. Panics if the slices differ in length.
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    assert!(
        values.len() == rewards.len() && dones.len() == rewards.len(),
        "rewards, values and dones must have the same length"
    );
    let mut advantages = vec![0.0; rewards.len()];
    let mut returns = vec![0.0; rewards.len()];
    gae_into(rewards, values, dones, last_value, (gamma, lambda), &mut advantages, &mut returns);
    (advantages, returns)
}

/// GAE over a batch made of back-to-back fragments from different workers.
///
/// Steps not covered by any fragment keep a zero advantage and a return
/// equal to their value estimate.
pub fn compute_gae_fragments(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    fragments: &[Fragment],
    gamma: f32,
    lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let mut advantages = vec![0.0; rewards.len()];
    let mut returns = values.to_vec();

    for frag in fragments {
        let r = frag.range();
        gae_into(
            &rewards[r.clone()],
            &values[r.clone()],
            &dones[r.clone()],
            frag.last_value,
            (gamma, lambda),
            &mut advantages[r.clone()],
            &mut returns[r],
        );
    }

    (advantages, returns)
}

/// Normalize to zero mean and unit (population) variance.
///
/// Empty input is left alone; a single element becomes 0.0.
pub fn normalize_advantages(advantages: &mut [f32]) {
    match advantages.len() {
        0 => {}
        1 => advantages[0] = 0.0,
        len => {
            let n = len as f32;
            let mean = advantages.iter().sum::<f32>() / n;
            let var = advantages.iter().fold(0.0, |acc, a| acc + (a - mean) * (a - mean)) / n;
            let inv_std = 1.0 / (var + 1e-8).sqrt();
            advantages.iter_mut().for_each(|a| *a = (*a - mean) * inv_std);
        }
    }
}
