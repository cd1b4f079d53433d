//! Environments addressable by name.
//!
//! Rollout workers create their environment from the configured name through
//! [`make_env`]. Only discrete-action environments are supported.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::RlError;

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Observation after the step.
    pub observation: Vec<f32>,
    /// Reward for the step.
    pub reward: f32,
    /// Episode ended because of the dynamics (failure or goal).
    pub terminated: bool,
    /// Episode ended because of the time limit.
    pub truncated: bool,
}

impl EnvStep {
    /// Terminal or truncated.
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Single discrete-action environment.
pub trait Env: Send {
    /// Registered name.
    fn name(&self) -> &str;

    /// Observation length.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> Vec<f32>;

    /// Apply `action` and advance one step.
    fn step(&mut self, action: usize) -> EnvStep;
}

// ============================================================================
// CartPole
// ============================================================================

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_HALF_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;
const INIT_RANGE: f32 = 0.05;

/// Classic cart-pole balancing task.
///
/// Observation: `[x, x_dot, theta, theta_dot]`. Actions: 0 pushes left,
/// 1 pushes right. Reward is 1.0 per step, including the terminating one.
pub struct CartPole {
    name: &'static str,
    state: [f32; 4],
    ticks: u32,
    max_steps: u32,
    reward_threshold: f32,
    rng: StdRng,
}

impl CartPole {
    /// Observation size.
    pub const OBS_SIZE: usize = 4;
    /// Number of actions.
    pub const N_ACTIONS: usize = 2;

    /// "CartPole-v1": 500 step limit, solved at 475.
    pub fn v1(seed: u64) -> Self {
        Self::new("CartPole-v1", 500, 475.0, seed)
    }

    /// "CartPole-v0": 200 step limit, solved at 195.
    pub fn v0(seed: u64) -> Self {
        Self::new("CartPole-v0", 200, 195.0, seed)
    }

    fn new(name: &'static str, max_steps: u32, reward_threshold: f32, seed: u64) -> Self {
        Self {
            name,
            state: [0.0; 4],
            ticks: 0,
            max_steps,
            reward_threshold,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Episode step limit.
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Mean episode reward at which the task counts as solved.
    pub fn reward_threshold(&self) -> f32 {
        self.reward_threshold
    }
}

impl Env for CartPole {
    fn name(&self) -> &str {
        self.name
    }

    fn obs_size(&self) -> usize {
        Self::OBS_SIZE
    }

    fn n_actions(&self) -> usize {
        Self::N_ACTIONS
    }

    fn reset(&mut self) -> Vec<f32> {
        for v in self.state.iter_mut() {
            *v = self.rng.gen_range(-INIT_RANGE..INIT_RANGE);
        }
        self.ticks = 0;
        self.state.to_vec()
    }

    fn step(&mut self, action: usize) -> EnvStep {
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let [x, x_dot, theta, theta_dot] = self.state;

        let cos_theta = theta.cos();
        let sin_theta = theta.sin();
        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_HALF_LENGTH;

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let denom = POLE_HALF_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass);
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp) / denom.max(1e-6);
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.state = [
            x + DT * x_dot,
            x_dot + DT * x_acc,
            theta + DT * theta_dot,
            theta_dot + DT * theta_acc,
        ];
        self.ticks += 1;

        let terminated = self.state[0].abs() > X_THRESHOLD || self.state[2].abs() > THETA_THRESHOLD;
        let truncated = !terminated && self.ticks >= self.max_steps;

        EnvStep {
            observation: self.state.to_vec(),
            reward: 1.0,
            terminated,
            truncated,
        }
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Registered environment names.
pub fn registered_envs() -> &'static [&'static str] {
    &["CartPole-v0", "CartPole-v1"]
}

/// Create an environment by name.
pub fn make_env(name: &str, seed: u64) -> Result<Box<dyn Env>, RlError> {
    match name {
        "CartPole-v1" => Ok(Box::new(CartPole::v1(seed))),
        "CartPole-v0" => Ok(Box::new(CartPole::v0(seed))),
        other => Err(RlError::UnknownEnvironment(other.to_string())),
    }
}

/// Observation and action sizes of a registered environment.
pub fn env_spaces(name: &str) -> Result<(usize, usize), RlError> {
    let env = make_env(name, 0)?;
    Ok((env.obs_size(), env.n_actions()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_env() {
        let env = make_env("CartPole-v1", 0).unwrap();
        assert_eq!(env.name(), "CartPole-v1");
        assert_eq!(env.obs_size(), 4);
        assert_eq!(env.n_actions(), 2);
        assert!(matches!(make_env("Pong-v5", 0), Err(RlError::UnknownEnvironment(_))));
        assert_eq!(env_spaces("CartPole-v0").unwrap(), (4, 2));
    }

    #[test]
    fn test_versions() {
        assert_eq!(CartPole::v0(0).max_steps(), 200);
        assert_eq!(CartPole::v0(0).reward_threshold(), 195.0);
        assert_eq!(CartPole::v1(0).max_steps(), 500);
        assert_eq!(CartPole::v1(0).reward_threshold(), 475.0);
        assert_eq!(registered_envs(), &["CartPole-v0", "CartPole-v1"]);
    }

    #[test]
    fn test_reset_is_small_and_seeded() {
        let mut a = CartPole::v1(7);
        let mut b = CartPole::v1(7);
        let obs = a.reset();
        assert_eq!(obs, b.reset());
        assert!(obs.iter().all(|v| v.abs() <= INIT_RANGE));
    }

    #[test]
    fn test_constant_push_terminates() {
        let mut env = CartPole::v1(0);
        env.reset();
        let mut steps = 0;
        loop {
            let step = env.step(1);
            steps += 1;
            assert_eq!(step.reward, 1.0);
            if step.done() {
                assert!(step.terminated);
                assert!(!step.truncated);
                break;
            }
            assert!(steps < 500);
        }
        assert!(steps < 100, "always pushing right should fail quickly, took {}", steps);
    }

    #[test]
    fn test_truncation_at_limit() {
        let mut env = CartPole::v0(3);
        env.reset();
        // Keep the pole near upright by pushing against its lean.
        let mut last = None;
        for _ in 0..200 {
            let theta = env.state[2] + 0.5 * env.state[3];
            let step = env.step(if theta > 0.0 { 1 } else { 0 });
            if step.done() {
                last = Some(step);
                break;
            }
        }
        let step = last.expect("episode should end within the step limit");
        if !step.terminated {
            assert!(step.truncated);
            assert_eq!(env.ticks, env.max_steps());
        }
    }
}
