//! Single rollout worker: one environment plus an inference copy of the policy.

use std::panic::{self, AssertUnwindSafe};

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;

use super::sample_batch::SampleBatch;
use crate::algorithms::action_policy::CategoricalOutput;
use crate::algorithms::model::{batch_tensor, read_floats, read_scalar, ActorCriticConfig, ActorCriticNet};
use crate::config::{AlgorithmConfig, ConfigError};
use crate::core::WeightsSlot;
use crate::environment::{make_env, Env};
use crate::error::RlError;

/// Env seeds of different workers are spaced this far apart.
const WORKER_SEED_STRIDE: u64 = 10_000;

/// Steps an environment with the current policy and records fragments.
///
/// Runs on the inner (non-autodiff) backend. The episode in progress carries
/// over between `sample` calls.
pub struct RolloutWorker<B: Backend> {
    worker_id: usize,
    env: Box<dyn Env>,
    model: ActorCriticNet<B>,
    device: B::Device,
    rng: fastrand::Rng,
    gamma: f32,
    obs: Vec<f32>,
    episode_return: f32,
    episode_len: usize,
    weights_version: u64,
}

impl<B: Backend> RolloutWorker<B> {
    /// Create a worker with a freshly initialized policy.
    pub fn new(worker_id: usize, config: &AlgorithmConfig, device: B::Device) -> Result<Self, RlError> {
        let env_name = config.env.as_deref().ok_or(ConfigError::MissingEnvironment)?;
        let seed = config
            .seed
            .map(|s| s.wrapping_add(worker_id as u64 * WORKER_SEED_STRIDE))
            .unwrap_or_else(rand::random);

        let mut env = make_env(env_name, seed)?;
        let model = ActorCriticConfig::new(env.obs_size(), env.n_actions(), config.fcnet_hiddens.clone())
            .init::<B>(&device);
        let obs = env.reset();

        Ok(Self {
            worker_id,
            env,
            model,
            device,
            rng: fastrand::Rng::with_seed(seed),
            gamma: config.gamma,
            obs,
            episode_return: 0.0,
            episode_len: 0,
            weights_version: 0,
        })
    }

    /// Worker index; 0 is the local worker.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Observation length of the environment.
    pub fn obs_size(&self) -> usize {
        self.env.obs_size()
    }

    /// Replace the policy.
    pub fn set_model(&mut self, model: ActorCriticNet<B>) {
        self.model = model;
    }

    /// Current policy.
    pub fn model(&self) -> &ActorCriticNet<B> {
        &self.model
    }

    /// Load weights recorded with `BinBytesRecorder<FullPrecisionSettings>`.
    ///
    /// Malformed bytes are an error, not a panic: the worker keeps its
    /// current weights and stays usable.
    pub fn load_weights(&mut self, bytes: &[u8]) -> Result<(), RlError> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let device = &self.device;
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
            Recorder::<B>::load::<<ActorCriticNet<B> as Module<B>>::Record>(&recorder, bytes.to_vec(), device)
        }));
        let record = match loaded {
            Ok(record) => record.map_err(|e| RlError::Weights(format!("{:?}", e)))?,
            Err(_) => return Err(RlError::Weights("recorder panicked on malformed weights".to_string())),
        };
        self.model = self.model.clone().load_record(record);
        Ok(())
    }

    /// Load weights from `slot` if a newer version was published.
    pub fn sync_from(&mut self, slot: &WeightsSlot) -> Result<bool, RlError> {
        match slot.get_if_newer(self.weights_version) {
            Some((version, bytes)) => {
                self.load_weights(&bytes)?;
                self.weights_version = version;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Collect `n_steps` transitions as a single fragment.
    pub fn sample(&mut self, n_steps: usize) -> Result<SampleBatch, RlError> {
        let obs_size = self.env.obs_size();
        let mut batch = SampleBatch::with_capacity(obs_size, n_steps);
        let mut last_done = false;

        for _ in 0..n_steps {
            let obs_tensor = batch_tensor::<B>(&self.obs, obs_size, &self.device);
            let (logits, value) = self.model.forward(obs_tensor);
            let (actions, log_probs) = CategoricalOutput::new(logits).sample(&mut self.rng)?;
            let value = read_scalar(value)?;
            let action = actions[0];

            let step = self.env.step(action);
            self.episode_return += step.reward;
            self.episode_len += 1;

            // A time limit is not a true terminal: fold the bootstrap into the
            // reward so the done flag can still cut the trace.
            let mut reward = step.reward;
            if step.truncated {
                reward += self.gamma * self.value_of(&step.observation)?;
            }

            let done = step.done();
            batch.push(&self.obs, action, reward, done, log_probs[0], value);

            if done {
                batch.push_episode(self.episode_return, self.episode_len);
                self.episode_return = 0.0;
                self.episode_len = 0;
                self.obs = self.env.reset();
            } else {
                self.obs = step.observation;
            }
            last_done = done;
        }

        let last_value = if last_done || batch.is_empty() {
            0.0
        } else {
            self.value_of(&self.obs)?
        };
        batch.end_fragment(last_value);

        Ok(batch)
    }

    /// Action for a single observation, sampled or greedy.
    pub fn compute_action(&mut self, obs: &[f32], explore: bool) -> Result<usize, RlError> {
        let expected = self.env.obs_size();
        if obs.len() != expected {
            return Err(RlError::ObservationSize {
                expected,
                actual: obs.len(),
            });
        }
        let (logits, _) = self.model.forward(batch_tensor::<B>(obs, expected, &self.device));
        let dist = CategoricalOutput::new(logits);
        let actions = if explore {
            dist.sample(&mut self.rng)?.0
        } else {
            dist.greedy()?
        };
        actions
            .first()
            .copied()
            .ok_or_else(|| RlError::Tensor("empty action batch".to_string()))
    }

    fn value_of(&self, obs: &[f32]) -> Result<f32, RlError> {
        let values = self.model.values(batch_tensor::<B>(obs, obs.len(), &self.device));
        read_floats(values)?
            .first()
            .copied()
            .ok_or_else(|| RlError::Tensor("empty value batch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PPOConfig;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn config() -> AlgorithmConfig {
        PPOConfig::new()
            .environment("CartPole-v1")
            .with_fcnet_hiddens(vec![8])
            .debugging(3)
    }

    #[test]
    fn test_sample_fragment() {
        let mut worker = RolloutWorker::<B>::new(0, &config(), Default::default()).unwrap();
        let batch = worker.sample(64).unwrap();

        assert_eq!(batch.len(), 64);
        assert_eq!(batch.obs.len(), 64 * 4);
        assert_eq!(batch.fragments.len(), 1);
        assert_eq!(batch.fragments[0].len, 64);
        assert!(batch.actions.iter().all(|&a| a < 2));
        assert!(batch.log_probs.iter().all(|&lp| lp <= 0.0));

        // Every done flag closes exactly one episode.
        let dones = batch.dones.iter().filter(|&&d| d).count();
        assert_eq!(dones, batch.num_episodes());
        assert!(batch.episode_lengths.iter().sum::<usize>() <= 64);
        if *batch.dones.last().unwrap() {
            assert_eq!(batch.fragments[0].last_value, 0.0);
        }
    }

    #[test]
    fn test_episode_carries_over() {
        let mut worker = RolloutWorker::<B>::new(0, &config(), Default::default()).unwrap();
        let a = worker.sample(5).unwrap();
        let b = worker.sample(5).unwrap();
        // The first observation of `b` continues where `a` left off.
        if !a.dones[4] {
            assert_ne!(&b.obs[..4], &a.obs[16..20]);
        }
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn test_load_weights_roundtrip() {
        let device = NdArrayDevice::Cpu;
        let mut source = RolloutWorker::<B>::new(0, &config(), device).unwrap();
        let mut target = RolloutWorker::<B>::new(1, &config(), device).unwrap();

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = recorder.record(source.model().clone().into_record(), ()).unwrap();
        target.load_weights(&bytes).unwrap();

        let obs = [0.01, -0.02, 0.03, 0.0];
        assert_eq!(source.value_of(&obs).unwrap(), target.value_of(&obs).unwrap());
        assert_eq!(
            source.compute_action(&obs, false).unwrap(),
            target.compute_action(&obs, false).unwrap()
        );
    }

    #[test]
    fn test_malformed_weights_keep_worker_usable() {
        let mut worker = RolloutWorker::<B>::new(0, &config(), NdArrayDevice::Cpu).unwrap();
        let obs = [0.01, -0.02, 0.03, 0.0];
        let before = worker.value_of(&obs).unwrap();

        let slot = WeightsSlot::new();
        slot.publish(vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(worker.sync_from(&slot), Err(RlError::Weights(_))));
        // Version not taken, weights untouched.
        assert_eq!(worker.value_of(&obs).unwrap(), before);
        assert_eq!(worker.sample(8).unwrap().len(), 8);
    }

    #[test]
    fn test_sync_from_slot() {
        let device = NdArrayDevice::Cpu;
        let source = RolloutWorker::<B>::new(0, &config(), device).unwrap();
        let mut target = RolloutWorker::<B>::new(1, &config(), device).unwrap();

        let slot = WeightsSlot::new();
        assert!(!target.sync_from(&slot).unwrap());

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        slot.publish(recorder.record(source.model().clone().into_record(), ()).unwrap());
        assert!(target.sync_from(&slot).unwrap());
        assert!(!target.sync_from(&slot).unwrap());
    }

    #[test]
    fn test_compute_action_checks_size() {
        let mut worker = RolloutWorker::<B>::new(0, &config(), Default::default()).unwrap();
        assert!(matches!(
            worker.compute_action(&[0.0; 3], true),
            Err(RlError::ObservationSize { expected: 4, actual: 3 })
        ));
        assert!(worker.compute_action(&[0.0; 4], true).unwrap() < 2);
    }
}
