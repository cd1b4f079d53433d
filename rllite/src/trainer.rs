//! Synchronous on-policy trainer shared by PPO and A2C.
//!
//! One `train()` call:
//!
//! 1. sample at least `train_batch_size` steps from the worker set
//! 2. GAE per fragment, optional advantage normalization
//! 3. `num_sgd_iter` passes of shuffled minibatch SGD (Adam), stopping early
//!    once the approximate KL exceeds `kl_target`
//! 4. push the new weights to the workers
//!
//! The loss is the only algorithm-specific part, see [`PolicyLoss`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::algorithm::Trainable;
use crate::algorithms::action_policy::CategoricalOutput;
use crate::algorithms::gae::{compute_gae_fragments, normalize_advantages};
use crate::algorithms::loss::{LossInput, PolicyLoss};
use crate::algorithms::model::{batch_tensor, read_scalar, ActorCriticConfig, ActorCriticNet};
use crate::checkpoint::{load_policy, read_state, save_policy, write_state, AlgorithmState, CheckpointError};
use crate::config::{AlgorithmConfig, ConfigError};
use crate::environment::env_spaces;
use crate::error::RlError;
use crate::framework::{BackendHandle, Framework, ImportContext};
use crate::metrics::{EpisodeWindow, LearnerStats, TrainResult};
use crate::rollout::{SampleBatch, WorkerSet};

/// Create a configured Adam optimizer with optional gradient clipping.
pub fn create_optimizer<B, M>(grad_clip: Option<f32>) -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut adam_config = AdamConfig::new().with_epsilon(1e-5);

    if let Some(max_norm) = grad_clip {
        adam_config = adam_config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
    }

    adam_config.init()
}

/// On-policy actor-critic trainer, generic over backend, loss and optimizer.
pub struct OnPolicyTrainer<B, L, O>
where
    B: AutodiffBackend,
    L: PolicyLoss,
    O: Optimizer<ActorCriticNet<B>, B>,
{
    config: AlgorithmConfig,
    loss: L,
    model: ActorCriticNet<B>,
    optimizer: O,
    workers: WorkerSet<B::InnerBackend>,
    device: B::Device,
    rng: StdRng,
    episodes: EpisodeWindow,
    iteration: usize,
    timesteps_total: usize,
    episodes_total: usize,
    time_total_s: f64,
    backend: BackendHandle,
    stopped: bool,
}

impl<B, L, O> OnPolicyTrainer<B, L, O>
where
    B: AutodiffBackend,
    L: PolicyLoss,
    O: Optimizer<ActorCriticNet<B>, B>,
{
    /// Create the model and the worker set.
    ///
    /// `backend` proves the framework was imported through an
    /// [`ImportContext`]; the trainer never imports anything itself.
    pub fn new(
        config: AlgorithmConfig,
        loss: L,
        optimizer: O,
        backend: BackendHandle,
        device: B::Device,
    ) -> Result<Self, RlError> {
        let env_name = config.env.as_deref().ok_or(ConfigError::MissingEnvironment)?;
        let (obs_size, n_actions) = env_spaces(env_name)?;

        let model = ActorCriticConfig::new(obs_size, n_actions, config.fcnet_hiddens.clone()).init::<B>(&device);
        let inner_device = <B::InnerBackend as Backend>::Device::default();
        let workers = WorkerSet::new(&config, &model.valid(), inner_device)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::debug!(
            "built {} on `{}` ({} remote rollout workers, fragment {})",
            loss.name(),
            backend.framework(),
            workers.num_remote_workers(),
            workers.fragment_length()
        );

        Ok(Self {
            config,
            loss,
            model,
            optimizer,
            workers,
            device,
            rng,
            episodes: EpisodeWindow::default(),
            iteration: 0,
            timesteps_total: 0,
            episodes_total: 0,
            time_total_s: 0.0,
            backend,
            stopped: false,
        })
    }

    /// Current trained model.
    pub fn model(&self) -> &ActorCriticNet<B> {
        &self.model
    }

    fn ensure_running(&self) -> Result<(), RlError> {
        if self.stopped {
            return Err(RlError::Stopped);
        }
        Ok(())
    }

    /// Minibatch SGD over one train batch.
    fn learn(&mut self, batch: &SampleBatch, advantages: &[f32], returns: &[f32]) -> Result<LearnerStats, RlError> {
        let n = batch.len();
        if n == 0 {
            log::warn!("empty train batch, skipping update");
            return Ok(LearnerStats::default());
        }

        let device = self.device.clone();
        let minibatch_size = self.config.effective_minibatch_size().min(n);
        let lr = self.config.lr;
        let kl_target = self.config.kl_target;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut model = self.model.clone();
        let mut totals = LearnerStats::default();
        let mut kl_early_stop = false;

        for _epoch in 0..self.config.num_sgd_iter {
            if kl_early_stop {
                break;
            }
            indices.shuffle(&mut self.rng);

            for chunk in indices.chunks(minibatch_size) {
                let gather = |src: &[f32]| -> Tensor<B, 1> {
                    let values: Vec<f32> = chunk.iter().map(|&i| src[i]).collect();
                    Tensor::from_floats(values.as_slice(), &device)
                };
                let actions: Vec<usize> = chunk.iter().map(|&i| batch.actions[i]).collect();

                let obs = batch_tensor::<B>(&batch.gather_obs(chunk), batch.obs_size, &device);
                let (logits, values) = model.forward(obs);
                let dist = CategoricalOutput::new(logits);

                let out = self.loss.compute(LossInput {
                    log_probs: dist.log_prob(&actions, &device),
                    entropy: dist.entropy(),
                    values: values.flatten(0, 1),
                    old_log_probs: gather(&batch.log_probs),
                    old_values: gather(&batch.values),
                    advantages: gather(advantages),
                    returns: gather(returns),
                });

                let kl = read_scalar(out.kl)?;
                totals.policy_loss += read_scalar(out.policy_loss)?;
                totals.vf_loss += read_scalar(out.vf_loss)?;
                totals.entropy += read_scalar(out.entropy)?;
                totals.total_loss += read_scalar(out.total.clone())?;
                totals.kl += kl;
                totals.num_sgd_steps += 1;

                let grads = GradientsParams::from_grads(out.total.backward(), &model);
                model = self.optimizer.step(lr, model, grads);

                if let Some(target) = kl_target {
                    if kl > target {
                        log::debug!("KL early stop triggered: approx_kl={:.4} > target_kl={:.4}", kl, target);
                        kl_early_stop = true;
                        break;
                    }
                }
            }
        }

        self.model = model;

        let steps = totals.num_sgd_steps.max(1) as f32;
        Ok(LearnerStats {
            policy_loss: totals.policy_loss / steps,
            vf_loss: totals.vf_loss / steps,
            entropy: totals.entropy / steps,
            kl: totals.kl / steps,
            total_loss: totals.total_loss / steps,
            num_sgd_steps: totals.num_sgd_steps,
        })
    }
}

impl<B, L, O> Trainable for OnPolicyTrainer<B, L, O>
where
    B: AutodiffBackend,
    L: PolicyLoss,
    O: Optimizer<ActorCriticNet<B>, B>,
{
    fn name(&self) -> &str {
        self.loss.name()
    }

    fn framework(&self) -> Framework {
        self.backend.framework()
    }

    fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    fn iteration(&self) -> usize {
        self.iteration
    }

    fn train(&mut self) -> Result<TrainResult, RlError> {
        self.ensure_running()?;
        let start = Instant::now();

        let batch = self.workers.sample(self.config.train_batch_size)?;
        let (mut advantages, returns) = compute_gae_fragments(
            &batch.rewards,
            &batch.values,
            &batch.dones,
            &batch.fragments,
            self.config.gamma,
            self.config.lambda,
        );
        if self.config.normalize_advantages {
            normalize_advantages(&mut advantages);
        }

        let learner = self.learn(&batch, &advantages, &returns)?;
        self.workers.sync_weights(&self.model.valid())?;

        for (&ret, &len) in batch.episode_returns.iter().zip(&batch.episode_lengths) {
            self.episodes.push(ret, len);
        }
        self.iteration += 1;
        self.timesteps_total += batch.len();
        self.episodes_total += batch.num_episodes();

        let time_this_iter_s = start.elapsed().as_secs_f64();
        self.time_total_s += time_this_iter_s;

        let result = TrainResult {
            algo: self.loss.name().to_string(),
            framework: self.framework().as_str().to_string(),
            training_iteration: self.iteration,
            timesteps_this_iter: batch.len(),
            timesteps_total: self.timesteps_total,
            episodes_this_iter: batch.num_episodes(),
            episodes_total: self.episodes_total,
            episode_reward_mean: self.episodes.reward_mean(),
            episode_reward_min: self.episodes.reward_min(),
            episode_reward_max: self.episodes.reward_max(),
            episode_len_mean: self.episodes.len_mean(),
            learner,
            time_this_iter_s,
            time_total_s: self.time_total_s,
        };

        log::info!(
            "{} iter {}: timesteps={} reward_mean={} policy_loss={:.4} vf_loss={:.4} kl={:.4} ({:.2}s)",
            result.algo,
            result.training_iteration,
            result.timesteps_total,
            result
                .episode_reward_mean
                .map_or_else(|| "-".to_string(), |r| format!("{:.2}", r)),
            learner.policy_loss,
            learner.vf_loss,
            learner.kl,
            time_this_iter_s
        );

        Ok(result)
    }

    fn compute_single_action(&mut self, obs: &[f32], explore: bool) -> Result<usize, RlError> {
        self.ensure_running()?;
        self.workers.local_worker().compute_action(obs, explore)
    }

    fn save_checkpoint(&self, dir: &Path) -> Result<PathBuf, RlError> {
        save_policy(&self.model, dir)?;
        write_state(
            dir,
            &AlgorithmState {
                algo: self.loss.name().to_string(),
                iteration: self.iteration,
                timesteps_total: self.timesteps_total,
                episodes_total: self.episodes_total,
                config: self.config.clone(),
            },
        )?;
        Ok(dir.to_path_buf())
    }

    fn restore_checkpoint(&mut self, dir: &Path) -> Result<(), RlError> {
        self.ensure_running()?;
        let state = read_state(dir)?;

        if !state.algo.eq_ignore_ascii_case(self.loss.name()) {
            return Err(CheckpointError::Incompatible(format!(
                "checkpoint is for {}, algorithm is {}",
                state.algo,
                self.loss.name()
            ))
            .into());
        }
        if state.config.env != self.config.env || state.config.fcnet_hiddens != self.config.fcnet_hiddens {
            return Err(CheckpointError::Incompatible(format!(
                "model shape differs: env {:?} hiddens {:?}",
                state.config.env, state.config.fcnet_hiddens
            ))
            .into());
        }

        self.model = load_policy(self.model.clone(), dir, &self.device)?;
        self.iteration = state.iteration;
        self.timesteps_total = state.timesteps_total;
        self.episodes_total = state.episodes_total;
        self.workers.sync_weights(&self.model.valid())?;

        log::info!("restored {} from {} at iteration {}", state.algo, dir.display(), state.iteration);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.workers.stop();
    }
}

/// Build an on-policy trainer for the selected framework.
///
/// The environment is checked before the backend is required, so a bad
/// config never loads a backend.
pub fn build_on_policy<L: PolicyLoss>(
    config: AlgorithmConfig,
    ctx: &ImportContext,
) -> Result<Box<dyn Trainable>, RlError> {
    config.validate()?;
    let env_name = config.env.as_deref().ok_or(ConfigError::MissingEnvironment)?;
    env_spaces(env_name)?;

    let backend = ctx.require(config.framework)?;
    let loss = L::from_config(&config);

    match config.framework {
        Framework::Torch => {
            type B = burn::backend::Autodiff<burn::backend::NdArray>;
            let optimizer = create_optimizer::<B, ActorCriticNet<B>>(config.grad_clip);
            let device = burn::backend::ndarray::NdArrayDevice::Cpu;
            let trainer = OnPolicyTrainer::<B, L, _>::new(config, loss, optimizer, backend, device)?;
            Ok(Box::new(trainer))
        }
        Framework::Tf => build_tf(config, loss, backend),
    }
}

#[cfg(feature = "wgpu")]
fn build_tf<L: PolicyLoss>(
    config: AlgorithmConfig,
    loss: L,
    backend: BackendHandle,
) -> Result<Box<dyn Trainable>, RlError> {
    type B = burn::backend::Autodiff<burn::backend::Wgpu>;
    let optimizer = create_optimizer::<B, ActorCriticNet<B>>(config.grad_clip);
    let device = burn::backend::wgpu::WgpuDevice::default();
    let trainer = OnPolicyTrainer::<B, L, _>::new(config, loss, optimizer, backend, device)?;
    Ok(Box::new(trainer))
}

#[cfg(not(feature = "wgpu"))]
fn build_tf<L: PolicyLoss>(
    _config: AlgorithmConfig,
    _loss: L,
    _backend: BackendHandle,
) -> Result<Box<dyn Trainable>, RlError> {
    Err(RlError::BackendUnavailable(Framework::Tf))
}
