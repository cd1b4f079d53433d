//! Actor-critic network.
//!
//! Separate actor and critic MLPs with tanh activations, no shared trunk.
//! The same type serves training (`B: AutodiffBackend`) and rollout inference
//! (`B::InnerBackend` via `model.valid()`).

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::tanh;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::RlError;

/// Shape of an [`ActorCriticNet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorCriticConfig {
    /// Observation size.
    pub obs_size: usize,
    /// Number of discrete actions.
    pub n_actions: usize,
    /// Hidden layer widths, shared by actor and critic.
    pub hiddens: Vec<usize>,
}

impl ActorCriticConfig {
    /// Create a config.
    pub fn new(obs_size: usize, n_actions: usize, hiddens: Vec<usize>) -> Self {
        Self {
            obs_size,
            n_actions,
            hiddens,
        }
    }

    /// Initialize a network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ActorCriticNet<B> {
        let mut widths = Vec::with_capacity(self.hiddens.len() + 1);
        widths.push(self.obs_size);
        widths.extend_from_slice(&self.hiddens);

        let stack = |device: &B::Device| -> Vec<Linear<B>> {
            widths
                .windows(2)
                .map(|w| LinearConfig::new(w[0], w[1]).init(device))
                .collect()
        };
        let last = *widths.last().unwrap_or(&self.obs_size);

        ActorCriticNet {
            actor: stack(device),
            actor_head: LinearConfig::new(last, self.n_actions).init(device),
            critic: stack(device),
            critic_head: LinearConfig::new(last, 1).init(device),
        }
    }
}

/// Actor-critic MLP producing action logits and state values.
#[derive(Module, Debug)]
pub struct ActorCriticNet<B: Backend> {
    actor: Vec<Linear<B>>,
    actor_head: Linear<B>,
    critic: Vec<Linear<B>>,
    critic_head: Linear<B>,
}

impl<B: Backend> ActorCriticNet<B> {
    /// Forward pass returning `(logits [batch, n_actions], values [batch, 1])`.
    pub fn forward(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let mut actor = obs.clone();
        for layer in &self.actor {
            actor = tanh(layer.forward(actor));
        }
        let logits = self.actor_head.forward(actor);

        let mut critic = obs;
        for layer in &self.critic {
            critic = tanh(layer.forward(critic));
        }
        let values = self.critic_head.forward(critic);

        (logits, values)
    }

    /// Value estimates only, flattened to `[batch]`.
    pub fn values(&self, obs: Tensor<B, 2>) -> Tensor<B, 1> {
        let mut critic = obs;
        for layer in &self.critic {
            critic = tanh(layer.forward(critic));
        }
        self.critic_head.forward(critic).flatten(0, 1)
    }
}

/// Build a `[rows, cols]` tensor from row-major floats.
pub fn batch_tensor<B: Backend>(data: &[f32], cols: usize, device: &B::Device) -> Tensor<B, 2> {
    let rows = if cols == 0 { 0 } else { data.len() / cols };
    Tensor::<B, 1>::from_floats(data, device).reshape([rows, cols])
}

/// Read a float tensor back to the host.
pub fn read_floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, RlError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| RlError::Tensor(format!("{:?}", e)))
}

/// Read a single-element float tensor back to the host.
pub fn read_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<f32, RlError> {
    read_floats(tensor)?
        .first()
        .copied()
        .ok_or_else(|| RlError::Tensor("empty tensor".to_string()))
}
