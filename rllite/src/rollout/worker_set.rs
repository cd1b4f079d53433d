//! Local worker plus optional remote worker threads.
//!
//! With `num_rollout_workers == 0` every fragment is sampled by the local
//! worker in the calling thread. Otherwise each remote worker runs in its own
//! thread, receives [`WorkerMsg`] commands over a crossbeam channel and sends
//! back one [`SampleBatch`] per `Sample` command. Weights reach remote workers
//! as bytes through a [`WeightsSlot`](crate::core::WeightsSlot).

use std::thread::JoinHandle;

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use crossbeam_channel::{Receiver, Sender};

use super::sample_batch::SampleBatch;
use super::worker::RolloutWorker;
use crate::algorithms::model::ActorCriticNet;
use crate::config::AlgorithmConfig;
use crate::core::{weights_slot, SharedWeightsSlot};
use crate::error::RlError;

/// Commands for a remote rollout worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMsg {
    /// Sync weights if newer, then sample `n_steps` and reply.
    Sample { n_steps: usize },
    /// Exit the worker loop.
    Stop,
}

struct RemoteWorker {
    worker_id: usize,
    cmd_tx: Sender<WorkerMsg>,
    result_rx: Receiver<Result<SampleBatch, RlError>>,
    thread: Option<JoinHandle<()>>,
}

impl RemoteWorker {
    fn spawn<B: Backend>(
        worker_id: usize,
        config: AlgorithmConfig,
        device: B::Device,
        weights: SharedWeightsSlot,
    ) -> Result<Self, RlError> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<WorkerMsg>(4);
        let (result_tx, result_rx) = crossbeam_channel::bounded(4);

        let thread = std::thread::Builder::new()
            .name(format!("rollout-worker-{}", worker_id))
            .spawn(move || {
                // The policy is created on this thread; only bytes cross over.
                let worker = RolloutWorker::<B>::new(worker_id, &config, device);
                run_remote(worker_id, worker, cmd_rx, result_tx, weights);
            })
            .map_err(|e| RlError::Worker {
                worker_id,
                message: format!("failed to spawn thread: {}", e),
            })?;

        Ok(Self {
            worker_id,
            cmd_tx,
            result_rx,
            thread: Some(thread),
        })
    }

    fn disconnected(&self) -> RlError {
        RlError::Worker {
            worker_id: self.worker_id,
            message: "worker thread disconnected".to_string(),
        }
    }
}

fn run_remote<B: Backend>(
    worker_id: usize,
    worker: Result<RolloutWorker<B>, RlError>,
    cmd_rx: Receiver<WorkerMsg>,
    result_tx: Sender<Result<SampleBatch, RlError>>,
    weights: SharedWeightsSlot,
) {
    let mut worker = match worker {
        Ok(worker) => worker,
        Err(e) => {
            log::error!("rollout worker failed to start: {}", e);
            let message = e.to_string();
            // Answer every request with the startup error until stopped.
            while let Ok(WorkerMsg::Sample { .. }) = cmd_rx.recv() {
                let err = RlError::Worker {
                    worker_id,
                    message: message.clone(),
                };
                if result_tx.send(Err(err)).is_err() {
                    break;
                }
            }
            return;
        }
    };

    while let Ok(msg) = cmd_rx.recv() {
        match msg {
            WorkerMsg::Sample { n_steps } => {
                let result = worker
                    .sync_from(&weights)
                    .and_then(|_| worker.sample(n_steps));
                if result_tx.send(result).is_err() {
                    break;
                }
            }
            WorkerMsg::Stop => break,
        }
    }
    log::debug!("rollout worker {} exiting", worker_id);
}

/// Sampling workers of one algorithm.
pub struct WorkerSet<B: Backend> {
    local: RolloutWorker<B>,
    remotes: Vec<RemoteWorker>,
    weights: SharedWeightsSlot,
    fragment_length: usize,
    stopped: bool,
}

impl<B: Backend> WorkerSet<B> {
    /// Create the local worker, spawn remote workers and push `model` to all.
    pub fn new(config: &AlgorithmConfig, model: &ActorCriticNet<B>, device: B::Device) -> Result<Self, RlError> {
        let local = RolloutWorker::new(0, config, device.clone())?;
        let weights = weights_slot();

        let mut set = Self {
            local,
            remotes: Vec::with_capacity(config.num_rollout_workers),
            weights: weights.clone(),
            fragment_length: config.effective_fragment_length(),
            stopped: false,
        };

        for worker_id in 1..=config.num_rollout_workers {
            let remote = RemoteWorker::spawn::<B>(worker_id, config.clone(), device.clone(), weights.clone())?;
            set.remotes.push(remote);
        }
        if !set.remotes.is_empty() {
            log::debug!("spawned {} rollout worker threads", set.remotes.len());
        }

        set.sync_weights(model)?;
        Ok(set)
    }

    /// Number of remote workers.
    pub fn num_remote_workers(&self) -> usize {
        self.remotes.len()
    }

    /// Steps per worker per round.
    pub fn fragment_length(&self) -> usize {
        self.fragment_length
    }

    /// The worker living in the calling thread.
    pub fn local_worker(&mut self) -> &mut RolloutWorker<B> {
        &mut self.local
    }

    /// Version of the weights last published to remote workers.
    pub fn weights_version(&self) -> u64 {
        self.weights.version()
    }

    /// Whether `stop()` was called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Push `model` to the local worker and publish it for remote workers.
    pub fn sync_weights(&mut self, model: &ActorCriticNet<B>) -> Result<(), RlError> {
        self.local.set_model(model.clone());
        if !self.remotes.is_empty() {
            let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
            let bytes = recorder
                .record(model.clone().into_record(), ())
                .map_err(|e| RlError::Weights(format!("{:?}", e)))?;
            self.weights.publish(bytes);
        }
        Ok(())
    }

    /// Sample rounds until at least `min_steps` transitions are collected.
    pub fn sample(&mut self, min_steps: usize) -> Result<SampleBatch, RlError> {
        if self.stopped {
            return Err(RlError::Stopped);
        }

        let mut batches = Vec::new();
        let mut collected = 0;

        while collected < min_steps.max(1) {
            if self.remotes.is_empty() {
                let batch = self.local.sample(self.fragment_length)?;
                collected += batch.len();
                batches.push(batch);
                continue;
            }

            for batch in self.sample_round()? {
                collected += batch.len();
                batches.push(batch);
            }
        }

        Ok(SampleBatch::concat(batches))
    }

    /// One fragment from every remote worker.
    ///
    /// Every worker that accepted the command is answered for before
    /// returning, so no reply is left behind for the next round. The first
    /// error wins.
    fn sample_round(&self) -> Result<Vec<SampleBatch>, RlError> {
        let mut first_err = None;
        let mut pending = Vec::with_capacity(self.remotes.len());

        for remote in &self.remotes {
            let msg = WorkerMsg::Sample {
                n_steps: self.fragment_length,
            };
            match remote.cmd_tx.send(msg) {
                Ok(()) => pending.push(remote),
                Err(_) => {
                    first_err.get_or_insert_with(|| remote.disconnected());
                }
            }
        }

        let mut batches = Vec::with_capacity(pending.len());
        for remote in pending {
            let reply = remote.result_rx.recv().map_err(|_| remote.disconnected());
            match reply.and_then(|result| result) {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    log::warn!("rollout worker {} failed this round: {}", remote.worker_id, e);
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(batches),
        }
    }

    /// Stop and join remote workers. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for remote in &self.remotes {
            let _ = remote.cmd_tx.send(WorkerMsg::Stop);
        }
        for remote in &mut self.remotes {
            if let Some(thread) = remote.thread.take() {
                if thread.join().is_err() {
                    log::warn!("rollout worker {} panicked", remote.worker_id);
                }
            }
        }
    }
}

impl<B: Backend> Drop for WorkerSet<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
