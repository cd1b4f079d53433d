//! The `Algorithm` handle built through the global registry.

use std::fs;

use rllite::checkpoint::is_checkpoint_dir;
use rllite::{
    A2CConfig, AlgorithmConfig, Checkpointer, CheckpointerConfig, CsvLogger, Framework, PPOConfig,
    RlError,
};
use tempfile::tempdir;

fn small_ppo() -> AlgorithmConfig {
    PPOConfig::new()
        .environment("CartPole-v1")
        .framework(Framework::Torch)
        .rollouts(0)
        .with_train_batch_size(100)
        .with_sgd_minibatch_size(50)
        .with_num_sgd_iter(1)
        .with_fcnet_hiddens(vec![8])
        .debugging(7)
}

#[test]
fn test_build_without_register_all() {
    let mut algo = small_ppo().build().unwrap();
    assert_eq!(algo.name(), "PPO");
    assert_eq!(algo.framework(), Framework::Torch);
    assert_eq!(algo.config().num_rollout_workers, 0);

    let result = algo.train().unwrap();
    assert_eq!(result.timesteps_this_iter, 100);
    assert_eq!(algo.iteration(), 1);
}

#[test]
fn test_csv_logger_and_checkpointer() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("progress.csv");
    let checkpointer = Checkpointer::new(
        CheckpointerConfig::new(dir.path().join("ckpt"))
            .every(2)
            .keep(Some(1))
            .keep_best(false),
    )
    .unwrap();

    let mut algo = small_ppo()
        .build()
        .unwrap()
        .with_logger(CsvLogger::new(&csv).unwrap())
        .with_checkpointer(checkpointer);
    for _ in 0..4 {
        algo.train().unwrap();
    }
    algo.stop();

    let lines = fs::read_to_string(&csv).unwrap();
    let lines: Vec<_> = lines.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("training_iteration,"));
    assert!(lines[4].starts_with("4,400,"));

    // Iterations 2 and 4 saved, only the newest kept.
    let ckpt = dir.path().join("ckpt");
    assert!(!ckpt.join("checkpoint_000002").exists());
    assert!(is_checkpoint_dir(&ckpt.join("checkpoint_000004")));
}

#[test]
fn test_restore_through_handle() {
    let dir = tempdir().unwrap();
    let mut algo = small_ppo().build().unwrap();
    algo.train().unwrap();
    let path = algo.save_checkpoint(dir.path().join("snap")).unwrap();

    let mut restored = small_ppo().build().unwrap();
    restored.restore_checkpoint(&path).unwrap();
    assert_eq!(restored.iteration(), 1);
    let result = restored.train().unwrap();
    assert_eq!(result.training_iteration, 2);
    assert_eq!(result.timesteps_total, 200);
}

#[test]
fn test_resume_from_latest_checkpoint() {
    let dir = tempdir().unwrap();
    let config = CheckpointerConfig::new(dir.path()).every(1).keep(Some(2));

    let mut first = small_ppo()
        .build()
        .unwrap()
        .with_checkpointer(Checkpointer::new(config.clone()).unwrap());
    for _ in 0..3 {
        first.train().unwrap();
    }
    first.stop();

    let mut second = small_ppo().build().unwrap();
    assert_eq!(second.resume().unwrap(), None);

    let mut second = second.with_checkpointer(Checkpointer::new(config).unwrap());
    let resumed = second.resume().unwrap().unwrap();
    assert_eq!(resumed.iteration, 3);
    assert_eq!(second.iteration(), 3);
    assert_eq!(second.train().unwrap().training_iteration, 4);
}

#[test]
fn test_calls_after_stop_fail() {
    let mut algo = A2CConfig::new()
        .environment("CartPole-v1")
        .rollouts(1)
        .with_fcnet_hiddens(vec![8])
        .build()
        .unwrap();
    algo.stop();
    algo.stop();
    assert!(algo.is_stopped());
    assert!(matches!(algo.train(), Err(RlError::Stopped)));
    assert!(matches!(
        algo.compute_single_action(&[0.0; 4], false),
        Err(RlError::Stopped)
    ));
}

#[test]
fn test_unknown_environment() {
    let result = PPOConfig::new().environment("Breakout-v5").build();
    assert!(matches!(result, Err(RlError::UnknownEnvironment(name)) if name == "Breakout-v5"));
}
