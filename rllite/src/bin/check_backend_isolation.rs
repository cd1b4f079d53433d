//! Checks that training PPO on `torch` never loads `tf`.
//!
//! ```bash
//! cargo run --bin check_backend_isolation
//! ```
//!
//! Prints `ok` and exits 0 on success. Any failed check or library error
//! exits non-zero with a message naming what went wrong.

use std::process::ExitCode;

use rllite::{is_imported, register_all, Framework, PPOConfig, RlError, NO_TF_IMPORT_ENV};

enum Failure {
    Check(&'static str),
    Library(RlError),
}

impl From<RlError> for Failure {
    fn from(e: RlError) -> Self {
        Failure::Library(e)
    }
}

fn run() -> Result<(), Failure> {
    // Must start from a clean process.
    if std::env::var_os(NO_TF_IMPORT_ENV).is_some() {
        return Err(Failure::Check("suppression flag already set before the check started"));
    }
    if is_imported(Framework::Tf) {
        return Err(Failure::Check("`tf` imported before the check started"));
    }

    std::env::set_var(NO_TF_IMPORT_ENV, "1");
    register_all()?;
    if is_imported(Framework::Tf) {
        return Err(Failure::Check("`tf` initially present, when it shouldn't!"));
    }

    let mut algo = PPOConfig::new()
        .environment("CartPole-v1")
        .framework(Framework::Torch)
        .rollouts(0)
        .build()?;
    algo.train()?;

    if is_imported(Framework::Tf) {
        return Err(Failure::Check("`tf` should not be imported after creating and training PPO!"));
    }

    std::env::remove_var(NO_TF_IMPORT_ENV);
    algo.stop();
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => {
            println!("ok");
            ExitCode::SUCCESS
        }
        Err(Failure::Check(msg)) => {
            eprintln!("{}", msg);
            ExitCode::FAILURE
        }
        Err(Failure::Library(e)) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
