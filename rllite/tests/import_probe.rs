//! Registration observed through an injected probe instead of the
//! environment flag, and the failure the isolation check reports when an
//! entry leaks an import at registration time.

use rllite::framework::{ensure_not_imported, is_imported};
use rllite::{
    register_all_with, AlgorithmEntry, AlgorithmRegistry, Framework, ImportContext, PPOConfig,
    RecordingProbe, RegistrationOptions, RlError,
};

#[test]
fn test_register_all_with_explicit_suppression() {
    let probe = RecordingProbe::shared();
    register_all_with(
        RegistrationOptions::allow_all()
            .suppress(Framework::Tf)
            .with_probe(probe.clone()),
    )
    .unwrap();
    assert!(probe.imports().is_empty());

    let registry = rllite::global_registry().read();
    assert!(registry.contains("PPO"));
    assert!(registry.contains("A2C"));
    assert!(registry.import_context().policy().is_suppressed(Framework::Tf));
    drop(registry);

    // `tf` selected while suppressed: refused before anything loads.
    let config = PPOConfig::new()
        .environment("CartPole-v1")
        .framework(Framework::Tf)
        .rollouts(0);
    assert!(matches!(
        config.build(),
        Err(RlError::BackendSuppressed(Framework::Tf))
    ));
    assert!(!probe.was_imported(Framework::Tf));
    assert!(!is_imported(Framework::Tf));
}

// Bypasses the policy the way an eager import would.
fn leaky_hook(ctx: &ImportContext) -> Result<(), RlError> {
    ctx.force_import(Framework::Torch).map(|_| ())
}

#[cfg(not(feature = "wgpu"))]
fn eager_tf_hook(ctx: &ImportContext) -> Result<(), RlError> {
    ctx.force_import(Framework::Tf).map(|_| ())
}

fn unreachable_factory(
    _config: rllite::AlgorithmConfig,
    _ctx: &ImportContext,
) -> Result<Box<dyn rllite::Trainable>, RlError> {
    Err(RlError::Stopped)
}

#[test]
fn test_leaking_registration_is_reported() {
    let probe = RecordingProbe::shared();
    let mut registry = AlgorithmRegistry::with_options(
        RegistrationOptions::allow_all()
            .suppress(Framework::Torch)
            .with_probe(probe.clone()),
    );
    registry
        .register(AlgorithmEntry::new("Leaky", PPOConfig::new, unreachable_factory).with_on_register(leaky_hook))
        .unwrap();

    assert!(probe.was_imported(Framework::Torch));
    assert_eq!(probe.import_count(Framework::Torch), 1);
    match ensure_not_imported(Framework::Torch, "after registration") {
        Err(RlError::BackendLeak { framework, stage }) => {
            assert_eq!(framework, Framework::Torch);
            assert_eq!(stage, "after registration");
        }
        other => panic!("expected a backend leak, got {:?}", other),
    }
}

#[cfg(not(feature = "wgpu"))]
#[test]
fn test_eager_tf_import_fails_registration() {
    // Without the backend compiled in, the eager import is an error that
    // registration returns instead of swallowing.
    let mut registry = AlgorithmRegistry::with_options(RegistrationOptions::allow_all());
    let entry = AlgorithmEntry::new("EagerTf", PPOConfig::new, unreachable_factory).with_on_register(eager_tf_hook);
    assert!(matches!(
        registry.register(entry),
        Err(RlError::BackendUnavailable(Framework::Tf))
    ));
    assert!(!registry.contains("EagerTf"));
    assert!(!is_imported(Framework::Tf));
}
