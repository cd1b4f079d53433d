//! Guarded backend import.
//!
//! Nothing in the crate touches a backend until an algorithm is built for it.
//! Every load goes through [`ImportContext`], which
//!
//! 1. refuses suppressed frameworks on the guarded path ([`ImportContext::try_import`],
//!    [`ImportContext::require`]),
//! 2. records the load in a process-wide table that only ever grows
//!    ([`is_imported`], [`imported_backends`]),
//! 3. notifies an optional injected [`BackendProbe`].
//!
//! The table answers "was this backend ever loaded in this process", which is
//! what the isolation check asserts on. The probe answers the same question for
//! one registration scope and lets tests observe imports without global state.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::framework::{Framework, NO_TF_IMPORT_ENV};
use crate::error::RlError;

static IMPORTED: Mutex<BTreeSet<Framework>> = parking_lot::const_mutex(BTreeSet::new());

/// Whether `framework` has been imported anywhere in this process.
pub fn is_imported(framework: Framework) -> bool {
    IMPORTED.lock().contains(&framework)
}

/// All frameworks imported so far, in `Framework` order.
pub fn imported_backends() -> Vec<Framework> {
    IMPORTED.lock().iter().copied().collect()
}

/// Fail with [`RlError::BackendLeak`] if `framework` was imported.
///
/// `stage` describes when the check ran, e.g. "after registration".
pub fn ensure_not_imported(framework: Framework, stage: &str) -> Result<(), RlError> {
    if is_imported(framework) {
        return Err(RlError::BackendLeak {
            framework,
            stage: stage.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// ImportPolicy
// ============================================================================

/// Which frameworks the guarded import path must refuse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPolicy {
    suppressed: BTreeSet<Framework>,
}

impl ImportPolicy {
    /// Policy that allows everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Read [`NO_TF_IMPORT_ENV`] from the process environment.
    pub fn from_env() -> Self {
        let raw = std::env::var(NO_TF_IMPORT_ENV).ok();
        Self::from_flag(raw.as_deref())
    }

    fn from_flag(raw: Option<&str>) -> Self {
        let mut policy = Self::default();
        if let Some(value) = raw {
            let value = value.trim();
            if !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false")) {
                policy.suppressed.insert(Framework::Tf);
            }
        }
        policy
    }

    /// Also suppress `framework`.
    pub fn suppress(mut self, framework: Framework) -> Self {
        self.suppressed.insert(framework);
        self
    }

    /// Whether the guarded path refuses `framework`.
    pub fn is_suppressed(&self, framework: Framework) -> bool {
        self.suppressed.contains(&framework)
    }

    /// Suppressed frameworks.
    pub fn suppressed(&self) -> impl Iterator<Item = Framework> + '_ {
        self.suppressed.iter().copied()
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Observer notified every time a backend is actually imported.
pub trait BackendProbe: Send + Sync {
    /// Called after `framework` was loaded.
    fn on_import(&self, framework: Framework);
}

/// Probe that records imports in order.
#[derive(Debug, Default)]
pub struct RecordingProbe {
    imports: Mutex<Vec<Framework>>,
}

impl RecordingProbe {
    /// Create an empty recording probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared recording probe.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Whether `framework` was imported through a context holding this probe.
    pub fn was_imported(&self, framework: Framework) -> bool {
        self.imports.lock().contains(&framework)
    }

    /// Number of recorded imports of `framework`.
    pub fn import_count(&self, framework: Framework) -> usize {
        self.imports.lock().iter().filter(|&&f| f == framework).count()
    }

    /// Recorded imports, oldest first.
    pub fn imports(&self) -> Vec<Framework> {
        self.imports.lock().clone()
    }
}

impl BackendProbe for RecordingProbe {
    fn on_import(&self, framework: Framework) {
        self.imports.lock().push(framework);
    }
}

// ============================================================================
// ImportContext
// ============================================================================

/// Proof that a backend was imported through an [`ImportContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHandle {
    framework: Framework,
}

impl BackendHandle {
    /// The imported framework.
    pub fn framework(&self) -> Framework {
        self.framework
    }
}

/// Import policy plus an optional probe; the only way backends get loaded.
#[derive(Clone, Default)]
pub struct ImportContext {
    policy: ImportPolicy,
    probe: Option<Arc<dyn BackendProbe>>,
}

impl ImportContext {
    /// Create a context with the given policy and no probe.
    pub fn new(policy: ImportPolicy) -> Self {
        Self { policy, probe: None }
    }

    /// Attach a probe.
    pub fn with_probe(mut self, probe: Arc<dyn BackendProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// The policy in effect.
    pub fn policy(&self) -> &ImportPolicy {
        &self.policy
    }

    /// Guarded import: `None` when suppressed or not compiled in.
    pub fn try_import(&self, framework: Framework) -> Option<BackendHandle> {
        if self.policy.is_suppressed(framework) {
            log::debug!("import of `{}` suppressed by policy", framework.module_name());
            return None;
        }
        self.load(framework).ok()
    }

    /// Guarded import of a framework the caller cannot run without.
    pub fn require(&self, framework: Framework) -> Result<BackendHandle, RlError> {
        if self.policy.is_suppressed(framework) {
            return Err(RlError::BackendSuppressed(framework));
        }
        self.load(framework)
    }

    /// Unguarded import that ignores the policy.
    pub fn force_import(&self, framework: Framework) -> Result<BackendHandle, RlError> {
        self.load(framework)
    }

    fn load(&self, framework: Framework) -> Result<BackendHandle, RlError> {
        if !framework.is_compiled() {
            return Err(RlError::BackendUnavailable(framework));
        }

        let first = IMPORTED.lock().insert(framework);
        if first {
            log::debug!("imported backend `{}`", framework.module_name());
        }
        if let Some(probe) = &self.probe {
            probe.on_import(framework);
        }

        Ok(BackendHandle { framework })
    }
}

impl fmt::Debug for ImportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportContext")
            .field("policy", &self.policy)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert!(!ImportPolicy::from_flag(None).is_suppressed(Framework::Tf));
        assert!(!ImportPolicy::from_flag(Some("")).is_suppressed(Framework::Tf));
        assert!(!ImportPolicy::from_flag(Some("0")).is_suppressed(Framework::Tf));
        assert!(!ImportPolicy::from_flag(Some("False")).is_suppressed(Framework::Tf));
        assert!(ImportPolicy::from_flag(Some("1")).is_suppressed(Framework::Tf));
        assert!(ImportPolicy::from_flag(Some("yes")).is_suppressed(Framework::Tf));
        assert!(!ImportPolicy::from_flag(Some("1")).is_suppressed(Framework::Torch));
    }

    #[test]
    fn test_suppressed_framework_is_never_loaded() {
        let probe = RecordingProbe::shared();
        let ctx = ImportContext::new(ImportPolicy::allow_all().suppress(Framework::Tf))
            .with_probe(probe.clone());

        assert!(ctx.try_import(Framework::Tf).is_none());
        assert!(matches!(
            ctx.require(Framework::Tf),
            Err(RlError::BackendSuppressed(Framework::Tf))
        ));
        assert!(!probe.was_imported(Framework::Tf));
    }

    #[test]
    fn test_require_torch_records_import() {
        let probe = RecordingProbe::shared();
        let ctx = ImportContext::default().with_probe(probe.clone());

        let handle = ctx.require(Framework::Torch).unwrap();
        assert_eq!(handle.framework(), Framework::Torch);
        assert!(probe.was_imported(Framework::Torch));
        assert!(is_imported(Framework::Torch));
        assert!(imported_backends().contains(&Framework::Torch));
    }

    #[test]
    fn test_force_import_ignores_policy() {
        let probe = RecordingProbe::shared();
        let ctx = ImportContext::new(ImportPolicy::allow_all().suppress(Framework::Torch))
            .with_probe(probe.clone());

        assert!(ctx.try_import(Framework::Torch).is_none());
        assert_eq!(probe.import_count(Framework::Torch), 0);

        ctx.force_import(Framework::Torch).unwrap();
        ctx.force_import(Framework::Torch).unwrap();
        assert_eq!(probe.import_count(Framework::Torch), 2);
        assert!(matches!(
            ensure_not_imported(Framework::Torch, "after forced import"),
            Err(RlError::BackendLeak { framework: Framework::Torch, .. })
        ));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_uncompiled_backend_unavailable() {
        let ctx = ImportContext::default();
        assert!(ctx.try_import(Framework::Tf).is_none());
        assert!(matches!(
            ctx.require(Framework::Tf),
            Err(RlError::BackendUnavailable(Framework::Tf))
        ));
        assert!(ensure_not_imported(Framework::Tf, "after failed import").is_ok());
    }
}
