//! Algorithm registry.
//!
//! Registration stores factories only. No entry touches a backend until
//! [`AlgorithmRegistry::build`] runs its factory for a concrete config, and
//! even then only the framework selected in the config is imported, through
//! the registry's [`ImportContext`].
//!
//! ```rust,ignore
//! std::env::set_var("RLLITE_TEST_NO_TF_IMPORT", "1");
//! rllite::register_all()?;
//! assert!(!rllite::framework::is_imported(Framework::Tf));
//! ```

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::algorithm::{Algorithm, Trainable};
use crate::algorithms::loss::{A2cLoss, PpoLoss};
use crate::config::{A2CConfig, AlgorithmConfig, PPOConfig};
use crate::error::RlError;
use crate::framework::{BackendProbe, Framework, ImportContext, ImportPolicy};
use crate::trainer::build_on_policy;

/// Builds a trainable for a validated config.
pub type AlgorithmFactory = fn(AlgorithmConfig, &ImportContext) -> Result<Box<dyn Trainable>, RlError>;

/// Runs when an entry is registered. An error aborts the registration.
pub type RegisterHook = fn(&ImportContext) -> Result<(), RlError>;

/// One registered algorithm.
#[derive(Clone)]
pub struct AlgorithmEntry {
    /// Name looked up by `AlgorithmConfig::algo` (case-insensitive).
    pub name: &'static str,
    /// Default configuration.
    pub default_config: fn() -> AlgorithmConfig,
    /// Constructor.
    pub factory: AlgorithmFactory,
    /// Runs once when the entry is registered.
    pub on_register: Option<RegisterHook>,
}

impl AlgorithmEntry {
    /// Entry without a registration hook.
    pub fn new(name: &'static str, default_config: fn() -> AlgorithmConfig, factory: AlgorithmFactory) -> Self {
        Self {
            name,
            default_config,
            factory,
            on_register: None,
        }
    }

    /// Attach a registration hook.
    pub fn with_on_register(mut self, hook: RegisterHook) -> Self {
        self.on_register = Some(hook);
        self
    }
}

impl fmt::Debug for AlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmEntry")
            .field("name", &self.name)
            .field("on_register", &self.on_register.is_some())
            .finish()
    }
}

fn ppo_entry() -> AlgorithmEntry {
    AlgorithmEntry::new("PPO", PPOConfig::new, build_on_policy::<PpoLoss>)
}

fn a2c_entry() -> AlgorithmEntry {
    AlgorithmEntry::new("A2C", A2CConfig::new, build_on_policy::<A2cLoss>)
}

/// Built-in algorithm entries.
pub fn builtin_entries() -> Vec<AlgorithmEntry> {
    vec![ppo_entry(), a2c_entry()]
}

// ============================================================================
// Registration options
// ============================================================================

/// Import policy and probe installed by a registration call.
#[derive(Clone, Default)]
pub struct RegistrationOptions {
    policy: ImportPolicy,
    probe: Option<Arc<dyn BackendProbe>>,
}

impl RegistrationOptions {
    /// Policy read from the process environment.
    pub fn from_env() -> Self {
        Self {
            policy: ImportPolicy::from_env(),
            probe: None,
        }
    }

    /// No framework suppressed.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Suppress `framework` on the guarded import path.
    pub fn suppress(mut self, framework: Framework) -> Self {
        self.policy = self.policy.suppress(framework);
        self
    }

    /// Observe imports made through the registry.
    pub fn with_probe(mut self, probe: Arc<dyn BackendProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// The import policy.
    pub fn policy(&self) -> &ImportPolicy {
        &self.policy
    }

    /// Import context for these options.
    pub fn into_context(self) -> ImportContext {
        let ctx = ImportContext::new(self.policy);
        match self.probe {
            Some(probe) => ctx.with_probe(probe),
            None => ctx,
        }
    }
}

impl fmt::Debug for RegistrationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationOptions")
            .field("policy", &self.policy)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name to factory map plus the import context factories build under.
#[derive(Debug, Default)]
pub struct AlgorithmRegistry {
    entries: BTreeMap<String, AlgorithmEntry>,
    import: ImportContext,
}

impl AlgorithmRegistry {
    /// Empty registry that allows every framework.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry with the given options.
    pub fn with_options(options: RegistrationOptions) -> Self {
        Self {
            entries: BTreeMap::new(),
            import: options.into_context(),
        }
    }

    /// Replace the import context used by later builds.
    pub fn set_options(&mut self, options: RegistrationOptions) {
        self.import = options.into_context();
    }

    /// Import context in effect.
    pub fn import_context(&self) -> &ImportContext {
        &self.import
    }

    /// Run the entry's hook, then register or replace it.
    ///
    /// A failing hook leaves the registry unchanged.
    pub fn register(&mut self, entry: AlgorithmEntry) -> Result<(), RlError> {
        if let Some(hook) = entry.on_register {
            hook(&self.import)?;
        }
        log::debug!("registered algorithm {}", entry.name);
        self.entries.insert(entry.name.to_ascii_uppercase(), entry);
        Ok(())
    }

    /// Register PPO and A2C.
    pub fn register_builtins(&mut self) -> Result<(), RlError> {
        builtin_entries().into_iter().try_for_each(|entry| self.register(entry))
    }

    /// Look up an entry, ignoring case.
    pub fn get(&self, name: &str) -> Option<&AlgorithmEntry> {
        self.entries.get(&name.to_ascii_uppercase())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.values().map(|e| e.name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Default config of a registered algorithm.
    pub fn default_config(&self, name: &str) -> Result<AlgorithmConfig, RlError> {
        self.get(name)
            .map(|e| (e.default_config)())
            .ok_or_else(|| RlError::UnknownAlgorithm(name.to_string()))
    }

    /// Build the algorithm named by `config.algo`.
    pub fn build(&self, config: AlgorithmConfig) -> Result<Algorithm, RlError> {
        let entry = self
            .get(&config.algo)
            .ok_or_else(|| RlError::UnknownAlgorithm(config.algo.clone()))?;
        log::debug!("building {} on `{}`", entry.name, config.framework);
        let trainable = (entry.factory)(config, &self.import)?;
        Ok(Algorithm::new(trainable))
    }
}

// ============================================================================
// Global registry
// ============================================================================

static REGISTRY: OnceLock<RwLock<AlgorithmRegistry>> = OnceLock::new();

/// Process-wide registry used by [`AlgorithmConfig::build`].
///
/// Starts empty with the import policy read from the environment at first
/// access.
pub fn global_registry() -> &'static RwLock<AlgorithmRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(AlgorithmRegistry::with_options(RegistrationOptions::from_env())))
}

/// Register all built-in algorithms with the policy read from the
/// environment.
pub fn register_all() -> Result<(), RlError> {
    register_all_with(RegistrationOptions::from_env())
}

/// Register all built-in algorithms with explicit options.
///
/// Replaces the global import context; entries are replaced in place, so
/// repeated calls are harmless. Errors from registration hooks are
/// returned as is.
pub fn register_all_with(options: RegistrationOptions) -> Result<(), RlError> {
    let mut registry = global_registry().write();
    registry.set_options(options);
    registry.register_builtins()
}
