//! Framework selection and lazy backend import.
//!
//! - `framework`: the `Framework` names ("torch", "tf") and what they map to
//! - `import`: guarded import, the process-wide loaded-backend table, probes

pub mod framework;
pub mod import;

pub use framework::{Framework, NO_TF_IMPORT_ENV};
pub use import::{
    ensure_not_imported, imported_backends, is_imported, BackendHandle, BackendProbe,
    ImportContext, ImportPolicy, RecordingProbe,
};
