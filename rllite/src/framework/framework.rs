//! Framework names.
//!
//! A framework is the numerical backend an algorithm's policy runs on:
//!
//! | name    | Burn backend          | availability            |
//! |---------|-----------------------|-------------------------|
//! | `torch` | `Autodiff<NdArray>`   | always                  |
//! | `tf`    | `Autodiff<Wgpu>`      | `wgpu` cargo feature    |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RlError;

/// Environment flag that suppresses the guarded import of the `tf` backend.
pub const NO_TF_IMPORT_ENV: &str = "RLLITE_TEST_NO_TF_IMPORT";

/// Numerical backend an algorithm runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Eager CPU execution (Burn `NdArray`).
    #[default]
    Torch,
    /// GPU execution (Burn `Wgpu`).
    #[serde(alias = "tf2")]
    Tf,
}

impl Framework {
    /// All frameworks, in declaration order.
    pub const ALL: [Framework; 2] = [Framework::Torch, Framework::Tf];

    /// Short user-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Torch => "torch",
            Framework::Tf => "tf",
        }
    }

    /// Name of the backend "module" as it appears in the import table.
    pub fn module_name(&self) -> &'static str {
        match self {
            Framework::Torch => "torch",
            Framework::Tf => "tensorflow",
        }
    }

    /// Whether the backend for this framework was compiled in.
    pub fn is_compiled(&self) -> bool {
        match self {
            Framework::Torch => true,
            Framework::Tf => cfg!(feature = "wgpu"),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = RlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "torch" => Ok(Framework::Torch),
            "tf" | "tf2" => Ok(Framework::Tf),
            other => Err(RlError::UnknownFramework(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("torch".parse::<Framework>().unwrap(), Framework::Torch);
        assert_eq!("TF2".parse::<Framework>().unwrap(), Framework::Tf);
        assert_eq!(" tf ".parse::<Framework>().unwrap(), Framework::Tf);
        assert!(matches!(
            "jax".parse::<Framework>(),
            Err(RlError::UnknownFramework(name)) if name == "jax"
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for fw in Framework::ALL {
            assert_eq!(fw.to_string().parse::<Framework>().unwrap(), fw);
        }
    }

    #[test]
    fn test_torch_always_compiled() {
        assert!(Framework::Torch.is_compiled());
        assert_eq!(Framework::Tf.is_compiled(), cfg!(feature = "wgpu"));
    }

    #[test]
    fn test_default_is_torch() {
        assert_eq!(Framework::default(), Framework::Torch);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Framework::Tf).unwrap();
        assert_eq!(json, "\"tf\"");
        let fw: Framework = serde_json::from_str("\"tf2\"").unwrap();
        assert_eq!(fw, Framework::Tf);
    }
}
