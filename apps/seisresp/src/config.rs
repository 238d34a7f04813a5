//! # Evaluation Config
//!
//! Optional JSON file holding the defaults of `seisresp eval`. Every field
//! has a default, so `{}` is a valid config. Command-line flags override
//! whatever the file sets.
//!
//! ```json
//! {
//!   "cascade": { "sensitivity_tolerance": 0.02, "target_units": "displacement" },
//!   "grid": { "sweep": { "start": 0.01, "stop": 50.0, "num_points": 200 } },
//!   "output": { "kind": "amplitude_phase", "amplitude": "decibel" }
//! }
//! ```

use crate::cli::CliError;
use seisresp_core::{CascadeOptions, FrequencyGrid, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lowest frequency of the default sweep (Hz).
pub const DEFAULT_START: f64 = 0.001;
/// Highest frequency of the default sweep (Hz).
pub const DEFAULT_STOP: f64 = 100.0;
pub const DEFAULT_POINTS: usize = 100;

/// Defaults for one `eval` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub cascade: CascadeOptions,
    pub grid: FrequencyGrid,
    pub output: OutputFormat,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cascade: CascadeOptions::default(),
            grid: FrequencyGrid::logarithmic(DEFAULT_START, DEFAULT_STOP, DEFAULT_POINTS),
            output: OutputFormat::default(),
        }
    }
}

impl EvalConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let tolerance = config.cascade.sensitivity_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(CliError::InvalidArgument(format!(
                "sensitivity_tolerance must be non-negative, got {tolerance}"
            )));
        }
        tracing::debug!(path = %path.display(), "loaded eval config");
        Ok(config)
    }

    /// Read `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CliError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use seisresp_core::{AmplitudeScale, GroundMotion, PhaseUnit};

    #[test]
    fn empty_object_is_all_defaults() {
        let config: EvalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EvalConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let json = r#"{
            "cascade": { "sensitivity_tolerance": 0.02, "target_units": "displacement" },
            "output": { "kind": "amplitude_phase", "amplitude": "decibel" }
        }"#;
        let config: EvalConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.cascade.sensitivity_tolerance, 0.02);
        assert_eq!(config.cascade.target_units, Some(GroundMotion::Displacement));
        assert!(!config.cascade.escalate_mismatch);
        assert_eq!(
            config.output,
            OutputFormat::AmplitudePhase {
                amplitude: AmplitudeScale::Decibel,
                phase: PhaseUnit::Degrees,
                unwrap: false,
            }
        );
        assert_eq!(config.grid, EvalConfig::default().grid);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = EvalConfig::load(Path::new("/nonexistent/seisresp.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(EvalConfig::load_or_default(None).unwrap(), EvalConfig::default());
    }
}
