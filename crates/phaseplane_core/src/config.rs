//! Explorer settings.
//!
//! Every field has a default, so a TOML file only needs to name what it changes:
//!
//! ```toml
//! grid_resolution = 64
//! integrator = "heun_stochastic"
//!
//! [noise]
//! nsig = [0.001, 0.0]
//! ntau = 0.0
//! seed = 7
//! ```

use crate::noise::NoiseConfig;
use crate::trajectory::DEFAULT_TRAJECTORY_STEPS;
use crate::vector_field::DEFAULT_GRID_RESOLUTION;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorName {
    Euler,
    Heun,
    Rk4,
    EulerStochastic,
    HeunStochastic,
}

impl IntegratorName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "euler" => Some(Self::Euler),
            "heun" => Some(Self::Heun),
            "rk4" => Some(Self::Rk4),
            "euler_stochastic" => Some(Self::EulerStochastic),
            "heun_stochastic" => Some(Self::HeunStochastic),
            _ => None,
        }
    }

    pub fn is_stochastic(self) -> bool {
        matches!(self, Self::EulerStochastic | Self::HeunStochastic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Samples per grid axis.
    pub grid_resolution: usize,
    pub trajectory_steps: usize,
    pub dt: f64,
    pub integrator: IntegratorName,
    pub noise: NoiseConfig,
    /// Sample grid rows on the rayon pool when the `parallel` feature is enabled.
    pub parallel_sampling: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            grid_resolution: DEFAULT_GRID_RESOLUTION,
            trajectory_steps: DEFAULT_TRAJECTORY_STEPS,
            dt: 2f64.powi(-5),
            integrator: IntegratorName::Rk4,
            noise: NoiseConfig::default(),
            parallel_sampling: false,
        }
    }
}

impl ExplorerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_resolution < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "grid_resolution must be at least 2 (got {})",
                self.grid_resolution
            )));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "dt must be positive (got {})",
                self.dt
            )));
        }
        if self.noise.nsig.is_empty() || self.noise.nsig.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ConfigError::InvalidValue(
                "noise.nsig must hold at least one non-negative value".to_string(),
            ));
        }
        if !self.noise.ntau.is_finite() || self.noise.ntau < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "noise.ntau must be non-negative (got {})",
                self.noise.ntau
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ExplorerConfig, IntegratorName};

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = ExplorerConfig::default();
        assert_eq!(config.grid_resolution, 42);
        assert_eq!(config.trajectory_steps, 4096);
        assert_eq!(config.dt, 0.03125);
        assert_eq!(config.integrator, IntegratorName::Rk4);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ExplorerConfig::from_toml_str(
            r#"
            grid_resolution = 64
            integrator = "heun_stochastic"

            [noise]
            nsig = [0.001, 0.0]
            ntau = 0.0
            seed = 7
            "#,
        )
        .expect("valid config");
        assert_eq!(config.grid_resolution, 64);
        assert_eq!(config.trajectory_steps, 4096);
        assert!(config.integrator.is_stochastic());
        assert_eq!(config.noise.nsig, vec![0.001, 0.0]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ExplorerConfig::from_toml_str("grid_resolution = 1").expect_err("too coarse");
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = ExplorerConfig::from_toml_str("dt = -0.1").expect_err("negative dt");
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = ExplorerConfig::from_toml_str("integrator = \"leapfrog\"").expect_err("unknown scheme");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_files() {
        let err = ExplorerConfig::load("/nonexistent/phaseplane.toml").expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn integrator_names_parse() {
        assert_eq!(IntegratorName::parse("rk4"), Some(IntegratorName::Rk4));
        assert_eq!(IntegratorName::parse("euler_stochastic"), Some(IntegratorName::EulerStochastic));
        assert_eq!(IntegratorName::parse("tsit5"), None);
    }
}
