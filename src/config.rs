//! Scenario configuration
//!
//! A scenario is a YAML file read once at startup. Every field has a default,
//! so a file only needs to name what it changes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::FamilyPolicy;
use crate::flock::{Bounds, FlockParams};
use crate::io::ScriptedEvent;

fn default_name() -> String {
    "meadow".to_string()
}

fn default_seed() -> u64 {
    7
}

fn default_population() -> usize {
    60
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_vision_sep() -> f64 {
    20.0
}

fn default_vision_cohes_min() -> f64 {
    10.0
}

fn default_vision_cohes() -> f64 {
    80.0
}

fn default_vision_align() -> f64 {
    50.0
}

fn default_vision_predator() -> f64 {
    100.0
}

fn default_angle_threshold() -> f64 {
    -0.5
}

fn default_coef_sep() -> f64 {
    40.0
}

fn default_coef_predator() -> f64 {
    800.0
}

fn default_coef_cohesion() -> f64 {
    0.05
}

fn default_coef_alignment() -> f64 {
    40.0
}

fn default_vmax() -> f64 {
    60.0
}

fn default_dt() -> f64 {
    0.1
}

fn default_initial_speed() -> f64 {
    10.0
}

fn default_max_family() -> i32 {
    4
}

fn default_max_wind() -> f64 {
    2.0
}

fn default_wind_step() -> f64 {
    0.25
}

fn default_every_rounds() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("scenario name must not be empty")]
    MissingName,
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("bounds must be finite with min < max on both axes")]
    EmptyBounds,
    #[error("cohesion band is empty: min {min} >= max {max}")]
    CohesionRange { min: f64, max: f64 },
    #[error("vision angle threshold {0} is outside [-1, 1]")]
    AngleThreshold(f64),
    #[error("wind limits must be finite and non-negative (max_wind {max_wind}, step {step})")]
    Wind { max_wind: f64, step: f64 },
    #[error("coef_predator {predator} must exceed coef_sep {sep}")]
    PredatorCoefficient { predator: f64, sep: f64 },
    #[error("max_family must be at least 1, got {0}")]
    NoFamilies(i32),
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("spawn family {family} is outside 0..{max_family}")]
    SpawnFamily { family: i32, max_family: i32 },
}

/// Full description of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    /// Round limit; runs until quit when absent.
    #[serde(default)]
    pub rounds: Option<u64>,
    #[serde(default = "default_population")]
    pub initial_population: usize,
    #[serde(default = "default_true")]
    pub predator: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub flocking: FlockingConfig,
    #[serde(default)]
    pub wind: WindConfig,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Input played back by `ScriptedInput`.
    #[serde(default)]
    pub script: Vec<ScriptedEvent>,
}

/// Vision radii (unsquared), coefficients and integration constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlockingConfig {
    #[serde(default = "default_vision_sep")]
    pub vision_sep: f64,
    #[serde(default = "default_vision_cohes_min")]
    pub vision_cohes_min: f64,
    #[serde(default = "default_vision_cohes")]
    pub vision_cohes: f64,
    #[serde(default = "default_vision_align")]
    pub vision_align: f64,
    #[serde(default = "default_vision_predator")]
    pub vision_predator: f64,
    #[serde(default = "default_angle_threshold")]
    pub vision_angle_threshold: f64,
    #[serde(default = "default_coef_sep")]
    pub coef_sep: f64,
    #[serde(default = "default_coef_predator")]
    pub coef_predator: f64,
    #[serde(default = "default_coef_cohesion")]
    pub coef_cohesion: f64,
    #[serde(default = "default_coef_alignment")]
    pub coef_alignment: f64,
    #[serde(default = "default_vmax")]
    pub vmax: f64,
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Upper bound on each velocity component of the initial population.
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,
}

impl Default for FlockingConfig {
    fn default() -> Self {
        Self {
            vision_sep: default_vision_sep(),
            vision_cohes_min: default_vision_cohes_min(),
            vision_cohes: default_vision_cohes(),
            vision_align: default_vision_align(),
            vision_predator: default_vision_predator(),
            vision_angle_threshold: default_angle_threshold(),
            coef_sep: default_coef_sep(),
            coef_predator: default_coef_predator(),
            coef_cohesion: default_coef_cohesion(),
            coef_alignment: default_coef_alignment(),
            vmax: default_vmax(),
            dt: default_dt(),
            initial_speed: default_initial_speed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindConfig {
    /// Number of families, the default family included.
    #[serde(default = "default_max_family")]
    pub max_family: i32,
    #[serde(default = "default_max_wind")]
    pub max_wind: f64,
    #[serde(default = "default_wind_step")]
    pub step: f64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            max_family: default_max_family(),
            max_wind: default_max_wind(),
            step: default_wind_step(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default)]
    pub policy: FamilyPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_every_rounds")]
    pub every_rounds: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            every_rounds: default_every_rounds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            random_seed: default_seed(),
            rounds: None,
            initial_population: default_population(),
            predator: true,
            workers: default_workers(),
            bounds: Bounds::default(),
            flocking: FlockingConfig::default(),
            wind: WindConfig::default(),
            spawn: SpawnConfig::default(),
            recorder: RecorderConfig::default(),
            logging: LoggingConfig::default(),
            script: Vec::new(),
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

impl SimConfig {
    /// The built-in scenario shipped as `scenarios/meadow.yaml`.
    pub fn meadow() -> Self {
        Self {
            description: Some("A single default flock chased by the cursor".to_string()),
            rounds: Some(600),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if !self.bounds.is_valid() {
            return Err(ConfigError::EmptyBounds);
        }

        let flocking = &self.flocking;
        positive("vision_sep", flocking.vision_sep)?;
        positive("vision_cohes", flocking.vision_cohes)?;
        positive("vision_align", flocking.vision_align)?;
        positive("vision_predator", flocking.vision_predator)?;
        positive("vmax", flocking.vmax)?;
        positive("dt", flocking.dt)?;
        if !(flocking.vision_cohes_min >= 0.0 && flocking.vision_cohes_min < flocking.vision_cohes)
        {
            return Err(ConfigError::CohesionRange {
                min: flocking.vision_cohes_min,
                max: flocking.vision_cohes,
            });
        }
        if !(-1.0..=1.0).contains(&flocking.vision_angle_threshold) {
            return Err(ConfigError::AngleThreshold(flocking.vision_angle_threshold));
        }
        for (field, value) in [
            ("coef_sep", flocking.coef_sep),
            ("coef_predator", flocking.coef_predator),
            ("coef_cohesion", flocking.coef_cohesion),
            ("coef_alignment", flocking.coef_alignment),
        ] {
            positive(field, value)?;
        }
        if flocking.coef_predator <= flocking.coef_sep {
            return Err(ConfigError::PredatorCoefficient {
                predator: flocking.coef_predator,
                sep: flocking.coef_sep,
            });
        }
        if !(flocking.initial_speed.is_finite() && flocking.initial_speed >= 0.0) {
            return Err(ConfigError::NonPositive {
                field: "initial_speed",
                value: flocking.initial_speed,
            });
        }

        if self.wind.max_family < 1 {
            return Err(ConfigError::NoFamilies(self.wind.max_family));
        }
        let wind_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !(wind_ok(self.wind.max_wind) && wind_ok(self.wind.step)) {
            return Err(ConfigError::Wind {
                max_wind: self.wind.max_wind,
                step: self.wind.step,
            });
        }
        if let FamilyPolicy::Fixed(family) = self.spawn.policy {
            if family.0 < 0 || family.0 >= self.wind.max_family {
                return Err(ConfigError::SpawnFamily {
                    family: family.0,
                    max_family: self.wind.max_family,
                });
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.recorder.every_rounds == 0 {
            return Err(ConfigError::NonPositive {
                field: "recorder.every_rounds",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn flock_params(&self) -> FlockParams {
        FlockParams::new(self.bounds, &self.flocking)
    }

    pub fn rounds(&self, override_rounds: Option<u64>) -> Option<u64> {
        override_rounds.or(self.rounds)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: SimConfig = serde_yaml::from_str(text).context("Failed to parse scenario")?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize scenario")
    }

    /// Write the scenario as YAML to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write scenario file {}", path.display()))
    }
}

/// Resolves scenario files relative to a base directory.
pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Read, parse and validate a scenario.
    pub fn load(&self, file: impl AsRef<Path>) -> Result<SimConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let config: SimConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        Ok(config)
    }
}
