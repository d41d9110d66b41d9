//! Configuration loading and validation.
//!
//! Settings come from a TOML file layered with `ROVER__`-prefixed environment
//! overrides, e.g. `ROVER__SIMULATOR__DT=0.05`.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use rover_navigation::ControlLimits;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::{Result, SimError};
use crate::noise::Covariance;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Reads the layered settings from `path` and the environment.
pub fn load_config(path: impl AsRef<Path>) -> std::result::Result<Config, ConfigError> {
    let path = path.as_ref();
    info!("Attempting to load configuration from {}", path.display());

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("ROVER").separator("__").try_parsing(true))
        .build();

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

/// Options governing the simulated vehicle and its sensors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Step length (s).
    pub dt: f64,
    pub enable_gps: bool,
    pub enable_laser: bool,
    pub enable_odometry: bool,
    pub gps_measurement_period: f64,
    pub laser_measurement_period: f64,
    pub laser_detection_range: f64,
    /// 2x2 covariance of the `[speed, turn_rate]` odometry measurement.
    pub r_odometry: Vec<Vec<f64>>,
    /// 2x2 covariance of the `[x, y]` GPS fix.
    pub r_gps: Vec<Vec<f64>>,
    /// 3x3 covariance of `[range, azimuth, elevation]`; only the diagonal is sampled.
    pub r_laser: Vec<Vec<f64>>,
    pub max_acceleration: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Largest steer change per second.
    pub max_diff_delta_rate: f64,
    /// Largest steer magnitude.
    pub max_delta: f64,
    /// Multiplier on every noise sample; 0 disables noise.
    pub noise_scale: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let deg = std::f64::consts::PI / 180.0;
        Self {
            dt: 0.1,
            enable_gps: true,
            enable_laser: true,
            enable_odometry: true,
            gps_measurement_period: 1.0,
            laser_measurement_period: 0.5,
            laser_detection_range: 20.0,
            r_odometry: vec![vec![0.1 * 0.1, 0.0], vec![0.0, (0.5 * deg).powi(2)]],
            r_gps: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            r_laser: vec![
                vec![0.1 * 0.1, 0.0, 0.0],
                vec![0.0, (1.0 * deg).powi(2), 0.0],
                vec![0.0, 0.0, (1.0 * deg).powi(2)],
            ],
            max_acceleration: 1.0,
            min_speed: 0.5,
            max_speed: 2.0,
            max_diff_delta_rate: 0.5,
            max_delta: 0.6,
            noise_scale: 1.0,
        }
    }
}

impl SimulatorConfig {
    /// Deserializes the `[simulator]` table and validates it.
    pub fn from_settings(settings: &Config) -> Result<Self> {
        let config: Self = settings.get("simulator")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every option, failing on the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(invalid(format!("dt must be positive, got {}", self.dt)));
        }
        for (name, period) in [
            ("gps_measurement_period", self.gps_measurement_period),
            ("laser_measurement_period", self.laser_measurement_period),
        ] {
            if !period.is_finite() || period <= 0.0 {
                return Err(invalid(format!("{name} must be positive, got {period}")));
            }
        }
        if !self.laser_detection_range.is_finite() || self.laser_detection_range < 0.0 {
            return Err(invalid(format!(
                "laser_detection_range must be non-negative, got {}",
                self.laser_detection_range
            )));
        }
        if !self.noise_scale.is_finite() || self.noise_scale < 0.0 {
            return Err(invalid(format!(
                "noise_scale must be non-negative, got {}",
                self.noise_scale
            )));
        }

        self.control_limits()?;
        self.odometry_covariance()?;
        self.gps_covariance()?;
        self.laser_covariance()?;
        Ok(())
    }

    pub fn control_limits(&self) -> Result<ControlLimits> {
        Ok(ControlLimits::new(
            self.max_acceleration,
            self.min_speed,
            self.max_speed,
            self.max_diff_delta_rate,
            self.max_delta,
        )?)
    }

    pub fn odometry_covariance(&self) -> Result<Covariance> {
        covariance("r_odometry", &self.r_odometry, 2)
    }

    pub fn gps_covariance(&self) -> Result<Covariance> {
        covariance("r_gps", &self.r_gps, 2)
    }

    pub fn laser_covariance(&self) -> Result<Covariance> {
        covariance("r_laser", &self.r_laser, 3)
    }
}

fn covariance(name: &str, rows: &[Vec<f64>], dim: usize) -> Result<Covariance> {
    if rows.len() != dim || rows.iter().any(|r| r.len() != dim) {
        return Err(invalid(format!("{name} must be {dim}x{dim}")));
    }
    Covariance::from_rows(rows).map_err(|e| match e {
        SimError::InvalidCovariance(reason) => SimError::InvalidCovariance(format!("{name}: {reason}")),
        other => other,
    })
}

fn invalid(reason: String) -> SimError {
    SimError::InvalidConfiguration(reason)
}

/// Options of the driver binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding one sub-directory per scenario.
    pub scenario_root: PathBuf,
    /// Name of the scenario to run.
    pub scenario: String,
    /// Seed of the noise generator.
    pub seed: u64,
    /// Upper bound on steps; 0 runs until the last waypoint is reached.
    pub max_steps: u64,
    /// Simulated seconds per wall-clock second; 0 runs unpaced.
    pub realtime_factor: f64,
    /// Capacity of the event topic.
    pub event_buffer: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario_root: PathBuf::from("scenarios"),
            scenario: "loop".into(),
            seed: 0,
            max_steps: 0,
            realtime_factor: 0.0,
            event_buffer: 1024,
        }
    }
}

impl RunConfig {
    /// Deserializes the `[run]` table and validates it.
    pub fn from_settings(settings: &Config) -> Result<Self> {
        let config: Self = settings.get("run")?;
        if !config.realtime_factor.is_finite() || config.realtime_factor < 0.0 {
            return Err(invalid(format!(
                "realtime_factor must be non-negative, got {}",
                config.realtime_factor
            )));
        }
        if config.event_buffer == 0 {
            return Err(invalid("event_buffer must be positive".into()));
        }
        Ok(config)
    }
}
