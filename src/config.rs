//! Startup configuration.
//!
//! Everything has a default matching the classic flocking setup, so the
//! configuration file is optional and may name only the fields it changes.
//! The file is looked up at `$FLOCKING_CONFIG`, then `./flocking.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::grid::check_tex_size;
use crate::simulation::{BoundaryPolicy, SimulationParameters};

pub const CONFIG_ENV_VAR: &str = "FLOCKING_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "flocking.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How particle colors combine with what is already in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendPolicy {
    /// `src * src_alpha + dst`, dense regions glow.
    #[default]
    Additive,
    /// Classic `src_alpha, one_minus_src_alpha`.
    Alpha,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockingConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Edge of the particle grid; the flock holds `tex_size²` particles.
    pub tex_size: u32,
    pub point_size: f32,
    pub cohesion: f32,
    pub alignment: f32,
    pub neighbor_radius: f32,
    pub collision_radius: f32,
    pub time_step: f32,
    pub max_speed: f32,
    pub min_distance: f32,
    pub fade_in_rate: f32,
    pub boundary: BoundaryPolicy,
    pub domain_half_extent: f32,
    pub blend: BlendPolicy,
    /// Fixed seed for the initial particle layout, random when absent.
    pub seed: Option<u64>,
    pub show_grid: bool,
}

impl Default for FlockingConfig {
    fn default() -> Self {
        let params = SimulationParameters::default();
        Self {
            window_width: 1024,
            window_height: 768,
            tex_size: 64,
            point_size: params.point_size,
            cohesion: params.cohesion,
            alignment: params.alignment,
            neighbor_radius: params.neighbor_radius,
            collision_radius: params.collision_radius,
            time_step: params.time_step,
            max_speed: params.max_speed,
            min_distance: params.min_distance,
            fade_in_rate: params.fade_in_rate,
            boundary: params.boundary,
            domain_half_extent: params.domain_half_extent,
            blend: BlendPolicy::default(),
            seed: None,
            show_grid: false,
        }
    }
}

impl FlockingConfig {
    /// Loads the config from `$FLOCKING_CONFIG` or `./flocking.json`,
    /// falling back to defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => {
                log::info!("no {DEFAULT_CONFIG_FILE} found, using default configuration");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid {
                field: "window_width/window_height",
                reason: "window must have a non-zero size".into(),
            });
        }
        check_tex_size(self.tex_size).map_err(|err| ConfigError::Invalid {
            field: "tex_size",
            reason: err.to_string(),
        })?;
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "point_size",
                reason: format!("{} must be positive", self.point_size),
            });
        }
        self.simulation_parameters()
            .validate()
            .map_err(|err| ConfigError::Invalid {
                field: err.field(),
                reason: err.to_string(),
            })
    }

    pub fn simulation_parameters(&self) -> SimulationParameters {
        SimulationParameters {
            time_step: self.time_step,
            cohesion: self.cohesion,
            alignment: self.alignment,
            neighbor_radius: self.neighbor_radius,
            collision_radius: self.collision_radius,
            point_size: self.point_size,
            max_speed: self.max_speed,
            min_distance: self.min_distance,
            fade_in_rate: self.fade_in_rate,
            boundary: self.boundary,
            domain_half_extent: self.domain_half_extent,
        }
    }
}
