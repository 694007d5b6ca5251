use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::types::FlockingUniforms;

/// What happens to a particle that leaves the simulation cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Periodic: leaving one face re-enters through the opposite one.
    #[default]
    Wrap,
    Unbounded,
}

#[derive(Debug, Clone, Error)]
pub enum ParameterError {
    #[error("{field} is not finite ({value})")]
    NotFinite { field: &'static str, value: f32 },

    #[error("{field} must not be negative ({value})")]
    Negative { field: &'static str, value: f32 },

    #[error("{field} must be greater than zero ({value})")]
    NotPositive { field: &'static str, value: f32 },
}

impl ParameterError {
    pub fn field(&self) -> &'static str {
        match self {
            ParameterError::NotFinite { field, .. }
            | ParameterError::Negative { field, .. }
            | ParameterError::NotPositive { field, .. } => field,
        }
    }
}

// Rejections compare by kind and field, never by the offending value, so a
// NaN rejection still equals itself.
impl PartialEq for ParameterError {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.field() == other.field()
    }
}

// Range a keyboard-adjusted knob is held in
const KNOB_MIN: f32 = 1.0e-3;
const KNOB_MAX: f32 = 1.0e6;

/// Scalar knobs of the flocking model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    pub time_step: f32,
    pub cohesion: f32,
    pub alignment: f32,
    pub neighbor_radius: f32,
    pub collision_radius: f32,
    pub point_size: f32,
    pub max_speed: f32,
    /// Lower bound on pair distance in the separation term.
    pub min_distance: f32,
    /// Alpha gained per unit of simulated time.
    pub fade_in_rate: f32,
    pub boundary: BoundaryPolicy,
    pub domain_half_extent: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            cohesion: 1000.0,
            alignment: 80.0,
            neighbor_radius: 1.0,
            collision_radius: 0.1,
            point_size: 3.0,
            max_speed: 10.0,
            min_distance: 0.01,
            fade_in_rate: 0.5,
            boundary: BoundaryPolicy::Wrap,
            domain_half_extent: 10.0,
        }
    }
}

/// A parameter that can be nudged from the keyboard between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKnob {
    Cohesion,
    Alignment,
    NeighborRadius,
    CollisionRadius,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ParameterError> {
        let fields = [
            ("time_step", self.time_step),
            ("cohesion", self.cohesion),
            ("alignment", self.alignment),
            ("neighbor_radius", self.neighbor_radius),
            ("collision_radius", self.collision_radius),
            ("max_speed", self.max_speed),
            ("min_distance", self.min_distance),
            ("fade_in_rate", self.fade_in_rate),
            ("domain_half_extent", self.domain_half_extent),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ParameterError::NotFinite { field, value });
            }
            if value < 0.0 {
                return Err(ParameterError::Negative { field, value });
            }
        }

        let strictly_positive = [
            ("max_speed", self.max_speed),
            ("min_distance", self.min_distance),
            ("domain_half_extent", self.domain_half_extent),
        ];
        for (field, value) in strictly_positive {
            if value <= 0.0 {
                return Err(ParameterError::NotPositive { field, value });
            }
        }
        Ok(())
    }

    /// Multiplies one knob by `factor`, held within `KNOB_MIN..=KNOB_MAX`, and
    /// returns its new value. A non-finite result leaves the knob unchanged.
    pub fn adjust(&mut self, knob: ParameterKnob, factor: f32) -> f32 {
        let value = match knob {
            ParameterKnob::Cohesion => &mut self.cohesion,
            ParameterKnob::Alignment => &mut self.alignment,
            ParameterKnob::NeighborRadius => &mut self.neighbor_radius,
            ParameterKnob::CollisionRadius => &mut self.collision_radius,
        };
        let scaled = *value * factor;
        if scaled.is_finite() {
            *value = scaled.clamp(KNOB_MIN, KNOB_MAX);
        }
        *value
    }

    pub fn to_uniforms(&self, tex_size: u32) -> FlockingUniforms {
        FlockingUniforms {
            time_step: self.time_step,
            cohesion: self.cohesion,
            alignment: self.alignment,
            neighbor_radius: self.neighbor_radius,
            collision_radius: self.collision_radius,
            max_speed: self.max_speed,
            min_distance: self.min_distance,
            fade_in_rate: self.fade_in_rate,
            domain_half_extent: self.domain_half_extent,
            boundary_mode: match self.boundary {
                BoundaryPolicy::Unbounded => 0,
                BoundaryPolicy::Wrap => 1,
            },
            tex_size,
            _padding: 0,
        }
    }
}
