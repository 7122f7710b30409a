//! Flocking force model and integration
//!
//! Everything here is a pure function of one boid and a full-population
//! snapshot. Degenerate geometry is excluded by epsilon guards instead of
//! producing errors, so a round can never stall on a numeric edge case.

pub mod forces;
pub mod integrate;

use serde::{Deserialize, Serialize};

use crate::config::FlockingConfig;
use crate::vector::Vec2;

pub use forces::{classify, compute_forces, in_vision_cone, Forces, Neighborhood};
pub use integrate::{integrate, reflect, step};

/// Squared distances and squared speeds below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Flock membership tag. Boids only cohere with and align to their own family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Family(pub i32);

impl Family {
    pub const PREDATOR: Family = Family(-1);
    pub const DEFAULT: Family = Family(0);

    pub fn is_predator(self) -> bool {
        self == Family::PREDATOR
    }

    /// Position in per-family tables; `None` for the predator.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boid {
    pub id: u64,
    pub family: Family,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
}

impl Boid {
    /// A boid at rest.
    pub fn new(id: u64, family: Family, position: Vec2) -> Self {
        Self {
            id,
            family,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn is_predator(&self) -> bool {
        self.family.is_predator()
    }
}

/// Axis-aligned world rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
        )
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_valid(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(-400.0, 400.0, -300.0, 300.0)
    }
}

/// Flocking constants with every vision radius pre-squared.
#[derive(Debug, Clone, PartialEq)]
pub struct FlockParams {
    pub bounds: Bounds,
    pub vision_sep_sq: f64,
    pub vision_cohes_min_sq: f64,
    pub vision_cohes_sq: f64,
    pub vision_align_sq: f64,
    pub vision_predator_sq: f64,
    pub vision_angle_threshold: f64,
    pub coef_sep: f64,
    pub coef_predator: f64,
    pub coef_cohesion: f64,
    pub coef_alignment: f64,
    pub vmax: f64,
    pub dt: f64,
}

impl FlockParams {
    pub fn new(bounds: Bounds, config: &FlockingConfig) -> Self {
        Self {
            bounds,
            vision_sep_sq: config.vision_sep.powi(2),
            vision_cohes_min_sq: config.vision_cohes_min.powi(2),
            vision_cohes_sq: config.vision_cohes.powi(2),
            vision_align_sq: config.vision_align.powi(2),
            vision_predator_sq: config.vision_predator.powi(2),
            vision_angle_threshold: config.vision_angle_threshold,
            coef_sep: config.coef_sep,
            coef_predator: config.coef_predator,
            coef_cohesion: config.coef_cohesion,
            coef_alignment: config.coef_alignment,
            vmax: config.vmax,
            dt: config.dt,
        }
    }
}

impl Default for FlockParams {
    fn default() -> Self {
        Self::new(Bounds::default(), &FlockingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_index() {
        assert_eq!(Family::DEFAULT.index(), Some(0));
        assert_eq!(Family(3).index(), Some(3));
        assert_eq!(Family::PREDATOR.index(), None);
        assert!(Family::PREDATOR.is_predator());
    }

    #[test]
    fn test_bounds_clamp_and_contains() {
        let bounds = Bounds::new(0.0, 10.0, -5.0, 5.0);
        assert!(bounds.contains(Vec2::new(10.0, -5.0)));
        assert!(!bounds.contains(Vec2::new(10.5, 0.0)));
        assert_eq!(bounds.clamp(Vec2::new(12.0, -9.0)), Vec2::new(10.0, -5.0));
        assert_eq!(bounds.center(), Vec2::new(5.0, 0.0));
        assert!(bounds.is_valid());
        assert!(!Bounds::new(1.0, 1.0, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_params_square_the_radii() {
        let config = FlockingConfig {
            vision_sep: 3.0,
            vision_cohes: 10.0,
            ..FlockingConfig::default()
        };
        let params = FlockParams::new(Bounds::default(), &config);
        assert_eq!(params.vision_sep_sq, 9.0);
        assert_eq!(params.vision_cohes_sq, 100.0);
    }
}
