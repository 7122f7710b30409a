//! 2D vector math shared by the flocking model and the render/input surfaces.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A 2D vector used for position, velocity and acceleration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm_sq(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance_sq(self, other: Vec2) -> f64 {
        (other - self).norm_sq()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).norm()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Unit vector in the same direction, or `None` when `|self|² <= epsilon`.
    pub fn try_normalize(self, epsilon: f64) -> Option<Vec2> {
        let norm_sq = self.norm_sq();
        if norm_sq <= epsilon || !norm_sq.is_finite() {
            return None;
        }
        Some(self / norm_sq.sqrt())
    }

    /// Rescales uniformly so that `|result| <= max`. Direction is preserved.
    pub fn clamp_norm(self, max: f64) -> Vec2 {
        let norm = self.norm();
        if norm <= max {
            self
        } else {
            self * (max / norm)
        }
    }

    /// Component-wise clamp into `[-limit, limit]`.
    pub fn clamp_axes(self, limit: f64) -> Vec2 {
        Vec2::new(self.x.clamp(-limit, limit), self.y.clamp(-limit, limit))
    }

    /// Heading in radians, measured counter-clockwise from +x.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, scalar: f64) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;

    fn div(self, scalar: f64) -> Vec2 {
        Vec2::new(self.x / scalar, self.y / scalar)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}
