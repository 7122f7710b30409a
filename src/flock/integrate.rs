//! Damped Euler integration with boundary reflection.

use super::{compute_forces, Boid, Bounds, FlockParams};
use crate::vector::Vec2;

/// Advance `boid` by one timestep under `acceleration`.
///
/// The new velocity mixes one part `v + dt·a` with three parts `v`, then is
/// capped at `vmax`. Position moves by the pre-update velocity.
pub fn integrate(boid: &Boid, acceleration: Vec2, params: &FlockParams) -> Boid {
    let acceleration = if acceleration.is_finite() {
        acceleration
    } else {
        Vec2::ZERO
    };
    let target = boid.velocity + acceleration * params.dt;
    let blended = (boid.velocity * 3.0 + target) / 4.0;
    let velocity = if blended.is_finite() {
        blended.clamp_norm(params.vmax)
    } else {
        Vec2::ZERO
    };

    let moved = boid.position + boid.velocity * params.dt;
    let position = if moved.is_finite() {
        moved
    } else {
        boid.position
    };
    let (position, velocity) = reflect(position, velocity, &params.bounds);

    Boid {
        id: boid.id,
        family: boid.family,
        position,
        velocity,
        acceleration,
    }
}

/// Clamp `position` into `bounds`. On each axis that was out of range, the
/// velocity component is turned to point back inside with its magnitude kept.
pub fn reflect(position: Vec2, velocity: Vec2, bounds: &Bounds) -> (Vec2, Vec2) {
    let (x, vx) = reflect_axis(position.x, velocity.x, bounds.min_x, bounds.max_x);
    let (y, vy) = reflect_axis(position.y, velocity.y, bounds.min_y, bounds.max_y);
    (Vec2::new(x, y), Vec2::new(vx, vy))
}

fn reflect_axis(position: f64, velocity: f64, min: f64, max: f64) -> (f64, f64) {
    if position < min {
        (min, velocity.abs())
    } else if position > max {
        (max, -velocity.abs())
    } else {
        (position, velocity)
    }
}

/// One full flocking update of `me` against the round snapshot.
pub fn step(me: &Boid, all: &[Boid], wind: Vec2, params: &FlockParams) -> Boid {
    let forces = compute_forces(me, all, wind, params);
    integrate(me, forces.acceleration(params), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flock::Family;

    fn params() -> FlockParams {
        FlockParams {
            bounds: Bounds::new(-10.0, 10.0, -10.0, 10.0),
            vmax: 5.0,
            dt: 1.0,
            ..FlockParams::default()
        }
    }

    #[test]
    fn test_position_uses_previous_velocity() {
        let boid = Boid::new(1, Family::DEFAULT, Vec2::ZERO).with_velocity(Vec2::new(1.0, 0.0));
        let next = integrate(&boid, Vec2::new(4.0, 0.0), &params());
        assert_eq!(next.position, Vec2::new(1.0, 0.0));
        // (3·1 + (1 + 4)) / 4
        assert_eq!(next.velocity, Vec2::new(2.0, 0.0));
        assert_eq!(next.acceleration, Vec2::new(4.0, 0.0));
    }

    #[test]
    fn test_non_finite_acceleration_is_ignored() {
        let boid = Boid::new(1, Family::DEFAULT, Vec2::ZERO).with_velocity(Vec2::new(1.0, 1.0));
        let next = integrate(&boid, Vec2::new(f64::NAN, f64::INFINITY), &params());
        assert_eq!(next.velocity, Vec2::new(1.0, 1.0));
        assert!(next.position.is_finite());
    }

    #[test]
    fn test_reflect_inside_is_identity() {
        let bounds = Bounds::new(-1.0, 1.0, -1.0, 1.0);
        let (p, v) = reflect(Vec2::new(0.5, -0.5), Vec2::new(3.0, -2.0), &bounds);
        assert_eq!(p, Vec2::new(0.5, -0.5));
        assert_eq!(v, Vec2::new(3.0, -2.0));
    }

    #[test]
    fn test_reflect_at_lower_bound_points_inward() {
        let bounds = Bounds::new(-1.0, 1.0, -1.0, 1.0);
        let (p, v) = reflect(Vec2::new(-3.0, 0.0), Vec2::new(-2.0, 0.7), &bounds);
        assert_eq!(p, Vec2::new(-1.0, 0.0));
        assert_eq!(v, Vec2::new(2.0, 0.7));
    }
}
