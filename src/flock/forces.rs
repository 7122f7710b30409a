//! Neighbor classification and the steering forces built from it.

use super::{Boid, FlockParams, EPSILON};
use crate::vector::Vec2;

/// Neighbor sets for one boid, built in a single pass over the snapshot.
///
/// The separation set proper is `separation` plus `predators`; predators are
/// kept apart because they repel with their own coefficient.
#[derive(Debug, Default)]
pub struct Neighborhood<'a> {
    pub separation: Vec<&'a Boid>,
    pub predators: Vec<&'a Boid>,
    pub cohesion: Vec<&'a Boid>,
    pub alignment: Vec<&'a Boid>,
}

/// Whether `offset` lies inside the forward cone of `me`. A boid at rest sees
/// in every direction.
pub fn in_vision_cone(me: &Boid, offset: Vec2, threshold: f64) -> bool {
    let Some(heading) = me.velocity.try_normalize(EPSILON) else {
        return true;
    };
    let Some(direction) = offset.try_normalize(EPSILON) else {
        return true;
    };
    heading.dot(direction) >= threshold
}

pub fn classify<'a>(me: &Boid, all: &'a [Boid], params: &FlockParams) -> Neighborhood<'a> {
    let mut hood = Neighborhood::default();
    for other in all {
        if other.id == me.id {
            continue;
        }
        let offset = other.position - me.position;
        let dist_sq = offset.norm_sq();

        if other.is_predator() && !me.is_predator() {
            if dist_sq < params.vision_predator_sq {
                hood.predators.push(other);
            }
            continue;
        }

        if dist_sq < params.vision_sep_sq
            && in_vision_cone(me, offset, params.vision_angle_threshold)
        {
            hood.separation.push(other);
        }

        if other.family != me.family {
            continue;
        }
        if dist_sq >= params.vision_cohes_min_sq && dist_sq < params.vision_cohes_sq {
            hood.cohesion.push(other);
        }
        if dist_sq < params.vision_align_sq && other.velocity.norm_sq() > EPSILON {
            hood.alignment.push(other);
        }
    }
    hood
}

/// Force terms acting on one boid. `separation` and `predator` are raw sums;
/// `cohesion` and `alignment` already carry their coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Forces {
    pub separation: Vec2,
    pub predator: Vec2,
    pub cohesion: Vec2,
    pub alignment: Vec2,
    pub wind: Vec2,
}

impl Forces {
    pub fn acceleration(&self, params: &FlockParams) -> Vec2 {
        self.separation * params.coef_sep
            + self.predator * params.coef_predator
            + self.cohesion
            + self.alignment
            + self.wind
    }
}

/// `-Σ (b - me) / |b - me|²`, skipping coincident pairs.
fn repulsion(me: &Boid, set: &[&Boid]) -> Vec2 {
    set.iter().fold(Vec2::ZERO, |acc, other| {
        let offset = other.position - me.position;
        let dist_sq = offset.norm_sq();
        if dist_sq < EPSILON {
            acc
        } else {
            acc - offset / dist_sq
        }
    })
}

fn cohesion(me: &Boid, set: &[&Boid], coef: f64) -> Vec2 {
    if set.is_empty() {
        return Vec2::ZERO;
    }
    let sum = set
        .iter()
        .fold(Vec2::ZERO, |acc, other| acc + other.position);
    let centroid = sum / set.len() as f64;
    (centroid - me.position) * coef
}

fn alignment(set: &[&Boid], coef: f64) -> Vec2 {
    if set.is_empty() {
        return Vec2::ZERO;
    }
    let sum = set.iter().fold(Vec2::ZERO, |acc, other| {
        acc + other.velocity / other.velocity.norm_sq()
    });
    sum / set.len() as f64 * coef
}

pub fn compute_forces(me: &Boid, all: &[Boid], wind: Vec2, params: &FlockParams) -> Forces {
    let hood = classify(me, all, params);
    Forces {
        separation: repulsion(me, &hood.separation),
        predator: repulsion(me, &hood.predators),
        cohesion: cohesion(me, &hood.cohesion, params.coef_cohesion),
        alignment: alignment(&hood.alignment, params.coef_alignment),
        wind,
    }
}
