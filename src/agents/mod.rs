//! Flock agents and the channels they share.

pub mod boid;
pub mod population;
pub mod predator;
pub mod wind;

use crate::flock::{Boid, Family};
use crate::io::Key;
use crate::kernel::{combine, Bus, ChannelKey};
use crate::vector::Vec2;

pub use boid::BoidAgent;
pub use population::{FamilyPolicy, PopulationManager};
pub use predator::PredatorAgent;
pub use wind::WindAgent;

/// Channel handles for one simulation.
#[derive(Debug, Clone)]
pub struct FlockChannels {
    /// Every boid's published state, ordered by id.
    pub snapshot: ChannelKey<Vec<Boid>>,
    /// Wind per family, indexed by `Family::index`.
    pub wind: Vec<ChannelKey<Vec2>>,
    pub click: ChannelKey<Option<Vec2>>,
    pub cursor: ChannelKey<Option<Vec2>>,
    pub key: ChannelKey<Option<Key>>,
}

impl FlockChannels {
    pub fn register(bus: &mut Bus, max_family: i32) -> Self {
        let snapshot = bus.register("snapshot", Vec::new(), merge_by_id);
        let wind = (0..max_family.max(1))
            .map(|family| bus.register(format!("wind/{family}"), Vec2::ZERO, combine::overwrite))
            .collect();
        Self {
            snapshot,
            wind,
            click: bus.register("click", None, combine::last_writer_wins),
            cursor: bus.register("cursor", None, combine::last_writer_wins),
            key: bus.register("key", None, combine::last_writer_wins),
        }
    }

    pub fn wind_for(&self, family: Family) -> Option<ChannelKey<Vec2>> {
        family.index().and_then(|index| self.wind.get(index).copied())
    }

    pub fn max_family(&self) -> i32 {
        self.wind.len() as i32
    }
}

/// Merge two id-sorted snapshots into one. The result is the same whichever
/// side arrives first, which makes the snapshot fold order-insensitive.
pub fn merge_by_id(left: Vec<Boid>, right: Vec<Boid>) -> Vec<Boid> {
    if right.is_empty() {
        return left;
    }
    if left.is_empty() {
        return right;
    }
    if left.last().map(|b| b.id) <= right.first().map(|b| b.id) {
        let mut merged = left;
        merged.extend(right);
        return merged;
    }

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.id <= r.id,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boids(ids: &[u64]) -> Vec<Boid> {
        ids.iter()
            .map(|&id| Boid::new(id, Family::DEFAULT, Vec2::new(id as f64, 0.0)))
            .collect()
    }

    fn ids(boids: &[Boid]) -> Vec<u64> {
        boids.iter().map(|b| b.id).collect()
    }

    #[test]
    fn test_merge_interleaves() {
        let merged = merge_by_id(boids(&[1, 4, 6]), boids(&[2, 3, 9]));
        assert_eq!(ids(&merged), vec![1, 2, 3, 4, 6, 9]);
    }

    #[test]
    fn test_merge_is_order_insensitive() {
        let a = merge_by_id(boids(&[5]), boids(&[0, 2]));
        let b = merge_by_id(boids(&[0, 2]), boids(&[5]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_channels_per_family() {
        let mut bus = Bus::new();
        let channels = FlockChannels::register(&mut bus, 3);
        assert_eq!(channels.max_family(), 3);
        assert!(channels.wind_for(Family(2)).is_some());
        assert!(channels.wind_for(Family(3)).is_none());
        assert!(channels.wind_for(Family::PREDATOR).is_none());
        assert!(bus.names().any(|name| name == "wind/0"));
    }
}
