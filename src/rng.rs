//! Deterministic random number generation
//!
//! Every consumer gets its own `ChaCha8Rng` stream, seeded from the master seed
//! and the stream's name. Streams never depend on the order they were created
//! in, so adding a wind agent cannot shift the population's placement.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::flock::Bounds;
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy)]
pub struct RngManager {
    master_seed: u64,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self { master_seed: seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// The stream for a named consumer, e.g. `"placement"` or `"wind/2"`.
    pub fn stream(&self, name: &str) -> ChaCha8Rng {
        self.entity_stream(name, 0)
    }

    /// A stream for one entity of a named consumer.
    pub fn entity_stream(&self, name: &str, entity: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.derive_seed(name_hash(name), entity))
    }

    fn derive_seed(&self, stream: u64, entity: u64) -> u64 {
        let mut seed = self.master_seed;
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed ^= stream.wrapping_mul(1103515245);
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed ^= entity.wrapping_mul(48271);
        seed
    }
}

impl Default for RngManager {
    fn default() -> Self {
        Self::new(42)
    }
}

/// FNV-1a; stable across platforms and releases, unlike `DefaultHasher`.
fn name_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

/// Helper functions for common random operations
pub trait RngExt {
    fn random_f64(&mut self, min: f64, max: f64) -> f64;
    fn random_in(&mut self, bounds: &Bounds) -> Vec2;
}

impl<R: Rng> RngExt for R {
    fn random_f64(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        self.gen_range(min..max)
    }

    fn random_in(&mut self, bounds: &Bounds) -> Vec2 {
        Vec2::new(
            self.random_f64(bounds.min_x, bounds.max_x),
            self.random_f64(bounds.min_y, bounds.max_y),
        )
    }
}
