//! Identity and family assignment, and click-driven admission of new boids.

use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::flock::{Boid, Family, FlockParams};
use crate::io::Key;
use crate::kernel::{Behavior, PublishCx, ResumeCx, Yield};
use crate::rng::RngExt;
use crate::vector::Vec2;

use super::{BoidAgent, FlockChannels, PredatorAgent};

/// How clicked-in boids pick their family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyPolicy {
    Fixed(Family),
    #[default]
    RoundRobin,
    Random,
}

impl FamilyPolicy {
    /// The policy selected by the next `CycleFamily` key press.
    pub fn cycle(self) -> FamilyPolicy {
        match self {
            FamilyPolicy::RoundRobin => FamilyPolicy::Random,
            FamilyPolicy::Random => FamilyPolicy::Fixed(Family(1)),
            FamilyPolicy::Fixed(_) => FamilyPolicy::RoundRobin,
        }
    }
}

pub struct PopulationManager {
    next_id: u64,
    policy: FamilyPolicy,
    max_family: i32,
    rotation: i32,
    rng: ChaCha8Rng,
    channels: Arc<FlockChannels>,
    params: Arc<FlockParams>,
    spawned: u64,
}

impl PopulationManager {
    pub fn new(
        policy: FamilyPolicy,
        channels: Arc<FlockChannels>,
        params: Arc<FlockParams>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            next_id: 0,
            policy,
            max_family: channels.max_family(),
            rotation: 0,
            rng,
            channels,
            params,
            spawned: 0,
        }
    }

    pub fn policy(&self) -> FamilyPolicy {
        self.policy
    }

    /// Boids admitted from clicks so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Family for the next clicked-in boid. Spawn families are
    /// `1..max_family`; with a single family everything is `DEFAULT`.
    pub fn next_family(&mut self) -> Family {
        if self.max_family <= 1 {
            return Family::DEFAULT;
        }
        let spawn_families = self.max_family - 1;
        match self.policy {
            FamilyPolicy::Fixed(family) if (0..self.max_family).contains(&family.0) => family,
            FamilyPolicy::Fixed(_) => Family::DEFAULT,
            FamilyPolicy::RoundRobin => {
                let family = Family(1 + self.rotation % spawn_families);
                self.rotation = (self.rotation + 1) % spawn_families;
                family
            }
            FamilyPolicy::Random => Family(self.rng.gen_range(1..self.max_family)),
        }
    }

    /// A new boid at rest at `position`, family chosen by the policy.
    pub fn spawn_boid(&mut self, position: Vec2) -> BoidAgent {
        let family = self.next_family();
        let boid = Boid::new(self.allocate_id(), family, position);
        debug!(id = boid.id, family = family.0, "spawning boid");
        BoidAgent::new(boid, self.channels.clone(), self.params.clone())
    }

    /// The initial flock: `DEFAULT` family, seeded positions and velocities.
    pub fn seed<R: Rng>(&mut self, count: usize, rng: &mut R, speed: f64) -> Vec<BoidAgent> {
        let bounds = self.params.bounds;
        (0..count)
            .map(|_| {
                let position = rng.random_in(&bounds);
                let velocity = Vec2::new(
                    rng.random_f64(-speed, speed),
                    rng.random_f64(-speed, speed),
                );
                let boid = Boid::new(self.allocate_id(), Family::DEFAULT, position)
                    .with_velocity(velocity.clamp_norm(self.params.vmax));
                BoidAgent::new(boid, self.channels.clone(), self.params.clone())
            })
            .collect()
    }

    pub fn spawn_predator(&mut self, position: Vec2) -> PredatorAgent {
        let boid = Boid::new(self.allocate_id(), Family::PREDATOR, position);
        PredatorAgent::new(boid, self.channels.clone(), self.params.clone())
    }
}

impl Behavior for PopulationManager {
    fn name(&self) -> &str {
        "population"
    }

    fn publish(&mut self, _cx: &mut PublishCx<'_>) -> Yield {
        Yield::Await
    }

    fn resume(&mut self, cx: &mut ResumeCx<'_>) -> Yield {
        if *cx.read(self.channels.key) == Some(Key::CycleFamily) {
            self.policy = self.policy.cycle();
            info!(round = cx.round(), policy = ?self.policy, "spawn policy changed");
        }
        if let Some(position) = *cx.read(self.channels.click) {
            let agent = self.spawn_boid(position);
            self.spawned += 1;
            cx.spawn(agent);
        }
        Yield::NextRound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Bus;
    use crate::rng::RngManager;

    fn manager_with(policy: FamilyPolicy, max_family: i32) -> PopulationManager {
        let mut bus = Bus::new();
        let channels = Arc::new(FlockChannels::register(&mut bus, max_family));
        PopulationManager::new(
            policy,
            channels,
            Arc::new(FlockParams::default()),
            RngManager::new(9).stream("population"),
        )
    }

    #[test]
    fn test_round_robin_skips_default_family() {
        let mut manager = manager_with(FamilyPolicy::RoundRobin, 4);
        let families: Vec<_> = (0..5).map(|_| manager.next_family().0).collect();
        assert_eq!(families, vec![1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_random_stays_in_spawn_range() {
        let mut manager = manager_with(FamilyPolicy::Random, 3);
        for _ in 0..100 {
            let family = manager.next_family();
            assert!((1..3).contains(&family.0));
        }
    }

    #[test]
    fn test_single_family_always_default() {
        let mut manager = manager_with(FamilyPolicy::RoundRobin, 1);
        assert_eq!(manager.next_family(), Family::DEFAULT);
        let mut manager = manager_with(FamilyPolicy::Random, 1);
        assert_eq!(manager.next_family(), Family::DEFAULT);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut manager = manager_with(FamilyPolicy::Fixed(Family(2)), 4);
        let predator = manager.spawn_predator(Vec2::ZERO);
        let mut rng = RngManager::new(1).stream("placement");
        let flock = manager.seed(3, &mut rng, 5.0);
        let clicked = manager.spawn_boid(Vec2::new(1.0, 1.0));

        let mut ids: Vec<u64> = flock.iter().map(|agent| agent.boid().id).collect();
        ids.push(predator.boid().id);
        ids.push(clicked.boid().id);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert_eq!(clicked.boid().family, Family(2));
        assert_eq!(clicked.boid().velocity, Vec2::ZERO);
        assert!(flock.iter().all(|agent| agent.boid().family == Family::DEFAULT));
    }

    #[test]
    fn test_policy_cycle() {
        let policy = FamilyPolicy::RoundRobin;
        assert_eq!(policy.cycle(), FamilyPolicy::Random);
        assert_eq!(policy.cycle().cycle(), FamilyPolicy::Fixed(Family(1)));
        assert_eq!(policy.cycle().cycle().cycle(), FamilyPolicy::RoundRobin);
    }
}
