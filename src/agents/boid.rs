use std::sync::Arc;

use crate::flock::{step, Boid, FlockParams};
use crate::kernel::{Behavior, PublishCx, ResumeCx, Yield};
use crate::vector::Vec2;

use super::FlockChannels;

/// Owns one boid. Publishes it, waits for the snapshot, then steps it.
pub struct BoidAgent {
    boid: Boid,
    channels: Arc<FlockChannels>,
    params: Arc<FlockParams>,
    /// Family wind as of the last resolved round.
    wind: Vec2,
}

impl BoidAgent {
    pub fn new(boid: Boid, channels: Arc<FlockChannels>, params: Arc<FlockParams>) -> Self {
        Self {
            boid,
            channels,
            params,
            wind: Vec2::ZERO,
        }
    }

    pub fn boid(&self) -> &Boid {
        &self.boid
    }
}

impl Behavior for BoidAgent {
    fn name(&self) -> &str {
        "boid"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        cx.emit(self.channels.snapshot, vec![self.boid.clone()]);
        self.wind = self
            .channels
            .wind_for(self.boid.family)
            .map(|key| *cx.latest(key))
            .unwrap_or(Vec2::ZERO);
        Yield::Await
    }

    fn resume(&mut self, cx: &mut ResumeCx<'_>) -> Yield {
        let snapshot = cx.read(self.channels.snapshot);
        self.boid = step(&self.boid, snapshot, self.wind, &self.params);
        Yield::NextRound
    }
}
