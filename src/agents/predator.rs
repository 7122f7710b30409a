use std::sync::Arc;

use crate::flock::{Boid, FlockParams};
use crate::kernel::{Behavior, PublishCx, Yield};
use crate::vector::Vec2;

use super::FlockChannels;

/// The cursor-driven predator. It follows the cursor of the last resolved
/// round and never runs the flocking model itself.
pub struct PredatorAgent {
    boid: Boid,
    channels: Arc<FlockChannels>,
    params: Arc<FlockParams>,
}

impl PredatorAgent {
    pub fn new(boid: Boid, channels: Arc<FlockChannels>, params: Arc<FlockParams>) -> Self {
        Self {
            boid,
            channels,
            params,
        }
    }

    pub fn boid(&self) -> &Boid {
        &self.boid
    }
}

impl Behavior for PredatorAgent {
    fn name(&self) -> &str {
        "predator"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        match *cx.latest(self.channels.cursor) {
            Some(cursor) => {
                let target = self.params.bounds.clamp(cursor);
                let velocity = (target - self.boid.position) / self.params.dt;
                self.boid.velocity = if velocity.is_finite() {
                    velocity
                } else {
                    Vec2::ZERO
                };
                self.boid.position = target;
            }
            None => self.boid.velocity = Vec2::ZERO,
        }
        cx.emit(self.channels.snapshot, vec![self.boid.clone()]);
        Yield::NextRound
    }
}
