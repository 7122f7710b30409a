use rand_chacha::ChaCha8Rng;

use crate::flock::Family;
use crate::kernel::{Behavior, ChannelKey, PublishCx, Yield};
use crate::rng::RngExt;
use crate::vector::Vec2;

/// Random-walk wind for one family, bounded per axis by `max_wind`.
pub struct WindAgent {
    family: Family,
    key: ChannelKey<Vec2>,
    wind: Vec2,
    max_wind: f64,
    step: f64,
    rng: ChaCha8Rng,
}

impl WindAgent {
    pub fn new(
        family: Family,
        key: ChannelKey<Vec2>,
        max_wind: f64,
        step: f64,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            family,
            key,
            wind: Vec2::ZERO,
            max_wind,
            step,
            rng,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn wind(&self) -> Vec2 {
        self.wind
    }

    fn advance(&mut self) -> Vec2 {
        let nudge = Vec2::new(
            self.rng.random_f64(-self.step, self.step),
            self.rng.random_f64(-self.step, self.step),
        );
        self.wind = (self.wind + nudge).clamp_axes(self.max_wind);
        self.wind
    }
}

impl Behavior for WindAgent {
    fn name(&self) -> &str {
        "wind"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        let wind = self.advance();
        cx.emit(self.key, wind);
        Yield::NextRound
    }
}
