//! The agent-facing side of the kernel: the `Behavior` state machine and the
//! contexts handed to it in each phase of a round.

use super::channel::{Bus, ChannelKey, Emission};
use super::task::TaskId;

/// What a behavior waits for after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    /// Suspend until this round's channels resolve, then `resume`.
    Await,
    /// Done for this round; `publish` again on the next heartbeat.
    NextRound,
    /// Leave the live set for good.
    Terminate,
}

/// An agent driven by the round scheduler.
///
/// Each round the scheduler calls `publish` on every ready task. A task that
/// yields [`Yield::Await`] gets `resume` once every task has published and the
/// channels are resolved.
pub trait Behavior: Send {
    fn name(&self) -> &str;

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield;

    fn resume(&mut self, _cx: &mut ResumeCx<'_>) -> Yield {
        Yield::NextRound
    }
}

/// Emissions and spawns a task made during one step, held until the barrier.
#[derive(Default)]
pub struct Outbox {
    pub(crate) emissions: Vec<Emission>,
    pub(crate) spawns: Vec<Box<dyn Behavior>>,
}

/// Context for the publish phase. Channel reads see the last resolved round.
pub struct PublishCx<'a> {
    round: u64,
    task: TaskId,
    bus: &'a Bus,
    outbox: &'a mut Outbox,
}

impl<'a> PublishCx<'a> {
    pub(crate) fn new(round: u64, task: TaskId, bus: &'a Bus, outbox: &'a mut Outbox) -> Self {
        Self {
            round,
            task,
            bus,
            outbox,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn emit<V: Send + 'static>(&mut self, key: ChannelKey<V>, value: V) {
        self.outbox.emissions.push(Emission::new(key, value));
    }

    /// Value of `key` from the last fully resolved round.
    pub fn latest<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> &'a V {
        self.bus.observe(key)
    }

    pub fn spawn(&mut self, behavior: impl Behavior + 'static) {
        self.outbox.spawns.push(Box::new(behavior));
    }
}

/// Context for the resume phase. Channel reads see this round's resolved fold.
pub struct ResumeCx<'a> {
    round: u64,
    task: TaskId,
    bus: &'a Bus,
    outbox: &'a mut Outbox,
}

impl<'a> ResumeCx<'a> {
    pub(crate) fn new(round: u64, task: TaskId, bus: &'a Bus, outbox: &'a mut Outbox) -> Self {
        Self {
            round,
            task,
            bus,
            outbox,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn read<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> &'a V {
        self.bus.observe(key)
    }

    /// Queue a new task. It joins the live set at the end of this round.
    pub fn spawn(&mut self, behavior: impl Behavior + 'static) {
        self.outbox.spawns.push(Box::new(behavior));
    }
}
