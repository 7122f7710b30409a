//! Round scheduler - drives every live task through lock-step rounds.
//!
//! A round is RESET, RUN, BARRIER, RESOLVE, RESUME, ADMIT. Emissions made
//! during RUN are buffered per task and folded into the bus in slot order after
//! the barrier, so the resolved values do not depend on how tasks were
//! interleaved or spread across workers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::behavior::{Behavior, Outbox, PublishCx, ResumeCx, Yield};
use super::channel::{combine, Bus, ChannelKey};
use super::task::{Task, TaskArena, TaskId, TaskState};

/// Statistics for a single round
#[derive(Debug, Clone)]
pub struct RoundStats {
    pub round: u64,
    pub live_tasks: usize,
    pub emissions: usize,
    pub admitted: usize,
    pub terminated: usize,
    pub duration: Duration,
}

struct Outcome {
    id: TaskId,
    yielded: Yield,
    outbox: Outbox,
}

pub struct Scheduler {
    bus: Bus,
    tasks: TaskArena,
    heartbeat: ChannelKey<()>,
    round: u64,
    workers: usize,
    stats_history: VecDeque<RoundStats>,
    max_stats_history: usize,
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        let mut bus = Bus::new();
        let heartbeat = bus.register("step", (), combine::presence);
        Self {
            bus,
            tasks: TaskArena::new(),
            heartbeat,
            round: 0,
            workers: workers.max(1),
            stats_history: VecDeque::new(),
            max_stats_history: 100,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable access for registering channels before the first round.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// The "step" channel, emitted once at the start of every round. Tasks
    /// parked on `Yield::NextRound` are woken by the round start itself, so
    /// nothing has to read it; it is a record that the round began.
    pub fn heartbeat(&self) -> ChannelKey<()> {
        self.heartbeat
    }

    /// Number of completed rounds.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &TaskArena {
        &self.tasks
    }

    /// Admit a task between rounds. It publishes in the next round.
    pub fn spawn(&mut self, behavior: impl Behavior + 'static) -> TaskId {
        self.tasks.insert(Box::new(behavior))
    }

    /// Run one full round. `inject` runs right after the reset and is where
    /// external input enters the channels.
    pub fn run_round(&mut self, inject: impl FnOnce(&mut Bus)) -> RoundStats {
        let round_start = Instant::now();
        let round = self.round + 1;
        let live_tasks = self.tasks.len();

        self.bus.reset_all();
        self.bus.emit(self.heartbeat, ());
        inject(&mut self.bus);

        let published = {
            let bus = &self.bus;
            drive(
                &mut self.tasks,
                TaskState::Ready,
                self.workers,
                |id, behavior, outbox| behavior.publish(&mut PublishCx::new(round, id, bus, outbox)),
            )
        };

        let mut admissions = Vec::new();
        let mut terminated = 0;
        for outcome in published {
            for emission in outcome.outbox.emissions {
                let channel = emission.channel();
                if let Err(err) = self.bus.deliver(emission) {
                    warn!(task = %outcome.id, channel, "dropping emission: {err}");
                }
            }
            admissions.extend(outcome.outbox.spawns);
            terminated += self.settle(outcome.id, outcome.yielded, true);
        }
        let emissions = self.bus.total_emissions();

        self.bus.resolve_all();

        let resumed = {
            let bus = &self.bus;
            drive(
                &mut self.tasks,
                TaskState::Awaiting,
                self.workers,
                |id, behavior, outbox| behavior.resume(&mut ResumeCx::new(round, id, bus, outbox)),
            )
        };
        for outcome in resumed {
            admissions.extend(outcome.outbox.spawns);
            terminated += self.settle(outcome.id, outcome.yielded, false);
        }

        let admitted = admissions.len();
        for behavior in admissions {
            self.tasks.insert(behavior);
        }

        self.round = round;
        let stats = RoundStats {
            round,
            live_tasks,
            emissions,
            admitted,
            terminated,
            duration: round_start.elapsed(),
        };
        debug!(
            round,
            live_tasks,
            emissions,
            admitted,
            terminated,
            elapsed_us = stats.duration.as_micros() as u64,
            "round complete"
        );

        self.stats_history.push_back(stats.clone());
        if self.stats_history.len() > self.max_stats_history {
            self.stats_history.pop_front();
        }

        stats
    }

    /// Run `rounds` rounds with no external input.
    pub fn run(&mut self, rounds: u64) {
        for _ in 0..rounds {
            self.run_round(|_| {});
        }
    }

    /// Get recent round statistics
    pub fn recent_stats(&self) -> impl Iterator<Item = &RoundStats> {
        self.stats_history.iter()
    }

    /// Get average round time from recent history
    pub fn average_round_time(&self) -> Option<Duration> {
        if self.stats_history.is_empty() {
            return None;
        }

        let total: Duration = self.stats_history.iter().map(|s| s.duration).sum();
        Some(total / self.stats_history.len() as u32)
    }

    /// Apply a task's yield. Returns 1 if the task terminated.
    fn settle(&mut self, id: TaskId, yielded: Yield, publishing: bool) -> usize {
        match yielded {
            Yield::Await if publishing => self.tasks.set_state(id, TaskState::Awaiting),
            Yield::Await => {
                debug!(task = %id, "await after resume has nothing left to wait for");
                self.tasks.set_state(id, TaskState::Ready);
            }
            Yield::NextRound => self.tasks.set_state(id, TaskState::Ready),
            Yield::Terminate => {
                if let Some(behavior) = self.tasks.remove(id) {
                    debug!(task = %id, name = behavior.name(), "task terminated");
                    return 1;
                }
            }
        }
        0
    }
}

/// Step every task in `phase`, on up to `workers` scoped threads. Outcomes come
/// back in slot order regardless of the worker count.
fn drive<F>(tasks: &mut TaskArena, phase: TaskState, workers: usize, step: F) -> Vec<Outcome>
where
    F: Fn(TaskId, &mut (dyn Behavior + 'static), &mut Outbox) -> Yield + Sync,
{
    let mut selected: Vec<&mut Task> = tasks.iter_mut().filter(|task| task.state == phase).collect();

    let run = |chunk: &mut [&mut Task]| -> Vec<Outcome> {
        chunk
            .iter_mut()
            .map(|task| {
                let mut outbox = Outbox::default();
                let yielded = step(task.id, task.behavior.as_mut(), &mut outbox);
                Outcome {
                    id: task.id,
                    yielded,
                    outbox,
                }
            })
            .collect()
    };

    if workers <= 1 || selected.len() < 2 {
        return run(selected.as_mut_slice());
    }

    let chunk_size = selected.len().div_ceil(workers);
    let run = &run;
    std::thread::scope(|scope| {
        let handles: Vec<_> = selected
            .chunks_mut(chunk_size)
            .map(|chunk| scope.spawn(move || run(chunk)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(outcomes) => outcomes,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}
