use std::sync::Arc;

use flockstep::agents::{merge_by_id, BoidAgent, FlockChannels};
use flockstep::flock::{Boid, Family, FlockParams};
use flockstep::kernel::{
    Behavior, Broadcast, ChannelKey, PublishCx, ResumeCx, Scheduler, TaskState, Yield,
};
use flockstep::Vec2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Publishes a boid with a fixed id every round.
struct Publisher {
    id: u64,
    snapshot: ChannelKey<Vec<Boid>>,
}

impl Publisher {
    fn new(id: u64, snapshot: ChannelKey<Vec<Boid>>) -> Self {
        Self { id, snapshot }
    }
}

impl Behavior for Publisher {
    fn name(&self) -> &str {
        "publisher"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        let boid = Boid::new(self.id, Family::DEFAULT, Vec2::new(self.id as f64, 0.0));
        cx.emit(self.snapshot, vec![boid]);
        Yield::Await
    }

    fn resume(&mut self, cx: &mut ResumeCx<'_>) -> Yield {
        let snapshot = cx.read(self.snapshot);
        assert!(
            snapshot.iter().any(|boid| boid.id == self.id),
            "resumed before its own emission resolved"
        );
        Yield::NextRound
    }
}

fn snapshot_scheduler(workers: usize) -> (Scheduler, ChannelKey<Vec<Boid>>) {
    let mut scheduler = Scheduler::new(workers);
    let snapshot = scheduler
        .bus_mut()
        .register("snapshot", Vec::new(), merge_by_id);
    (scheduler, snapshot)
}

fn ids(boids: &[Boid]) -> Vec<u64> {
    boids.iter().map(|boid| boid.id).collect()
}

#[test]
fn snapshot_fold_ignores_emission_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let boids: Vec<Boid> = (0..40)
        .map(|id| Boid::new(id, Family(id as i32 % 3), Vec2::new(id as f64, -(id as f64))))
        .collect();

    let mut reference = Broadcast::new("snapshot", Vec::new(), merge_by_id);
    for boid in &boids {
        reference.emit(vec![boid.clone()]);
    }
    reference.resolve();

    for _ in 0..25 {
        let mut shuffled = boids.clone();
        shuffled.shuffle(&mut rng);
        let mut channel = Broadcast::new("snapshot", Vec::new(), merge_by_id);
        for boid in shuffled {
            channel.emit(vec![boid]);
        }
        channel.resolve();
        assert_eq!(channel.observe(), reference.observe());
    }
}

#[test]
fn snapshot_is_independent_of_spawn_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut order: Vec<u64> = (0..16).collect();

    let mut results = Vec::new();
    for _ in 0..5 {
        order.shuffle(&mut rng);
        let (mut scheduler, snapshot) = snapshot_scheduler(1);
        for &id in &order {
            scheduler.spawn(Publisher::new(id, snapshot));
        }
        scheduler.run(2);
        results.push(scheduler.bus().observe(snapshot).clone());
    }

    assert_eq!(ids(&results[0]), (0..16).collect::<Vec<_>>());
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

/// Emits into a sum channel on one chosen round only.
struct OneShot {
    key: ChannelKey<i64>,
    fire_on: u64,
}

impl Behavior for OneShot {
    fn name(&self) -> &str {
        "one-shot"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        if cx.round() == self.fire_on {
            cx.emit(self.key, 10);
        }
        Yield::NextRound
    }
}

#[test]
fn values_do_not_leak_into_the_next_round() {
    let mut scheduler = Scheduler::new(1);
    let key = scheduler.bus_mut().register("sum", 0_i64, |a, b| a + b);
    scheduler.spawn(OneShot { key, fire_on: 2 });

    let mut after_reset = Vec::new();
    let mut resolved = Vec::new();
    for _ in 0..4 {
        scheduler.run_round(|bus| after_reset.push(*bus.pending(key)));
        resolved.push(*scheduler.bus().observe(key));
    }

    assert_eq!(after_reset, vec![0, 0, 0, 0]);
    assert_eq!(resolved, vec![0, 10, 0, 0]);
}

#[test]
fn resolve_freezes_the_fold_and_clears_pending() {
    let mut scheduler = Scheduler::new(1);
    let key = scheduler.bus_mut().register("sum", 0_i64, |a, b| a + b);
    for _ in 0..2 {
        scheduler.spawn(OneShot { key, fire_on: 1 });
    }

    scheduler.run(1);
    assert_eq!(*scheduler.bus().observe(key), 20);
    assert_eq!(*scheduler.bus().pending(key), 0);
}

/// Spawns one publisher during the resume of `spawn_on`.
struct Spawner {
    snapshot: ChannelKey<Vec<Boid>>,
    spawn_on: u64,
}

impl Behavior for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn publish(&mut self, _cx: &mut PublishCx<'_>) -> Yield {
        Yield::Await
    }

    fn resume(&mut self, cx: &mut ResumeCx<'_>) -> Yield {
        if cx.round() == self.spawn_on {
            cx.spawn(Publisher::new(99, self.snapshot));
        }
        Yield::NextRound
    }
}

#[test]
fn spawned_tasks_join_next_round() {
    let (mut scheduler, snapshot) = snapshot_scheduler(1);
    scheduler.spawn(Publisher::new(1, snapshot));
    scheduler.spawn(Spawner {
        snapshot,
        spawn_on: 2,
    });

    let first = scheduler.run_round(|_| {});
    assert_eq!(first.admitted, 0);
    assert_eq!(ids(scheduler.bus().observe(snapshot).as_slice()), vec![1]);

    let second = scheduler.run_round(|_| {});
    assert_eq!(second.admitted, 1);
    assert_eq!(
        ids(scheduler.bus().observe(snapshot).as_slice()),
        vec![1],
        "a task spawned in round k is not part of round k"
    );
    assert_eq!(scheduler.live_tasks(), 3);

    scheduler.run_round(|_| {});
    assert_eq!(ids(scheduler.bus().observe(snapshot).as_slice()), vec![1, 99]);
}

/// Terminates after a fixed number of rounds.
struct Mayfly {
    rounds_left: u32,
}

impl Behavior for Mayfly {
    fn name(&self) -> &str {
        "mayfly"
    }

    fn publish(&mut self, _cx: &mut PublishCx<'_>) -> Yield {
        if self.rounds_left == 0 {
            return Yield::Terminate;
        }
        self.rounds_left -= 1;
        Yield::NextRound
    }
}

#[test]
fn terminated_tasks_free_their_slot() {
    let mut scheduler = Scheduler::new(1);
    let short = scheduler.spawn(Mayfly { rounds_left: 1 });
    let long = scheduler.spawn(Mayfly { rounds_left: 10 });
    assert_eq!(scheduler.tasks().state(short), Some(TaskState::Ready));

    scheduler.run_round(|_| {});
    assert!(scheduler.tasks().contains(short));
    let stats = scheduler.run_round(|_| {});
    assert_eq!(stats.terminated, 1);
    assert!(!scheduler.tasks().contains(short));
    assert!(scheduler.tasks().contains(long));
    assert_eq!(scheduler.live_tasks(), 1);

    let reused = scheduler.spawn(Mayfly { rounds_left: 3 });
    assert_eq!(reused.index(), short.index());
    assert_ne!(reused.generation(), short.generation());
    assert!(!scheduler.tasks().contains(short));
    assert_eq!(scheduler.tasks().name(reused), Some("mayfly"));
}

#[test]
fn worker_threads_resolve_like_a_single_thread() {
    let run = |workers: usize| {
        let (mut scheduler, snapshot) = snapshot_scheduler(workers);
        let sum = scheduler.bus_mut().register("sum", 0_i64, |a, b| a + b);
        for id in (0..50).rev() {
            scheduler.spawn(Publisher::new(id, snapshot));
        }
        for round in 1..=5 {
            scheduler.spawn(OneShot {
                key: sum,
                fire_on: round,
            });
        }
        let mut history = Vec::new();
        for _ in 0..6 {
            let stats = scheduler.run_round(|_| {});
            history.push((
                stats.emissions,
                scheduler.bus().observe(snapshot).clone(),
                *scheduler.bus().observe(sum),
            ));
        }
        history
    };

    let sequential = run(1);
    assert_eq!(sequential, run(4));
    assert_eq!(sequential, run(7));
}

/// Blows a constant wind on one family every round.
struct SteadyWind {
    key: ChannelKey<Vec2>,
    force: Vec2,
}

impl Behavior for SteadyWind {
    fn name(&self) -> &str {
        "steady-wind"
    }

    fn publish(&mut self, cx: &mut PublishCx<'_>) -> Yield {
        cx.emit(self.key, self.force);
        Yield::NextRound
    }
}

#[test]
fn boids_feel_wind_one_round_late() {
    let mut scheduler = Scheduler::new(1);
    let channels = Arc::new(FlockChannels::register(scheduler.bus_mut(), 2));
    let params = Arc::new(FlockParams {
        dt: 1.0,
        vmax: 100.0,
        ..FlockParams::default()
    });
    let wind = channels.wind_for(Family::DEFAULT).unwrap();
    scheduler.spawn(SteadyWind {
        key: wind,
        force: Vec2::new(4.0, 0.0),
    });
    scheduler.spawn(BoidAgent::new(
        Boid::new(1, Family::DEFAULT, Vec2::ZERO),
        Arc::clone(&channels),
        params,
    ));

    let velocity = |scheduler: &Scheduler| scheduler.bus().observe(channels.snapshot)[0].velocity;

    scheduler.run_round(|_| {});
    assert_eq!(*scheduler.bus().observe(wind), Vec2::new(4.0, 0.0));
    assert_eq!(velocity(&scheduler), Vec2::ZERO);

    // round 1 stepped before any wind had resolved
    scheduler.run_round(|_| {});
    assert_eq!(velocity(&scheduler), Vec2::ZERO);

    // round 2 stepped with round 1's wind: (3*0 + 0 + 4) / 4
    scheduler.run_round(|_| {});
    let boid = &scheduler.bus().observe(channels.snapshot)[0];
    assert_eq!(boid.velocity, Vec2::new(1.0, 0.0));
    assert_eq!(boid.position, Vec2::ZERO);
}

struct Bomb;

impl Behavior for Bomb {
    fn name(&self) -> &str {
        "bomb"
    }

    fn publish(&mut self, _cx: &mut PublishCx<'_>) -> Yield {
        panic!("boom");
    }
}

#[test]
#[should_panic(expected = "boom")]
fn worker_panics_reach_the_caller() {
    let mut scheduler = Scheduler::new(2);
    scheduler.spawn(Mayfly { rounds_left: 5 });
    scheduler.spawn(Bomb);
    scheduler.run_round(|_| {});
}
