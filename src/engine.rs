//! Simulation driver: builds the agents from a scenario and runs rounds
//! against an input source and a renderer.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::agents::{FlockChannels, PopulationManager, WindAgent};
use crate::config::{ConfigError, SimConfig};
use crate::flock::{Boid, Bounds, Family};
use crate::io::{InputSource, Key, Renderer, Sprite};
use crate::kernel::{RoundStats, Scheduler};
use crate::rng::RngManager;

/// Result of a single round
#[derive(Clone, Debug)]
pub struct RoundSummary {
    pub round: u64,
    pub population: usize,
    pub stats: RoundStats,
    pub quit_requested: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { rounds: u64 },
    Quit { round: u64 },
}

impl RunOutcome {
    pub fn rounds(self) -> u64 {
        match self {
            RunOutcome::Completed { rounds } => rounds,
            RunOutcome::Quit { round } => round,
        }
    }
}

pub struct Simulation {
    name: String,
    scheduler: Scheduler,
    channels: Arc<FlockChannels>,
    bounds: Bounds,
    quit_requested: bool,
}

impl Simulation {
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = RngManager::new(config.random_seed);
        let mut scheduler = Scheduler::new(config.workers);
        let channels = Arc::new(FlockChannels::register(
            scheduler.bus_mut(),
            config.wind.max_family,
        ));
        let params = Arc::new(config.flock_params());

        for (index, key) in channels.wind.iter().enumerate() {
            scheduler.spawn(WindAgent::new(
                Family(index as i32),
                *key,
                config.wind.max_wind,
                config.wind.step,
                rng.stream(&format!("wind/{index}")),
            ));
        }

        let mut population = PopulationManager::new(
            config.spawn.policy,
            channels.clone(),
            params.clone(),
            rng.stream("population"),
        );
        if config.predator {
            scheduler.spawn(population.spawn_predator(config.bounds.center()));
        }
        let mut placement = rng.stream("placement");
        for agent in population.seed(
            config.initial_population,
            &mut placement,
            config.flocking.initial_speed,
        ) {
            scheduler.spawn(agent);
        }
        scheduler.spawn(population);

        info!(
            scenario = %config.name,
            seed = config.random_seed,
            boids = config.initial_population,
            predator = config.predator,
            families = config.wind.max_family,
            workers = scheduler.workers(),
            "simulation ready"
        );

        Ok(Self {
            name: config.name.clone(),
            scheduler,
            channels,
            bounds: config.bounds,
            quit_requested: false,
        })
    }

    /// Sample input, run one round and hand the frame to `renderer`.
    pub fn step(
        &mut self,
        input: &mut dyn InputSource,
        renderer: &mut dyn Renderer,
    ) -> Result<RoundSummary> {
        let round = self.scheduler.round() + 1;
        let sample = input.sample(round).bounded(&self.bounds);
        let channels = &self.channels;
        let stats = self.scheduler.run_round(|bus| {
            if sample.click.is_some() {
                bus.emit(channels.click, sample.click);
            }
            if sample.cursor.is_some() {
                bus.emit(channels.cursor, sample.cursor);
            }
            if sample.key.is_some() {
                bus.emit(channels.key, sample.key);
            }
        });

        let snapshot = self.snapshot();
        let sprites: Vec<Sprite> = snapshot.iter().map(Sprite::from_boid).collect();
        renderer.draw(stats.round, &sprites)?;

        if sample.key == Some(Key::Quit) {
            info!(round = stats.round, "quit requested");
            self.quit_requested = true;
        }
        debug!(round = stats.round, population = sprites.len(), "frame drawn");

        Ok(RoundSummary {
            round: stats.round,
            population: sprites.len(),
            stats,
            quit_requested: self.quit_requested,
        })
    }

    /// Run until `rounds` rounds have passed or a quit key arrives. With no
    /// limit the run only ends on quit.
    pub fn run(
        &mut self,
        rounds: Option<u64>,
        input: &mut dyn InputSource,
        renderer: &mut dyn Renderer,
    ) -> Result<RunOutcome> {
        let mut completed = 0;
        let outcome = loop {
            if rounds.is_some_and(|limit| completed >= limit) {
                break RunOutcome::Completed { rounds: completed };
            }
            let summary = self.step(input, renderer)?;
            completed += 1;
            if summary.quit_requested {
                break RunOutcome::Quit {
                    round: summary.round,
                };
            }
        };
        renderer.finish()?;
        info!(scenario = %self.name, ?outcome, "run finished");
        Ok(outcome)
    }

    /// Number of completed rounds.
    pub fn round(&self) -> u64 {
        self.scheduler.round()
    }

    /// The population as resolved by the last round, ordered by id.
    pub fn snapshot(&self) -> &[Boid] {
        self.scheduler.bus().observe(self.channels.snapshot).as_slice()
    }

    pub fn channels(&self) -> &FlockChannels {
        &self.channels
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}
