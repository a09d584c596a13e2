//! Stormkeep - headless demo driver
//!
//! Spawns a small scenario (units, resource nodes, a depot), feeds the
//! pipeline seeded random intents, runs the tick loop and prints a summary.
//! Useful for watching the pipeline under load without any client attached.

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use stormkeep::core::config::SimConfig;
use stormkeep::core::error::Result;
use stormkeep::core::types::{EntityId, ResourceKind, Vec2};
use stormkeep::diagnostics;
use stormkeep::intent::catalog::{IntentKind, ParamKey, ParamValue, Params};
use stormkeep::service::providers::register_defaults;
use stormkeep::service::registry::ServiceRegistry;
use stormkeep::simulation::store::Stash;
use stormkeep::simulation::tick::{run_simulation_tick, SimulationEvent};
use stormkeep::simulation::world::World;

#[derive(Parser, Debug)]
#[command(name = "stormkeep", about = "Tick-driven strategy simulation core")]
struct Args {
    /// Number of ticks to run
    #[arg(long, default_value_t = 200)]
    ticks: u64,

    /// Number of mobile units to spawn
    #[arg(long, default_value_t = 12)]
    units: usize,

    /// RNG seed for the intent script (same seed, same run)
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Print the full diagnostics snapshot as JSON at the end
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stormkeep=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    // Make the effective config visible process-wide (diagnostics, tools)
    let _ = stormkeep::core::config::set_config(config.clone());

    tracing::info!(ticks = args.ticks, units = args.units, seed = args.seed, "starting");

    // Startup: register providers, then freeze before the first tick
    let mut registry = ServiceRegistry::new();
    register_defaults(&mut registry)?;
    registry.freeze();

    let mut world = World::new(config, std::sync::Arc::new(registry))?;

    // Scenario: units in a rough line, two resource nodes, one depot
    let units: Vec<EntityId> = (0..args.units)
        .map(|i| world.spawn_unit(Vec2::new(i as f32 * 4.0, 0.0)))
        .collect();

    let mut wood = Stash::default();
    wood.insert(ResourceKind::Wood, 500);
    let wood_node = world.spawn_node(Vec2::new(40.0, 30.0), wood);

    let mut stone = Stash::default();
    stone.insert(ResourceKind::Stone, 300);
    let stone_node = world.spawn_node(Vec2::new(-25.0, 50.0), stone);

    let depot = world.spawn_depot(Vec2::new(0.0, -20.0));

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut totals = EventTotals::default();

    for tick in 0..args.ticks {
        // A burst of orders every few ticks, like an AI controller would issue
        if tick % 5 == 0 {
            for _ in 0..rng.gen_range(1..=3) {
                let subject = units[rng.gen_range(0..units.len())];
                submit_random_intent(&world, &mut rng, subject, wood_node, stone_node, depot)?;
            }
        }

        let events = run_simulation_tick(&mut world)?;
        totals.absorb(&events);
    }

    println!("=== STORMKEEP RUN COMPLETE ===");
    println!("ticks:              {}", world.current_tick);
    println!("intents translated: {}", totals.translated);
    println!("intents cancelled:  {}", totals.intent_cancelled);
    println!("jobs completed:     {}", totals.completed);
    println!("jobs retried:       {}", totals.retried);
    println!("jobs failed:        {}", totals.failed);
    println!("deltas published:   {}", totals.deltas);

    if let Some(view) = world.presenter.project(depot) {
        println!("depot stash (as of tick {}): {:?}", view.as_of_tick, view.stash);
    }

    if args.json {
        println!("{}", diagnostics::snapshot_json(&world)?);
    }

    Ok(())
}

fn submit_random_intent(
    world: &World,
    rng: &mut ChaCha8Rng,
    subject: EntityId,
    wood_node: EntityId,
    stone_node: EntityId,
    depot: EntityId,
) -> Result<()> {
    let priority = rng.gen_range(0..10);
    let mut params = Params::default();

    let kind = match rng.gen_range(0..10) {
        0..=3 => {
            params.insert(
                ParamKey::Dest,
                ParamValue::Position(Vec2::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                )),
            );
            IntentKind::Move
        }
        4..=6 => {
            let (node, resource) = if rng.gen_bool(0.5) {
                (wood_node, ResourceKind::Wood)
            } else {
                (stone_node, ResourceKind::Stone)
            };
            params.insert(ParamKey::Target, ParamValue::Entity(node));
            params.insert(ParamKey::Resource, ParamValue::Resource(resource));
            params.insert(ParamKey::Amount, ParamValue::Amount(rng.gen_range(1..8)));
            IntentKind::Gather
        }
        _ => {
            params.insert(ParamKey::Target, ParamValue::Entity(depot));
            IntentKind::Haul
        }
    };

    world.submit_intent(subject, kind, params, priority)?;
    Ok(())
}

/// Running tally of events across the whole run
#[derive(Default)]
struct EventTotals {
    translated: usize,
    intent_cancelled: usize,
    completed: usize,
    retried: usize,
    failed: usize,
    deltas: usize,
}

impl EventTotals {
    fn absorb(&mut self, events: &[SimulationEvent]) {
        for event in events {
            match event {
                SimulationEvent::IntentTranslated { .. } => self.translated += 1,
                SimulationEvent::IntentCancelled { .. } => self.intent_cancelled += 1,
                SimulationEvent::JobCompleted { .. } => self.completed += 1,
                SimulationEvent::JobRetried { .. } => self.retried += 1,
                SimulationEvent::JobFailed { .. } => self.failed += 1,
                SimulationEvent::DeltaPublished { .. } => self.deltas += 1,
                SimulationEvent::JobStarted { .. } => {}
            }
        }
    }
}
