pub mod config;
pub mod content;
pub mod entities;
pub mod error;
pub mod telemetry;
pub mod world;

pub use error::{WorldError, WorldResult};

use content::ContentIndex;
use world::context::MapContext;
use world::registry::WorldMaps;

/// Headless driver: loads the content root, ticks every map and writes the
/// persistable spawner counters back on exit.
pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&config.root)?;
    let content = ContentIndex::load(&config.root).map_err(|err| err.to_string())?;

    let mut world: WorldMaps = WorldMaps::new(MapContext::default());
    world
        .load_all(&content, config.seed)
        .map_err(|err| err.to_string())?;

    println!("tileworld: content loaded");
    println!("- root: {}", config.root.display());
    println!("- npc templates: {}", content.npcs.len());
    println!("- spawner templates: {}", content.spawners.len());
    println!("- maps: {}", world.len());
    println!("- seed: {}", config.seed);

    let mut staged = 0usize;
    for tick in 0..config.ticks {
        for _ in 0..config.npc_ticks_per_steady {
            world.npc_tick();
        }
        world.steady_tick();
        for name in world.map_names().into_iter().map(str::to_string).collect::<Vec<_>>() {
            if let Some(map) = world.get_mut(&name) {
                staged += map.views_mut().drain().len();
            }
        }
        if tick > 0 && tick % 100 == 0 {
            log::info!("tick {}: views staged so far {}", tick, staged);
        }
        if !config.tick_interval.is_zero() {
            std::thread::sleep(config.tick_interval);
        }
    }

    for name in world.map_names() {
        if let Some(map) = world.get(name) {
            println!(
                "- map {}: npcs={}, spawners={}, players={}",
                name,
                map.npc_count(),
                map.spawners().len(),
                map.player_count()
            );
        }
    }

    let saved = world.serializable_spawners();
    content::save_spawners(&config.root, &saved).map_err(|err| err.to_string())?;
    log::info!(
        "shutdown after {} ticks, saved spawners for {} maps",
        config.ticks,
        saved.len()
    );
    Ok(())
}
