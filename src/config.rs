use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TICKS: u64 = 600;
pub const DEFAULT_TICK_MILLIS: u64 = 0;
pub const DEFAULT_NPC_TICKS_PER_STEADY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub root: PathBuf,
    /// Steady ticks to run before exiting.
    pub ticks: u64,
    pub tick_interval: Duration,
    pub npc_ticks_per_steady: u32,
    pub seed: u64,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        Self::from_args_with(args, |key| std::env::var(key).ok())
    }

    fn from_args_with(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: tileworld <content-root> [ticks]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let ticks = if args.len() > 2 {
            args[2]
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid tick count '{}'", args[2]))?
        } else {
            env_number(&env, "WORLD_TICKS").unwrap_or(DEFAULT_TICKS)
        };
        let tick_millis = env_number(&env, "WORLD_TICK_MILLIS").unwrap_or(DEFAULT_TICK_MILLIS);
        let npc_ticks_per_steady = env_number(&env, "WORLD_NPC_TICKS_PER_STEADY")
            .and_then(|value| u32::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_NPC_TICKS_PER_STEADY);
        let seed = env_number(&env, "WORLD_SEED").unwrap_or_else(clock_seed);

        Ok(Self {
            root,
            ticks,
            tick_interval: Duration::from_millis(tick_millis),
            npc_ticks_per_steady,
            seed,
        })
    }
}

fn env_number(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let value = env(key)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("tileworld: invalid {} '{}', using default", key, value);
            None
        }
    }
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
