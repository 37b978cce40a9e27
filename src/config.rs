//! Runtime configuration for the Gridfall server.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug)]
pub struct Settings {
    /// Bind address for the HTTP + WS server.
    pub server_addr: String,
    /// Board dimensions.
    pub board_rows: i32,
    pub board_cols: i32,
    /// Seconds players get to lock their decisions each round.
    pub decision_deadline_secs: u64,
    /// Maximum cards held in hand; upkeep draws up to this.
    pub hand_limit: usize,
    /// Starting (and maximum) command center health.
    pub command_center_health: i32,
    /// Self-damage applied when a seat reshuffles its discard pile.
    pub deck_exhaustion_penalty: i32,
    /// Rounds a command center holds a level before upgrading.
    pub upgrade_cadence: u32,
    /// Gold each seat starts with.
    pub starting_gold: u32,
    /// Gold storage cap.
    pub max_gold: u32,
}

impl Settings {
    fn from_env() -> Self {
        Settings {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            board_rows: env_parse("BOARD_ROWS", 12),
            board_cols: env_parse("BOARD_COLS", 12),
            decision_deadline_secs: env_parse("DECISION_DEADLINE", 30),
            hand_limit: env_parse("HAND_LIMIT", 7),
            command_center_health: env_parse("COMMAND_CENTER_HEALTH", 100),
            deck_exhaustion_penalty: env_parse("DECK_EXHAUSTION_PENALTY", 25),
            upgrade_cadence: env_parse("UPGRADE_CADENCE", 3),
            starting_gold: env_parse("STARTING_GOLD", 3),
            max_gold: env_parse("MAX_GOLD", 20),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
