use std::env;
use std::path::PathBuf;

pub const DEFAULT_CATALOG_PATH: &str = "games.json";
pub const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";

/// Settings read from the environment (and `.env`). The bot token itself is
/// picked up by teloxide from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub dialogue_db: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            catalog_path: non_empty("GAMES_CATALOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            dialogue_db: non_empty("DIALOGUE_DB").unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
        }
    }
}
