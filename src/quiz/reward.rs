pub const DEFAULT_COINS_PER_LEVEL: u32 = 5;
pub const DEFAULT_TOTAL_COINS: u32 = 5;
pub const DEFAULT_TOTAL_XP: u32 = 10;

/// Reward values a game card or a navigation payload may carry. Any of them
/// can be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RewardOverrides {
    #[serde(default)]
    pub coins_per_level: Option<u32>,
    #[serde(default)]
    pub total_coins: Option<u32>,
    #[serde(default)]
    pub total_xp: Option<u32>,
}

/// The (coins-per-level, total-coins, total-xp) triple a screen works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RewardTriple {
    pub coins_per_level: u32,
    pub total_coins: u32,
    pub total_xp: u32,
}

impl Default for RewardTriple {
    fn default() -> Self {
        Self {
            coins_per_level: DEFAULT_COINS_PER_LEVEL,
            total_coins: DEFAULT_TOTAL_COINS,
            total_xp: DEFAULT_TOTAL_XP,
        }
    }
}

impl RewardTriple {
    /// Resolves every field on its own: the content lookup wins over the
    /// navigation payload, which wins over the defaults. Zero counts as absent.
    pub fn resolve(content: Option<&RewardOverrides>, payload: Option<&RewardOverrides>) -> Self {
        let defaults = Self::default();
        Self {
            coins_per_level: first_set(
                content.and_then(|r| r.coins_per_level),
                payload.and_then(|r| r.coins_per_level),
                defaults.coins_per_level,
            ),
            total_coins: first_set(
                content.and_then(|r| r.total_coins),
                payload.and_then(|r| r.total_coins),
                defaults.total_coins,
            ),
            total_xp: first_set(
                content.and_then(|r| r.total_xp),
                payload.and_then(|r| r.total_xp),
                defaults.total_xp,
            ),
        }
    }
}

impl From<RewardTriple> for RewardOverrides {
    fn from(triple: RewardTriple) -> Self {
        Self {
            coins_per_level: Some(triple.coins_per_level),
            total_coins: Some(triple.total_coins),
            total_xp: Some(triple.total_xp),
        }
    }
}

fn first_set(primary: Option<u32>, secondary: Option<u32>, default: u32) -> u32 {
    primary
        .filter(|v| *v != 0)
        .or(secondary.filter(|v| *v != 0))
        .unwrap_or(default)
}
