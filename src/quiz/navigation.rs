use super::reward::{RewardOverrides, RewardTriple};

/// Where a finished screen sends the player, with the reward values it hands on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NavigationTarget {
    pub screen: String,
    #[serde(default)]
    pub rewards: Option<RewardOverrides>,
}

impl NavigationTarget {
    pub fn to(screen: &str) -> Self {
        Self {
            screen: screen.to_string(),
            rewards: None,
        }
    }

    pub fn carrying(mut self, rewards: RewardTriple) -> Self {
        self.rewards = Some(rewards.into());
        self
    }
}
