use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::{info, warn};

use super::linear::DEFAULT_LINEAR_REWARD;
use super::reward::RewardOverrides;
use super::timed::TimedRoundConfig;
use super::{ContentIssue, Question};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameMode {
    Linear {
        #[serde(default = "default_linear_reward")]
        reward_per_correct: u32,
    },
    Timed(TimedRoundConfig),
}

fn default_linear_reward() -> u32 {
    DEFAULT_LINEAR_REWARD
}

/// One screen: what it asks, how it plays, and where it leads.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GameDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub game_type: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub total_levels: u32,
    #[serde(default)]
    pub back_path: Option<String>,
    /// Game opened once this one is done
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub rewards: RewardOverrides,
    #[serde(default)]
    pub shuffle_choices: bool,
    pub mode: GameMode,
    pub questions: Vec<Question>,
}

impl GameDefinition {
    /// Questions as they should be played, with choices shuffled when the
    /// game asks for it.
    pub fn playable_questions(&self) -> Vec<Question> {
        if self.shuffle_choices {
            self.questions.iter().map(|q| q.shuffled()).collect()
        } else {
            self.questions.clone()
        }
    }

    pub fn content_issues(&self) -> Vec<(u32, ContentIssue)> {
        self.questions
            .iter()
            .flat_map(|q| q.content_issues().into_iter().map(move |issue| (q.id, issue)))
            .collect()
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Io(io::Error),
    Parse(serde_json::Error),
    Empty,
    DuplicateGame(String),
    /// A linear game without questions could never be finished
    NoQuestions(String),
    UnknownNext { game: String, next: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "failed to read the games catalog: {}", e),
            CatalogError::Parse(e) => write!(f, "failed to parse the games catalog: {}", e),
            CatalogError::Empty => write!(f, "the games catalog has no games"),
            CatalogError::DuplicateGame(id) => write!(f, "game '{}' is defined twice", id),
            CatalogError::NoQuestions(id) => write!(f, "linear game '{}' has no questions", id),
            CatalogError::UnknownNext { game, next } => {
                write!(f, "game '{}' leads to unknown game '{}'", game, next)
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(e) => Some(e),
            CatalogError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CatalogError {
    fn from(e: io::Error) -> Self {
        CatalogError::Io(e)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Parse(e)
    }
}

/// All playable games, looked up by id.
#[derive(Debug, Clone)]
pub struct GameCatalog {
    games: Vec<GameDefinition>,
}

impl GameCatalog {
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let games: Vec<GameDefinition> = serde_json::from_reader(reader)?;
        Self::new(games)
    }

    pub fn new(games: Vec<GameDefinition>) -> Result<Self, CatalogError> {
        if games.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids = HashSet::new();
        for game in &games {
            if !ids.insert(game.id.as_str()) {
                return Err(CatalogError::DuplicateGame(game.id.clone()));
            }
            // Timed games without rounds finish on start, linear ones would hang
            if matches!(game.mode, GameMode::Linear { .. }) && game.questions.is_empty() {
                return Err(CatalogError::NoQuestions(game.id.clone()));
            }
        }
        for game in &games {
            if let Some(next) = &game.next {
                if !ids.contains(next.as_str()) {
                    return Err(CatalogError::UnknownNext {
                        game: game.id.clone(),
                        next: next.clone(),
                    });
                }
            }
        }

        // Broken content is playable; it is reported for the authors to fix
        for game in &games {
            for (question, issue) in game.content_issues() {
                warn!("game '{}', question {}: {}", game.id, question, issue);
            }
        }

        info!("Loaded {} games", games.len());
        Ok(Self { games })
    }

    pub fn get(&self, id: &str) -> Option<&GameDefinition> {
        self.games.iter().find(|g| g.id == id)
    }

    pub fn by_title(&self, title: &str) -> Option<&GameDefinition> {
        self.games.iter().find(|g| g.title == title)
    }

    /// Reward values the catalog holds for a game.
    pub fn rewards_for(&self, id: &str) -> Option<&RewardOverrides> {
        self.get(id).map(|g| &g.rewards)
    }

    pub fn games(&self) -> &[GameDefinition] {
        &self.games
    }
}
