pub mod catalog;
pub mod feedback;
pub mod linear;
pub mod navigation;
pub mod reward;
pub mod shell;
pub mod timed;
pub mod timer;

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;

pub type ChoiceId = u32;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: u32,
    pub text: String,
    /// Emoji or audio label shown next to the prompt
    #[serde(default)]
    pub media: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub correct_feedback: Option<String>,
    #[serde(default)]
    pub incorrect_feedback: Option<String>,
    /// Coins for answering this question correctly, overriding the screen-wide reward
    #[serde(default)]
    pub reward: Option<u32>,
}

impl Question {
    pub fn new(id: u32, text: String, choices: Vec<Choice>) -> Self {
        Self {
            id,
            text,
            choices,
            ..Default::default()
        }
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }

    /// Finds the choice a keyboard button stands for. Both the bare label and
    /// the emoji-prefixed button text are accepted.
    pub fn choice_by_text(&self, text: &str) -> Option<&Choice> {
        let text = text.trim();
        self.choices
            .iter()
            .find(|c| c.button_text() == text || c.label == text)
    }

    #[cfg(test)]
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.is_correct)
    }

    pub fn feedback_text(&self, is_correct: bool) -> Option<&str> {
        if is_correct {
            self.correct_feedback.as_deref()
        } else {
            self.incorrect_feedback.as_deref()
        }
    }

    /// Copy of this question with its choices in random order.
    pub fn shuffled(&self) -> Self {
        let mut question = self.clone();
        question.choices.shuffle(&mut rand::thread_rng());
        question
    }

    /// Authoring problems in this question. Gameplay never fails on these;
    /// they are reported so the content can be fixed.
    pub fn content_issues(&self) -> Vec<ContentIssue> {
        let mut issues = Vec::new();
        if self.choices.is_empty() {
            issues.push(ContentIssue::NoChoices);
            return issues;
        }

        let correct = self.choices.iter().filter(|c| c.is_correct).count();
        match correct {
            0 => issues.push(ContentIssue::NoCorrectChoice),
            1 => {}
            n => issues.push(ContentIssue::SeveralCorrectChoices(n)),
        }

        let mut seen = HashSet::new();
        for choice in &self.choices {
            if !seen.insert(choice.id) {
                issues.push(ContentIssue::DuplicateChoiceId(choice.id));
            }
        }
        issues
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub label: String,
    #[serde(default)]
    pub emoji: Option<String>,
    pub is_correct: bool,
}

impl Choice {
    pub fn new(id: ChoiceId, label: String, is_correct: bool) -> Self {
        Self {
            id,
            label,
            emoji: None,
            is_correct,
        }
    }

    pub fn with_emoji(mut self, emoji: &str) -> Self {
        self.emoji = Some(emoji.to_string());
        self
    }

    pub fn button_text(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji, self.label),
            None => self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentIssue {
    NoChoices,
    NoCorrectChoice,
    SeveralCorrectChoices(usize),
    DuplicateChoiceId(ChoiceId),
}

impl fmt::Display for ContentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentIssue::NoChoices => write!(f, "question has no choices"),
            ContentIssue::NoCorrectChoice => write!(f, "no choice is marked correct"),
            ContentIssue::SeveralCorrectChoices(n) => {
                write!(f, "{} choices are marked correct", n)
            }
            ContentIssue::DuplicateChoiceId(id) => write!(f, "choice id {} is used twice", id),
        }
    }
}

/// Score and coins collected during one play-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionTotals {
    pub score: u32,
    pub coins: u32,
}

impl SessionTotals {
    pub fn record_correct(&mut self, coins: u32) {
        self.score += 1;
        self.coins += coins;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Percentage of correct answers, rounded to the nearest integer.
pub fn accuracy(score: u32, total_rounds: usize) -> u32 {
    if total_rounds == 0 {
        return 0;
    }
    (score as f64 / total_rounds as f64 * 100.0).round() as u32
}
