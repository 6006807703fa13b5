use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html;

use super::catalog::GameDefinition;
use super::feedback::GameFeedback;
use super::reward::RewardTriple;
use super::timed::{RoundOutcome, RoundRecord};
use super::Question;

/// Timed games celebrate a finish with at least this many correct rounds.
pub const CONFETTI_SCORE: u32 = 3;

/// Chrome shared by every screen, rendered as the header of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellView {
    pub title: String,
    pub subtitle: String,
    pub current_level: u32,
    pub total_levels: u32,
    pub score: u32,
    pub max_score: u32,
    pub rewards: RewardTriple,
    pub game_id: String,
    pub game_type: String,
    pub show_confetti: bool,
    pub show_game_over: bool,
    pub next_enabled: bool,
    pub flash_points: Option<u32>,
    pub show_answer_confetti: bool,
    pub back_path: Option<String>,
}

impl ShellView {
    pub fn for_game(game: &GameDefinition, rewards: RewardTriple) -> Self {
        Self {
            title: game.title.clone(),
            subtitle: game.subtitle.clone().unwrap_or_default(),
            current_level: game.level,
            total_levels: game.total_levels,
            score: 0,
            max_score: game.questions.len() as u32,
            rewards,
            game_id: game.id.clone(),
            game_type: game.game_type.clone(),
            show_confetti: false,
            show_game_over: false,
            next_enabled: false,
            flash_points: None,
            show_answer_confetti: false,
            back_path: game.back_path.clone(),
        }
    }

    pub fn with_feedback(mut self, feedback: &GameFeedback) -> Self {
        self.flash_points = feedback.flash_points();
        self.show_answer_confetti = feedback.show_answer_confetti();
        self
    }

    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "<b>{}</b> · <code>{}/{}</code>",
            html::escape(&self.title),
            html::escape(&self.game_type),
            html::escape(&self.game_id)
        )];
        if !self.subtitle.is_empty() {
            lines.push(format!("<i>{}</i>", html::escape(&self.subtitle)));
        }

        let mut stats = Vec::new();
        if self.total_levels > 0 {
            stats.push(format!("Level {}/{}", self.current_level, self.total_levels));
        }
        stats.push(format!("Score {}/{}", self.score, self.max_score));
        stats.push(format!(
            "🪙 {}/level · {} coins · {} XP",
            self.rewards.coins_per_level, self.rewards.total_coins, self.rewards.total_xp
        ));
        lines.push(stats.join(" · "));

        if let Some(points) = self.flash_points {
            lines.push(format!("✨ +{}", points));
        }
        if self.show_confetti || self.show_answer_confetti {
            lines.push("🎉🎉🎉".to_string());
        }
        if self.show_game_over {
            lines.push("🏁 <b>Game over!</b>".to_string());
        }
        if self.next_enabled {
            lines.push("➡️ Tap Next to continue".to_string());
        }
        if let Some(back) = &self.back_path {
            lines.push(format!("↩️ {}", html::escape(back)));
        }
        lines.join("\n")
    }
}

pub fn question_html(question: &Question) -> String {
    match &question.media {
        Some(media) => format!("{}\n<b>{}</b>", media, html::escape(&question.text)),
        None => format!("<b>{}</b>", html::escape(&question.text)),
    }
}

/// One line per played round: outcome, prompt and the answer given.
pub fn round_summary<'a>(
    history: &[RoundRecord],
    question: impl Fn(usize) -> Option<&'a Question>,
) -> String {
    history
        .iter()
        .map(|record| {
            let icon = match record.outcome {
                RoundOutcome::Correct => "✅",
                RoundOutcome::Incorrect => "❌",
                RoundOutcome::TimedOut => "⏰",
            };
            let question = question(record.round);
            let prompt = question.map(|q| html::escape(&q.text)).unwrap_or_default();
            let answer = record
                .choice
                .and_then(|id| question.and_then(|q| q.choice(id)))
                .map(|c| html::escape(&c.button_text()))
                .unwrap_or_else(|| "no answer".to_string());
            format!("{} {}. {} · <i>{}</i>", icon, record.round + 1, prompt, answer)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One row per choice, followed by a row with the `extra` buttons.
pub fn choice_keyboard(question: &Question, extra: &[&str]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = question
        .choices
        .iter()
        .map(|c| vec![KeyboardButton::new(c.button_text())])
        .collect();
    if !extra.is_empty() {
        rows.push(extra.iter().map(|b| KeyboardButton::new(*b)).collect());
    }
    KeyboardMarkup::new(rows)
}
