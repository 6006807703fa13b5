//! Untimed question-by-question flow: pick, confirm, read the feedback, move on.
//!
//! The questions themselves are static content and are passed into every
//! call; `LinearQuiz` only holds the player's progress, so it can be kept in
//! the dialogue storage between messages.

use super::feedback::Feedback;
use super::{ChoiceId, Question, SessionTotals};

pub const DEFAULT_LINEAR_REWARD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_correct: bool,
    pub coins: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearStep {
    Question(usize),
    Completed { correct: u32, coins: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinearQuiz {
    index: usize,
    selected: Option<ChoiceId>,
    /// Set once the answer is confirmed, while the feedback is on screen
    verdict: Option<bool>,
    /// Coins won on the current question
    coins: u32,
    totals: SessionTotals,
    reward_per_correct: u32,
}

impl LinearQuiz {
    pub fn new(reward_per_correct: u32) -> Self {
        Self {
            reward_per_correct,
            ..Default::default()
        }
    }

    pub fn current<'a>(&self, questions: &'a [Question]) -> Option<&'a Question> {
        questions.get(self.index)
    }

    /// Picks (or re-picks) a choice. Refused while feedback is showing and
    /// for ids the question does not have.
    pub fn select(&mut self, questions: &[Question], choice: ChoiceId) -> bool {
        if self.verdict.is_some() {
            return false;
        }
        match self.current(questions).and_then(|q| q.choice(choice)) {
            Some(_) => {
                self.selected = Some(choice);
                true
            }
            None => false,
        }
    }

    /// Locks in the selected choice. Nothing happens without a selection or
    /// when the answer is already confirmed.
    pub fn confirm(&mut self, questions: &[Question], feedback: &mut impl Feedback) -> Option<Verdict> {
        if self.verdict.is_some() {
            return None;
        }
        let question = self.current(questions)?;
        let choice = question.choice(self.selected?)?;

        let coins = if choice.is_correct {
            let coins = question.reward.unwrap_or(self.reward_per_correct);
            feedback.trigger_correct(coins);
            self.totals.record_correct(coins);
            coins
        } else {
            feedback.trigger_incorrect();
            0
        };
        self.coins = coins;
        self.verdict = Some(choice.is_correct);
        Some(Verdict {
            is_correct: choice.is_correct,
            coins,
        })
    }

    /// Moves past the feedback. Only allowed while the feedback is showing.
    pub fn next(&mut self, questions: &[Question], feedback: &mut impl Feedback) -> Option<LinearStep> {
        if !self.next_enabled() {
            return None;
        }
        if self.index + 1 >= questions.len() {
            return Some(LinearStep::Completed {
                correct: self.totals.score,
                coins: self.totals.coins,
            });
        }
        self.index += 1;
        self.selected = None;
        self.verdict = None;
        self.coins = 0;
        feedback.reset();
        Some(LinearStep::Question(self.index))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<ChoiceId> {
        self.selected
    }

    #[cfg(test)]
    pub fn verdict(&self) -> Option<bool> {
        self.verdict
    }

    #[cfg(test)]
    pub fn coins_for_question(&self) -> u32 {
        self.coins
    }

    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    /// Coins the whole quiz pays when every answer is right.
    pub fn max_coins(&self, questions: &[Question]) -> u32 {
        questions
            .iter()
            .map(|q| q.reward.unwrap_or(self.reward_per_correct))
            .sum()
    }

    pub fn next_enabled(&self) -> bool {
        self.verdict.is_some()
    }

    pub fn is_last(&self, questions: &[Question]) -> bool {
        self.index + 1 >= questions.len()
    }

    pub fn game_over(&self, questions: &[Question]) -> bool {
        self.next_enabled() && self.is_last(questions)
    }
}
