//! Timed rounds: a fixed list of questions, each bounded by a countdown.
//!
//! The controller is a plain state machine. Timers are armed through a
//! [`Scheduler`] and report back as [`RoundEvent`]s, which the owner feeds
//! into [`TimedRoundController::handle`]. Every call returns the
//! [`RoundUpdate`]s it caused so a presentation layer can render them.

use std::time::Duration;

use log::debug;

use super::feedback::{Feedback, GameFeedback};
use super::timer::{RoundEvent, Scheduler, TimerHandle};
use super::{accuracy, ChoiceId, Question, SessionTotals};

pub const DEFAULT_ROUND_TIME: u32 = 10;
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 500;
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// "Try again" goes back to the start screen
    #[default]
    Ready,
    /// "Try again" starts the first round right away
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimedRoundConfig {
    /// Seconds per round
    #[serde(default = "default_round_time")]
    pub round_time: u32,
    /// How long the result of an answered round stays up before the next one
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
    #[serde(default = "default_reward")]
    pub reward_per_correct: u32,
    #[serde(default)]
    pub restart: RestartMode,
}

fn default_round_time() -> u32 {
    DEFAULT_ROUND_TIME
}

fn default_reveal_delay_ms() -> u64 {
    DEFAULT_REVEAL_DELAY_MS
}

fn default_reward() -> u32 {
    1
}

impl Default for TimedRoundConfig {
    fn default() -> Self {
        Self {
            round_time: DEFAULT_ROUND_TIME,
            reveal_delay_ms: DEFAULT_REVEAL_DELAY_MS,
            reward_per_correct: default_reward(),
            restart: RestartMode::Ready,
        }
    }
}

impl TimedRoundConfig {
    /// Seconds per round, at least one.
    pub(crate) fn round_time(&self) -> u32 {
        self.round_time.max(1)
    }

    fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Correct,
    Incorrect,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRecord {
    pub round: usize,
    pub choice: Option<ChoiceId>,
    pub outcome: RoundOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundUpdate {
    Started { round: usize },
    Tick { round: usize, time_left: u32 },
    Answered { round: usize, choice: ChoiceId, outcome: RoundOutcome, coins: u32 },
    TimedOut { round: usize },
    Finished { score: u32, coins: u32, accuracy: u32 },
}

pub struct TimedRoundController<S: Scheduler, F: Feedback = GameFeedback> {
    rounds: Vec<Question>,
    config: TimedRoundConfig,
    scheduler: S,
    feedback: F,

    phase: Phase,
    current: usize,
    selected: Option<ChoiceId>,
    answered: bool,
    time_left: u32,
    totals: SessionTotals,
    history: Vec<RoundRecord>,

    epoch: u64,
    countdown: Option<TimerHandle>,
    reveal: Option<TimerHandle>,
}

impl<S: Scheduler, F: Feedback> TimedRoundController<S, F> {
    pub fn new(rounds: Vec<Question>, config: TimedRoundConfig, scheduler: S, feedback: F) -> Self {
        let time_left = config.round_time();
        Self {
            rounds,
            config,
            scheduler,
            feedback,
            phase: Phase::Ready,
            current: 0,
            selected: None,
            answered: false,
            time_left,
            totals: SessionTotals::default(),
            history: Vec::new(),
            epoch: 0,
            countdown: None,
            reveal: None,
        }
    }

    pub fn start(&mut self) -> Vec<RoundUpdate> {
        let mut updates = Vec::new();
        if self.phase != Phase::Ready {
            return updates;
        }
        debug!("starting {} timed rounds", self.rounds.len());
        self.totals.reset();
        self.history.clear();
        self.phase = Phase::Playing;
        self.begin_round(0, &mut updates);
        updates
    }

    /// Answers the current round. Ignored outside `Playing`, once the round
    /// is answered, and for ids the question does not have.
    pub fn select(&mut self, choice: ChoiceId) -> Vec<RoundUpdate> {
        let mut updates = Vec::new();
        if self.phase != Phase::Playing || self.answered {
            return updates;
        }
        let Some(is_correct) = self.rounds[self.current].choice(choice).map(|c| c.is_correct) else {
            return updates;
        };

        self.answered = true;
        self.selected = Some(choice);
        self.stop_countdown();

        let (outcome, coins) = if is_correct {
            let coins = self.rounds[self.current]
                .reward
                .unwrap_or(self.config.reward_per_correct);
            self.totals.record_correct(coins);
            self.feedback.trigger_correct(coins);
            (RoundOutcome::Correct, coins)
        } else {
            self.feedback.trigger_incorrect();
            (RoundOutcome::Incorrect, 0)
        };
        self.history.push(RoundRecord {
            round: self.current,
            choice: Some(choice),
            outcome,
        });
        updates.push(RoundUpdate::Answered {
            round: self.current,
            choice,
            outcome,
            coins,
        });

        self.epoch += 1;
        self.reveal = Some(self.scheduler.after(
            self.config.reveal_delay(),
            RoundEvent::RevealElapsed { epoch: self.epoch },
        ));
        updates
    }

    pub fn handle(&mut self, event: RoundEvent) -> Vec<RoundUpdate> {
        let mut updates = Vec::new();
        if self.phase != Phase::Playing {
            return updates;
        }
        match event {
            RoundEvent::Tick { epoch } if epoch == self.epoch && !self.answered => {
                self.time_left = self.time_left.saturating_sub(1);
                if self.time_left > 0 {
                    updates.push(RoundUpdate::Tick {
                        round: self.current,
                        time_left: self.time_left,
                    });
                    return updates;
                }

                self.stop_countdown();
                self.history.push(RoundRecord {
                    round: self.current,
                    choice: None,
                    outcome: RoundOutcome::TimedOut,
                });
                updates.push(RoundUpdate::TimedOut { round: self.current });
                self.begin_round(self.current + 1, &mut updates);
            }
            RoundEvent::RevealElapsed { epoch } if epoch == self.epoch && self.answered => {
                self.reveal = None;
                self.begin_round(self.current + 1, &mut updates);
            }
            stale => debug!("ignoring stale {:?} (epoch {})", stale, self.epoch),
        }
        updates
    }

    /// Resets everything for another play-through.
    pub fn try_again(&mut self) -> Vec<RoundUpdate> {
        self.cancel_timers();
        self.epoch += 1;
        self.phase = Phase::Ready;
        self.current = 0;
        self.selected = None;
        self.answered = false;
        self.time_left = self.config.round_time();
        self.totals.reset();
        self.history.clear();
        self.feedback.reset();

        match self.config.restart {
            RestartMode::Ready => Vec::new(),
            RestartMode::Immediate => self.start(),
        }
    }

    fn begin_round(&mut self, index: usize, updates: &mut Vec<RoundUpdate>) {
        if index >= self.rounds.len() {
            self.finish(updates);
            return;
        }
        self.current = index;
        self.selected = None;
        self.answered = false;
        self.time_left = self.config.round_time();
        self.feedback.reset();

        self.epoch += 1;
        self.countdown = Some(self.scheduler.every(TICK, RoundEvent::Tick { epoch: self.epoch }));
        updates.push(RoundUpdate::Started { round: index });
    }

    fn finish(&mut self, updates: &mut Vec<RoundUpdate>) {
        self.cancel_timers();
        self.phase = Phase::Finished;
        debug!(
            "timed rounds finished: {} of {} correct",
            self.totals.score,
            self.rounds.len()
        );
        updates.push(RoundUpdate::Finished {
            score: self.totals.score,
            coins: self.totals.coins,
            accuracy: self.accuracy(),
        });
    }

    fn stop_countdown(&mut self) {
        if let Some(timer) = self.countdown.take() {
            timer.cancel();
        }
    }

    fn cancel_timers(&mut self) {
        self.stop_countdown();
        if let Some(timer) = self.reveal.take() {
            timer.cancel();
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Zero-based index of the round being played
    pub fn current_round(&self) -> usize {
        self.current
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Playing => self.rounds.get(self.current),
            _ => None,
        }
    }

    pub fn question(&self, round: usize) -> Option<&Question> {
        self.rounds.get(round)
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    #[cfg(test)]
    pub fn is_answered(&self) -> bool {
        self.answered
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<ChoiceId> {
        self.selected
    }

    #[cfg(test)]
    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    pub fn score(&self) -> u32 {
        self.totals.score
    }

    #[cfg(test)]
    pub fn coins(&self) -> u32 {
        self.totals.coins
    }

    pub fn accuracy(&self) -> u32 {
        accuracy(self.totals.score, self.rounds.len())
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn config(&self) -> &TimedRoundConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn has_running_countdown(&self) -> bool {
        self.countdown.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::feedback::FeedbackSignal;
    use crate::quiz::timer::manual::ManualScheduler;
    use crate::quiz::Choice;

    const CORRECT: ChoiceId = 1;
    const WRONG: ChoiceId = 2;

    fn rounds(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    i as u32 + 1,
                    format!("Is robot #{} using AI?", i + 1),
                    vec![
                        Choice::new(CORRECT, "AI".to_string(), true),
                        Choice::new(WRONG, "Not AI".to_string(), false),
                    ],
                )
            })
            .collect()
    }

    fn controller(
        n: usize,
        round_time: u32,
        reward: u32,
    ) -> (TimedRoundController<ManualScheduler>, ManualScheduler) {
        let scheduler = ManualScheduler::default();
        let config = TimedRoundConfig {
            round_time,
            reward_per_correct: reward,
            ..Default::default()
        };
        let controller =
            TimedRoundController::new(rounds(n), config, scheduler.clone(), GameFeedback::default());
        (controller, scheduler)
    }

    fn tick(
        controller: &mut TimedRoundController<ManualScheduler>,
        scheduler: &ManualScheduler,
    ) -> Vec<RoundUpdate> {
        let live = scheduler.live_ticks();
        assert_eq!(live.len(), 1, "exactly one countdown should be running");
        controller.handle(live[0])
    }

    fn reveal(
        controller: &mut TimedRoundController<ManualScheduler>,
        scheduler: &ManualScheduler,
    ) -> Vec<RoundUpdate> {
        let live = scheduler.live_delays();
        assert_eq!(live.len(), 1, "exactly one reveal delay should be pending");
        controller.handle(live[0])
    }

    fn time_out(
        controller: &mut TimedRoundController<ManualScheduler>,
        scheduler: &ManualScheduler,
    ) -> Vec<RoundUpdate> {
        let mut updates = Vec::new();
        for _ in 0..controller.config().round_time() {
            updates.extend(tick(controller, scheduler));
        }
        updates
    }

    #[test]
    fn starts_ready_and_start_arms_first_round() {
        let (mut controller, scheduler) = controller(5, 10, 1);
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(scheduler.live_count(), 0);

        assert_eq!(controller.start(), vec![RoundUpdate::Started { round: 0 }]);
        assert_eq!(controller.phase(), Phase::Playing);
        assert_eq!(controller.time_left(), 10);
        assert_eq!(controller.current_question().map(|q| q.id), Some(1));
        assert_eq!(scheduler.live_ticks().len(), 1);

        // a second start is ignored
        assert!(controller.start().is_empty());
        assert_eq!(scheduler.armed_count(), 1);
    }

    #[test]
    fn zero_round_time_counts_as_one_second() {
        let (mut controller, scheduler) = controller(2, 0, 1);
        assert_eq!(controller.config().round_time(), 1);
        assert_eq!(controller.time_left(), 1);

        controller.start();
        assert_eq!(controller.time_left(), 1);
        assert_eq!(
            tick(&mut controller, &scheduler),
            vec![
                RoundUpdate::TimedOut { round: 0 },
                RoundUpdate::Started { round: 1 }
            ]
        );
        assert_eq!(controller.time_left(), 1);
    }

    #[test]
    fn every_round_timing_out_finishes_with_zero_score() {
        for n in 1..=6 {
            for t in [1, 3, 10] {
                let (mut controller, scheduler) = controller(n, t, 5);
                let mut updates = controller.start();
                for _ in 0..n {
                    updates.extend(time_out(&mut controller, &scheduler));
                }

                let timeouts = updates
                    .iter()
                    .filter(|u| matches!(u, RoundUpdate::TimedOut { .. }))
                    .count();
                let starts = updates
                    .iter()
                    .filter(|u| matches!(u, RoundUpdate::Started { .. }))
                    .count();
                assert_eq!(timeouts, n);
                assert_eq!(starts, n);
                assert_eq!(controller.phase(), Phase::Finished);
                assert_eq!(controller.score(), 0);
                assert_eq!(controller.coins(), 0);
                assert_eq!(
                    updates.last(),
                    Some(&RoundUpdate::Finished {
                        score: 0,
                        coins: 0,
                        accuracy: 0
                    })
                );
                assert!(controller
                    .history()
                    .iter()
                    .all(|r| r.outcome == RoundOutcome::TimedOut));
                assert_eq!(scheduler.live_count(), 0);
            }
        }
    }

    #[test]
    fn countdown_reports_each_second() {
        let (mut controller, scheduler) = controller(2, 3, 1);
        controller.start();
        assert_eq!(
            tick(&mut controller, &scheduler),
            vec![RoundUpdate::Tick { round: 0, time_left: 2 }]
        );
        assert_eq!(
            tick(&mut controller, &scheduler),
            vec![RoundUpdate::Tick { round: 0, time_left: 1 }]
        );
        assert_eq!(
            tick(&mut controller, &scheduler),
            vec![
                RoundUpdate::TimedOut { round: 0 },
                RoundUpdate::Started { round: 1 }
            ]
        );
        assert_eq!(controller.time_left(), 3);
    }

    #[test]
    fn correct_choice_scores_and_pays_reward() {
        let (mut controller, _scheduler) = controller(5, 10, 5);
        controller.start();

        let updates = controller.select(CORRECT);
        assert_eq!(
            updates,
            vec![RoundUpdate::Answered {
                round: 0,
                choice: CORRECT,
                outcome: RoundOutcome::Correct,
                coins: 5
            }]
        );
        assert_eq!(controller.score(), 1);
        assert_eq!(controller.coins(), 5);
        assert_eq!(
            controller.feedback().signal(),
            FeedbackSignal::Correct { points: 5 }
        );
    }

    #[test]
    fn incorrect_choice_leaves_score_unchanged() {
        let (mut controller, _scheduler) = controller(5, 10, 5);
        controller.start();

        controller.select(WRONG);
        assert_eq!(controller.score(), 0);
        assert_eq!(controller.coins(), 0);
        assert!(controller.is_answered());
        assert_eq!(controller.feedback().signal(), FeedbackSignal::Incorrect);
    }

    #[test]
    fn question_reward_overrides_screen_reward() {
        let scheduler = ManualScheduler::default();
        let mut questions = rounds(1);
        questions[0].reward = Some(15);
        let mut controller = TimedRoundController::new(
            questions,
            TimedRoundConfig::default(),
            scheduler,
            GameFeedback::default(),
        );
        controller.start();
        controller.select(CORRECT);
        assert_eq!(controller.coins(), 15);
    }

    #[test]
    fn only_first_answer_in_a_round_counts() {
        let (mut controller, scheduler) = controller(5, 10, 1);
        controller.start();
        controller.select(WRONG);

        assert!(controller.select(CORRECT).is_empty());
        assert!(controller.select(CORRECT).is_empty());
        assert_eq!(controller.score(), 0);
        assert_eq!(controller.selected(), Some(WRONG));
        assert_eq!(controller.history().len(), 1);
        assert_eq!(scheduler.live_delays().len(), 1);
    }

    #[test]
    fn unknown_choice_and_input_outside_play_are_ignored() {
        let (mut controller, scheduler) = controller(1, 10, 1);
        assert!(controller.select(CORRECT).is_empty());

        controller.start();
        assert!(controller.select(99).is_empty());
        assert!(!controller.is_answered());

        controller.select(CORRECT);
        reveal(&mut controller, &scheduler);
        assert_eq!(controller.phase(), Phase::Finished);
        assert!(controller.select(CORRECT).is_empty());
        assert_eq!(controller.score(), 1);
    }

    #[test]
    fn answering_cancels_countdown_and_ignores_stale_ticks() {
        let (mut controller, scheduler) = controller(3, 10, 1);
        controller.start();
        let stale_tick = scheduler.live_ticks()[0];
        tick(&mut controller, &scheduler);

        controller.select(CORRECT);
        assert!(!controller.has_running_countdown());
        assert!(scheduler.live_ticks().is_empty());

        // a tick that was already queued when the countdown got cancelled
        assert!(controller.handle(stale_tick).is_empty());
        assert_eq!(controller.time_left(), 9);

        assert_eq!(
            reveal(&mut controller, &scheduler),
            vec![RoundUpdate::Started { round: 1 }]
        );
        assert_eq!(scheduler.live_ticks().len(), 1);
        assert!(controller.handle(stale_tick).is_empty());
        assert_eq!(controller.time_left(), 10);
    }

    #[test]
    fn timeout_cancels_countdown_before_next_round() {
        let (mut controller, scheduler) = controller(2, 2, 1);
        controller.start();
        let first_tick = scheduler.live_ticks()[0];
        time_out(&mut controller, &scheduler);

        assert_eq!(controller.current_round(), 1);
        assert_eq!(scheduler.live_ticks().len(), 1);
        assert_ne!(scheduler.live_ticks()[0], first_tick);
        assert!(controller.handle(first_tick).is_empty());
        assert_eq!(controller.time_left(), 2);
    }

    #[test]
    fn reveal_delay_advances_only_after_answer() {
        let (mut controller, scheduler) = controller(2, 10, 1);
        controller.start();
        controller.select(CORRECT);
        assert_eq!(controller.current_round(), 0);

        reveal(&mut controller, &scheduler);
        assert_eq!(controller.current_round(), 1);
        assert!(!controller.is_answered());
        assert_eq!(controller.selected(), None);
        assert_eq!(controller.feedback().signal(), FeedbackSignal::Idle);
    }

    #[test]
    fn mixed_play_through_reports_accuracy() {
        let (mut controller, scheduler) = controller(5, 10, 5);
        controller.start();

        // round 1: correct after three seconds
        for _ in 0..3 {
            tick(&mut controller, &scheduler);
        }
        controller.select(CORRECT);
        reveal(&mut controller, &scheduler);

        // round 2: no input
        time_out(&mut controller, &scheduler);
        assert_eq!(controller.current_round(), 2);

        // rounds 3..5: correct, wrong, correct
        controller.select(CORRECT);
        reveal(&mut controller, &scheduler);
        controller.select(WRONG);
        reveal(&mut controller, &scheduler);
        controller.select(CORRECT);
        let updates = reveal(&mut controller, &scheduler);

        assert_eq!(controller.phase(), Phase::Finished);
        assert_eq!(
            updates,
            vec![RoundUpdate::Finished {
                score: 3,
                coins: 15,
                accuracy: 60
            }]
        );
        assert_eq!(controller.accuracy(), 60);
        let outcomes: Vec<_> = controller.history().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                RoundOutcome::Correct,
                RoundOutcome::TimedOut,
                RoundOutcome::Correct,
                RoundOutcome::Incorrect,
                RoundOutcome::Correct
            ]
        );
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn try_again_resets_to_ready_without_residual_timers() {
        let (mut controller, scheduler) = controller(3, 10, 2);
        controller.start();
        controller.select(CORRECT);
        reveal(&mut controller, &scheduler);
        tick(&mut controller, &scheduler);
        let old_tick = scheduler.live_ticks()[0];

        assert!(controller.try_again().is_empty());
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(controller.current_round(), 0);
        assert_eq!(controller.totals(), SessionTotals::default());
        assert_eq!(controller.time_left(), 10);
        assert!(controller.history().is_empty());
        assert_eq!(scheduler.live_count(), 0);
        assert!(controller.handle(old_tick).is_empty());

        controller.start();
        assert_eq!(scheduler.live_ticks().len(), 1);
        assert!(controller.handle(old_tick).is_empty());
        assert_eq!(controller.time_left(), 10);
    }

    #[test]
    fn try_again_can_restart_immediately() {
        let scheduler = ManualScheduler::default();
        let config = TimedRoundConfig {
            restart: RestartMode::Immediate,
            ..Default::default()
        };
        let mut controller =
            TimedRoundController::new(rounds(2), config, scheduler.clone(), GameFeedback::default());
        controller.start();
        controller.select(CORRECT);

        assert_eq!(controller.try_again(), vec![RoundUpdate::Started { round: 0 }]);
        assert_eq!(controller.phase(), Phase::Playing);
        assert_eq!(controller.score(), 0);
        assert_eq!(scheduler.live_ticks().len(), 1);
        assert!(scheduler.live_delays().is_empty());
    }

    #[test]
    fn dropping_controller_cancels_timers() {
        let (mut controller, scheduler) = controller(2, 10, 1);
        controller.start();
        assert_eq!(scheduler.live_count(), 1);
        drop(controller);
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn no_rounds_finish_on_start() {
        let (mut controller, scheduler) = controller(0, 10, 1);
        assert_eq!(
            controller.start(),
            vec![RoundUpdate::Finished {
                score: 0,
                coins: 0,
                accuracy: 0
            }]
        );
        assert_eq!(controller.phase(), Phase::Finished);
        assert_eq!(scheduler.armed_count(), 0);
    }
}
