//! Timed games in a chat. Each running game is a task that owns its
//! controller; the message handler forwards the chat's text to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info};
use teloxide::{
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, MessageId, ParseMode},
    utils::html,
};
use tokio::sync::mpsc;

use crate::quiz::{
    catalog::{GameCatalog, GameDefinition, GameMode},
    feedback::GameFeedback,
    reward::RewardTriple,
    shell::{choice_keyboard, question_html, round_summary, ShellView, CONFETTI_SCORE},
    timed::{Phase, RoundOutcome, RoundUpdate, TimedRoundController},
    timer::{RoundEvent, TokioScheduler},
};
use crate::{GameDialogue, HandlerResult, MENU_BUTTON, NEXT_BUTTON};

const START_BUTTON: &str = "▶️ Start";
const TRY_AGAIN_BUTTON: &str = "🔁 Try again";

/// Input channels of the timed games running right now, one per chat.
#[derive(Clone, Default)]
pub struct ReflexSessions {
    inputs: Arc<Mutex<HashMap<ChatId, mpsc::UnboundedSender<String>>>>,
}

impl ReflexSessions {
    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, mpsc::UnboundedSender<String>>> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, chat_id: ChatId) -> mpsc::UnboundedReceiver<String> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().insert(chat_id, sender);
        receiver
    }

    /// Hands a chat message to the chat's game. `false` when no game is
    /// running there.
    pub fn forward(&self, chat_id: ChatId, text: String) -> bool {
        let mut inputs = self.lock();
        match inputs.get(&chat_id) {
            Some(sender) if sender.send(text).is_ok() => true,
            Some(_) => {
                inputs.remove(&chat_id);
                false
            }
            None => false,
        }
    }

    /// Ends the chat's game, if any. The task stops once it sees its input
    /// closed, dropping the controller and every timer with it.
    pub fn close(&self, chat_id: ChatId) -> bool {
        self.lock().remove(&chat_id).is_some()
    }
}

/// Spawns the task running `game` for the dialogue's chat.
pub fn start(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    game: GameDefinition,
    rewards: RewardTriple,
) {
    let GameMode::Timed(config) = game.mode.clone() else {
        error!("Game '{}' is not a timed game", game.id);
        return;
    };
    let chat_id = dialogue.chat_id();
    let inputs = sessions.register(chat_id);
    let (scheduler, events) = TokioScheduler::channel();
    let controller = TimedRoundController::new(
        game.playable_questions(),
        config,
        scheduler,
        GameFeedback::default(),
    );

    let session = ReflexSession {
        bot,
        dialogue,
        catalog,
        sessions,
        game,
        rewards,
        controller,
        countdown: None,
    };
    tokio::spawn(async move {
        if let Err(e) = session.run(inputs, events).await {
            error!("Timed game in chat {} stopped: {}", chat_id, e);
        }
    });
}

enum Exit {
    Stay,
    Leave,
}

struct ReflexSession {
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    game: GameDefinition,
    rewards: RewardTriple,
    controller: TimedRoundController<TokioScheduler>,
    /// Message showing the seconds left in the current round
    countdown: Option<MessageId>,
}

impl ReflexSession {
    fn chat_id(&self) -> ChatId {
        self.dialogue.chat_id()
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<String>,
        mut events: mpsc::UnboundedReceiver<RoundEvent>,
    ) -> HandlerResult {
        info!("Timed game '{}' ready in chat {}", self.game.id, self.chat_id());
        self.show_ready().await?;

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(text) => {
                        if let Exit::Leave = self.on_input(&text).await? {
                            let game = self.game.clone();
                            return crate::leave_game(
                                self.bot.clone(),
                                self.dialogue.clone(),
                                self.catalog.clone(),
                                self.sessions.clone(),
                                &game,
                                self.rewards,
                            )
                            .await;
                        }
                    }
                    None => break,
                },
                Some(event) = events.recv() => {
                    let updates = self.controller.handle(event);
                    self.render(updates).await?;
                }
            }
        }

        debug!("Timed game '{}' closed in chat {}", self.game.id, self.chat_id());
        Ok(())
    }

    async fn on_input(&mut self, text: &str) -> Result<Exit, Box<dyn std::error::Error + Send + Sync>> {
        match (text, self.controller.phase()) {
            (START_BUTTON, Phase::Ready) => {
                let updates = self.controller.start();
                self.render(updates).await?;
            }
            (TRY_AGAIN_BUTTON, Phase::Finished) => {
                let updates = self.controller.try_again();
                if self.controller.phase() == Phase::Ready {
                    self.show_ready().await?;
                } else {
                    self.render(updates).await?;
                }
            }
            (NEXT_BUTTON, Phase::Finished) => return Ok(Exit::Leave),
            (_, Phase::Playing) => {
                let choice = self
                    .controller
                    .current_question()
                    .and_then(|q| q.choice_by_text(text))
                    .map(|c| c.id);
                match choice {
                    Some(choice) => {
                        let updates = self.controller.select(choice);
                        self.render(updates).await?;
                    }
                    None => self.say("Tap one of the answers below").await?,
                }
            }
            (_, Phase::Ready) => self.say("Tap ▶️ Start when you're ready").await?,
            (_, Phase::Finished) => self.say("Tap 🔁 Try again or ➡️ Next").await?,
        }
        Ok(Exit::Stay)
    }

    fn shell(&self) -> ShellView {
        let mut shell = ShellView::for_game(&self.game, self.rewards)
            .with_feedback(self.controller.feedback());
        shell.score = self.controller.score();
        shell.max_score = self.controller.total_rounds() as u32;
        match self.controller.phase() {
            Phase::Ready => {}
            Phase::Playing => {
                shell.subtitle = format!(
                    "Round {} of {}",
                    self.controller.current_round() + 1,
                    self.controller.total_rounds()
                );
            }
            Phase::Finished => {
                shell.subtitle = "Game complete!".to_string();
                shell.show_game_over = true;
                shell.next_enabled = true;
                shell.show_confetti = self.controller.score() >= CONFETTI_SCORE;
            }
        }
        shell
    }

    async fn show_ready(&mut self) -> HandlerResult {
        let text = format!(
            "{}\n\n⚡ You have {} seconds per round. Answer fast!",
            self.shell().render(),
            self.controller.config().round_time()
        );
        self.bot
            .send_message(self.chat_id(), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(KeyboardMarkup::new(vec![
                vec![KeyboardButton::new(START_BUTTON)],
                vec![KeyboardButton::new(MENU_BUTTON)],
            ]))
            .await?;
        Ok(())
    }

    async fn say(&self, text: &str) -> HandlerResult {
        self.bot.send_message(self.chat_id(), text).await?;
        Ok(())
    }

    async fn render(&mut self, updates: Vec<RoundUpdate>) -> HandlerResult {
        for update in updates {
            match update {
                RoundUpdate::Started { round } => self.show_round(round).await?,
                RoundUpdate::Tick { time_left, .. } => {
                    self.edit_countdown(format!("⏱ {}s", time_left)).await;
                }
                RoundUpdate::Answered {
                    round,
                    outcome,
                    coins,
                    ..
                } => {
                    let headline = match outcome {
                        RoundOutcome::Correct => format!("✅ Correct! +{} coins", coins),
                        _ => "❌ Good try!".to_string(),
                    };
                    let explanation = self
                        .controller
                        .question(round)
                        .and_then(|q| q.feedback_text(outcome == RoundOutcome::Correct))
                        .map(|t| format!("\n{}", html::escape(t)))
                        .unwrap_or_default();
                    self.edit_countdown("⏹".to_string()).await;
                    self.bot
                        .send_message(
                            self.chat_id(),
                            format!("<b>{}</b>{}", headline, explanation),
                        )
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                RoundUpdate::TimedOut { .. } => {
                    self.edit_countdown("⏰ Time's up!".to_string()).await;
                }
                RoundUpdate::Finished {
                    score,
                    coins,
                    accuracy,
                } => {
                    info!(
                        "Chat {} finished '{}': {} of {} ({}%)",
                        self.chat_id(),
                        self.game.id,
                        score,
                        self.controller.total_rounds(),
                        accuracy
                    );
                    self.countdown = None;
                    let rounds = round_summary(self.controller.history(), |round| {
                        self.controller.question(round)
                    });
                    let text = format!(
                        "{}\n\n{}\n\n🏆 You got {} of {} right ({}% accuracy) and earned {} coins!",
                        self.shell().render(),
                        rounds,
                        score,
                        self.controller.total_rounds(),
                        accuracy,
                        coins
                    );
                    self.bot
                        .send_message(self.chat_id(), text)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(KeyboardMarkup::new(vec![
                            vec![KeyboardButton::new(TRY_AGAIN_BUTTON)],
                            vec![KeyboardButton::new(NEXT_BUTTON)],
                            vec![KeyboardButton::new(MENU_BUTTON)],
                        ]))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn show_round(&mut self, round: usize) -> HandlerResult {
        let Some(question) = self.controller.question(round).cloned() else {
            return Ok(());
        };
        let text = format!("{}\n\n{}", self.shell().render(), question_html(&question));
        self.bot
            .send_message(self.chat_id(), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(choice_keyboard(&question, &[MENU_BUTTON]))
            .await?;

        let countdown = self
            .bot
            .send_message(
                self.chat_id(),
                format!("⏱ {}s", self.controller.time_left()),
            )
            .await?;
        self.countdown = Some(countdown.id);
        Ok(())
    }

    /// Cosmetic, so a failed edit is only logged.
    async fn edit_countdown(&mut self, text: String) {
        let Some(message_id) = self.countdown else {
            return;
        };
        if let Err(e) = self
            .bot
            .edit_message_text(self.chat_id(), message_id, text)
            .await
        {
            debug!("Could not update the countdown in chat {}: {}", self.chat_id(), e);
        }
    }
}
