mod config;
mod quiz;
mod session;

use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, info, warn};
use quiz::{
    catalog::{GameCatalog, GameDefinition, GameMode},
    feedback::GameFeedback,
    linear::{LinearQuiz, LinearStep},
    navigation::NavigationTarget,
    reward::RewardTriple,
    shell::{choice_keyboard, question_html, ShellView},
};
use session::ReflexSessions;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, ParseMode},
    utils::html,
};

type GameDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveGameChoice,
    LinearGame {
        game_id: String,
        rewards: RewardTriple,
        quiz: LinearQuiz,
    },
    TimedGame {
        game_id: String,
        rewards: RewardTriple,
    },
}

type GameStorage = Arc<ErasedStorage<State>>;

const MENU_BUTTON: &str = "🏠 Menu";
const CONFIRM_BUTTON: &str = "✅ Confirm";
const NEXT_BUTTON: &str = "➡️ Next";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine, the variables may come from the environment
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting AI literacy games bot...");

    let config = config::Config::from_env();
    debug!("{:?}", config);

    let catalog = Arc::new(GameCatalog::open(&config.catalog_path)?);

    let bot = Bot::from_env();

    info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: GameStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await?
        .erase();

    let sessions = ReflexSessions::default();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveGameChoice].endpoint(receive_game_choice))
            .branch(
                dptree::case![State::LinearGame {
                    game_id,
                    rewards,
                    quiz
                }]
                .endpoint(linear_game),
            )
            .branch(dptree::case![State::TimedGame { game_id, rewards }].endpoint(timed_game)),
    )
    .dependencies(dptree::deps![storage, catalog, sessions])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const GREETING_TEXT: &str = "Hi! 🤖 I'm the AI explorer bot. Play short games and stories to learn how artificial intelligence works, earn coins and XP along the way!";
async fn start(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    msg: Message,
) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    show_menu(&bot, &dialogue, &catalog).await
}

async fn show_menu(bot: &Bot, dialogue: &GameDialogue, catalog: &GameCatalog) -> HandlerResult {
    let keyboard = KeyboardMarkup::new(
        catalog
            .games()
            .iter()
            .map(|g| vec![KeyboardButton::new(g.title.clone())])
            .collect::<Vec<_>>(),
    );
    bot.send_message(dialogue.chat_id(), "Which game do you want to play?")
        .reply_markup(keyboard)
        .await?;

    dialogue.update(State::ReceiveGameChoice).await?;
    Ok(())
}

async fn receive_game_choice(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    msg: Message,
) -> HandlerResult {
    let target = msg
        .text()
        .and_then(|text| catalog.by_title(text))
        .map(|game| NavigationTarget::to(&game.id));

    match target {
        Some(target) => open_game(bot, dialogue, catalog, sessions, target).await,
        None => {
            bot.send_message(msg.chat.id, "Please pick one of the games below")
                .await?;
            Ok(())
        }
    }
}

/// Opens the screen a navigation target names, resolving its reward values
/// from the catalog first and the carried payload second.
async fn open_game(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    target: NavigationTarget,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    sessions.close(chat_id);

    let Some(game) = catalog.get(&target.screen) else {
        warn!("Chat {} asked for unknown game '{}'", chat_id, target.screen);
        bot.send_message(chat_id, "This game is not available yet.")
            .await?;
        return show_menu(&bot, &dialogue, &catalog).await;
    };
    let rewards = RewardTriple::resolve(catalog.rewards_for(&game.id), target.rewards.as_ref());
    info!("Chat {} opens game '{}'", chat_id, game.id);

    match &game.mode {
        GameMode::Linear { reward_per_correct } => {
            let quiz = LinearQuiz::new(*reward_per_correct);
            send_linear_question(&bot, chat_id, game, rewards, &quiz).await?;
            dialogue
                .update(State::LinearGame {
                    game_id: game.id.clone(),
                    rewards,
                    quiz,
                })
                .await?;
        }
        GameMode::Timed(_) => {
            dialogue
                .update(State::TimedGame {
                    game_id: game.id.clone(),
                    rewards,
                })
                .await?;
            session::start(
                bot.clone(),
                dialogue.clone(),
                catalog.clone(),
                sessions,
                game.clone(),
                rewards,
            );
        }
    }
    Ok(())
}

/// Where to go once `game` is done.
async fn leave_game(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    game: &GameDefinition,
    rewards: RewardTriple,
) -> HandlerResult {
    match &game.next {
        Some(next) => {
            let target = NavigationTarget::to(next).carrying(rewards);
            open_game(bot, dialogue, catalog, sessions, target).await
        }
        None => {
            sessions.close(dialogue.chat_id());
            show_menu(&bot, &dialogue, &catalog).await
        }
    }
}

async fn send_linear_question(
    bot: &Bot,
    chat_id: ChatId,
    game: &GameDefinition,
    rewards: RewardTriple,
    quiz: &LinearQuiz,
) -> HandlerResult {
    let Some(question) = quiz.current(&game.questions) else {
        return Ok(());
    };
    // Shuffling only changes the button order, answers are matched by text
    let question = if game.shuffle_choices {
        question.shuffled()
    } else {
        question.clone()
    };

    let mut shell = ShellView::for_game(game, rewards);
    shell.subtitle = format!("Question {} of {}", quiz.index() + 1, game.questions.len());
    shell.score = quiz.totals().coins;
    shell.max_score = quiz.max_coins(&game.questions);

    bot.send_message(
        chat_id,
        format!("{}\n\n{}", shell.render(), question_html(&question)),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(choice_keyboard(&question, &[CONFIRM_BUTTON, MENU_BUTTON]))
    .await?;
    Ok(())
}

async fn linear_game(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    (game_id, rewards, mut quiz): (String, RewardTriple, LinearQuiz),
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU_BUTTON {
        return show_menu(&bot, &dialogue, &catalog).await;
    }
    let Some(game) = catalog.get(&game_id) else {
        // The catalog changed under a stored dialogue
        warn!("Game '{}' is gone from the catalog", game_id);
        return show_menu(&bot, &dialogue, &catalog).await;
    };
    let mut feedback = GameFeedback::default();

    match text {
        CONFIRM_BUTTON => match quiz.confirm(&game.questions, &mut feedback) {
            Some(verdict) => {
                let mut shell = ShellView::for_game(game, rewards).with_feedback(&feedback);
                shell.subtitle = format!(
                    "Question {} of {}",
                    quiz.index() + 1,
                    game.questions.len()
                );
                shell.score = quiz.totals().coins;
                shell.max_score = quiz.max_coins(&game.questions);
                shell.show_confetti = verdict.is_correct;
                shell.next_enabled = quiz.next_enabled();
                shell.show_game_over = quiz.game_over(&game.questions);

                let headline = if verdict.is_correct {
                    format!("✅ Correct! +{} coins", verdict.coins)
                } else {
                    "❌ Not quite.".to_string()
                };
                let explanation = quiz
                    .current(&game.questions)
                    .and_then(|q| q.feedback_text(verdict.is_correct))
                    .map(|t| format!("\n{}", html::escape(t)))
                    .unwrap_or_default();

                bot.send_message(
                    msg.chat.id,
                    format!("{}\n\n<b>{}</b>{}", shell.render(), headline, explanation),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(KeyboardMarkup::new(vec![
                    vec![KeyboardButton::new(NEXT_BUTTON)],
                    vec![KeyboardButton::new(MENU_BUTTON)],
                ]))
                .await?;
            }
            None if quiz.next_enabled() => {
                bot.send_message(msg.chat.id, "Tap Next to continue").await?;
            }
            None => {
                bot.send_message(msg.chat.id, "Pick an answer first, then confirm it")
                    .await?;
            }
        },
        NEXT_BUTTON => match quiz.next(&game.questions, &mut feedback) {
            Some(LinearStep::Question(_)) => {
                send_linear_question(&bot, msg.chat.id, game, rewards, &quiz).await?;
            }
            Some(LinearStep::Completed { correct, coins }) => {
                info!(
                    "Chat {} finished '{}' with {} of {} correct",
                    msg.chat.id,
                    game.id,
                    correct,
                    game.questions.len()
                );
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "🏆 You got {} of {} right and earned {} coins!",
                        correct,
                        game.questions.len(),
                        coins
                    ),
                )
                .await?;
                return leave_game(bot, dialogue, catalog.clone(), sessions, game, rewards).await;
            }
            None => {
                bot.send_message(msg.chat.id, "Confirm your answer first").await?;
            }
        },
        _ => {
            let choice = quiz
                .current(&game.questions)
                .and_then(|q| q.choice_by_text(text))
                .map(|c| (c.id, c.button_text()));
            match choice {
                Some((id, label)) => {
                    if quiz.select(&game.questions, id) {
                        bot.send_message(
                            msg.chat.id,
                            format!("You picked \"{}\". Tap {} to lock it in.", label, CONFIRM_BUTTON),
                        )
                        .await?;
                    } else {
                        bot.send_message(msg.chat.id, "Tap Next to continue").await?;
                    }
                }
                None => {
                    bot.send_message(msg.chat.id, "Please use the buttons below")
                        .await?;
                }
            }
        }
    }

    dialogue
        .update(State::LinearGame {
            game_id,
            rewards,
            quiz,
        })
        .await?;
    Ok(())
}

async fn timed_game(
    bot: Bot,
    dialogue: GameDialogue,
    catalog: Arc<GameCatalog>,
    sessions: ReflexSessions,
    (game_id, rewards): (String, RewardTriple),
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU_BUTTON {
        sessions.close(msg.chat.id);
        return show_menu(&bot, &dialogue, &catalog).await;
    }

    if !sessions.forward(msg.chat.id, text.to_string()) {
        // Timed games live in memory only, e.g. lost on restart; open it afresh
        debug!("No running session for chat {}, reopening '{}'", msg.chat.id, game_id);
        let target = NavigationTarget::to(&game_id).carrying(rewards);
        return open_game(bot, dialogue, catalog, sessions, target).await;
    }
    Ok(())
}
