mod config;
mod keyboards;
mod quiz;
mod storage;

use std::sync::Arc;

use config::Config;
use dotenv::dotenv;
use keyboards::Action;
use log::{error, info, warn};
use quiz::{QuizEngine, QuizError, QuizStep, SessionState};
use storage::{OwnerId, SqliteStore, WordStore};
use teloxide::{
    dispatching::{dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::User,
    utils::command::BotCommands,
};

type VocabDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;

/// Where the user is in the word-adding flow. Quiz progress lives in
/// [`SessionState`], not here.
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Menu,
    ReceiveWord,
    ReceiveTranslation {
        word: String,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "эта справка")]
    Help,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    info!("Starting vocabulary bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let store = match SqliteStore::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("Failed to open {}: {}", config.db_path.display(), err);
            std::process::exit(1);
        }
    };
    info!("Word database opened at {}", config.db_path.display());

    let engine = Arc::new(QuizEngine::new(
        store.clone(),
        store.clone(),
        Arc::new(SessionState::new()),
        config.quiz,
    ));

    let bot = Bot::from_env();

    // Updates from one chat are handled in order; different chats run concurrently.
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            InMemStorage::<State>::new(),
            engine,
            store,
            Arc::new(config)
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<HandlerError> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::case![State::ReceiveWord].endpoint(receive_word))
        .branch(dptree::case![State::ReceiveTranslation { word }].endpoint(receive_translation))
        .branch(dptree::endpoint(show_menu_hint));

    let callbacks = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
        .endpoint(handle_callback);

    dptree::entry().branch(messages).branch(callbacks)
}

fn owner_of(user: &User) -> OwnerId {
    OwnerId(user.id.0 as i64)
}

const MAIN_MENU_TEXT: &str = "Главное меню:";
async fn handle_command(
    bot: Bot,
    dialogue: VocabDialogue,
    engine: Arc<QuizEngine>,
    cmd: Command,
    msg: Message,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let name = msg
                .from()
                .map(|user| user.first_name.clone())
                .unwrap_or_default();
            if let Some(user) = msg.from() {
                engine.sessions().clear(owner_of(user));
            }
            dialogue.update(State::Menu).await?;
            bot.send_message(
                msg.chat.id,
                format!("Привет, {}!\n\nЯ бот для изучения слов. Выбери действие:", name),
            )
            .reply_markup(keyboards::menu())
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }
    Ok(())
}

async fn show_menu_hint(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, MAIN_MENU_TEXT)
        .reply_markup(keyboards::menu())
        .await?;
    Ok(())
}

const ASK_WORD_TEXT: &str = "Напиши слово:";
const ASK_TRANSLATION_TEXT: &str = "Теперь напиши перевод:";
async fn receive_word(bot: Bot, dialogue: VocabDialogue, msg: Message) -> HandlerResult {
    match msg.text().map(str::trim) {
        Some(word) if !word.is_empty() => {
            bot.send_message(msg.chat.id, ASK_TRANSLATION_TEXT).await?;
            dialogue
                .update(State::ReceiveTranslation {
                    word: word.to_string(),
                })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, ASK_WORD_TEXT).await?;
        }
    }
    Ok(())
}

async fn receive_translation(
    bot: Bot,
    dialogue: VocabDialogue,
    word: String,
    msg: Message,
    store: Arc<SqliteStore>,
) -> HandlerResult {
    let (Some(user), Some(translation)) = (msg.from(), msg.text().map(str::trim)) else {
        bot.send_message(msg.chat.id, ASK_TRANSLATION_TEXT).await?;
        return Ok(());
    };
    if translation.is_empty() {
        bot.send_message(msg.chat.id, ASK_TRANSLATION_TEXT).await?;
        return Ok(());
    }

    let record = store.add_word(owner_of(user), &word, translation).await?;
    info!("User {} added word {}", record.owner_id, record.id);

    bot.send_message(
        msg.chat.id,
        format!("Слово добавлено!\n\n{} - {}", record.term, record.translation),
    )
    .reply_markup(keyboards::menu())
    .await?;
    dialogue.update(State::Menu).await?;
    Ok(())
}

const NO_WORDS_TEXT: &str = "У тебя пока нет слов";
const TOO_FEW_WORDS_TEXT: &str = "Добавь хотя бы 2 слова для теста";
async fn handle_callback(
    bot: Bot,
    dialogue: VocabDialogue,
    q: CallbackQuery,
    engine: Arc<QuizEngine>,
    store: Arc<SqliteStore>,
    config: Arc<Config>,
) -> HandlerResult {
    let (Some(action), Some(msg)) = (q.data.as_deref().and_then(Action::parse), q.message.as_ref())
    else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let owner = owner_of(&q.from);

    if let Action::Answer { tag, option } = action {
        return answer_question(&bot, &q, msg, &engine, owner, tag, option).await;
    }
    bot.answer_callback_query(q.id.clone()).await?;

    match action {
        Action::Menu => {
            engine.sessions().clear(owner);
            dialogue.update(State::Menu).await?;
            edit(&bot, msg, MAIN_MENU_TEXT.to_string(), keyboards::menu()).await
        }
        Action::AddWord => {
            dialogue.update(State::ReceiveWord).await?;
            bot.edit_message_text(msg.chat.id, msg.id, ASK_WORD_TEXT)
                .await?;
            Ok(())
        }
        Action::ListWords => {
            let words = store.list_words(owner).await?;
            let text = if words.is_empty() {
                NO_WORDS_TEXT.to_string()
            } else {
                keyboards::word_list_text(&words, config.list_limit)
            };
            edit(&bot, msg, text, keyboards::back()).await
        }
        Action::Stats => {
            let summary = engine.stats_summary(owner).await?;
            edit(&bot, msg, keyboards::stats_text(&summary), keyboards::back()).await
        }
        Action::Test => match engine.start_session(owner).await {
            Ok(_) => {
                let step = engine.build_question(owner).await?;
                show_step(&bot, msg, step).await
            }
            Err(QuizError::InsufficientVocabulary { .. }) => {
                edit(&bot, msg, TOO_FEW_WORDS_TEXT.to_string(), keyboards::back()).await
            }
            Err(err) => Err(err.into()),
        },
        Action::Answer { .. } => Ok(()),
    }
}

async fn answer_question(
    bot: &Bot,
    q: &CallbackQuery,
    msg: &Message,
    engine: &QuizEngine,
    owner: OwnerId,
    tag: u64,
    option: usize,
) -> HandlerResult {
    let outcome = engine.submit_answer(owner, tag, option).await;
    let reply = keyboards::answer_reply(&outcome);

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(toast) = reply.toast {
        answer = answer.text(toast);
    }
    answer.await?;

    if reply.show_next {
        let step = engine.build_question(owner).await?;
        show_step(bot, msg, step).await?;
    }

    match outcome {
        Err(err @ QuizError::StoreUnavailable(_)) => {
            warn!("Answer from user {} was not fully recorded: {}", owner, err);
            Err(err.into())
        }
        _ => Ok(()),
    }
}

async fn show_step(bot: &Bot, msg: &Message, step: QuizStep) -> HandlerResult {
    match step {
        QuizStep::Question(view) => {
            edit(
                bot,
                msg,
                keyboards::question_text(&view),
                keyboards::answers(&view),
            )
            .await
        }
        QuizStep::Complete { score, total } => {
            edit(
                bot,
                msg,
                keyboards::quiz_finished_text(score, total),
                keyboards::menu(),
            )
            .await
        }
    }
}

async fn edit(
    bot: &Bot,
    msg: &Message,
    text: String,
    keyboard: teloxide::types::InlineKeyboardMarkup,
) -> HandlerResult {
    bot.edit_message_text(msg.chat.id, msg.id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}
