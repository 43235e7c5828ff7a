use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::quiz::{AnswerResult, QuestionView, QuizError, QuizResult, StatsSummary};
use crate::storage::WordRecord;

pub const ADD_WORD_BUTTON: &str = "Добавить слово";
pub const MY_WORDS_BUTTON: &str = "Мои слова";
pub const TEST_BUTTON: &str = "Тест";
pub const STATS_BUTTON: &str = "Статистика";
pub const BACK_BUTTON: &str = "Назад";

pub const CORRECT_TEXT: &str = "Правильно!";
pub const WRONG_TEXT: &str = "Неправильно";
pub const EXPIRED_TEXT: &str = "Этот тест уже неактуален";

const ANSWER_PREFIX: &str = "ans";

/// Payload of an inline button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Menu,
    AddWord,
    ListWords,
    Test,
    Stats,
    Answer { tag: u64, option: usize },
}

impl Action {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "menu" => Some(Action::Menu),
            "add" => Some(Action::AddWord),
            "list" => Some(Action::ListWords),
            "test" => Some(Action::Test),
            "stats" => Some(Action::Stats),
            _ => {
                let mut parts = data.split(':');
                if parts.next() != Some(ANSWER_PREFIX) {
                    return None;
                }
                let tag = parts.next()?.parse().ok()?;
                let option = parts.next()?.parse().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                Some(Action::Answer { tag, option })
            }
        }
    }

    pub fn data(&self) -> String {
        match self {
            Action::Menu => "menu".to_string(),
            Action::AddWord => "add".to_string(),
            Action::ListWords => "list".to_string(),
            Action::Test => "test".to_string(),
            Action::Stats => "stats".to_string(),
            Action::Answer { tag, option } => format!("{ANSWER_PREFIX}:{tag}:{option}"),
        }
    }

    fn button(self, text: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(text, self.data())
    }
}

pub fn menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![Action::AddWord.button(ADD_WORD_BUTTON)],
        vec![Action::ListWords.button(MY_WORDS_BUTTON)],
        vec![Action::Test.button(TEST_BUTTON)],
        vec![Action::Stats.button(STATS_BUTTON)],
    ])
}

pub fn back() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![Action::Menu.button(BACK_BUTTON)]])
}

/// One button per option, each carrying the question tag.
pub fn answers(view: &QuestionView) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(view.options.iter().enumerate().map(|(option, text)| {
        vec![Action::Answer {
            tag: view.tag,
            option,
        }
        .button(text.clone())]
    }))
}

/// How the chat reacts to an answer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReply {
    pub toast: Option<&'static str>,
    /// Replace the buttons with the next question or the final score.
    pub show_next: bool,
}

pub fn answer_reply(outcome: &QuizResult<AnswerResult>) -> AnswerReply {
    match outcome {
        Ok(result) => AnswerReply {
            toast: Some(if result.was_correct {
                CORRECT_TEXT
            } else {
                WRONG_TEXT
            }),
            show_next: true,
        },
        Err(QuizError::StaleAnswer | QuizError::NoActiveSession) => AnswerReply {
            toast: Some(EXPIRED_TEXT),
            show_next: false,
        },
        // The quiz has already moved past the answered question, so the old
        // buttons must go even though the store write failed.
        Err(QuizError::StoreUnavailable(_) | QuizError::InsufficientVocabulary { .. }) => {
            AnswerReply {
                toast: None,
                show_next: true,
            }
        }
    }
}

pub fn question_text(view: &QuestionView) -> String {
    format!("Вопрос {}/{}\n\n{}", view.index, view.total, view.prompt)
}

pub fn quiz_finished_text(score: usize, total: usize) -> String {
    format!("Тест завершен!\n\nПравильных: {score}/{total}")
}

pub fn word_list_text(words: &[WordRecord], limit: usize) -> String {
    let mut text = String::from("Твои слова:\n\n");
    for word in words.iter().take(limit) {
        text.push_str(&format!(
            "{} - {} (повторено: {})\n",
            word.term, word.translation, word.times_learned
        ));
    }
    text
}

pub fn stats_text(summary: &StatsSummary) -> String {
    format!(
        "Статистика:\n\nВсего слов: {}\nТестов пройдено: {}\nПравильных ответов: {}\nТочность: {}%",
        summary.total_words, summary.tests_passed, summary.correct_answers, summary.accuracy_percent
    )
}
