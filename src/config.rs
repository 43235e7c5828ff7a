use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::QuizSettings;

const DEFAULT_DB_PATH: &str = "words.db";
const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },
}

/// Bot settings read from the environment (and `.env`, if present).
///
/// The bot token itself is picked up by `Bot::from_env` from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub quiz: QuizSettings,
    /// How many words "My words" shows.
    pub list_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = QuizSettings::default();
        let number = |name: &'static str, default: usize, min: usize| -> Result<usize, ConfigError> {
            let value = match lookup(name) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::NotANumber {
                    name,
                    value: raw.clone(),
                })?,
                None => default,
            };
            if value < min {
                return Err(ConfigError::TooSmall { name, min, value });
            }
            Ok(value)
        };

        Ok(Self {
            db_path: lookup("VOCAB_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            quiz: QuizSettings {
                questions_per_quiz: number("VOCAB_QUIZ_SIZE", defaults.questions_per_quiz, 1)?,
                max_options: number("VOCAB_MAX_OPTIONS", defaults.max_options, 2)?,
            },
            list_limit: number("VOCAB_LIST_LIMIT", DEFAULT_LIST_LIMIT, 1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_classic_bot() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("words.db"));
        assert_eq!(config.quiz, QuizSettings::default());
        assert_eq!(config.quiz.questions_per_quiz, 5);
        assert_eq!(config.quiz.max_options, 4);
        assert_eq!(config.list_limit, 20);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = config_from(&[
            ("VOCAB_DB_PATH", "/tmp/vocab.sqlite"),
            ("VOCAB_QUIZ_SIZE", " 10 "),
            ("VOCAB_MAX_OPTIONS", "3"),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/vocab.sqlite"));
        assert_eq!(config.quiz.questions_per_quiz, 10);
        assert_eq!(config.quiz.max_options, 3);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(matches!(
            config_from(&[("VOCAB_QUIZ_SIZE", "five")]),
            Err(ConfigError::NotANumber { name: "VOCAB_QUIZ_SIZE", .. })
        ));
        assert!(matches!(
            config_from(&[("VOCAB_MAX_OPTIONS", "1")]),
            Err(ConfigError::TooSmall { min: 2, value: 1, .. })
        ));
    }
}
