pub mod engine;
pub mod session;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::storage::{OwnerId, StorageError, WordId, WordRecord};

pub use engine::{QuizEngine, QuizSettings, StatsSummary};
pub use session::SessionState;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("at least 2 words are needed for a quiz, found {available}")]
    InsufficientVocabulary { available: usize },

    #[error("the answer does not belong to the active question")]
    StaleAnswer,

    #[error("no quiz is in progress")]
    NoActiveSession,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

pub type QuizResult<T> = Result<T, QuizError>;

/// A question committed to a session, waiting for an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveQuestion {
    pub tag: u64,
    pub word_id: WordId,
    pub correct_option_index: usize,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum QuizPhase {
    /// No question has been drawn for `current_index` yet.
    #[default]
    Created,
    AwaitingAnswer(ActiveQuestion),
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    pub owner_id: OwnerId,
    pub questions: Vec<WordRecord>,
    pub current_index: usize,
    pub score: usize,
    pub phase: QuizPhase,
}

/// What the dialogue layer needs to render one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub tag: u64,
    /// 1-based position of the question in the quiz.
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizStep {
    Question(QuestionView),
    Complete { score: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerResult {
    pub was_correct: bool,
    pub new_index: usize,
    pub score: usize,
}

impl QuizSession {
    pub fn new(owner_id: OwnerId, questions: Vec<WordRecord>) -> Self {
        Self {
            owner_id,
            questions,
            current_index: 0,
            score: 0,
            phase: QuizPhase::Created,
        }
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    /// The word asked about at `current_index`, if the quiz is not over.
    pub fn current_word(&self) -> Option<&WordRecord> {
        self.questions.get(self.current_index)
    }

    pub fn active_question(&self) -> Option<&ActiveQuestion> {
        match &self.phase {
            QuizPhase::AwaitingAnswer(question) => Some(question),
            QuizPhase::Created | QuizPhase::Completed => None,
        }
    }

    /// Renders the committed question. `None` unless a question is awaiting an answer.
    pub fn view(&self) -> Option<QuestionView> {
        let question = self.active_question()?;
        let word = self.current_word()?;
        Some(QuestionView {
            tag: question.tag,
            index: self.current_index + 1,
            total: self.total(),
            prompt: word.term.clone(),
            options: question.options.clone(),
        })
    }

    /// Scores `chosen` against the question tagged `tag` and moves to the next word.
    ///
    /// Out-of-range choices count as wrong answers. A mismatching tag, or no
    /// question awaiting an answer, leaves the session untouched.
    pub fn apply_answer(&mut self, tag: u64, chosen: usize) -> QuizResult<(AnswerResult, WordId)> {
        let question = match &self.phase {
            QuizPhase::AwaitingAnswer(question) if question.tag == tag => question,
            _ => return Err(QuizError::StaleAnswer),
        };

        let was_correct = chosen == question.correct_option_index;
        let word_id = question.word_id;
        if was_correct {
            self.score += 1;
        }
        self.current_index += 1;
        self.phase = if self.is_finished() {
            QuizPhase::Completed
        } else {
            QuizPhase::Created
        };

        Ok((
            AnswerResult {
                was_correct,
                new_index: self.current_index,
                score: self.score,
            },
            word_id,
        ))
    }
}

/// Puts the correct translation among the distractors in random order.
///
/// Takes at most `max_options - 1` entries from `pool`, which is expected to be
/// shuffled already. Returns the options and the position of the correct one.
/// Identical texts in the pool are kept as separate options.
pub fn assemble_options<R: Rng + ?Sized>(
    correct: &str,
    pool: Vec<String>,
    max_options: usize,
    rng: &mut R,
) -> (Vec<String>, usize) {
    let mut options: Vec<(bool, String)> = std::iter::once((true, correct.to_string()))
        .chain(
            pool.into_iter()
                .take(max_options.saturating_sub(1))
                .map(|text| (false, text)),
        )
        .collect();
    options.shuffle(rng);

    let correct_option_index = options
        .iter()
        .position(|(is_correct, _)| *is_correct)
        .unwrap_or_default();
    let options = options.into_iter().map(|(_, text)| text).collect();
    (options, correct_option_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: i64, term: &str, translation: &str) -> WordRecord {
        WordRecord {
            id: WordId(id),
            owner_id: OwnerId(1),
            term: term.to_string(),
            translation: translation.to_string(),
            times_learned: 0,
            added_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
        }
    }

    fn session_awaiting(tag: u64) -> QuizSession {
        let mut session = QuizSession::new(
            OwnerId(1),
            vec![word(1, "cat", "gato"), word(2, "dog", "perro")],
        );
        session.phase = QuizPhase::AwaitingAnswer(ActiveQuestion {
            tag,
            word_id: WordId(1),
            correct_option_index: 1,
            options: vec!["perro".to_string(), "gato".to_string()],
        });
        session
    }

    #[test]
    fn assembled_options_keep_the_correct_answer_once() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let pool = vec!["perro".to_string(), "casa".to_string(), "sol".to_string(), "luna".to_string()];
            let (options, idx) = assemble_options("gato", pool, 4, &mut rng);
            assert_eq!(options.len(), 4);
            assert_eq!(options[idx], "gato");
            assert_eq!(options.iter().filter(|o| *o == "gato").count(), 1);
        }
    }

    #[test]
    fn assembled_options_with_empty_pool_degenerate_to_one() {
        let (options, idx) = assemble_options("gato", Vec::new(), 4, &mut rand::thread_rng());
        assert_eq!(options, vec!["gato".to_string()]);
        assert_eq!(idx, 0);
    }

    #[test]
    fn duplicate_translations_are_tracked_by_position() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let (options, idx) = assemble_options("gato", vec!["gato".to_string()], 4, &mut rng);
            assert_eq!(options, vec!["gato".to_string(), "gato".to_string()]);
            assert!(idx < 2);
        }
    }

    #[test]
    fn view_is_only_available_while_awaiting_an_answer() {
        let fresh = QuizSession::new(OwnerId(1), vec![word(1, "cat", "gato")]);
        assert_eq!(fresh.view(), None);

        let view = session_awaiting(7).view().unwrap();
        assert_eq!(view.tag, 7);
        assert_eq!(view.index, 1);
        assert_eq!(view.total, 2);
        assert_eq!(view.prompt, "cat");
    }

    #[test]
    fn answers_advance_the_session_until_completed() {
        let mut session = session_awaiting(3);
        let (result, word_id) = session.apply_answer(3, 1).unwrap();
        assert_eq!(word_id, WordId(1));
        assert_eq!(
            result,
            AnswerResult {
                was_correct: true,
                new_index: 1,
                score: 1
            }
        );
        assert_eq!(session.phase, QuizPhase::Created);

        session.phase = QuizPhase::AwaitingAnswer(ActiveQuestion {
            tag: 4,
            word_id: WordId(2),
            correct_option_index: 0,
            options: vec!["perro".to_string(), "gato".to_string()],
        });
        let (result, _) = session.apply_answer(4, 1).unwrap();
        assert!(!result.was_correct);
        assert_eq!(result.new_index, 2);
        assert_eq!(session.score, 1);
        assert_eq!(session.phase, QuizPhase::Completed);
        assert!(session.is_finished());
    }

    #[test]
    fn out_of_range_choice_is_just_wrong() {
        let mut session = session_awaiting(3);
        let (result, _) = session.apply_answer(3, 42).unwrap();
        assert!(!result.was_correct);
        assert_eq!(session.current_index, 1);
        assert_eq!(session.score, 0);
    }

    #[test]
    fn stale_tags_leave_the_session_untouched() {
        let mut session = session_awaiting(3);
        let before = session.clone();
        assert!(matches!(session.apply_answer(2, 1), Err(QuizError::StaleAnswer)));
        assert_eq!(session, before);

        let mut fresh = QuizSession::new(OwnerId(1), vec![word(1, "cat", "gato")]);
        assert!(matches!(fresh.apply_answer(0, 0), Err(QuizError::StaleAnswer)));
        assert_eq!(fresh.current_index, 0);
    }
}
