use std::sync::Arc;

use log::{debug, info, warn};
use rand::seq::SliceRandom;

use crate::quiz::{
    assemble_options, ActiveQuestion, AnswerResult, QuizError, QuizPhase, QuizResult,
    QuizSession, QuizStep, SessionState,
};
use crate::storage::{OwnerId, StatsStore, StorageError, WordStore};

/// Smallest vocabulary that still leaves one distractor per question.
const MIN_WORDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSettings {
    pub questions_per_quiz: usize,
    pub max_options: usize,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            questions_per_quiz: 5,
            max_options: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub total_words: usize,
    pub tests_passed: u32,
    pub correct_answers: u32,
    pub accuracy_percent: f64,
}

/// Runs multiple-choice quizzes over a user's own vocabulary.
pub struct QuizEngine {
    words: Arc<dyn WordStore>,
    stats: Arc<dyn StatsStore>,
    sessions: Arc<SessionState>,
    settings: QuizSettings,
}

impl QuizEngine {
    pub fn new(
        words: Arc<dyn WordStore>,
        stats: Arc<dyn StatsStore>,
        sessions: Arc<SessionState>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            words,
            stats,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionState {
        &self.sessions
    }

    /// Draws the words for a new quiz and makes it the user's only session.
    ///
    /// A user with fewer than two words is rejected and keeps any session
    /// they already had.
    pub async fn start_session(&self, owner: OwnerId) -> QuizResult<QuizSession> {
        let questions = self
            .words
            .sample_random(owner, self.settings.questions_per_quiz)
            .await?;
        if questions.len() < MIN_WORDS {
            return Err(QuizError::InsufficientVocabulary {
                available: questions.len(),
            });
        }

        let session = QuizSession::new(owner, questions);
        self.sessions.put(owner, session.clone());
        info!(
            "Started a quiz of {} questions for user {} ({} sessions active)",
            session.total(),
            owner,
            self.sessions.len()
        );
        Ok(session)
    }

    /// Returns the question at the current position, or the final score.
    ///
    /// Calling this again before an answer returns the same question. Once
    /// the quiz is complete the session is dropped.
    pub async fn build_question(&self, owner: OwnerId) -> QuizResult<QuizStep> {
        let session = self
            .sessions
            .get(owner)
            .ok_or(QuizError::NoActiveSession)?;

        let word = match (&session.phase, session.current_word()) {
            (QuizPhase::Completed, _) | (_, None) => {
                self.sessions.clear(owner);
                info!(
                    "User {} finished a quiz with {}/{}",
                    owner,
                    session.score,
                    session.total()
                );
                return Ok(QuizStep::Complete {
                    score: session.score,
                    total: session.total(),
                });
            }
            (QuizPhase::AwaitingAnswer(_), Some(_)) => {
                return session
                    .view()
                    .map(QuizStep::Question)
                    .ok_or(QuizError::NoActiveSession);
            }
            (QuizPhase::Created, Some(word)) => word.clone(),
        };

        let mut pool: Vec<String> = self
            .words
            .list_words(owner)
            .await?
            .into_iter()
            .filter(|other| other.id != word.id)
            .map(|other| other.translation)
            .collect();
        pool.shuffle(&mut rand::thread_rng());
        let (options, correct_option_index) = assemble_options(
            &word.translation,
            pool,
            self.settings.max_options,
            &mut rand::thread_rng(),
        );
        if options.len() < 2 {
            warn!("Word {} of user {} has no distractors", word.id, owner);
        }

        let question = ActiveQuestion {
            tag: self.sessions.next_tag(),
            word_id: word.id,
            correct_option_index,
            options,
        };
        debug!(
            "Question {} for user {}: {:?} -> {:?}",
            question.tag, owner, word.term, question.options
        );

        // The session may have been replaced while the pool was loading.
        let mut current = match self.sessions.get(owner) {
            Some(current) if current == session => current,
            _ => return Err(QuizError::StaleAnswer),
        };
        current.phase = QuizPhase::AwaitingAnswer(question);
        let view = current.view().ok_or(QuizError::NoActiveSession)?;
        self.sessions.put(owner, current);
        Ok(QuizStep::Question(view))
    }

    /// Scores an answer to the question tagged `tag`.
    ///
    /// The session moves forward before anything is written to the stores, so
    /// a store failure is reported but does not undo the step.
    pub async fn submit_answer(
        &self,
        owner: OwnerId,
        tag: u64,
        chosen: usize,
    ) -> QuizResult<AnswerResult> {
        let mut session = self
            .sessions
            .get(owner)
            .ok_or(QuizError::NoActiveSession)?;
        let (result, word_id) = session.apply_answer(tag, chosen).map_err(|err| {
            warn!("Ignoring answer with tag {} from user {}", tag, owner);
            err
        })?;
        self.sessions.put(owner, session);
        debug!(
            "User {} answered question {}: correct = {}",
            owner, tag, result.was_correct
        );

        if result.was_correct {
            match self.words.increment_learned(word_id).await {
                Ok(()) => {}
                Err(StorageError::NotFound(id)) => {
                    warn!("Word {} disappeared before it could be marked learned", id)
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.stats.record_answer(owner, result.was_correct).await?;

        Ok(result)
    }

    pub async fn stats_summary(&self, owner: OwnerId) -> QuizResult<StatsSummary> {
        let total_words = self.words.list_words(owner).await?.len();
        let stats = self.stats.get_stats(owner).await?;
        Ok(StatsSummary {
            total_words,
            tests_passed: stats.tests_passed,
            correct_answers: stats.correct_answers,
            accuracy_percent: accuracy_percent(stats.correct_answers, stats.tests_passed),
        })
    }
}

/// Share of correct answers in percent, rounded to one decimal with ties to even.
pub fn accuracy_percent(correct: u32, answered: u32) -> f64 {
    if answered == 0 {
        return 0.0;
    }
    let percent = f64::from(correct) / f64::from(answered) * 100.0;
    (percent * 10.0).round_ties_even() / 10.0
}
