//! Running per-user performance statistics.
//!
//! `average_score` is the mean score per graded session
//! (`total_score / quizzes_completed`). `overall_accuracy` is the percentage
//! of questions answered correctly across all sessions.

use crate::error::{Result, SchedError};
use crate::models::{Attempt, UserPerformance};

/// Fold one attempt into the user's aggregate, creating it if absent.
///
/// The caller is responsible for keeping `correct <= questions`; only the
/// question count and score are validated here.
pub fn fold(previous: Option<&UserPerformance>, attempt: &Attempt) -> Result<UserPerformance> {
    attempt.validate()?;

    let (quizzes, score, questions, correct) = match previous {
        Some(p) => (
            p.quizzes_completed.checked_add(1),
            p.total_score + attempt.score,
            p.total_questions_answered.checked_add(attempt.questions),
            p.total_correct_answers.checked_add(attempt.correct),
        ),
        None => (
            Some(1),
            attempt.score,
            Some(attempt.questions),
            Some(attempt.correct),
        ),
    };

    match (quizzes, questions, correct) {
        (Some(q), Some(n), Some(c)) => Ok(derive(q, score, n, c)),
        _ => Err(SchedError::invalid("performance counters would overflow")),
    }
}

/// Recompute an aggregate from raw attempt history.
pub fn rebuild<'a, I>(attempts: I) -> Result<Option<UserPerformance>>
where
    I: IntoIterator<Item = &'a Attempt>,
{
    let mut current: Option<UserPerformance> = None;
    for attempt in attempts {
        current = Some(fold(current.as_ref(), attempt)?);
    }
    Ok(current)
}

fn derive(quizzes: u32, total_score: f64, questions: u32, correct: u32) -> UserPerformance {
    let average_score = if quizzes == 0 {
        0.0
    } else {
        total_score / quizzes as f64
    };
    let overall_accuracy = if questions == 0 {
        0.0
    } else {
        100.0 * correct as f64 / questions as f64
    };

    UserPerformance {
        quizzes_completed: quizzes,
        total_score,
        total_questions_answered: questions,
        total_correct_answers: correct,
        average_score,
        overall_accuracy,
    }
}
