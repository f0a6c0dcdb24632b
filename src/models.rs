use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedError};

/// Starting easiness for an item that has never been graded.
pub const SEED_EASINESS: f64 = 2.5;

/// Lower bound for the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

// Recall quality reported by the learner for one grading event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quality {
    Blackout = 0,
    Incorrect = 1,
    Recognized = 2,
    Hard = 3,
    Good = 4,
    Perfect = 5,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::Blackout,
        Quality::Incorrect,
        Quality::Recognized,
        Quality::Hard,
        Quality::Good,
        Quality::Perfect,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Quality::Blackout),
            1 => Ok(Quality::Incorrect),
            2 => Ok(Quality::Recognized),
            3 => Ok(Quality::Hard),
            4 => Ok(Quality::Good),
            5 => Ok(Quality::Perfect),
            _ => Err(SchedError::invalid(format!(
                "quality must be between 0 and 5, got {}",
                v
            ))),
        }
    }

    /// A grade of 3 or better counts as a successful recall.
    pub fn is_success(&self) -> bool {
        self.as_u8() >= 3
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Blackout => "Blackout",
            Quality::Incorrect => "Incorrect",
            Quality::Recognized => "Recognized",
            Quality::Hard => "Hard",
            Quality::Good => "Good",
            Quality::Perfect => "Perfect",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "blackout" => Ok(Quality::Blackout),
            "1" | "incorrect" | "wrong" => Ok(Quality::Incorrect),
            "2" | "recognized" => Ok(Quality::Recognized),
            "3" | "hard" => Ok(Quality::Hard),
            "4" | "good" => Ok(Quality::Good),
            "5" | "perfect" | "easy" => Ok(Quality::Perfect),
            other => Err(SchedError::invalid(format!(
                "unknown quality '{}', use 0-5 or blackout/incorrect/recognized/hard/good/perfect",
                other
            ))),
        }
    }
}

impl TryFrom<u8> for Quality {
    type Error = SchedError;

    fn try_from(v: u8) -> Result<Self> {
        Quality::from_u8(v)
    }
}

impl TryFrom<i64> for Quality {
    type Error = SchedError;

    fn try_from(v: i64) -> Result<Self> {
        let v = u8::try_from(v).map_err(|_| {
            SchedError::invalid(format!("quality must be between 0 and 5, got {}", v))
        })?;
        Quality::from_u8(v)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> u8 {
        q.as_u8()
    }
}

/// Scheduling state for one (user, concept) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub easiness_factor: f64,
    pub repetitions: u32,
    pub interval: u32,
    pub last_review_date: Option<NaiveDate>,
}

impl Default for ReviewItem {
    fn default() -> Self {
        Self {
            easiness_factor: SEED_EASINESS,
            repetitions: 0,
            interval: 0,
            last_review_date: None,
        }
    }
}

impl ReviewItem {
    /// `last_review_date + interval`, or `None` before the first grading event.
    pub fn next_review_date(&self) -> Option<NaiveDate> {
        self.last_review_date
            .and_then(|d| d.checked_add_days(Days::new(self.interval as u64)))
    }

    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.next_review_date().is_some_and(|next| next <= as_of)
    }
}

/// The result of one graded session, folded into the user's aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub score: f64,
    pub questions: u32,
    pub correct: u32,
}

impl Attempt {
    pub fn new(score: f64, questions: u32, correct: u32) -> Self {
        Self {
            score,
            questions,
            correct,
        }
    }

    /// A single flashcard grade as a one-question attempt.
    pub fn single(quality: Quality) -> Self {
        if quality.is_success() {
            Self::new(1.0, 1, 1)
        } else {
            Self::new(0.0, 1, 0)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.questions == 0 {
            return Err(SchedError::invalid("attempt must cover at least one question"));
        }
        if !self.score.is_finite() || self.score < 0.0 {
            return Err(SchedError::invalid(format!(
                "attempt score must be a non-negative number, got {}",
                self.score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPerformance {
    pub quizzes_completed: u32,
    pub total_score: f64,
    pub total_questions_answered: u32,
    pub total_correct_answers: u32,
    pub average_score: f64,
    pub overall_accuracy: f64,
}

/// A stored record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueItem {
    pub concept_id: i64,
    pub concept_name: String,
    pub next_review_date: NaiveDate,
    pub item: ReviewItem,
}

impl DueItem {
    pub fn cursor(&self) -> DueCursor {
        DueCursor {
            next_review_date: self.next_review_date,
            concept_id: self.concept_id,
        }
    }

    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.next_review_date).num_days()
    }
}

/// Position in the due ordering; a page resumes strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueCursor {
    pub next_review_date: NaiveDate,
    pub concept_id: i64,
}

// One row of the append-only review log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub concept_id: i64,
    pub quality: Quality,
    pub reviewed_on: NaiveDate,
    pub interval: u32,
    pub easiness_factor: f64,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
