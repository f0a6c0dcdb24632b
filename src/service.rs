//! Grading workflow: scheduler and aggregator applied against a store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator;
use crate::error::{Entity, Result, SchedError};
use crate::models::{
    Attempt, DueCursor, DueItem, Quality, ReviewItem, ReviewLogEntry, UserPerformance,
};
use crate::scheduler;
use crate::store::{ItemKey, ReviewRecordStore, StoreTx};

/// Conflict retries attempted before a conflict is surfaced.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a caller gets back after one grading event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub next_review_date: NaiveDate,
    pub item: ReviewItem,
    pub performance: UserPerformance,
}

pub struct SchedulingService<S> {
    store: S,
    max_retries: u32,
}

impl<S: ReviewRecordStore> SchedulingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Grade one concept for one user and persist the new schedule and
    /// aggregate together.
    pub fn record_review(
        &mut self,
        user_id: i64,
        concept_id: i64,
        quality: Quality,
        attempt: &Attempt,
        today: NaiveDate,
    ) -> Result<ReviewResult> {
        attempt.validate()?;
        let key = ItemKey::new(user_id, concept_id);

        let result = self.with_retries(&key.to_string(), |tx| {
            ensure_exists(tx, Entity::User, user_id)?;
            ensure_exists(tx, Entity::Concept, concept_id)?;

            let current = tx.load_review_item(key)?;
            let (state, item_version) = match current {
                Some(v) => (v.value, Some(v.version)),
                None => (ReviewItem::default(), None),
            };
            let next = scheduler::advance(&state, quality, today);
            let next_review_date = next
                .next_review_date()
                .filter(|d| *d <= scheduler::last_schedulable_date())
                .ok_or_else(|| {
                    SchedError::invalid(format!(
                        "{} cannot be scheduled past the calendar end",
                        key
                    ))
                })?;

            let performance = fold_attempt(tx, user_id, attempt, today)?;

            tx.save_review_item(key, &next, item_version)?;
            tx.append_review_log(key, quality, &next)?;

            Ok(ReviewResult {
                next_review_date,
                item: next,
                performance,
            })
        })?;

        info!(
            user_id,
            concept_id,
            quality = quality.as_u8(),
            interval = result.item.interval,
            next_review = %result.next_review_date,
            "review recorded"
        );
        Ok(result)
    }

    /// Fold a quiz attempt that is not tied to a single concept.
    pub fn record_attempt(
        &mut self,
        user_id: i64,
        attempt: &Attempt,
        today: NaiveDate,
    ) -> Result<UserPerformance> {
        attempt.validate()?;
        let subject = format!("performance of user {}", user_id);

        let performance = self.with_retries(&subject, |tx| {
            ensure_exists(tx, Entity::User, user_id)?;
            fold_attempt(tx, user_id, attempt, today)
        })?;

        info!(
            user_id,
            quizzes = performance.quizzes_completed,
            average = performance.average_score,
            "attempt recorded"
        );
        Ok(performance)
    }

    /// Recompute the user's aggregate from attempt history.
    ///
    /// An aggregate with no history behind it cannot be reproduced and is
    /// removed.
    pub fn rebuild_performance(&mut self, user_id: i64) -> Result<Option<UserPerformance>> {
        let subject = format!("performance of user {}", user_id);

        self.with_retries(&subject, |tx| {
            ensure_exists(tx, Entity::User, user_id)?;
            let attempts = tx.load_attempts(user_id)?;
            let rebuilt = aggregator::rebuild(&attempts)?;
            let current = tx.load_aggregate(user_id)?;
            match (&rebuilt, current) {
                (Some(performance), current) => {
                    tx.save_aggregate(user_id, performance, current.map(|v| v.version))?;
                    debug!(user_id, attempts = attempts.len(), "aggregate rebuilt");
                }
                (None, Some(stale)) => {
                    warn!(
                        user_id,
                        quizzes = stale.value.quizzes_completed,
                        "no attempt history, dropping aggregate"
                    );
                    tx.delete_aggregate(user_id, stale.version)?;
                }
                (None, None) => {}
            }
            Ok(rebuilt)
        })
    }

    /// Items due on or before `as_of`, earliest first.
    pub fn list_due_items(&self, user_id: i64, as_of: NaiveDate) -> Result<Vec<DueItem>> {
        let as_of = as_of.min(scheduler::last_schedulable_date());
        self.store.list_due_items(user_id, as_of, None, None)
    }

    /// One page of [`list_due_items`](Self::list_due_items), resuming after `after`.
    pub fn list_due_page(
        &self,
        user_id: i64,
        as_of: NaiveDate,
        after: Option<DueCursor>,
        limit: u32,
    ) -> Result<Vec<DueItem>> {
        if limit == 0 {
            return Err(SchedError::invalid("page limit must be at least 1"));
        }
        let as_of = as_of.min(scheduler::last_schedulable_date());
        self.store.list_due_items(user_id, as_of, after, Some(limit))
    }

    pub fn schedule(&self, user_id: i64) -> Result<Vec<DueItem>> {
        self.store.list_scheduled(user_id)
    }

    pub fn review_item(&self, user_id: i64, concept_id: i64) -> Result<Option<ReviewItem>> {
        self.store.get_review_item(ItemKey::new(user_id, concept_id))
    }

    pub fn performance(&self, user_id: i64) -> Result<Option<UserPerformance>> {
        self.store.get_aggregate(user_id)
    }

    pub fn review_history(&self, user_id: i64, concept_id: i64) -> Result<Vec<ReviewLogEntry>> {
        self.store.review_log(ItemKey::new(user_id, concept_id))
    }

    // Each attempt reloads everything; nothing computed in a failed attempt
    // is carried into the next one.
    fn with_retries<T, F>(&mut self, subject: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&dyn StoreTx) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match self.store.transaction(&mut op) {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(subject, attempt, max = self.max_retries, "conflict, retrying: {}", e);
                }
                Err(e) if e.is_retryable() => {
                    warn!(subject, "giving up after {} retries", self.max_retries);
                    return Err(e);
                }
                other => return other,
            }
        }
    }
}

fn ensure_exists(tx: &dyn StoreTx, entity: Entity, id: i64) -> Result<()> {
    let exists = match entity {
        Entity::User => tx.user_exists(id)?,
        Entity::Concept => tx.concept_exists(id)?,
    };
    if exists {
        Ok(())
    } else {
        Err(SchedError::not_found(entity, id))
    }
}

fn fold_attempt(
    tx: &dyn StoreTx,
    user_id: i64,
    attempt: &Attempt,
    today: NaiveDate,
) -> Result<UserPerformance> {
    let current = tx.load_aggregate(user_id)?;
    let (previous, version) = match current {
        Some(v) => (Some(v.value), Some(v.version)),
        None => (None, None),
    };
    let performance = aggregator::fold(previous.as_ref(), attempt)?;
    tx.save_aggregate(user_id, &performance, version)?;
    tx.append_attempt(user_id, attempt, today)?;
    Ok(performance)
}
