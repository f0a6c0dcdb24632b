//! Storage boundary for scheduling state and performance aggregates.
//!
//! Writes happen inside [`ReviewRecordStore::transaction`]: the closure gets a
//! [`StoreTx`] handle, and the transaction commits only if the closure returns
//! `Ok`. Every save carries the version the record was loaded at; a mismatch is
//! reported as [`SchedError::ConcurrencyConflict`](crate::error::SchedError).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    Attempt, DueCursor, DueItem, Quality, ReviewItem, ReviewLogEntry, UserPerformance, Versioned,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub user_id: i64,
    pub concept_id: i64,
}

impl ItemKey {
    pub fn new(user_id: i64, concept_id: i64) -> Self {
        Self {
            user_id,
            concept_id,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "review item {}/{}", self.user_id, self.concept_id)
    }
}

/// Operations available inside one transaction scope.
pub trait StoreTx {
    fn user_exists(&self, user_id: i64) -> Result<bool>;

    fn concept_exists(&self, concept_id: i64) -> Result<bool>;

    fn load_review_item(&self, key: ItemKey) -> Result<Option<Versioned<ReviewItem>>>;

    /// Insert when `expected_version` is `None`, otherwise update only if the
    /// stored version still matches. Returns the new version.
    fn save_review_item(
        &self,
        key: ItemKey,
        item: &ReviewItem,
        expected_version: Option<i64>,
    ) -> Result<i64>;

    fn load_aggregate(&self, user_id: i64) -> Result<Option<Versioned<UserPerformance>>>;

    fn save_aggregate(
        &self,
        user_id: i64,
        performance: &UserPerformance,
        expected_version: Option<i64>,
    ) -> Result<i64>;

    /// Remove the aggregate if it is still at `expected_version`.
    fn delete_aggregate(&self, user_id: i64, expected_version: i64) -> Result<()>;

    fn append_review_log(&self, key: ItemKey, quality: Quality, item: &ReviewItem) -> Result<()>;

    fn append_attempt(&self, user_id: i64, attempt: &Attempt, recorded_on: NaiveDate)
        -> Result<()>;

    /// Every attempt recorded for the user, oldest first.
    fn load_attempts(&self, user_id: i64) -> Result<Vec<Attempt>>;
}

pub trait ReviewRecordStore {
    /// Run `f` inside one transaction. The transaction is committed when `f`
    /// returns `Ok` and rolled back on every other exit path.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn StoreTx) -> Result<T>;

    /// Items with `next_review_date <= as_of`, ordered by date then concept id,
    /// starting strictly after `after` when given.
    fn list_due_items(
        &self,
        user_id: i64,
        as_of: NaiveDate,
        after: Option<DueCursor>,
        limit: Option<u32>,
    ) -> Result<Vec<DueItem>>;

    /// Every scheduled item for the user, in due order.
    fn list_scheduled(&self, user_id: i64) -> Result<Vec<DueItem>>;

    fn get_review_item(&self, key: ItemKey) -> Result<Option<ReviewItem>>;

    fn get_aggregate(&self, user_id: i64) -> Result<Option<UserPerformance>>;

    /// Review log for one item, oldest first.
    fn review_log(&self, key: ItemKey) -> Result<Vec<ReviewLogEntry>>;
}
