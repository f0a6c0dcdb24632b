use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SchedError};
use crate::models::{
    Attempt, Concept, DueCursor, DueItem, Quality, ReviewItem, ReviewLogEntry, User,
    UserPerformance, Versioned,
};
use crate::store::{ItemKey, ReviewRecordStore, StoreTx};

impl From<rusqlite::Error> for SchedError {
    fn from(e: rusqlite::Error) -> Self {
        SchedError::Storage(Box::new(e))
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_secs(5))
    }

    /// Open with an explicit lock wait; writers queue for at most `busy_timeout`.
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS concepts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Scheduling state per (user, concept)
            CREATE TABLE IF NOT EXISTS review_items (
                user_id INTEGER NOT NULL,
                concept_id INTEGER NOT NULL,
                easiness_factor REAL NOT NULL CHECK(easiness_factor >= 1.3),
                repetitions INTEGER NOT NULL DEFAULT 0 CHECK(repetitions >= 0),
                interval_days INTEGER NOT NULL CHECK(interval_days >= 1),
                last_review_date TEXT NOT NULL,
                next_review_date TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, concept_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (concept_id) REFERENCES concepts(id) ON DELETE CASCADE
            );

            -- Running aggregate per user
            CREATE TABLE IF NOT EXISTS user_performance (
                user_id INTEGER PRIMARY KEY,
                quizzes_completed INTEGER NOT NULL DEFAULT 0,
                total_score REAL NOT NULL DEFAULT 0,
                total_questions_answered INTEGER NOT NULL DEFAULT 0,
                total_correct_answers INTEGER NOT NULL DEFAULT 0,
                average_score REAL NOT NULL DEFAULT 0,
                overall_accuracy REAL NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                concept_id INTEGER NOT NULL,
                quality INTEGER NOT NULL CHECK(quality BETWEEN 0 AND 5),
                reviewed_on TEXT NOT NULL,
                interval_days INTEGER NOT NULL,
                easiness_factor REAL NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (concept_id) REFERENCES concepts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS attempt_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                score REAL NOT NULL,
                questions INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                recorded_on TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_review_history_item ON review_history(user_id, concept_id);
            CREATE INDEX IF NOT EXISTS idx_attempt_history_user ON attempt_history(user_id);
            "#,
        )?;

        // Run migrations for existing databases
        self.migrate()?;

        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_review_items_due ON review_items(user_id, next_review_date, concept_id);",
        )?;

        Ok(())
    }

    // Databases created before optimistic locking have no version columns
    fn migrate(&self) -> Result<()> {
        for table in ["review_items", "user_performance"] {
            let has_version = self
                .conn
                .prepare(&format!("SELECT version FROM {} LIMIT 1", table))
                .is_ok();

            if !has_version {
                debug!(table, "adding version column");
                self.conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN version INTEGER NOT NULL DEFAULT 1;",
                    table
                ))?;
            }
        }

        Ok(())
    }

    // User operations
    pub fn add_user(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM users ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Concept operations
    pub fn add_concept(&self, name: &str, description: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO concepts (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_concept(&self, id: i64) -> Result<Option<Concept>> {
        let concept = self
            .conn
            .query_row(
                "SELECT id, name, description, created_at FROM concepts WHERE id = ?1",
                params![id],
                concept_from_row,
            )
            .optional()?;
        Ok(concept)
    }

    pub fn list_concepts(&self) -> Result<Vec<Concept>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, created_at FROM concepts ORDER BY name")?;
        let rows = stmt.query_map([], concept_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn concept_from_row(row: &Row<'_>) -> rusqlite::Result<Concept> {
    Ok(Concept {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn review_item_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewItem> {
    Ok(ReviewItem {
        easiness_factor: row.get(offset)?,
        repetitions: row.get(offset + 1)?,
        interval: row.get(offset + 2)?,
        last_review_date: Some(row.get(offset + 3)?),
    })
}

fn due_item_from_row(row: &Row<'_>) -> rusqlite::Result<DueItem> {
    Ok(DueItem {
        concept_id: row.get(0)?,
        concept_name: row.get(1)?,
        next_review_date: row.get(2)?,
        item: review_item_from_row(row, 3)?,
    })
}

fn performance_from_row(row: &Row<'_>) -> rusqlite::Result<UserPerformance> {
    Ok(UserPerformance {
        quizzes_completed: row.get(0)?,
        total_score: row.get(1)?,
        total_questions_answered: row.get(2)?,
        total_correct_answers: row.get(3)?,
        average_score: row.get(4)?,
        overall_accuracy: row.get(5)?,
    })
}

fn quality_from_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Quality> {
    let raw: u8 = row.get(idx)?;
    Quality::from_u8(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn is_key_collision(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

// Lock contention that outlasted the busy timeout is retryable like a version clash.
fn classify(e: rusqlite::Error, subject: &str) -> SchedError {
    if is_busy(&e) {
        SchedError::ConcurrencyConflict(format!("{} (store busy)", subject))
    } else {
        e.into()
    }
}

const REVIEW_ITEM_COLUMNS: &str =
    "easiness_factor, repetitions, interval_days, last_review_date, version";

const PERFORMANCE_COLUMNS: &str = "quizzes_completed, total_score, total_questions_answered, \
     total_correct_answers, average_score, overall_accuracy";

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl StoreTx for SqliteTx<'_> {
    fn user_exists(&self, user_id: i64) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    fn concept_exists(&self, concept_id: i64) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM concepts WHERE id = ?1)",
            params![concept_id],
            |row| row.get(0),
        )?)
    }

    fn load_review_item(&self, key: ItemKey) -> Result<Option<Versioned<ReviewItem>>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM review_items WHERE user_id = ?1 AND concept_id = ?2",
                    REVIEW_ITEM_COLUMNS
                ),
                params![key.user_id, key.concept_id],
                |row| {
                    Ok(Versioned {
                        value: review_item_from_row(row, 0)?,
                        version: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(item)
    }

    fn save_review_item(
        &self,
        key: ItemKey,
        item: &ReviewItem,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        let (last, next) = match (item.last_review_date, item.next_review_date()) {
            (Some(last), Some(next)) => (last, next),
            _ => {
                return Err(SchedError::invalid(format!(
                    "{} has never been reviewed and cannot be stored",
                    key
                )))
            }
        };

        match expected_version {
            None => {
                let inserted = self.conn.execute(
                    r#"
                    INSERT INTO review_items
                        (user_id, concept_id, easiness_factor, repetitions, interval_days,
                         last_review_date, next_review_date, version)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
                    "#,
                    params![
                        key.user_id,
                        key.concept_id,
                        item.easiness_factor,
                        item.repetitions,
                        item.interval,
                        last,
                        next
                    ],
                );
                match inserted {
                    Ok(_) => Ok(1),
                    Err(e) if is_key_collision(&e) => {
                        Err(SchedError::ConcurrencyConflict(key.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Some(version) => {
                let changed = self.conn.execute(
                    r#"
                    UPDATE review_items
                    SET easiness_factor = ?1,
                        repetitions = ?2,
                        interval_days = ?3,
                        last_review_date = ?4,
                        next_review_date = ?5,
                        version = version + 1
                    WHERE user_id = ?6 AND concept_id = ?7 AND version = ?8
                    "#,
                    params![
                        item.easiness_factor,
                        item.repetitions,
                        item.interval,
                        last,
                        next,
                        key.user_id,
                        key.concept_id,
                        version
                    ],
                )?;
                if changed == 0 {
                    return Err(SchedError::ConcurrencyConflict(key.to_string()));
                }
                Ok(version + 1)
            }
        }
    }

    fn load_aggregate(&self, user_id: i64) -> Result<Option<Versioned<UserPerformance>>> {
        let performance = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, version FROM user_performance WHERE user_id = ?1",
                    PERFORMANCE_COLUMNS
                ),
                params![user_id],
                |row| {
                    Ok(Versioned {
                        value: performance_from_row(row)?,
                        version: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(performance)
    }

    fn save_aggregate(
        &self,
        user_id: i64,
        performance: &UserPerformance,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        let subject = format!("performance of user {}", user_id);
        match expected_version {
            None => {
                let inserted = self.conn.execute(
                    &format!(
                        "INSERT INTO user_performance (user_id, {}, version) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
                        PERFORMANCE_COLUMNS
                    ),
                    params![
                        user_id,
                        performance.quizzes_completed,
                        performance.total_score,
                        performance.total_questions_answered,
                        performance.total_correct_answers,
                        performance.average_score,
                        performance.overall_accuracy
                    ],
                );
                match inserted {
                    Ok(_) => Ok(1),
                    Err(e) if is_key_collision(&e) => Err(SchedError::ConcurrencyConflict(subject)),
                    Err(e) => Err(e.into()),
                }
            }
            Some(version) => {
                let changed = self.conn.execute(
                    r#"
                    UPDATE user_performance
                    SET quizzes_completed = ?1,
                        total_score = ?2,
                        total_questions_answered = ?3,
                        total_correct_answers = ?4,
                        average_score = ?5,
                        overall_accuracy = ?6,
                        version = version + 1
                    WHERE user_id = ?7 AND version = ?8
                    "#,
                    params![
                        performance.quizzes_completed,
                        performance.total_score,
                        performance.total_questions_answered,
                        performance.total_correct_answers,
                        performance.average_score,
                        performance.overall_accuracy,
                        user_id,
                        version
                    ],
                )?;
                if changed == 0 {
                    return Err(SchedError::ConcurrencyConflict(subject));
                }
                Ok(version + 1)
            }
        }
    }

    fn delete_aggregate(&self, user_id: i64, expected_version: i64) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM user_performance WHERE user_id = ?1 AND version = ?2",
            params![user_id, expected_version],
        )?;
        if removed == 0 {
            return Err(SchedError::ConcurrencyConflict(format!(
                "performance of user {}",
                user_id
            )));
        }
        Ok(())
    }

    fn append_review_log(&self, key: ItemKey, quality: Quality, item: &ReviewItem) -> Result<()> {
        let reviewed_on = item.last_review_date.ok_or_else(|| {
            SchedError::invalid(format!("{} has no review date to log", key))
        })?;
        self.conn.execute(
            r#"
            INSERT INTO review_history
                (user_id, concept_id, quality, reviewed_on, interval_days, easiness_factor)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                key.user_id,
                key.concept_id,
                quality.as_u8(),
                reviewed_on,
                item.interval,
                item.easiness_factor
            ],
        )?;
        Ok(())
    }

    fn append_attempt(
        &self,
        user_id: i64,
        attempt: &Attempt,
        recorded_on: NaiveDate,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO attempt_history (user_id, score, questions, correct, recorded_on) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                attempt.score,
                attempt.questions,
                attempt.correct,
                recorded_on
            ],
        )?;
        Ok(())
    }

    fn load_attempts(&self, user_id: i64) -> Result<Vec<Attempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT score, questions, correct FROM attempt_history WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Attempt {
                score: row.get(0)?,
                questions: row.get(1)?,
                correct: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

const DUE_ITEM_SELECT: &str = r#"
    SELECT r.concept_id, c.name, r.next_review_date,
           r.easiness_factor, r.repetitions, r.interval_days, r.last_review_date
    FROM review_items r
    JOIN concepts c ON c.id = r.concept_id
"#;

impl ReviewRecordStore for Database {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn StoreTx) -> Result<T>,
    {
        // Immediate: take the write lock before the first read so the whole
        // read-modify-write span is serialized against other connections.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| classify(e, "write transaction"))?;
        let value = f(&SqliteTx { conn: &tx })?;
        tx.commit().map_err(|e| classify(e, "commit"))?;
        Ok(value)
    }

    fn list_due_items(
        &self,
        user_id: i64,
        as_of: NaiveDate,
        after: Option<DueCursor>,
        limit: Option<u32>,
    ) -> Result<Vec<DueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"{}
            WHERE r.user_id = ?1
              AND r.next_review_date <= ?2
              AND (?3 IS NULL
                   OR r.next_review_date > ?3
                   OR (r.next_review_date = ?3 AND r.concept_id > ?4))
            ORDER BY r.next_review_date ASC, r.concept_id ASC
            LIMIT ?5
            "#,
            DUE_ITEM_SELECT
        ))?;

        let limit: i64 = limit.map(i64::from).unwrap_or(-1);
        let rows = stmt.query_map(
            params![
                user_id,
                as_of,
                after.map(|c| c.next_review_date),
                after.map(|c| c.concept_id),
                limit
            ],
            due_item_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_scheduled(&self, user_id: i64) -> Result<Vec<DueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE r.user_id = ?1 ORDER BY r.next_review_date ASC, r.concept_id ASC",
            DUE_ITEM_SELECT
        ))?;
        let rows = stmt.query_map(params![user_id], due_item_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_review_item(&self, key: ItemKey) -> Result<Option<ReviewItem>> {
        Ok(SqliteTx { conn: &self.conn }
            .load_review_item(key)?
            .map(|v| v.value))
    }

    fn get_aggregate(&self, user_id: i64) -> Result<Option<UserPerformance>> {
        Ok(SqliteTx { conn: &self.conn }
            .load_aggregate(user_id)?
            .map(|v| v.value))
    }

    fn review_log(&self, key: ItemKey) -> Result<Vec<ReviewLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, concept_id, quality, reviewed_on, interval_days, easiness_factor
            FROM review_history
            WHERE user_id = ?1 AND concept_id = ?2
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![key.user_id, key.concept_id], |row| {
            Ok(ReviewLogEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                concept_id: row.get(2)?,
                quality: quality_from_column(row, 3)?,
                reviewed_on: row.get(4)?,
                interval: row.get(5)?,
                easiness_factor: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reviewed(interval: u32, last: NaiveDate) -> ReviewItem {
        ReviewItem {
            easiness_factor: 2.5,
            repetitions: 2,
            interval,
            last_review_date: Some(last),
        }
    }

    fn seeded() -> (Database, i64, i64) {
        let db = setup_db();
        let user = db.add_user("ada").unwrap();
        let concept = db.add_concept("Borrowing", None).unwrap();
        (db, user, concept)
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            for table in [
                "users",
                "concepts",
                "review_items",
                "user_performance",
                "review_history",
                "attempt_history",
            ] {
                let count: i64 = db
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })
                    .unwrap_or_else(|_| panic!("{} table should exist", table));
                assert_eq!(count, 0);
            }
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            db.add_user("ada").unwrap();

            db.init().expect("Re-init should succeed");

            assert_eq!(db.list_users().unwrap().len(), 1);
        }

        #[test]
        fn migrate_adds_missing_version_column() {
            let db = Database::open(":memory:").unwrap();
            db.conn
                .execute_batch(
                    r#"
                    CREATE TABLE user_performance (
                        user_id INTEGER PRIMARY KEY,
                        quizzes_completed INTEGER NOT NULL DEFAULT 0,
                        total_score REAL NOT NULL DEFAULT 0,
                        total_questions_answered INTEGER NOT NULL DEFAULT 0,
                        total_correct_answers INTEGER NOT NULL DEFAULT 0,
                        average_score REAL NOT NULL DEFAULT 0,
                        overall_accuracy REAL NOT NULL DEFAULT 0
                    );
                    INSERT INTO user_performance (user_id, quizzes_completed) VALUES (1, 3);
                    "#,
                )
                .unwrap();

            db.init().unwrap();

            let version: i64 = db
                .conn
                .query_row(
                    "SELECT version FROM user_performance WHERE user_id = 1",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(version, 1);
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn add_and_get_user() {
            let db = setup_db();
            let id = db.add_user("ada").unwrap();
            let user = db.get_user(id).unwrap().unwrap();
            assert_eq!(user.name, "ada");
            assert!(db.get_user(999).unwrap().is_none());
        }

        #[test]
        fn duplicate_user_fails() {
            let db = setup_db();
            db.add_user("ada").unwrap();
            assert!(matches!(db.add_user("ada"), Err(SchedError::Storage(_))));
        }

        #[test]
        fn concepts_sorted_by_name() {
            let db = setup_db();
            db.add_concept("Traits", Some("Shared behaviour")).unwrap();
            db.add_concept("Lifetimes", None).unwrap();
            let names: Vec<_> = db
                .list_concepts()
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect();
            assert_eq!(names, vec!["Lifetimes", "Traits"]);
        }

        #[test]
        fn get_concept_keeps_description() {
            let db = setup_db();
            let id = db.add_concept("Traits", Some("Shared behaviour")).unwrap();
            let c = db.get_concept(id).unwrap().unwrap();
            assert_eq!(c.description.as_deref(), Some("Shared behaviour"));
        }
    }

    mod transaction_tests {
        use super::*;

        #[test]
        fn existence_checks() {
            let (mut db, user, concept) = seeded();
            let (u, c, missing) = db
                .transaction(|tx| {
                    Ok((
                        tx.user_exists(user)?,
                        tx.concept_exists(concept)?,
                        tx.user_exists(user + 100)?,
                    ))
                })
                .unwrap();
            assert!(u);
            assert!(c);
            assert!(!missing);
        }

        #[test]
        fn insert_then_update_bumps_version() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);

            let v1 = db
                .transaction(|tx| tx.save_review_item(key, &reviewed(1, date(2024, 1, 1)), None))
                .unwrap();
            assert_eq!(v1, 1);

            let v2 = db
                .transaction(|tx| {
                    tx.save_review_item(key, &reviewed(6, date(2024, 1, 2)), Some(v1))
                })
                .unwrap();
            assert_eq!(v2, 2);

            let stored = db.get_review_item(key).unwrap().unwrap();
            assert_eq!(stored.interval, 6);
            assert_eq!(stored.next_review_date(), Some(date(2024, 1, 8)));
        }

        #[test]
        fn stale_version_conflicts() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);
            db.transaction(|tx| tx.save_review_item(key, &reviewed(1, date(2024, 1, 1)), None))
                .unwrap();
            db.transaction(|tx| tx.save_review_item(key, &reviewed(6, date(2024, 1, 2)), Some(1)))
                .unwrap();

            let err = db
                .transaction(|tx| {
                    tx.save_review_item(key, &reviewed(15, date(2024, 1, 8)), Some(1))
                })
                .unwrap_err();
            assert!(matches!(err, SchedError::ConcurrencyConflict(_)));
            assert_eq!(db.get_review_item(key).unwrap().unwrap().interval, 6);
        }

        #[test]
        fn duplicate_insert_conflicts() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);
            db.transaction(|tx| tx.save_review_item(key, &reviewed(1, date(2024, 1, 1)), None))
                .unwrap();
            let err = db
                .transaction(|tx| tx.save_review_item(key, &reviewed(1, date(2024, 1, 1)), None))
                .unwrap_err();
            assert!(matches!(err, SchedError::ConcurrencyConflict(_)));
        }

        #[test]
        fn unreviewed_item_is_rejected() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);
            let err = db
                .transaction(|tx| tx.save_review_item(key, &ReviewItem::default(), None))
                .unwrap_err();
            assert!(matches!(err, SchedError::InvalidInput(_)));
        }

        #[test]
        fn error_rolls_back_every_write() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);
            let perf = UserPerformance {
                quizzes_completed: 1,
                total_score: 1.0,
                total_questions_answered: 1,
                total_correct_answers: 1,
                average_score: 1.0,
                overall_accuracy: 100.0,
            };

            let result: Result<()> = db.transaction(|tx| {
                tx.save_review_item(key, &reviewed(1, date(2024, 1, 1)), None)?;
                tx.save_aggregate(user, &perf, None)?;
                Err(SchedError::ConcurrencyConflict("forced".into()))
            });
            assert!(result.is_err());

            assert!(db.get_review_item(key).unwrap().is_none());
            assert!(db.get_aggregate(user).unwrap().is_none());
        }

        #[test]
        fn aggregate_round_trip_with_versions() {
            let (mut db, user, _) = seeded();
            let mut perf = UserPerformance {
                quizzes_completed: 1,
                total_score: 8.0,
                total_questions_answered: 10,
                total_correct_answers: 8,
                average_score: 8.0,
                overall_accuracy: 80.0,
            };
            let v1 = db
                .transaction(|tx| tx.save_aggregate(user, &perf, None))
                .unwrap();
            perf.quizzes_completed = 2;
            let v2 = db
                .transaction(|tx| tx.save_aggregate(user, &perf, Some(v1)))
                .unwrap();
            assert_eq!(v2, 2);

            let loaded = db.transaction(|tx| tx.load_aggregate(user)).unwrap().unwrap();
            assert_eq!(loaded.version, 2);
            assert_eq!(loaded.value, perf);

            let err = db
                .transaction(|tx| tx.save_aggregate(user, &perf, Some(v1)))
                .unwrap_err();
            assert!(matches!(err, SchedError::ConcurrencyConflict(_)));
        }

        #[test]
        fn attempts_in_insertion_order() {
            let (mut db, user, _) = seeded();
            db.transaction(|tx| {
                tx.append_attempt(user, &Attempt::new(8.0, 10, 8), date(2024, 1, 1))?;
                tx.append_attempt(user, &Attempt::new(6.0, 10, 5), date(2024, 1, 2))
            })
            .unwrap();
            let attempts = db.transaction(|tx| tx.load_attempts(user)).unwrap();
            assert_eq!(
                attempts,
                vec![Attempt::new(8.0, 10, 8), Attempt::new(6.0, 10, 5)]
            );
        }

        #[test]
        fn delete_aggregate_checks_version() {
            let (mut db, user, _) = seeded();
            let perf = sample_performance();
            let v1 = db
                .transaction(|tx| tx.save_aggregate(user, &perf, None))
                .unwrap();

            let err = db
                .transaction(|tx| tx.delete_aggregate(user, v1 + 1))
                .unwrap_err();
            assert!(matches!(err, SchedError::ConcurrencyConflict(_)));

            db.transaction(|tx| tx.delete_aggregate(user, v1)).unwrap();
            assert!(db.transaction(|tx| tx.load_aggregate(user)).unwrap().is_none());
        }

        fn sample_performance() -> UserPerformance {
            UserPerformance {
                quizzes_completed: 1,
                total_score: 8.0,
                total_questions_answered: 10,
                total_correct_answers: 8,
                average_score: 8.0,
                overall_accuracy: 80.0,
            }
        }

        #[test]
        fn held_write_lock_is_a_conflict() {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("locked.db");
            let holder = Database::open(&path).unwrap();
            holder.init().unwrap();
            holder
                .conn
                .execute_batch("BEGIN IMMEDIATE;")
                .unwrap();

            let mut waiter = Database::open_with_timeout(&path, Duration::from_millis(20)).unwrap();
            let err = waiter.transaction(|tx| tx.user_exists(1)).unwrap_err();
            assert!(matches!(err, SchedError::ConcurrencyConflict(_)));
            assert!(err.is_retryable());

            holder.conn.execute_batch("ROLLBACK;").unwrap();
            assert!(!waiter.transaction(|tx| tx.user_exists(1)).unwrap());
        }
    }

    mod due_tests {
        use super::*;

        fn schedule(db: &mut Database, key: ItemKey, interval: u32, last: NaiveDate) {
            db.transaction(|tx| tx.save_review_item(key, &reviewed(interval, last), None))
                .unwrap();
        }

        #[test]
        fn filters_and_orders_by_due_date() {
            let (mut db, user, _) = seeded();
            let a = db.add_concept("A", None).unwrap();
            let b = db.add_concept("B", None).unwrap();
            let c = db.add_concept("C", None).unwrap();
            schedule(&mut db, ItemKey::new(user, a), 10, date(2024, 1, 1)); // due 01-11
            schedule(&mut db, ItemKey::new(user, b), 2, date(2024, 1, 1)); // due 01-03
            schedule(&mut db, ItemKey::new(user, c), 30, date(2024, 1, 1)); // due 01-31

            let due = db
                .list_due_items(user, date(2024, 1, 11), None, None)
                .unwrap();
            let ids: Vec<_> = due.iter().map(|d| d.concept_id).collect();
            assert_eq!(ids, vec![b, a]);
            assert_eq!(due[0].concept_name, "B");
            assert_eq!(due[0].next_review_date, date(2024, 1, 3));
        }

        #[test]
        fn ties_broken_by_concept_id() {
            let (mut db, user, first) = seeded();
            let second = db.add_concept("Second", None).unwrap();
            schedule(&mut db, ItemKey::new(user, second), 1, date(2024, 1, 1));
            schedule(&mut db, ItemKey::new(user, first), 1, date(2024, 1, 1));

            let due = db
                .list_due_items(user, date(2024, 1, 2), None, None)
                .unwrap();
            let ids: Vec<_> = due.iter().map(|d| d.concept_id).collect();
            assert_eq!(ids, vec![first, second]);
        }

        #[test]
        fn only_own_items_listed() {
            let (mut db, user, concept) = seeded();
            let other = db.add_user("grace").unwrap();
            schedule(&mut db, ItemKey::new(other, concept), 1, date(2024, 1, 1));
            assert!(db
                .list_due_items(user, date(2024, 6, 1), None, None)
                .unwrap()
                .is_empty());
        }

        #[test]
        fn pages_resume_after_cursor() {
            let (mut db, user, _) = seeded();
            let mut ids = Vec::new();
            for i in 0..5 {
                let id = db.add_concept(&format!("c{}", i), None).unwrap();
                schedule(&mut db, ItemKey::new(user, id), 1 + (i % 2), date(2024, 1, 1));
                ids.push(id);
            }
            let as_of = date(2024, 2, 1);
            let full = db.list_due_items(user, as_of, None, None).unwrap();

            let mut paged = Vec::new();
            let mut cursor = None;
            loop {
                let page = db.list_due_items(user, as_of, cursor, Some(2)).unwrap();
                if page.is_empty() {
                    break;
                }
                cursor = page.last().map(DueItem::cursor);
                paged.extend(page);
            }
            assert_eq!(paged, full);
            assert_eq!(paged.len(), 5);
        }

        #[test]
        fn scheduled_includes_future_items() {
            let (mut db, user, concept) = seeded();
            schedule(&mut db, ItemKey::new(user, concept), 30, date(2024, 1, 1));
            assert!(db
                .list_due_items(user, date(2024, 1, 2), None, None)
                .unwrap()
                .is_empty());
            assert_eq!(db.list_scheduled(user).unwrap().len(), 1);
        }
    }

    mod history_tests {
        use super::*;

        #[test]
        fn review_log_records_each_grade() {
            let (mut db, user, concept) = seeded();
            let key = ItemKey::new(user, concept);
            db.transaction(|tx| {
                tx.append_review_log(key, Quality::Good, &reviewed(1, date(2024, 1, 1)))?;
                tx.append_review_log(key, Quality::Blackout, &reviewed(1, date(2024, 1, 2)))
            })
            .unwrap();

            let log = db.review_log(key).unwrap();
            assert_eq!(log.len(), 2);
            assert_eq!(log[0].quality, Quality::Good);
            assert_eq!(log[1].quality, Quality::Blackout);
            assert_eq!(log[1].reviewed_on, date(2024, 1, 2));
        }
    }
}
