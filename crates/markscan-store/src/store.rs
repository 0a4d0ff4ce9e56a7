// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite-backed store for quizzes, students, uploaded scans, grading sessions
// and results.
//
// Scan bytes live in the `ImageVault`; the database holds their metadata and
// current location. Every counter update runs inside a transaction on the one
// connection, which is guarded by a mutex.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use markscan_core::error::{MarkscanError, Result};
use markscan_core::ports::{GradingLedger, StudentDirectory};
use markscan_core::types::{
    ChoiceLabelScheme, GradingSession, ImageId, ImageStatus, Question, QuizId, SheetConfiguration,
    SheetImage, SheetRecord, SheetResult, Student, StudentQuestionResult,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::integrity::hash_bytes;
use crate::vault::ImageVault;

/// SQLite schema. Results are append-only; a re-grade writes a new session.
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        question_count INTEGER NOT NULL,
        choice_count INTEGER NOT NULL,
        label_scheme TEXT NOT NULL,
        fail_mark REAL NOT NULL,
        pending_count INTEGER NOT NULL DEFAULT 0 CHECK (pending_count >= 0),
        corrected_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS questions (
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        ordinal INTEGER NOT NULL,
        correct_labels TEXT NOT NULL,
        distractor_labels TEXT NOT NULL,
        mark_distribution TEXT NOT NULL,
        total_mark REAL NOT NULL,
        PRIMARY KEY (quiz_id, ordinal)
    );

    CREATE TABLE IF NOT EXISTS students (
        code TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        email TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sheet_images (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        path TEXT NOT NULL,
        status TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sheet_images_quiz_status
        ON sheet_images (quiz_id, status);

    CREATE TABLE IF NOT EXISTS grading_sessions (
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        session INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        UNIQUE (quiz_id, session)
    );

    CREATE TABLE IF NOT EXISTS question_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        image_id TEXT NOT NULL REFERENCES sheet_images(id),
        student_code TEXT NOT NULL,
        question_ordinal INTEGER NOT NULL,
        session INTEGER NOT NULL,
        correct_choices TEXT NOT NULL,
        wrong_choices TEXT NOT NULL,
        percentage_pass REAL NOT NULL,
        mark REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sheet_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        image_id TEXT NOT NULL REFERENCES sheet_images(id),
        student_code TEXT NOT NULL,
        session INTEGER NOT NULL,
        score REAL NOT NULL,
        total REAL NOT NULL,
        graded_at TEXT NOT NULL
    );
"#;

/// Pending and corrected scan counts of one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageCounters {
    pub pending: u32,
    pub corrected: u32,
}

/// The Markscan database plus its image vault.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    vault: ImageVault,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, vault: ImageVault) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        let store = Self::init(conn, vault)?;
        info!("Markscan database opened");
        Ok(store)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory(vault: ImageVault) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        let store = Self::init(conn, vault)?;
        debug!("in-memory Markscan database opened");
        Ok(store)
    }

    fn init(conn: Connection, vault: ImageVault) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err("foreign_keys pragma"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(db_err("create schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
            vault,
        })
    }

    pub fn vault(&self) -> &ImageVault {
        &self.vault
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MarkscanError::PersistenceFailure("database lock poisoned".into()))
    }

    // -- Quizzes and students -------------------------------------------------

    /// Insert a quiz, its questions and its students in one transaction.
    #[instrument(skip_all, fields(quiz = %quiz.id, questions = quiz.questions.len()))]
    pub fn import_quiz(&self, quiz: &SheetConfiguration, students: &[Student]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("begin import"))?;

        tx.execute(
            "INSERT INTO quizzes (id, name, question_count, choice_count, label_scheme,
             fail_mark, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                quiz.id.to_string(),
                quiz.name,
                quiz.question_count as i64,
                quiz.choice_count as i64,
                quiz.label_scheme.wire_name(),
                quiz.fail_mark,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err("insert quiz"))?;

        for q in &quiz.questions {
            tx.execute(
                "INSERT INTO questions (quiz_id, ordinal, correct_labels, distractor_labels,
                 mark_distribution, total_mark) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    quiz.id.to_string(),
                    q.ordinal as i64,
                    serde_json::to_string(&q.correct_labels)?,
                    serde_json::to_string(&q.distractor_labels)?,
                    serde_json::to_string(&q.mark_distribution)?,
                    q.total_mark,
                ],
            )
            .map_err(db_err("insert question"))?;
        }

        for s in students {
            insert_student(&tx, &quiz.id, s)?;
        }

        tx.commit().map_err(db_err("commit import"))?;
        info!(students = students.len(), "Quiz imported");
        Ok(())
    }

    /// Enroll one student under `student.quiz_id`.
    pub fn enroll_student(&self, student: &Student) -> Result<()> {
        let conn = self.lock()?;
        insert_student(&conn, &student.quiz_id, student)
    }

    /// Load a quiz with its questions in ordinal order.
    pub fn load_quiz(&self, id: &QuizId) -> Result<SheetConfiguration> {
        let conn = self.lock()?;
        load_quiz(&conn, id)
    }

    /// Every quiz, oldest first.
    pub fn list_quizzes(&self) -> Result<Vec<SheetConfiguration>> {
        let conn = self.lock()?;
        let ids: Vec<String> = conn
            .prepare("SELECT id FROM quizzes ORDER BY created_at ASC, id ASC")
            .map_err(db_err("prepare list_quizzes"))?
            .query_map([], |row| row.get(0))
            .map_err(db_err("query list_quizzes"))?
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err("collect rows"))?;
        ids.iter()
            .map(|id| load_quiz(&conn, &id.parse()?))
            .collect()
    }

    pub fn counters(&self, id: &QuizId) -> Result<ImageCounters> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT pending_count, corrected_count FROM quizzes WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(ImageCounters {
                    pending: row.get(0)?,
                    corrected: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(db_err("query counters"))?
        .ok_or_else(|| unknown_quiz(id))
    }

    // -- Uploads --------------------------------------------------------------

    /// Copy a scan into the vault's pending directory and register it.
    #[instrument(skip(self), fields(quiz = %quiz))]
    pub fn register_image(&self, quiz: &QuizId, source: &Path) -> Result<SheetImage> {
        let bytes = std::fs::read(source)?;
        let content_hash = hash_bytes(&bytes);
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let mut conn = self.lock()?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM quizzes WHERE id = ?1)",
                params![quiz.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err("query quiz"))?;
        if !exists {
            return Err(unknown_quiz(quiz));
        }

        let duplicates: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sheet_images WHERE quiz_id = ?1 AND content_hash = ?2",
                params![quiz.to_string(), content_hash],
                |row| row.get(0),
            )
            .map_err(db_err("query duplicates"))?;
        if duplicates > 0 {
            warn!(hash = %content_hash, duplicates, "Identical scan already uploaded");
        }

        let id = ImageId::new();
        let path = self.vault.store_pending(&id, extension, &bytes)?;
        let image = SheetImage {
            id,
            quiz_id: *quiz,
            path,
            status: ImageStatus::Pending,
            content_hash,
            uploaded_at: Utc::now(),
        };

        if let Err(err) = insert_pending_image(&mut conn, &image) {
            if let Err(cleanup) = self.vault.remove(&image.path) {
                warn!(path = %image.path.display(), error = %cleanup, "Could not remove orphaned scan");
            }
            return Err(err);
        }

        info!(image = %image.id, "Scan registered");
        Ok(image)
    }

    pub fn get_image(&self, id: &ImageId) -> Result<Option<SheetImage>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, quiz_id, path, status, content_hash, uploaded_at
             FROM sheet_images WHERE id = ?1",
            params![id.to_string()],
            row_to_image,
        )
        .optional()
        .map_err(db_err("query image"))
    }

    // -- Results --------------------------------------------------------------

    /// Sessions recorded for `quiz`, ascending.
    pub fn sessions(&self, quiz: &QuizId) -> Result<Vec<GradingSession>> {
        let conn = self.lock()?;
        let sessions = conn
            .prepare("SELECT session FROM grading_sessions WHERE quiz_id = ?1 ORDER BY session")
            .map_err(db_err("prepare sessions"))?
            .query_map(params![quiz.to_string()], |row| row.get(0).map(GradingSession))
            .map_err(db_err("query sessions"))?
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err("collect rows"))?;
        Ok(sessions)
    }

    /// Graded sheets of `quiz`, optionally limited to one session.
    #[instrument(skip(self), fields(quiz = %quiz))]
    pub fn list_results(
        &self,
        quiz: &QuizId,
        session: Option<GradingSession>,
    ) -> Result<Vec<SheetRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT quiz_id, image_id, student_code, session, score, total, graded_at
                 FROM sheet_results
                 WHERE quiz_id = ?1 AND (?2 IS NULL OR session = ?2)
                 ORDER BY session ASC, id ASC",
            )
            .map_err(db_err("prepare list_results"))?;
        let results: Vec<SheetResult> = stmt
            .query_map(
                params![quiz.to_string(), session.map(|s| s.0)],
                row_to_sheet_result,
            )
            .map_err(db_err("query list_results"))?
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err("collect rows"))?;

        let mut question_stmt = conn
            .prepare(
                "SELECT student_code, question_ordinal, session, correct_choices,
                        wrong_choices, percentage_pass, mark
                 FROM question_results
                 WHERE image_id = ?1 AND session = ?2
                 ORDER BY question_ordinal ASC",
            )
            .map_err(db_err("prepare question results"))?;

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            let questions = question_stmt
                .query_map(
                    params![result.image_id.to_string(), result.session.0],
                    row_to_question_result,
                )
                .map_err(db_err("query question results"))?
                .collect::<std::result::Result<_, _>>()
                .map_err(db_err("collect rows"))?;
            records.push(SheetRecord { result, questions });
        }
        debug!(count = records.len(), "Results listed");
        Ok(records)
    }
}

// -- Ports --------------------------------------------------------------------

impl StudentDirectory for SqliteStore {
    fn find_student(&self, quiz: &QuizId, code: &str) -> Result<Option<Student>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT code, name, email, quiz_id FROM students WHERE quiz_id = ?1 AND code = ?2",
            params![quiz.to_string(), code],
            |row| {
                Ok(Student {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    quiz_id: parse_column(row, 3)?,
                })
            },
        )
        .optional()
        .map_err(db_err("find student"))
    }
}

impl GradingLedger for SqliteStore {
    #[instrument(skip(self), fields(quiz = %quiz))]
    fn reserve_session(&self, quiz: &QuizId) -> Result<GradingSession> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("begin reserve_session"))?;
        let next: u32 = tx
            .query_row(
                "SELECT COALESCE(MAX(session), 0) + 1 FROM grading_sessions WHERE quiz_id = ?1",
                params![quiz.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err("query max session"))?;
        tx.execute(
            "INSERT INTO grading_sessions (quiz_id, session, started_at) VALUES (?1, ?2, ?3)",
            params![quiz.to_string(), next, Utc::now().to_rfc3339()],
        )
        .map_err(db_err("insert session"))?;
        tx.commit().map_err(db_err("commit reserve_session"))?;

        info!(session = next, "Grading session reserved");
        Ok(GradingSession(next))
    }

    #[instrument(skip(self), fields(quiz = %quiz, session = %session))]
    fn release_session(&self, quiz: &QuizId, session: GradingSession) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM grading_sessions
                 WHERE quiz_id = ?1 AND session = ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM sheet_results WHERE quiz_id = ?1 AND session = ?2
                   )",
                params![quiz.to_string(), session.0],
            )
            .map_err(db_err("release session"))?;
        debug!(removed, "Grading session released");
        Ok(())
    }

    fn pending_images(&self, quiz: &QuizId) -> Result<Vec<SheetImage>> {
        let conn = self.lock()?;
        let images = conn
            .prepare(
                "SELECT id, quiz_id, path, status, content_hash, uploaded_at
                 FROM sheet_images WHERE quiz_id = ?1 AND status = ?2
                 ORDER BY uploaded_at ASC, id ASC",
            )
            .map_err(db_err("prepare pending_images"))?
            .query_map(
                params![quiz.to_string(), ImageStatus::Pending.as_str()],
                row_to_image,
            )
            .map_err(db_err("query pending_images"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect rows"))?;
        Ok(images)
    }

    #[instrument(skip(self, record), fields(image = %image.id, session = %record.result.session))]
    fn commit_sheet(&self, image: &SheetImage, record: &SheetRecord) -> Result<SheetImage> {
        let mut conn = self.lock()?;
        let corrected = self.vault.move_to_corrected(&image.path)?;

        if let Err(cause) = write_sheet(&mut conn, image, record, &corrected) {
            return Err(restore_or_flag(&self.vault, &corrected, &image.path, cause));
        }

        info!(questions = record.questions.len(), "Sheet committed");
        Ok(SheetImage {
            path: corrected,
            status: ImageStatus::Corrected,
            ..image.clone()
        })
    }
}

// -- Transactions -------------------------------------------------------------

fn insert_student(conn: &Connection, quiz: &QuizId, student: &Student) -> Result<()> {
    conn.execute(
        "INSERT INTO students (code, quiz_id, name, email) VALUES (?1, ?2, ?3, ?4)",
        params![student.code, quiz.to_string(), student.name, student.email],
    )
    .map_err(db_err("insert student"))?;
    Ok(())
}

fn insert_pending_image(conn: &mut Connection, image: &SheetImage) -> Result<()> {
    let tx = conn.transaction().map_err(db_err("begin register"))?;
    tx.execute(
        "INSERT INTO sheet_images (id, quiz_id, path, status, content_hash, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            image.id.to_string(),
            image.quiz_id.to_string(),
            image.path.to_string_lossy(),
            image.status.as_str(),
            image.content_hash,
            image.uploaded_at.to_rfc3339(),
        ],
    )
    .map_err(db_err("insert image"))?;
    tx.execute(
        "UPDATE quizzes SET pending_count = pending_count + 1 WHERE id = ?1",
        params![image.quiz_id.to_string()],
    )
    .map_err(db_err("bump pending_count"))?;
    tx.commit().map_err(db_err("commit register"))
}

/// Results, image status and counters for one sheet, all or nothing.
fn write_sheet(
    conn: &mut Connection,
    image: &SheetImage,
    record: &SheetRecord,
    corrected: &Path,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    let image_id = image.id.to_string();
    let quiz_id = image.quiz_id.to_string();

    let changed = tx.execute(
        "UPDATE sheet_images SET status = ?1, path = ?2 WHERE id = ?3 AND status = ?4",
        params![
            ImageStatus::Corrected.as_str(),
            corrected.to_string_lossy(),
            image_id,
            ImageStatus::Pending.as_str(),
        ],
    )?;
    if changed != 1 {
        return Err(rusqlite::Error::StatementChangedRows(changed));
    }

    for q in &record.questions {
        tx.execute(
            "INSERT INTO question_results (quiz_id, image_id, student_code, question_ordinal,
             session, correct_choices, wrong_choices, percentage_pass, mark)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                quiz_id,
                image_id,
                q.student_code,
                q.question_ordinal as i64,
                q.session.0,
                to_json(&q.correct_choices)?,
                to_json(&q.wrong_choices)?,
                q.percentage_pass,
                q.mark,
            ],
        )?;
    }

    let r = &record.result;
    tx.execute(
        "INSERT INTO sheet_results (quiz_id, image_id, student_code, session, score, total,
         graded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            r.quiz_id.to_string(),
            image_id,
            r.student_code,
            r.session.0,
            r.score,
            r.total,
            r.graded_at.to_rfc3339(),
        ],
    )?;

    let changed = tx.execute(
        "UPDATE quizzes SET pending_count = pending_count - 1,
                            corrected_count = corrected_count + 1
         WHERE id = ?1",
        params![quiz_id],
    )?;
    if changed != 1 {
        return Err(rusqlite::Error::StatementChangedRows(changed));
    }

    tx.commit()
}

/// Put a scan back in pending after its transaction rolled back. If that
/// fails too, location and status disagree and the caller must be told.
fn restore_or_flag(
    vault: &ImageVault,
    corrected: &Path,
    pending: &Path,
    cause: rusqlite::Error,
) -> MarkscanError {
    match vault.move_back(corrected, pending) {
        Ok(()) => MarkscanError::PersistenceFailure(format!("commit sheet: {cause}")),
        Err(restore) => {
            warn!(
                corrected = %corrected.display(),
                pending = %pending.display(),
                error = %restore,
                "Scan left in corrected directory while still marked pending"
            );
            MarkscanError::InconsistentImageState(format!(
                "{} is marked pending but sits at {} (commit failed: {cause}; restore failed: {restore})",
                pending.display(),
                corrected.display()
            ))
        }
    }
}

fn load_quiz(conn: &Connection, id: &QuizId) -> Result<SheetConfiguration> {
    let header = conn
        .query_row(
            "SELECT name, question_count, choice_count, label_scheme, fail_mark
             FROM quizzes WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    parse_column::<ChoiceLabelScheme>(row, 3)?,
                    row.get::<_, f64>(4)?,
                ))
            },
        )
        .optional()
        .map_err(db_err("query quiz"))?
        .ok_or_else(|| unknown_quiz(id))?;
    let (name, question_count, choice_count, label_scheme, fail_mark) = header;

    let questions = conn
        .prepare(
            "SELECT ordinal, correct_labels, distractor_labels, mark_distribution, total_mark
             FROM questions WHERE quiz_id = ?1 ORDER BY ordinal ASC",
        )
        .map_err(db_err("prepare questions"))?
        .query_map(params![id.to_string()], |row| {
            Ok(Question {
                ordinal: row.get::<_, i64>(0)? as usize,
                correct_labels: json_column(row, 1)?,
                distractor_labels: json_column(row, 2)?,
                mark_distribution: json_column(row, 3)?,
                total_mark: row.get(4)?,
            })
        })
        .map_err(db_err("query questions"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("collect rows"))?;

    Ok(SheetConfiguration {
        id: *id,
        name,
        question_count: question_count as usize,
        choice_count: choice_count as usize,
        label_scheme,
        fail_mark,
        questions,
    })
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<SheetImage> {
    Ok(SheetImage {
        id: parse_column(row, 0)?,
        quiz_id: parse_column(row, 1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        status: parse_column(row, 3)?,
        content_hash: row.get(4)?,
        uploaded_at: time_column(row, 5)?,
    })
}

fn row_to_sheet_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<SheetResult> {
    Ok(SheetResult {
        quiz_id: parse_column(row, 0)?,
        image_id: parse_column(row, 1)?,
        student_code: row.get(2)?,
        session: GradingSession(row.get(3)?),
        score: row.get(4)?,
        total: row.get(5)?,
        graded_at: time_column(row, 6)?,
    })
}

fn row_to_question_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentQuestionResult> {
    Ok(StudentQuestionResult {
        student_code: row.get(0)?,
        question_ordinal: row.get::<_, i64>(1)? as usize,
        session: GradingSession(row.get(2)?),
        correct_choices: json_column(row, 3)?,
        wrong_choices: json_column(row, 4)?,
        percentage_pass: row.get(5)?,
        mark: row.get(6)?,
    })
}

/// Parse a TEXT column with `FromStr`, surfacing failures as conversion errors.
fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = MarkscanError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn to_json<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> MarkscanError {
    move |e| MarkscanError::PersistenceFailure(format!("{context}: {e}"))
}

fn unknown_quiz(id: &QuizId) -> MarkscanError {
    MarkscanError::MalformedSheetInput(format!("unknown quiz {id}"))
}
