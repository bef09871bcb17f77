//! SQLite-backed storage for harvested responses.
//!
//! Four surfaces:
//!
//! - `raw_responses` — the latest fetch result, one JSON payload per row.
//! - `processed` — a wide table with one quoted column per field id,
//!   dropped and recreated on every rebuild because the column set
//!   follows whatever fields the form currently has.
//! - `summary` / `reports` — aggregate views derived from the raw rows.
//! - `response_log` — a cumulative, append-only record of every response
//!   id ever seen, tagged with the fetch that first saw it. Survives
//!   rebuilds, so history is kept even when the upstream form later
//!   returns fewer records.
//!
//! One fetch commits raw, processed, summary, and log inside a single
//! transaction: it lands completely or not at all, and a failed fetch
//! never leaves the tables describing different runs.

use super::records::{CleanedRecord, SubmissionRecord};
use super::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Aggregate counts over the harvested responses.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Summary {
    pub total: u64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub completed: u64,
    pub partial: u64,
}

/// Per-field answered/blank counts for the reports table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldReport {
    pub field_id: String,
    pub answered: u64,
    pub blank: u64,
}

/// Response storage backed by a single SQLite file.
pub struct ResponseStore {
    db: Connection,
}

impl ResponseStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HarvestError::Precondition(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let db = Connection::open(path)?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS raw_responses (
                response_id TEXT PRIMARY KEY,
                submitted_at TEXT NOT NULL,
                landing_id TEXT,
                token TEXT,
                payload TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS summary (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total INTEGER NOT NULL,
                earliest TEXT,
                latest TEXT,
                completed INTEGER NOT NULL,
                partial INTEGER NOT NULL,
                generated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reports (
                field_id TEXT PRIMARY KEY,
                answered INTEGER NOT NULL,
                blank INTEGER NOT NULL,
                generated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS response_log (
                response_id TEXT PRIMARY KEY,
                submitted_at TEXT NOT NULL,
                fetch_tag TEXT NOT NULL,
                logged_at TEXT NOT NULL
            );",
        )?;

        Ok(Self { db })
    }

    /// Default store location at ~/.fieldwork/responses.db.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".fieldwork")
            .join("responses.db")
    }

    /// Commit one complete fetch: replace raw and processed, upsert the
    /// summary, and append newly seen responses to the cumulative log —
    /// all in one transaction. Returns the number of responses added to
    /// the log by this fetch.
    pub fn commit_fetch(
        &mut self,
        records: &[SubmissionRecord],
        cleaned: &[CleanedRecord],
        summary: &Summary,
        fetch_tag: &str,
    ) -> Result<u64, HarvestError> {
        let tx = self.db.transaction()?;
        replace_raw(&tx, records)?;
        rebuild_processed(&tx, cleaned)?;
        upsert_summary(&tx, summary)?;
        let appended = append_log(&tx, records, fetch_tag)?;
        tx.commit()?;
        Ok(appended)
    }

    /// Load every stored raw submission.
    pub fn load_raw(&self) -> Result<Vec<SubmissionRecord>, HarvestError> {
        let mut stmt = self
            .db
            .prepare("SELECT payload FROM raw_responses ORDER BY submitted_at")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            records.push(serde_json::from_str(&payload)?);
        }
        Ok(records)
    }

    /// Persist the summary row (single-row table, always replaced).
    pub fn write_summary(&self, summary: &Summary) -> Result<(), HarvestError> {
        upsert_summary(&self.db, summary)?;
        Ok(())
    }

    /// Read the stored summary, if one has been written.
    pub fn read_summary(&self) -> Result<Option<Summary>, HarvestError> {
        let mut stmt = self.db.prepare(
            "SELECT total, earliest, latest, completed, partial FROM summary WHERE id = 1",
        )?;
        let result = stmt.query_row([], |row| {
            Ok(Summary {
                total: row.get(0)?,
                earliest: parse_time(row.get::<_, Option<String>>(1)?),
                latest: parse_time(row.get::<_, Option<String>>(2)?),
                completed: row.get(3)?,
                partial: row.get(4)?,
            })
        });
        match result {
            Ok(summary) => Ok(Some(summary)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the per-field reports table.
    pub fn replace_reports(&mut self, reports: &[FieldReport]) -> Result<(), HarvestError> {
        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM reports", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reports (field_id, answered, blank, generated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let now = Utc::now().to_rfc3339();
            for report in reports {
                stmt.execute(rusqlite::params![
                    report.field_id,
                    report.answered,
                    report.blank,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of stored raw responses (latest fetch only).
    pub fn raw_count(&self) -> Result<u64, HarvestError> {
        let count: u64 = self
            .db
            .query_row("SELECT COUNT(*) FROM raw_responses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of responses ever logged, across all fetches.
    pub fn log_count(&self) -> Result<u64, HarvestError> {
        let count: u64 = self
            .db
            .query_row("SELECT COUNT(*) FROM response_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Replace the raw table with a fresh fetch result.
fn replace_raw(db: &Connection, records: &[SubmissionRecord]) -> Result<(), HarvestError> {
    db.execute("DELETE FROM raw_responses", [])?;
    let mut stmt = db.prepare(
        "INSERT INTO raw_responses (response_id, submitted_at, landing_id, token, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for record in records {
        let payload = serde_json::to_string(record)?;
        stmt.execute(rusqlite::params![
            record.response_id,
            record.submitted_at.to_rfc3339(),
            record.landing_id,
            record.token,
            payload,
        ])?;
    }
    Ok(())
}

/// Rebuild the wide processed table from cleaned records.
///
/// The column set is the union of every field id seen across the records,
/// so new questions appear as new columns on the next rebuild without
/// migration.
fn rebuild_processed(db: &Connection, records: &[CleanedRecord]) -> Result<(), HarvestError> {
    let mut fields: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        fields.extend(record.answers.keys().map(String::as_str));
    }

    let mut columns = String::new();
    for field in &fields {
        columns.push_str(", ");
        columns.push_str(&quote_ident(field));
        columns.push_str(" TEXT");
    }

    db.execute_batch(&format!(
        "DROP TABLE IF EXISTS processed;
         CREATE TABLE processed (
            response_id TEXT PRIMARY KEY,
            submitted_at TEXT NOT NULL,
            landing_id TEXT,
            token TEXT{columns}
         );"
    ))?;

    let field_cols = fields
        .iter()
        .map(|f| format!(", {}", quote_ident(f)))
        .collect::<String>();
    let placeholders = (0..fields.len())
        .map(|i| format!(", ?{}", i + 5))
        .collect::<String>();
    let mut stmt = db.prepare(&format!(
        "INSERT INTO processed (response_id, submitted_at, landing_id, token{field_cols})
         VALUES (?1, ?2, ?3, ?4{placeholders})"
    ))?;
    for record in records {
        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(4 + fields.len());
        let submitted = record.submitted_at.to_rfc3339();
        values.push(&record.response_id);
        values.push(&submitted);
        values.push(&record.landing_id);
        values.push(&record.token);
        let answer_slots: Vec<Option<&String>> =
            fields.iter().map(|f| record.answers.get(*f)).collect();
        for slot in &answer_slots {
            values.push(slot);
        }
        stmt.execute(values.as_slice())?;
    }
    Ok(())
}

fn upsert_summary(db: &Connection, summary: &Summary) -> Result<(), rusqlite::Error> {
    db.execute(
        "INSERT OR REPLACE INTO summary (id, total, earliest, latest, completed, partial, generated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            summary.total,
            summary.earliest.map(|t| t.to_rfc3339()),
            summary.latest.map(|t| t.to_rfc3339()),
            summary.completed,
            summary.partial,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Append responses to the cumulative log. A response id already logged
/// by an earlier fetch keeps its original row and fetch tag.
fn append_log(
    db: &Connection,
    records: &[SubmissionRecord],
    fetch_tag: &str,
) -> Result<u64, rusqlite::Error> {
    let mut stmt = db.prepare(
        "INSERT OR IGNORE INTO response_log (response_id, submitted_at, fetch_tag, logged_at)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let now = Utc::now().to_rfc3339();
    let mut appended = 0u64;
    for record in records {
        appended += stmt.execute(rusqlite::params![
            record.response_id,
            record.submitted_at.to_rfc3339(),
            fetch_tag,
            now,
        ])? as u64;
    }
    Ok(appended)
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Quote a dynamic column name; field ids come from the API and are not
/// trusted as bare identifiers.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
