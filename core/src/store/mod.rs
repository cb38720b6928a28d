//! Complaint store contract and its SQLite implementation.
//!
//! RULE: Only the store talks to the database. The broadcast engine reads
//! through the ComplaintStore trait and never writes; the write methods on
//! SqliteComplaintStore exist for the CRUD layer (see desk.rs) and seeding.

mod complaint;
mod person;

pub use complaint::NewComplaint;

use crate::{
    complaint::{ComplaintSnapshot, Person},
    error::{NotifyError, NotifyResult},
    types::ComplaintId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Read side the broadcast coordinator depends on.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// The complaint with submitter, assignees, ward staff and status log
    /// attached. None if there is no such complaint.
    async fn fetch_complaint_with_relations(
        &self,
        complaint_id: ComplaintId,
    ) -> NotifyResult<Option<ComplaintSnapshot>>;

    /// Every active ADMINISTRATOR, ordered by id.
    async fn list_active_administrators(&self) -> NotifyResult<Vec<Person>>;
}

pub struct SqliteComplaintStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<String>, // None for :memory:
}

impl SqliteComplaintStore {
    pub fn open(path: &str) -> NotifyResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> NotifyResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> NotifyResult<()> {
        self.conn()?
            .execute_batch(include_str!("../../../migrations/001_complaints.sql"))?;
        Ok(())
    }

    fn conn(&self) -> NotifyResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    /// Run a read on the blocking pool so rusqlite never stalls a runtime
    /// worker.
    async fn blocking<T, F>(&self, read: F) -> NotifyResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> NotifyResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || read(&*lock(&conn)?))
            .await
            .map_err(|e| NotifyError::Other(anyhow::anyhow!("store task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> NotifyResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| NotifyError::Other(anyhow::anyhow!("store connection lock poisoned")))
}

#[async_trait]
impl ComplaintStore for SqliteComplaintStore {
    async fn fetch_complaint_with_relations(
        &self,
        complaint_id: ComplaintId,
    ) -> NotifyResult<Option<ComplaintSnapshot>> {
        self.blocking(move |conn| complaint::load_complaint(conn, complaint_id))
            .await
    }

    async fn list_active_administrators(&self) -> NotifyResult<Vec<Person>> {
        self.blocking(person::active_administrators).await
    }
}

// ── Column helpers ─────────────────────────────────────────────────

fn to_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_time(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_time(idx, &r)).transpose()
}

fn parse_code<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
