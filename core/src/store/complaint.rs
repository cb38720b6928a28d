use super::{
    parse_code, parse_opt_time, parse_time,
    person::{person_by_id, ward_by_id},
    to_text, SqliteComplaintStore,
};
use crate::{
    complaint::{ComplaintSnapshot, StatusLogEntry},
    error::{NotifyError, NotifyResult},
    lifecycle::INITIAL_STATUS,
    types::{ComplaintId, PersonId, Priority, Status},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Fields the citizen supplies when filing a complaint.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub code: String,
    pub complaint_type: String,
    pub description: String,
    pub priority: Priority,
    pub area: String,
    pub landmark: Option<String>,
    pub address: Option<String>,
    pub sub_zone: Option<String>,
    pub submitted_by: PersonId,
    pub ward_id: Option<i64>,
    pub submitted_on: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Raw complaint row before relations are attached.
struct ComplaintRow {
    complaint_id: ComplaintId,
    code: String,
    complaint_type: String,
    description: String,
    status: Status,
    priority: Priority,
    area: String,
    landmark: Option<String>,
    address: Option<String>,
    sub_zone: Option<String>,
    submitted_by: Option<PersonId>,
    ward_officer: Option<PersonId>,
    maintenance_team: Option<PersonId>,
    assigned_to: Option<PersonId>,
    ward_id: Option<i64>,
    submitted_on: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    resolved_on: Option<DateTime<Utc>>,
}

fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRow> {
    Ok(ComplaintRow {
        complaint_id: row.get(0)?,
        code: row.get(1)?,
        complaint_type: row.get(2)?,
        description: row.get(3)?,
        status: parse_code(4, &row.get::<_, String>(4)?)?,
        priority: parse_code(5, &row.get::<_, String>(5)?)?,
        area: row.get(6)?,
        landmark: row.get(7)?,
        address: row.get(8)?,
        sub_zone: row.get(9)?,
        submitted_by: row.get(10)?,
        ward_officer: row.get(11)?,
        maintenance_team: row.get(12)?,
        assigned_to: row.get(13)?,
        ward_id: row.get(14)?,
        submitted_on: parse_time(15, &row.get::<_, String>(15)?)?,
        deadline: parse_opt_time(16, row.get(16)?)?,
        resolved_on: parse_opt_time(17, row.get(17)?)?,
    })
}

fn status_logs(conn: &Connection, complaint_id: ComplaintId) -> rusqlite::Result<Vec<StatusLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT from_status, to_status, comment, changed_by, changed_on
         FROM status_log WHERE complaint_id = ?1
         ORDER BY log_id ASC",
    )?;
    let raw = stmt
        .query_map(params![complaint_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<PersonId>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(from, to, comment, changed_by, changed_on)| -> rusqlite::Result<StatusLogEntry> {
            Ok(StatusLogEntry {
                from_status: from.map(|f| parse_code(0, &f)).transpose()?,
                to_status: parse_code(1, &to)?,
                comment,
                changed_by: person_by_id(conn, changed_by)?,
                changed_on: parse_time(4, &changed_on)?,
            })
        })
        .collect()
}

/// Complaint with every relation attached, or None.
pub(super) fn load_complaint(conn: &Connection, complaint_id: ComplaintId) -> NotifyResult<Option<ComplaintSnapshot>> {
    let row = conn
        .query_row(
            "SELECT complaint_id, code, complaint_type, description, status, priority, area,
                    landmark, address, sub_zone, submitted_by, ward_officer, maintenance_team,
                    assigned_to, ward_id, submitted_on, deadline, resolved_on
             FROM complaint WHERE complaint_id = ?1",
            params![complaint_id],
            complaint_row_mapper,
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(ComplaintSnapshot {
        complaint_id: row.complaint_id,
        code: row.code,
        complaint_type: row.complaint_type,
        description: row.description,
        status: row.status,
        priority: row.priority,
        area: row.area,
        landmark: row.landmark,
        address: row.address,
        sub_zone: row.sub_zone,
        submitted_by: person_by_id(conn, row.submitted_by)?,
        ward_officer: person_by_id(conn, row.ward_officer)?,
        maintenance_team: person_by_id(conn, row.maintenance_team)?,
        assigned_to: person_by_id(conn, row.assigned_to)?,
        ward: ward_by_id(conn, row.ward_id)?,
        submitted_on: row.submitted_on,
        deadline: row.deadline,
        resolved_on: row.resolved_on,
        status_logs: status_logs(conn, row.complaint_id)?,
    }))
}

fn apply_status_change(
    conn: &Connection,
    complaint_id: ComplaintId,
    from: Status,
    to: Status,
    comment: Option<&str>,
    changed_by: PersonId,
    at: DateTime<Utc>,
) -> NotifyResult<()> {
    let resolved_on = match to {
        Status::Resolved => Some(to_text(at)),
        _ => None,
    };
    let changed = conn.execute(
        "UPDATE complaint
         SET status = ?1,
             resolved_on = CASE
                 WHEN ?1 = 'RESOLVED' THEN ?2
                 WHEN ?1 = 'REOPENED' THEN NULL
                 ELSE resolved_on
             END
         WHERE complaint_id = ?3 AND status = ?4",
        params![to.as_str(), resolved_on, complaint_id, from.as_str()],
    )?;
    if changed == 0 {
        return Err(refusal(conn, complaint_id, to)?);
    }
    conn.execute(
        "INSERT INTO status_log (complaint_id, from_status, to_status, comment, changed_by, changed_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![complaint_id, from.as_str(), to.as_str(), comment, changed_by, to_text(at)],
    )?;
    Ok(())
}

/// Why a status-guarded write touched no row: the complaint is gone, or
/// someone else moved it first.
fn refusal(conn: &Connection, complaint_id: ComplaintId, requested: Status) -> NotifyResult<NotifyError> {
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM complaint WHERE complaint_id = ?1",
            params![complaint_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match current {
        None => NotifyError::ComplaintNotFound { complaint_id },
        Some(current) => NotifyError::InvalidTransition {
            current: parse_code(0, &current)?,
            requested,
        },
    })
}

impl SqliteComplaintStore {
    // ── Complaint ──────────────────────────────────────────────────

    /// File a complaint in the initial status and write its first log entry.
    pub fn insert_complaint(&self, c: &NewComplaint) -> NotifyResult<ComplaintId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO complaint (
                code, complaint_type, description, status, priority, area, landmark,
                address, sub_zone, submitted_by, ward_id, submitted_on, deadline
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &c.code,
                &c.complaint_type,
                &c.description,
                INITIAL_STATUS.as_str(),
                c.priority.as_str(),
                &c.area,
                c.landmark.as_deref(),
                c.address.as_deref(),
                c.sub_zone.as_deref(),
                c.submitted_by,
                c.ward_id,
                to_text(c.submitted_on),
                c.deadline.map(to_text),
            ],
        )?;
        let complaint_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO status_log (complaint_id, from_status, to_status, comment, changed_by, changed_on)
             VALUES (?1, NULL, ?2, NULL, ?3, ?4)",
            params![
                complaint_id,
                INITIAL_STATUS.as_str(),
                c.submitted_by,
                to_text(c.submitted_on)
            ],
        )?;
        tx.commit()?;
        Ok(complaint_id)
    }

    /// Complaint with every relation attached, or None.
    pub fn load_complaint(&self, complaint_id: ComplaintId) -> NotifyResult<Option<ComplaintSnapshot>> {
        let conn = self.conn()?;
        load_complaint(&conn, complaint_id)
    }

    pub fn current_status(&self, complaint_id: ComplaintId) -> NotifyResult<Option<Status>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT status FROM complaint WHERE complaint_id = ?1",
                params![complaint_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|r| parse_code(0, &r)).transpose()?)
    }

    /// Set the ward officer and/or maintenance team. `None` leaves the
    /// existing value in place.
    pub fn set_assignees(
        &self,
        complaint_id: ComplaintId,
        ward_officer: Option<PersonId>,
        maintenance_team: Option<PersonId>,
    ) -> NotifyResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE complaint
             SET ward_officer = COALESCE(?1, ward_officer),
                 maintenance_team = COALESCE(?2, maintenance_team)
             WHERE complaint_id = ?3",
            params![ward_officer, maintenance_team, complaint_id],
        )?;
        if changed == 0 {
            return Err(NotifyError::ComplaintNotFound { complaint_id });
        }
        Ok(())
    }

    /// Legacy single-assignee field.
    pub fn set_assigned_to(&self, complaint_id: ComplaintId, person_id: Option<PersonId>) -> NotifyResult<()> {
        self.conn()?.execute(
            "UPDATE complaint SET assigned_to = ?1 WHERE complaint_id = ?2",
            params![person_id, complaint_id],
        )?;
        Ok(())
    }

    /// Move the complaint to `to` and append the status log entry, atomically.
    /// RESOLVED stamps resolved_on; REOPENED clears it.
    pub fn record_status_change(
        &self,
        complaint_id: ComplaintId,
        from: Status,
        to: Status,
        comment: Option<&str>,
        changed_by: PersonId,
        at: DateTime<Utc>,
    ) -> NotifyResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        apply_status_change(&tx, complaint_id, from, to, comment, changed_by, at)?;
        tx.commit()?;
        Ok(())
    }

    /// Attach a ward officer and/or maintenance team member and, unless the
    /// complaint is already ASSIGNED, move it to ASSIGNED. Both writes land
    /// in one transaction or not at all.
    #[allow(clippy::too_many_arguments)]
    pub fn record_assignment(
        &self,
        complaint_id: ComplaintId,
        from: Status,
        ward_officer: Option<PersonId>,
        maintenance_team: Option<PersonId>,
        comment: Option<&str>,
        changed_by: PersonId,
        at: DateTime<Utc>,
    ) -> NotifyResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE complaint
             SET ward_officer = COALESCE(?1, ward_officer),
                 maintenance_team = COALESCE(?2, maintenance_team)
             WHERE complaint_id = ?3 AND status = ?4",
            params![ward_officer, maintenance_team, complaint_id, from.as_str()],
        )?;
        if changed == 0 {
            return Err(refusal(&tx, complaint_id, Status::Assigned)?);
        }
        if from != Status::Assigned {
            apply_status_change(&tx, complaint_id, from, Status::Assigned, comment, changed_by, at)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn complaint_count(&self) -> NotifyResult<i64> {
        Ok(self
            .conn()?
            .query_row("SELECT COUNT(*) FROM complaint", [], |row| row.get(0))?)
    }
}
