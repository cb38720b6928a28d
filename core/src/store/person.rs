use super::{parse_code, SqliteComplaintStore};
use crate::{
    complaint::{Person, Ward},
    error::NotifyResult,
    types::{PersonId, Role},
};
use rusqlite::{params, Connection, OptionalExtension};

const PERSON_COLUMNS: &str = "person_id, name, email, phone, role, locale, active";

fn person_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let role: String = row.get(4)?;
    Ok(Person {
        person_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: parse_code::<Role>(4, &role)?,
        locale: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
    })
}

pub(super) fn person_by_id(
    conn: &Connection,
    person_id: Option<PersonId>,
) -> rusqlite::Result<Option<Person>> {
    let Some(person_id) = person_id else {
        return Ok(None);
    };
    conn.query_row(
        &format!("SELECT {PERSON_COLUMNS} FROM person WHERE person_id = ?1"),
        params![person_id],
        person_row_mapper,
    )
    .optional()
}

pub(super) fn ward_by_id(conn: &Connection, ward_id: Option<i64>) -> rusqlite::Result<Option<Ward>> {
    let Some(ward_id) = ward_id else {
        return Ok(None);
    };
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM ward WHERE ward_id = ?1",
            params![ward_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(name) = name else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT p.person_id, p.name, p.email, p.phone, p.role, p.locale, p.active
         FROM ward_staff s JOIN person p ON p.person_id = s.person_id
         WHERE s.ward_id = ?1
         ORDER BY p.person_id ASC",
    )?;
    let staff = stmt
        .query_map(params![ward_id], person_row_mapper)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Ward {
        ward_id,
        name,
        staff,
    }))
}

pub(super) fn active_administrators(conn: &Connection) -> NotifyResult<Vec<Person>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PERSON_COLUMNS} FROM person
         WHERE role = 'ADMINISTRATOR' AND active = 1
         ORDER BY person_id ASC"
    ))?;
    let rows = stmt.query_map([], person_row_mapper)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

impl SqliteComplaintStore {
    // ── Person ─────────────────────────────────────────────────────

    pub fn insert_person(&self, p: &Person) -> NotifyResult<()> {
        self.conn()?.execute(
            "INSERT INTO person (person_id, name, email, phone, role, locale, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                p.person_id,
                &p.name,
                p.email.as_deref(),
                p.phone.as_deref(),
                p.role.as_str(),
                p.locale.as_deref(),
                if p.active { 1i32 } else { 0i32 },
            ],
        )?;
        Ok(())
    }

    pub fn get_person(&self, person_id: PersonId) -> NotifyResult<Option<Person>> {
        let conn = self.conn()?;
        Ok(person_by_id(&conn, Some(person_id))?)
    }

    pub fn set_person_active(&self, person_id: PersonId, active: bool) -> NotifyResult<()> {
        self.conn()?.execute(
            "UPDATE person SET active = ?1 WHERE person_id = ?2",
            params![if active { 1i32 } else { 0i32 }, person_id],
        )?;
        Ok(())
    }

    pub fn active_administrators(&self) -> NotifyResult<Vec<Person>> {
        let conn = self.conn()?;
        active_administrators(&conn)
    }

    // ── Ward ───────────────────────────────────────────────────────

    pub fn insert_ward(&self, ward_id: i64, name: &str) -> NotifyResult<()> {
        self.conn()?.execute(
            "INSERT INTO ward (ward_id, name) VALUES (?1, ?2)",
            params![ward_id, name],
        )?;
        Ok(())
    }

    pub fn add_ward_staff(&self, ward_id: i64, person_id: PersonId) -> NotifyResult<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO ward_staff (ward_id, person_id) VALUES (?1, ?2)",
            params![ward_id, person_id],
        )?;
        Ok(())
    }

    pub fn get_ward(&self, ward_id: i64) -> NotifyResult<Option<Ward>> {
        let conn = self.conn()?;
        Ok(ward_by_id(&conn, Some(ward_id))?)
    }
}
