//! Read-only snapshots of complaints and the people attached to them.
//!
//! Snapshots are owned by the persistence layer. The engine never mutates
//! them; every broadcast works on its own freshly fetched copy.

use crate::types::{ComplaintId, PersonId, Priority, Role, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub person_id: PersonId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub locale: Option<String>,
    pub active: bool,
}

impl Person {
    /// Trimmed, non-empty email address, if any.
    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ward {
    pub ward_id: i64,
    pub name: String,
    pub staff: Vec<Person>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusLogEntry {
    pub from_status: Option<Status>,
    pub to_status: Status,
    pub comment: Option<String>,
    pub changed_by: Option<Person>,
    pub changed_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintSnapshot {
    pub complaint_id: ComplaintId,
    /// Human-readable code shown to citizens, e.g. "CMP-2026-000123".
    pub code: String,
    pub complaint_type: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub area: String,
    pub landmark: Option<String>,
    pub address: Option<String>,
    pub sub_zone: Option<String>,
    pub submitted_by: Option<Person>,
    pub ward_officer: Option<Person>,
    pub maintenance_team: Option<Person>,
    /// Single-assignee field kept for records created before split assignment.
    pub assigned_to: Option<Person>,
    pub ward: Option<Ward>,
    pub submitted_on: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub resolved_on: Option<DateTime<Utc>>,
    pub status_logs: Vec<StatusLogEntry>,
}

impl ComplaintSnapshot {
    /// Find a person attached to this complaint by id.
    pub fn find_person(&self, person_id: PersonId) -> Option<&Person> {
        let direct = [
            self.submitted_by.as_ref(),
            self.ward_officer.as_ref(),
            self.maintenance_team.as_ref(),
            self.assigned_to.as_ref(),
        ];
        direct
            .into_iter()
            .flatten()
            .chain(self.ward.iter().flat_map(|w| w.staff.iter()))
            .chain(self.status_logs.iter().filter_map(|l| l.changed_by.as_ref()))
            .find(|p| p.person_id == person_id)
    }

    /// The most recent point in time recorded on the snapshot.
    /// Used instead of the wall clock so rendering stays reproducible.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.status_logs
            .iter()
            .map(|l| l.changed_on)
            .chain(self.resolved_on)
            .fold(self.submitted_on, |acc, t| acc.max(t))
    }

    /// Deadline has passed and the work is not finished.
    pub fn is_overdue(&self) -> bool {
        match self.deadline {
            Some(deadline) => !self.status.is_settled() && self.reference_time() > deadline,
            None => false,
        }
    }

    /// Most recent status log entries, newest first.
    pub fn recent_history(&self, limit: usize) -> impl Iterator<Item = &StatusLogEntry> {
        self.status_logs.iter().rev().take(limit)
    }
}
