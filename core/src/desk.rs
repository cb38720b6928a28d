//! Complaint desk — the CRUD-side caller of the notification engine.
//!
//! RULES:
//!   - Validate first. A rejected transition changes nothing and notifies
//!     nobody.
//!   - Persist second. Assignees, status and status log are written in one
//!     transaction.
//!   - Notify last, without waiting. The returned handle may be awaited or
//!     dropped; a notification failure never turns a committed change into
//!     an error.

use crate::{
    complaint::{ComplaintSnapshot, Person},
    error::{NotifyError, NotifyResult},
    event::BroadcastResult,
    hooks::{Assignment, AssignmentType, NotificationHooks, StatusUpdate, TransitionNotice},
    lifecycle,
    store::{NewComplaint, SqliteComplaintStore},
    types::{ComplaintId, Role, Status},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct ComplaintDesk {
    store: Arc<SqliteComplaintStore>,
    hooks: NotificationHooks,
}

impl ComplaintDesk {
    pub fn new(store: Arc<SqliteComplaintStore>, hooks: NotificationHooks) -> Self {
        Self { store, hooks }
    }

    /// File a complaint and announce it.
    pub fn file_complaint(
        &self,
        complaint: &NewComplaint,
    ) -> NotifyResult<(ComplaintSnapshot, JoinHandle<BroadcastResult>)> {
        let complaint_id = self.store.insert_complaint(complaint)?;
        let snapshot = self.snapshot(complaint_id)?;
        log::info!("complaint {} filed in {}", snapshot.code, snapshot.area);
        let handle = self.hooks.on_complaint_created(&snapshot, complaint.submitted_by);
        Ok((snapshot, handle))
    }

    /// Attach a ward officer or maintenance team member.
    ///
    /// From REGISTERED or REOPENED this is the move to ASSIGNED. On a
    /// complaint that is already ASSIGNED it only adds the assignee.
    pub fn assign(
        &self,
        complaint_id: ComplaintId,
        actor: &Person,
        assignee: &Person,
        comment: Option<String>,
    ) -> NotifyResult<JoinHandle<BroadcastResult>> {
        let current = self.status_of(complaint_id)?;
        if current != Status::Assigned {
            lifecycle::validate_transition(current, Status::Assigned, actor.role)?;
        } else if !matches!(actor.role, Role::WardOfficer | Role::Administrator) {
            return Err(NotifyError::Unauthorized {
                role: actor.role,
                current,
                requested: Status::Assigned,
            });
        }

        let assignment_type = match assignee.role {
            Role::WardOfficer => AssignmentType::WardOfficer,
            Role::MaintenanceTeam => AssignmentType::MaintenanceTeam,
            other => {
                return Err(NotifyError::Other(anyhow::anyhow!(
                    "person {} has role {other} and cannot be assigned",
                    assignee.person_id
                )))
            }
        };
        let (ward_officer, maintenance_team) = match assignment_type {
            AssignmentType::WardOfficer => (Some(assignee.person_id), None),
            AssignmentType::MaintenanceTeam => (None, Some(assignee.person_id)),
        };
        self.store.record_assignment(
            complaint_id,
            current,
            ward_officer,
            maintenance_team,
            comment.as_deref(),
            actor.person_id,
            Utc::now(),
        )?;

        Ok(self.hooks.on_assigned(Assignment {
            complaint_id,
            assigned_to_id: assignee.person_id,
            assigned_by_id: actor.person_id,
            assignment_type,
            previous_status: Some(current),
            comment,
        }))
    }

    /// Move a complaint to `requested` on behalf of `actor`.
    pub fn change_status(
        &self,
        complaint_id: ComplaintId,
        requested: Status,
        actor: &Person,
        comment: Option<String>,
    ) -> NotifyResult<JoinHandle<BroadcastResult>> {
        let current = self.status_of(complaint_id)?;
        lifecycle::validate_transition(current, requested, actor.role)?;
        self.store.record_status_change(
            complaint_id,
            current,
            requested,
            comment.as_deref(),
            actor.person_id,
            Utc::now(),
        )?;
        log::info!(
            "complaint {complaint_id}: {current} -> {requested} by {} ({})",
            actor.person_id,
            actor.role
        );

        let notice = TransitionNotice {
            complaint_id,
            previous_status: Some(current),
            comment,
            actor_id: actor.person_id,
            additional_data: Default::default(),
        };
        let handle = match requested {
            Status::Resolved => self.hooks.on_resolved(notice),
            Status::Closed => self.hooks.on_closed(notice),
            Status::Reopened => self.hooks.on_reopened(notice),
            _ => self.hooks.on_status_updated(StatusUpdate {
                complaint_id,
                new_status: requested,
                previous_status: notice.previous_status,
                comment: notice.comment,
                actor_id: notice.actor_id,
                additional_data: notice.additional_data,
            }),
        };
        Ok(handle)
    }

    fn status_of(&self, complaint_id: ComplaintId) -> NotifyResult<Status> {
        self.store
            .current_status(complaint_id)?
            .ok_or(NotifyError::ComplaintNotFound { complaint_id })
    }

    fn snapshot(&self, complaint_id: ComplaintId) -> NotifyResult<ComplaintSnapshot> {
        self.store
            .load_complaint(complaint_id)?
            .ok_or(NotifyError::ComplaintNotFound { complaint_id })
    }
}
