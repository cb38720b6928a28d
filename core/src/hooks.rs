//! Event hooks — the engine's entry points for the CRUD layer.
//!
//! RULE: A hook never fails the caller. Each one builds a BroadcastEvent,
//! spawns the broadcast on the tokio runtime and returns immediately. Any
//! error inside the broadcast is logged and turned into a failed
//! BroadcastResult on the returned handle. Callers that do not care about
//! the outcome simply drop the handle; the broadcast still runs.
//!
//! Hooks must be called from within a tokio runtime.

use crate::{
    complaint::ComplaintSnapshot,
    coordinator::BroadcastCoordinator,
    event::{BroadcastEvent, BroadcastResult, Trigger},
    types::{AdditionalData, ComplaintId, PersonId, Status},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Generic status change coming from the CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub complaint_id: ComplaintId,
    pub new_status: Status,
    pub previous_status: Option<Status>,
    pub comment: Option<String>,
    pub actor_id: PersonId,
    #[serde(default)]
    pub additional_data: AdditionalData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    WardOfficer,
    MaintenanceTeam,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WardOfficer     => "ward_officer",
            Self::MaintenanceTeam => "maintenance_team",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub complaint_id: ComplaintId,
    pub assigned_to_id: PersonId,
    pub assigned_by_id: PersonId,
    pub assignment_type: AssignmentType,
    pub previous_status: Option<Status>,
    pub comment: Option<String>,
}

/// Resolve / close / reopen notice. The target status is implied by the hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionNotice {
    pub complaint_id: ComplaintId,
    pub previous_status: Option<Status>,
    pub comment: Option<String>,
    pub actor_id: PersonId,
    #[serde(default)]
    pub additional_data: AdditionalData,
}

#[derive(Clone)]
pub struct NotificationHooks {
    coordinator: Arc<BroadcastCoordinator>,
}

impl NotificationHooks {
    pub fn new(coordinator: Arc<BroadcastCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn on_complaint_created(
        &self,
        complaint: &ComplaintSnapshot,
        actor_id: PersonId,
    ) -> JoinHandle<BroadcastResult> {
        let event = BroadcastEvent::new(complaint.complaint_id, complaint.status, actor_id)
            .with_trigger(Trigger::Created);
        self.spawn(event)
    }

    pub fn on_status_updated(&self, update: StatusUpdate) -> JoinHandle<BroadcastResult> {
        let mut event = BroadcastEvent::new(update.complaint_id, update.new_status, update.actor_id)
            .with_previous(update.previous_status)
            .with_comment(update.comment)
            .with_trigger(Trigger::StatusUpdated);
        event.additional_data = update.additional_data;
        self.spawn(event)
    }

    pub fn on_assigned(&self, assignment: Assignment) -> JoinHandle<BroadcastResult> {
        let event = BroadcastEvent::new(
            assignment.complaint_id,
            Status::Assigned,
            assignment.assigned_by_id,
        )
        .with_previous(assignment.previous_status)
        .with_comment(assignment.comment)
        .with_trigger(Trigger::Assigned)
        .with_data("assignment_type", assignment.assignment_type.as_str())
        .with_data("assigned_to_id", assignment.assigned_to_id);
        self.spawn(event)
    }

    pub fn on_resolved(&self, notice: TransitionNotice) -> JoinHandle<BroadcastResult> {
        self.spawn(Self::transition(notice, Status::Resolved, Trigger::Resolved))
    }

    pub fn on_closed(&self, notice: TransitionNotice) -> JoinHandle<BroadcastResult> {
        self.spawn(Self::transition(notice, Status::Closed, Trigger::Closed))
    }

    pub fn on_reopened(&self, notice: TransitionNotice) -> JoinHandle<BroadcastResult> {
        self.spawn(Self::transition(notice, Status::Reopened, Trigger::Reopened))
    }

    fn transition(notice: TransitionNotice, status: Status, trigger: Trigger) -> BroadcastEvent {
        let mut event = BroadcastEvent::new(notice.complaint_id, status, notice.actor_id)
            .with_previous(notice.previous_status)
            .with_comment(notice.comment)
            .with_trigger(trigger);
        event.additional_data = notice.additional_data;
        event
    }

    fn spawn(&self, event: BroadcastEvent) -> JoinHandle<BroadcastResult> {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            match coordinator.broadcast(&event).await {
                Ok(result) => result,
                Err(e) => {
                    log::error!(
                        "broadcast for complaint {} ({} -> {}) failed: {e}",
                        event.complaint_id,
                        event.trigger.as_str(),
                        event.new_status
                    );
                    BroadcastResult::failed()
                }
            }
        })
    }
}
