//! Broadcast events and results.
//!
//! RULE: One BroadcastEvent per committed transition. It is consumed once by
//! the coordinator and never persisted here; the CRUD layer owns the status
//! log entry.

use crate::types::{AdditionalData, ComplaintId, PersonId, Role, Status};
use serde::{Deserialize, Serialize};

/// Which CRUD action produced the event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Created,
    #[default]
    StatusUpdated,
    Assigned,
    Resolved,
    Closed,
    Reopened,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created       => "created",
            Self::StatusUpdated => "status_updated",
            Self::Assigned      => "assigned",
            Self::Resolved      => "resolved",
            Self::Closed        => "closed",
            Self::Reopened      => "reopened",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastEvent {
    pub complaint_id: ComplaintId,
    pub new_status: Status,
    pub previous_status: Option<Status>,
    pub comment: Option<String>,
    pub acting_user_id: PersonId,
    #[serde(default)]
    pub trigger: Trigger,
    /// Role-specific extras, e.g. "assignment_type".
    #[serde(default)]
    pub additional_data: AdditionalData,
}

impl BroadcastEvent {
    pub fn new(complaint_id: ComplaintId, new_status: Status, acting_user_id: PersonId) -> Self {
        Self {
            complaint_id,
            new_status,
            previous_status: None,
            comment: None,
            acting_user_id,
            trigger: Trigger::default(),
            additional_data: AdditionalData::new(),
        }
    }

    pub fn with_previous(mut self, previous: Option<Status>) -> Self {
        self.previous_status = previous;
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.additional_data.insert(key.to_string(), value.into());
        self
    }
}

/// One recipient the coordinator tried to reach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptedRecipient {
    pub email: String,
    pub role: Role,
    pub delivered: bool,
}

/// Summary of one broadcast. Failure reasons are logged, not returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastResult {
    pub success: bool,
    pub emails_sent: usize,
    pub total_recipients: usize,
    pub failed_count: usize,
    pub recipients: Vec<AttemptedRecipient>,
}

impl BroadcastResult {
    /// Nobody wanted this status. Still a success.
    pub fn empty() -> Self {
        Self {
            success: true,
            emails_sent: 0,
            total_recipients: 0,
            failed_count: 0,
            recipients: Vec::new(),
        }
    }

    /// The broadcast could not run at all (e.g. complaint not found).
    pub fn failed() -> Self {
        Self {
            success: false,
            ..Self::empty()
        }
    }

    pub fn from_attempts(recipients: Vec<AttemptedRecipient>) -> Self {
        let emails_sent = recipients.iter().filter(|r| r.delivered).count();
        Self {
            success: true,
            emails_sent,
            total_recipients: recipients.len(),
            failed_count: recipients.len() - emails_sent,
            recipients,
        }
    }
}
