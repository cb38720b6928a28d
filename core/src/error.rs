use crate::types::{ComplaintId, Role, Status};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Complaint {complaint_id} not found")]
    ComplaintNotFound { complaint_id: ComplaintId },

    #[error("Invalid transition: {current} -> {requested}")]
    InvalidTransition { current: Status, requested: Status },

    #[error("Role {role} may not move a complaint from {current} to {requested}")]
    Unauthorized {
        role: Role,
        current: Status,
        requested: Status,
    },

    #[error("Cannot render message for {email} as {role}: {reason}")]
    RecipientRender {
        email: String,
        role: Role,
        reason: String,
    },

    #[error("Transport failed for {email}: {reason}")]
    Transport { email: String, reason: String },

    #[error("Transport timed out for {email} after {timeout_ms}ms")]
    Timeout { email: String, timeout_ms: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NotifyError {
    /// Request-rejection errors raised before any state is changed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. } | Self::Unauthorized { .. })
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;
