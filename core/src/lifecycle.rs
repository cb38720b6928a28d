//! Complaint status lifecycle.
//!
//! RULE: The CRUD layer calls validate_transition() before it persists a
//! status change. The broadcast coordinator never re-checks a transition
//! that has already been committed.
//!
//! REGISTERED → ASSIGNED → IN_PROGRESS → RESOLVED → CLOSED → REOPENED
//! ASSIGNED may skip straight to RESOLVED. REOPENED goes back to
//! ASSIGNED or IN_PROGRESS.

use crate::{
    error::{NotifyError, NotifyResult},
    types::{Role, Status},
};

/// Status every complaint starts in.
pub const INITIAL_STATUS: Status = Status::Registered;

/// Legal edges and the roles allowed to take them.
/// ADMINISTRATOR is allowed on every edge.
const TRANSITIONS: &[(Status, Status, &[Role])] = &[
    (Status::Registered, Status::Assigned,   &[Role::WardOfficer, Role::Administrator]),
    (Status::Assigned,   Status::InProgress, &[Role::MaintenanceTeam, Role::Administrator]),
    (Status::Assigned,   Status::Resolved,   &[Role::MaintenanceTeam, Role::Administrator]),
    (Status::InProgress, Status::Resolved,   &[Role::MaintenanceTeam, Role::Administrator]),
    (Status::Resolved,   Status::Closed,     &[Role::WardOfficer, Role::Administrator]),
    (Status::Closed,     Status::Reopened,   &[Role::Citizen, Role::WardOfficer, Role::Administrator]),
    (Status::Reopened,   Status::Assigned,   &[Role::WardOfficer, Role::Administrator]),
    (Status::Reopened,   Status::InProgress, &[Role::MaintenanceTeam, Role::Administrator]),
];

fn edge(current: Status, requested: Status) -> Option<&'static [Role]> {
    TRANSITIONS
        .iter()
        .find(|(from, to, _)| *from == current && *to == requested)
        .map(|(_, _, roles)| *roles)
}

/// True if the edge exists at all, regardless of who asks.
pub fn is_legal_edge(current: Status, requested: Status) -> bool {
    edge(current, requested).is_some()
}

/// Decide whether `role` may move a complaint from `current` to `requested`.
///
/// Edge legality is checked first: an edge that does not exist is always
/// `InvalidTransition`, even for an administrator.
pub fn validate_transition(current: Status, requested: Status, role: Role) -> NotifyResult<()> {
    let roles = edge(current, requested)
        .ok_or(NotifyError::InvalidTransition { current, requested })?;
    if !roles.contains(&role) {
        return Err(NotifyError::Unauthorized {
            role,
            current,
            requested,
        });
    }
    Ok(())
}

/// Statuses `role` may move a complaint to from `current`, in lifecycle order.
pub fn next_statuses(current: Status, role: Role) -> Vec<Status> {
    TRANSITIONS
        .iter()
        .filter(|(from, _, roles)| *from == current && roles.contains(&role))
        .map(|(_, to, _)| *to)
        .collect()
}
