//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal database identifier of a complaint.
pub type ComplaintId = i64;

/// Internal identifier of any person (citizen or staff).
pub type PersonId = i64;

/// Free-form key/value extras attached to a broadcast event.
/// BTreeMap keeps iteration order stable for rendering.
pub type AdditionalData = std::collections::BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Registered,
    Assigned,
    InProgress,
    Resolved,
    Closed,
    Reopened,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Registered,
        Status::Assigned,
        Status::InProgress,
        Status::Resolved,
        Status::Closed,
        Status::Reopened,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Assigned   => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved   => "RESOLVED",
            Self::Closed     => "CLOSED",
            Self::Reopened   => "REOPENED",
        }
    }

    /// Work on the complaint is finished (deadline no longer applies).
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    WardOfficer,
    MaintenanceTeam,
    Administrator,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Citizen,
        Role::WardOfficer,
        Role::MaintenanceTeam,
        Role::Administrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen         => "CITIZEN",
            Self::WardOfficer     => "WARD_OFFICER",
            Self::MaintenanceTeam => "MAINTENANCE_TEAM",
            Self::Administrator   => "ADMINISTRATOR",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low      => "LOW",
            Self::Medium   => "MEDIUM",
            Self::High     => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Which family of message tables a role is rendered with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Citizen,
    Staff,
    Admin,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Staff   => "staff",
            Self::Admin   => "admin",
        }
    }
}

/// Error returned when a stored code does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode(pub String);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown code '{}'", self.0)
    }
}

impl std::error::Error for UnknownCode {}

macro_rules! impl_code {
    ($ty:ty, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownCode(s.to_string()))
            }
        }
    };
}

impl_code!(Status, [
    Status::Registered,
    Status::Assigned,
    Status::InProgress,
    Status::Resolved,
    Status::Closed,
    Status::Reopened,
]);
impl_code!(Role, [
    Role::Citizen,
    Role::WardOfficer,
    Role::MaintenanceTeam,
    Role::Administrator,
]);
impl_code!(Priority, [Priority::Low, Priority::Medium, Priority::High, Priority::Critical]);
impl_code!(TemplateKind, [TemplateKind::Citizen, TemplateKind::Staff, TemplateKind::Admin]);
