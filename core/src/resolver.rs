//! Recipient resolution — who hears about a status change.
//!
//! PRECEDENCE (fixed, first match wins per email):
//!   1. submitted_by        as CITIZEN
//!   2. ward_officer        as WARD_OFFICER
//!   3. maintenance_team    as MAINTENANCE_TEAM
//!   4. assigned_to         as their stored role (legacy field)
//!   5. active ward staff   as their stored role
//!   6. active administrators as ADMINISTRATOR
//!
//! A candidate is kept only if its role's template allows the status.
//! An email that has already been added is never added again, even if the
//! later role would also qualify. People without an email are skipped.

use crate::{
    complaint::{ComplaintSnapshot, Person},
    config::{NotificationTemplate, TemplateRegistry},
    types::{Role, Status},
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Why a person was considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientSource {
    Submitter,
    WardOfficer,
    MaintenanceTeam,
    LegacyAssignee,
    WardStaff,
    Administrator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub person: Person,
    /// Trimmed address the message goes to.
    pub email: String,
    /// Role used to pick the template (not necessarily the stored role).
    pub role: Role,
    pub locale: Option<String>,
    pub source: RecipientSource,
    pub template: NotificationTemplate,
}

pub struct RecipientResolver {
    templates: Arc<TemplateRegistry>,
}

impl RecipientResolver {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }

    /// Resolve recipients for `status`.
    ///
    /// `administrators` is the system-wide administrator list; inactive
    /// entries and non-administrators in it are ignored.
    pub fn resolve(
        &self,
        complaint: &ComplaintSnapshot,
        administrators: &[Person],
        status: Status,
    ) -> Vec<Recipient> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        match &complaint.submitted_by {
            Some(citizen) => {
                self.consider(citizen, Role::Citizen, RecipientSource::Submitter, status, &mut seen, &mut out)
            }
            None => log::warn!(
                "complaint {} has no submitter; notifying staff only",
                complaint.code
            ),
        }

        if let Some(officer) = &complaint.ward_officer {
            self.consider(officer, Role::WardOfficer, RecipientSource::WardOfficer, status, &mut seen, &mut out);
        }

        if let Some(team) = &complaint.maintenance_team {
            self.consider(team, Role::MaintenanceTeam, RecipientSource::MaintenanceTeam, status, &mut seen, &mut out);
        }

        if let Some(assignee) = &complaint.assigned_to {
            self.consider(assignee, assignee.role, RecipientSource::LegacyAssignee, status, &mut seen, &mut out);
        }

        if let Some(ward) = &complaint.ward {
            for member in ward.staff.iter().filter(|p| p.active) {
                self.consider(member, member.role, RecipientSource::WardStaff, status, &mut seen, &mut out);
            }
        }

        for admin in administrators
            .iter()
            .filter(|p| p.active && p.role == Role::Administrator)
        {
            self.consider(admin, Role::Administrator, RecipientSource::Administrator, status, &mut seen, &mut out);
        }

        log::debug!(
            "complaint {} -> {status}: {} recipient(s)",
            complaint.code,
            out.len()
        );
        out
    }

    fn consider(
        &self,
        person: &Person,
        role: Role,
        source: RecipientSource,
        status: Status,
        seen: &mut HashSet<String>,
        out: &mut Vec<Recipient>,
    ) {
        let Some(email) = person.contact_email() else {
            log::debug!("skipping person {} ({source:?}): no email", person.person_id);
            return;
        };
        let key = email.to_lowercase();
        if seen.contains(&key) {
            return;
        }
        let Some(template) = self.templates.get(role) else {
            log::warn!("no notification template for role {role}");
            return;
        };
        if !template.allows(status) {
            return;
        }
        seen.insert(key);
        out.push(Recipient {
            person: person.clone(),
            email: email.to_string(),
            role,
            locale: person.locale.clone(),
            source,
            template: template.clone(),
        });
    }
}
