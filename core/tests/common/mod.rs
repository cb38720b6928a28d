//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use civicdesk_core::{
    complaint::{ComplaintSnapshot, Person, StatusLogEntry, Ward},
    config::NotifyConfig,
    coordinator::BroadcastCoordinator,
    desk::ComplaintDesk,
    hooks::NotificationHooks,
    store::{ComplaintStore, NewComplaint, SqliteComplaintStore},
    transport::RecordingTransport,
    types::{ComplaintId, PersonId, Priority, Role, Status},
};
use std::sync::Arc;

pub const CITIZEN: PersonId = 1;
pub const OFFICER: PersonId = 2;
pub const CREW: PersonId = 3;
pub const ADMIN: PersonId = 4;
pub const WARD: i64 = 12;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 15, 0).unwrap()
}

pub fn config() -> Arc<NotifyConfig> {
    Arc::new(NotifyConfig::builtin().unwrap())
}

pub fn config_with_timeout(timeout_ms: u64) -> Arc<NotifyConfig> {
    let mut config = NotifyConfig::builtin().unwrap();
    config.settings.send_timeout_ms = timeout_ms;
    Arc::new(config)
}

pub fn person(person_id: PersonId, name: &str, email: &str, role: Role) -> Person {
    Person {
        person_id,
        name: name.into(),
        email: Some(email.into()),
        phone: None,
        role,
        locale: None,
        active: true,
    }
}

pub fn citizen() -> Person {
    Person {
        phone: Some("+91 98200 00001".into()),
        ..person(CITIZEN, "Asha Patil", "asha@example.org", Role::Citizen)
    }
}

pub fn officer() -> Person {
    person(OFFICER, "Alice Rao", "alice@example.org", Role::WardOfficer)
}

pub fn crew() -> Person {
    person(CREW, "Bob Shinde", "bob@example.org", Role::MaintenanceTeam)
}

pub fn admin() -> Person {
    person(ADMIN, "Meera Joshi", "meera@example.org", Role::Administrator)
}

/// In-memory snapshot with only a submitter attached.
pub fn bare_snapshot(status: Status) -> ComplaintSnapshot {
    ComplaintSnapshot {
        complaint_id: 41,
        code: "CMP-2026-000041".into(),
        complaint_type: "Streetlight".into(),
        description: "Streetlight out on the main road".into(),
        status,
        priority: Priority::Medium,
        area: "Kothrud".into(),
        landmark: Some("Near the temple".into()),
        address: None,
        sub_zone: None,
        submitted_by: Some(citizen()),
        ward_officer: None,
        maintenance_team: None,
        assigned_to: None,
        ward: None,
        submitted_on: t0(),
        deadline: Some(t0() + Duration::days(5)),
        resolved_on: None,
        status_logs: vec![StatusLogEntry {
            from_status: None,
            to_status: Status::Registered,
            comment: None,
            changed_by: Some(citizen()),
            changed_on: t0(),
        }],
    }
}

/// Snapshot with officer, crew and a ward whose staff repeats them.
pub fn staffed_snapshot(status: Status) -> ComplaintSnapshot {
    let mut snapshot = bare_snapshot(status);
    snapshot.ward_officer = Some(officer());
    snapshot.maintenance_team = Some(crew());
    snapshot.ward = Some(Ward {
        ward_id: WARD,
        name: "Ward 12".into(),
        staff: vec![officer(), crew()],
    });
    snapshot.status_logs.push(StatusLogEntry {
        from_status: Some(Status::Registered),
        to_status: Status::Assigned,
        comment: Some("Crew dispatched with ladder".into()),
        changed_by: Some(officer()),
        changed_on: t0() + Duration::hours(3),
    });
    snapshot
}

/// Migrated in-memory store with the four fixture people.
/// Administrators are only seeded when `with_admin` is set.
pub fn seeded_store(with_admin: bool) -> Arc<SqliteComplaintStore> {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SqliteComplaintStore::in_memory().unwrap();
    store.migrate().unwrap();
    for p in [citizen(), officer(), crew()] {
        store.insert_person(&p).unwrap();
    }
    if with_admin {
        store.insert_person(&admin()).unwrap();
    }
    store.insert_ward(WARD, "Ward 12").unwrap();
    Arc::new(store)
}

pub fn new_complaint(code: &str, ward_id: Option<i64>) -> NewComplaint {
    NewComplaint {
        code: code.into(),
        complaint_type: "Garbage".into(),
        description: "Overflowing bin".into(),
        priority: Priority::High,
        area: "Aundh".into(),
        landmark: None,
        address: Some("12 Ring Road".into()),
        sub_zone: None,
        submitted_by: CITIZEN,
        ward_id,
        submitted_on: t0(),
        deadline: None,
    }
}

pub fn file(store: &SqliteComplaintStore, code: &str, ward_id: Option<i64>) -> ComplaintId {
    store.insert_complaint(&new_complaint(code, ward_id)).unwrap()
}

pub fn coordinator(
    config: Arc<NotifyConfig>,
    store: Arc<SqliteComplaintStore>,
    transport: Arc<RecordingTransport>,
) -> Arc<BroadcastCoordinator> {
    let store: Arc<dyn ComplaintStore> = store;
    Arc::new(BroadcastCoordinator::new(config, store, transport).unwrap())
}

pub fn desk(
    store: Arc<SqliteComplaintStore>,
    transport: Arc<RecordingTransport>,
) -> ComplaintDesk {
    let coordinator = coordinator(config(), store.clone(), transport);
    ComplaintDesk::new(store, NotificationHooks::new(coordinator))
}
