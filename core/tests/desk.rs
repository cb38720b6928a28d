//! The CRUD-side flow: validate, persist, then notify.

mod common;

use civicdesk_core::{
    error::NotifyError,
    transport::RecordingTransport,
    types::{Role, Status},
};
use common::*;
use std::sync::Arc;

#[tokio::test]
async fn full_lifecycle_notifies_at_every_step() {
    let store = seeded_store(false);
    store.add_ward_staff(WARD, OFFICER).unwrap();
    store.add_ward_staff(WARD, CREW).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let desk = desk(store.clone(), transport.clone());

    let (snapshot, filed) = desk.file_complaint(&new_complaint("CMP-L", Some(WARD))).unwrap();
    let filed = filed.await.unwrap();
    assert_eq!(snapshot.status, Status::Registered);
    // Citizen and the ward officer; the crew template skips REGISTERED.
    assert_eq!(filed.emails_sent, 2);

    let id = snapshot.complaint_id;
    let steps = [
        desk.assign(id, &officer(), &officer(), None).unwrap(),
        desk.assign(id, &officer(), &crew(), Some("Bob takes it".into())).unwrap(),
    ];
    for handle in steps {
        assert!(handle.await.unwrap().success);
    }
    for (status, actor) in [
        (Status::InProgress, crew()),
        (Status::Resolved, crew()),
        (Status::Closed, officer()),
        (Status::Reopened, citizen()),
    ] {
        let result = desk.change_status(id, status, &actor, None).unwrap().await.unwrap();
        assert!(result.success, "{status}");
        assert!(result.emails_sent > 0, "{status}");
    }

    let after = store.load_complaint(id).unwrap().unwrap();
    assert_eq!(after.status, Status::Reopened);
    assert_eq!(after.ward_officer.as_ref().map(|p| p.person_id), Some(OFFICER));
    assert_eq!(after.maintenance_team.as_ref().map(|p| p.person_id), Some(CREW));
    assert!(after.resolved_on.is_none());
    let trail: Vec<Status> = after.status_logs.iter().map(|l| l.to_status).collect();
    assert_eq!(
        trail,
        vec![
            Status::Registered,
            Status::Assigned,
            Status::InProgress,
            Status::Resolved,
            Status::Closed,
            Status::Reopened,
        ]
    );
    // The citizen never hears about IN_PROGRESS.
    let citizen_subjects: Vec<String> = transport
        .sent_to("asha@example.org")
        .into_iter()
        .map(|m| m.subject)
        .collect();
    assert!(citizen_subjects.iter().all(|s| !s.contains("Work started")));
    assert_eq!(citizen_subjects.len(), 6);
}

#[tokio::test]
async fn rejected_transitions_change_nothing() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-R", None);
    let transport = Arc::new(RecordingTransport::new());
    let desk = desk(store.clone(), transport.clone());

    let err = desk.change_status(id, Status::Resolved, &admin(), None).unwrap_err();
    assert!(matches!(
        err,
        NotifyError::InvalidTransition { current: Status::Registered, requested: Status::Resolved }
    ));

    let err = desk.assign(id, &citizen(), &officer(), None).unwrap_err();
    assert!(matches!(err, NotifyError::Unauthorized { role: Role::Citizen, .. }));
    assert!(err.is_rejection());

    let after = store.load_complaint(id).unwrap().unwrap();
    assert_eq!(after.status, Status::Registered);
    assert_eq!(after.status_logs.len(), 1);
    assert!(after.ward_officer.is_none());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn unknown_complaint_is_reported() {
    let store = seeded_store(false);
    let desk = desk(store, Arc::new(RecordingTransport::new()));
    let err = desk.change_status(999, Status::Assigned, &officer(), None).unwrap_err();
    assert!(matches!(err, NotifyError::ComplaintNotFound { complaint_id: 999 }));
}

#[tokio::test]
async fn notification_failure_does_not_undo_the_change() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-N", None);
    let transport = Arc::new(RecordingTransport::new());
    transport.fail_for("asha@example.org");
    transport.fail_for("alice@example.org");
    let desk = desk(store.clone(), transport.clone());

    let result = desk
        .assign(id, &officer(), &officer(), None)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(result.emails_sent, 0);
    assert_eq!(result.failed_count, 2);

    let after = store.load_complaint(id).unwrap().unwrap();
    assert_eq!(after.status, Status::Assigned);
    assert_eq!(after.ward_officer.map(|p| p.person_id), Some(OFFICER));
}

#[tokio::test]
async fn only_staff_can_be_assigned() {
    let store = seeded_store(true);
    let id = file(&store, "CMP-S", None);
    let desk = desk(store.clone(), Arc::new(RecordingTransport::new()));

    assert!(desk.assign(id, &officer(), &citizen(), None).is_err());
    assert_eq!(store.current_status(id).unwrap(), Some(Status::Registered));

    desk.assign(id, &admin(), &officer(), None).unwrap().await.unwrap();
    // Already assigned: only officers and administrators may add assignees.
    let err = desk.assign(id, &crew(), &crew(), None).unwrap_err();
    assert!(matches!(err, NotifyError::Unauthorized { role: Role::MaintenanceTeam, .. }));
}

/// The assignee write and the status log entry commit together. An actor
/// with no person row fails the log insert, so the assignee must not stick.
#[tokio::test]
async fn failed_assignment_leaves_no_partial_write() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-A", None);
    let transport = Arc::new(RecordingTransport::new());
    let desk = desk(store.clone(), transport.clone());
    let ghost = person(50, "Ghost Officer", "ghost@example.org", Role::WardOfficer);

    assert!(desk.assign(id, &ghost, &officer(), None).is_err());

    let after = store.load_complaint(id).unwrap().unwrap();
    assert_eq!(after.status, Status::Registered);
    assert!(after.ward_officer.is_none());
    assert_eq!(after.status_logs.len(), 1);
    assert!(transport.sent().is_empty());
}
