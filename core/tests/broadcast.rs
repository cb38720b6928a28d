//! Coordinator and hooks against an in-memory store and a recording transport.

mod common;

use async_trait::async_trait;
use civicdesk_core::{
    complaint::{ComplaintSnapshot, Person},
    config::NotifyConfig,
    coordinator::BroadcastCoordinator,
    error::{NotifyError, NotifyResult},
    event::BroadcastEvent,
    hooks::{NotificationHooks, StatusUpdate, TransitionNotice},
    store::ComplaintStore,
    transport::RecordingTransport,
    types::{ComplaintId, Role, Status, TemplateKind},
};
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Hands back a fixed snapshot whatever id is asked for.
struct FixedStore {
    snapshot: ComplaintSnapshot,
    admins: Vec<Person>,
}

#[async_trait]
impl ComplaintStore for FixedStore {
    async fn fetch_complaint_with_relations(
        &self,
        _complaint_id: ComplaintId,
    ) -> NotifyResult<Option<ComplaintSnapshot>> {
        Ok(Some(self.snapshot.clone()))
    }

    async fn list_active_administrators(&self) -> NotifyResult<Vec<Person>> {
        Ok(self.admins.clone())
    }
}

fn fixed_coordinator(
    config: Arc<NotifyConfig>,
    snapshot: ComplaintSnapshot,
    transport: Arc<RecordingTransport>,
) -> BroadcastCoordinator {
    let store = Arc::new(FixedStore { snapshot, admins: vec![admin()] });
    BroadcastCoordinator::new(config, store, transport).unwrap()
}

/// Only a citizen is attached and nobody else exists: one message goes out.
#[tokio::test]
async fn citizen_only_complaint_reaches_the_citizen() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-A", None);
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = coordinator(config(), store, transport.clone());

    let event = BroadcastEvent::new(id, Status::Assigned, OFFICER).with_previous(Some(Status::Registered));
    let result = coordinator.broadcast(&event).await.unwrap();

    assert!(result.success);
    assert_eq!(result.emails_sent, 1);
    assert_eq!(result.total_recipients, 1);
    assert_eq!(result.failed_count, 0);
    let sent = transport.sent_to("asha@example.org");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[Civic Desk] Complaint CMP-A has been assigned");
}

#[tokio::test]
async fn assigned_staff_and_admins_are_notified_once_each() {
    let store = seeded_store(true);
    let id = file(&store, "CMP-B", Some(WARD));
    store.add_ward_staff(WARD, OFFICER).unwrap();
    store.add_ward_staff(WARD, CREW).unwrap();
    store.set_assignees(id, Some(OFFICER), Some(CREW)).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = coordinator(config(), store, transport.clone());

    let event = BroadcastEvent::new(id, Status::InProgress, CREW);
    let result = coordinator.broadcast(&event).await.unwrap();

    let roles: Vec<(String, Role)> = result.recipients.iter().map(|r| (r.email.clone(), r.role)).collect();
    assert_eq!(
        roles,
        vec![
            ("alice@example.org".to_string(), Role::WardOfficer),
            ("bob@example.org".to_string(), Role::MaintenanceTeam),
            ("meera@example.org".to_string(), Role::Administrator),
        ]
    );
    assert_eq!(result.emails_sent, 3);
    assert!(transport.sent_to("asha@example.org").is_empty());
}

#[tokio::test]
async fn one_failed_send_does_not_stop_the_others() {
    let store = seeded_store(true);
    let id = file(&store, "CMP-C", None);
    store.set_assignees(id, Some(OFFICER), Some(CREW)).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    transport.fail_for("ALICE@example.org");
    let coordinator = coordinator(config(), store, transport.clone());

    let event = BroadcastEvent::new(id, Status::Resolved, CREW);
    let result = coordinator.broadcast(&event).await.unwrap();

    assert!(result.success);
    assert_eq!(result.total_recipients, 4);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.emails_sent, result.total_recipients - 1);
    let alice = result.recipients.iter().find(|r| r.email == "alice@example.org").unwrap();
    assert!(!alice.delivered);
    assert_eq!(transport.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_send_times_out_as_a_failure() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-T", None);
    let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(300)));
    let coordinator = coordinator(config_with_timeout(20), store, transport.clone());

    let started = Instant::now();
    let event = BroadcastEvent::new(id, Status::Resolved, CREW);
    let result = coordinator.broadcast(&event).await.unwrap();

    // Paused clock: the timeout fires long before the transport would.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(20) && elapsed < Duration::from_millis(300), "{elapsed:?}");
    assert!(result.success);
    assert_eq!(result.total_recipients, 1);
    assert_eq!(result.failed_count, 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sends_run_concurrently() {
    let store = seeded_store(true);
    let id = file(&store, "CMP-P", None);
    store.set_assignees(id, Some(OFFICER), Some(CREW)).unwrap();
    let transport = Arc::new(RecordingTransport::with_delay(Duration::from_millis(200)));
    let coordinator = coordinator(config(), store, transport.clone());

    let started = Instant::now();
    let event = BroadcastEvent::new(id, Status::Reopened, CITIZEN);
    let result = coordinator.broadcast(&event).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.emails_sent, 4);
    // One delay, not four.
    assert!(elapsed < Duration::from_millis(400), "four sends took {elapsed:?}");
}

#[tokio::test]
async fn status_nobody_wants_is_an_empty_success() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-E", None);
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = coordinator(config(), store, transport.clone());

    let result = coordinator
        .broadcast(&BroadcastEvent::new(id, Status::InProgress, CREW))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.total_recipients, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn unknown_complaint_is_an_error_from_the_coordinator() {
    let store = seeded_store(false);
    let coordinator = coordinator(config(), store, Arc::new(RecordingTransport::new()));
    let err = coordinator
        .broadcast(&BroadcastEvent::new(404, Status::Closed, OFFICER))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::ComplaintNotFound { complaint_id: 404 }));
}

#[tokio::test]
async fn hook_turns_unknown_complaint_into_failed_result() {
    let store = seeded_store(true);
    let transport = Arc::new(RecordingTransport::new());
    let hooks = NotificationHooks::new(coordinator(config(), store, transport.clone()));

    let result = hooks
        .on_closed(TransitionNotice {
            complaint_id: 404,
            actor_id: OFFICER,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.total_recipients, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn hooks_set_status_and_extras() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-H", None);
    store.set_assignees(id, Some(OFFICER), None).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let hooks = NotificationHooks::new(coordinator(config(), store, transport.clone()));

    let result = hooks
        .on_status_updated(StatusUpdate {
            complaint_id: id,
            new_status: Status::InProgress,
            previous_status: Some(Status::Assigned),
            comment: Some("Digging started".into()),
            actor_id: OFFICER,
            additional_data: [("crew_size".to_string(), serde_json::json!(4))].into_iter().collect(),
        })
        .await
        .unwrap();
    assert_eq!(result.emails_sent, 1);

    let mail = &transport.sent_to("alice@example.org")[0];
    assert_eq!(mail.subject, "[Civic Desk] Work started on CMP-H");
    assert!(mail.text.contains("- Crew size: 4"));
    assert!(mail.text.contains("Comment: Digging started"));
}

/// A dropped handle does not cancel the broadcast.
#[tokio::test]
async fn dropped_hook_handle_still_delivers() {
    let store = seeded_store(false);
    let id = file(&store, "CMP-F", None);
    let transport = Arc::new(RecordingTransport::new());
    let hooks = NotificationHooks::new(coordinator(config(), store, transport.clone()));

    drop(hooks.on_resolved(TransitionNotice {
        complaint_id: id,
        actor_id: CREW,
        ..Default::default()
    }));

    for _ in 0..50 {
        if !transport.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.sent_to("asha@example.org").len(), 1);
}

/// A snapshot that does not match the event renders for nobody.
#[tokio::test]
async fn mismatched_snapshot_fails_every_recipient() {
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = fixed_coordinator(config(), staffed_snapshot(Status::Resolved), transport.clone());

    let result = coordinator
        .broadcast(&BroadcastEvent::new(99, Status::Resolved, CREW))
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.total_recipients > 0);
    assert_eq!(result.failed_count, result.total_recipients);
    assert_eq!(result.emails_sent, 0);
    assert!(result.recipients.iter().all(|r| !r.delivered));
    assert!(transport.sent().is_empty());
}

/// A message that fails to render for one recipient is counted as a failure
/// and the rest are still sent.
#[tokio::test]
async fn render_failure_is_counted_per_recipient() {
    let base = NotifyConfig::builtin().unwrap();
    let mut tables: Vec<_> = base.messages.tables().cloned().collect();
    let hi = tables.iter_mut().find(|t| t.locale == "hi").unwrap();
    hi.kinds
        .get_mut(&TemplateKind::Citizen)
        .unwrap()
        .subjects
        .insert(Status::Resolved, "{{ticketNumber}}".into());
    let config = NotifyConfig::from_parts(
        base.settings.clone(),
        base.templates.by_precedence().into_iter().cloned().collect(),
        tables,
        base.branding.clone(),
    )
    .unwrap();

    let mut snapshot = staffed_snapshot(Status::Resolved);
    if let Some(citizen) = snapshot.submitted_by.as_mut() {
        citizen.locale = Some("hi".into());
    }
    let complaint_id = snapshot.complaint_id;
    let transport = Arc::new(RecordingTransport::new());
    let coordinator = fixed_coordinator(Arc::new(config), snapshot, transport.clone());

    let result = coordinator
        .broadcast(&BroadcastEvent::new(complaint_id, Status::Resolved, CREW))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.emails_sent, result.total_recipients - 1);
    let asha = result.recipients.iter().find(|r| r.email == "asha@example.org").unwrap();
    assert!(!asha.delivered);
    assert!(transport.sent_to("asha@example.org").is_empty());
    assert_eq!(transport.sent().len(), result.emails_sent);
}
