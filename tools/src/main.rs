//! notify-runner: headless driver for the complaint notification engine.
//!
//! Usage:
//!   notify-runner --db demo.db --data-dir ./data
//!   notify-runner --fail-for ravi.kumar@example.org
//!   notify-runner --ipc-mode < commands.jsonl

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use civicdesk_core::{
    complaint::Person,
    config::NotifyConfig,
    coordinator::BroadcastCoordinator,
    desk::ComplaintDesk,
    event::BroadcastResult,
    hooks::NotificationHooks,
    lifecycle,
    store::{ComplaintStore, NewComplaint, SqliteComplaintStore},
    transport::{LogTransport, MailTransport, RecordingTransport},
    types::{ComplaintId, PersonId, Priority, Role, Status},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Get {
        complaint_id: ComplaintId,
    },
    Next {
        complaint_id: ComplaintId,
        actor_id: PersonId,
    },
    Assign {
        complaint_id: ComplaintId,
        actor_id: PersonId,
        assignee_id: PersonId,
        #[serde(default)]
        comment: Option<String>,
    },
    Status {
        complaint_id: ComplaintId,
        status: Status,
        actor_id: PersonId,
        #[serde(default)]
        comment: Option<String>,
    },
    Quit,
}

const DEMO_WARD: i64 = 7;
const CITIZEN: PersonId = 1;
const OFFICER: PersonId = 2;
const MAINTENANCE: PersonId = 3;
const ADMIN: PersonId = 4;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir");
    let fail_for = flag_value(&args, "--fail-for");

    let config = Arc::new(match data_dir {
        Some(dir) => NotifyConfig::load(dir)?,
        None => NotifyConfig::builtin()?,
    });

    if !ipc_mode {
        println!("Civic Desk notify-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {}", data_dir.unwrap_or("(builtin)"));
        println!("  locales:   {}", config.messages.locales().join(", "));
        println!("  templates:");
        for t in config.templates.by_precedence() {
            let statuses: Vec<&str> = t.allowed_statuses.iter().map(|s| s.as_str()).collect();
            println!(
                "    {:<17} kind={:<8} statuses={}",
                t.role.as_str(),
                t.template_kind.as_str(),
                statuses.join(",")
            );
        }
        println!();
    }

    let store = Arc::new(if db == ":memory:" {
        SqliteComplaintStore::in_memory()?
    } else {
        SqliteComplaintStore::open(db)?
    });
    store.migrate()?;
    seed_demo(&store)?;

    let transport: Arc<dyn MailTransport> = match fail_for {
        Some(email) => {
            let recording = RecordingTransport::new();
            recording.fail_for(email);
            Arc::new(recording)
        }
        None => Arc::new(LogTransport),
    };
    let read_side: Arc<dyn ComplaintStore> = store.clone();
    let coordinator = Arc::new(BroadcastCoordinator::new(config, read_side, transport)?);
    let desk = ComplaintDesk::new(store.clone(), NotificationHooks::new(coordinator));

    if ipc_mode {
        store.insert_complaint(&demo_complaint(&store)?)?;
        run_ipc_loop(&desk, &store).await?;
    } else {
        run_demo(&desk, &store).await?;
    }
    Ok(())
}

/// A ward with one person of each role. A database that already holds the
/// demo people is left as it is.
fn seed_demo(store: &SqliteComplaintStore) -> Result<()> {
    if store.get_person(CITIZEN)?.is_some() {
        log::info!("demo people already present, skipping seed");
        return Ok(());
    }
    let people = [
        (CITIZEN, "Asha Patil", "asha.patil@example.org", Role::Citizen, Some("hi")),
        (OFFICER, "Ravi Kumar", "ravi.kumar@example.org", Role::WardOfficer, None),
        (MAINTENANCE, "Road Crew 3", "crew3@example.org", Role::MaintenanceTeam, None),
        (ADMIN, "Meera Joshi", "meera.joshi@example.org", Role::Administrator, Some("en-IN")),
    ];
    for (person_id, name, email, role, locale) in people {
        store.insert_person(&Person {
            person_id,
            name: name.into(),
            email: Some(email.into()),
            phone: None,
            role,
            locale: locale.map(String::from),
            active: true,
        })?;
    }
    store.insert_ward(DEMO_WARD, "Ward 7, Shivaji Nagar")?;
    store.add_ward_staff(DEMO_WARD, OFFICER)?;
    store.add_ward_staff(DEMO_WARD, MAINTENANCE)?;
    Ok(())
}

/// The next demo complaint; codes continue from whatever the database holds.
fn demo_complaint(store: &SqliteComplaintStore) -> Result<NewComplaint> {
    let submitted_on = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).single().unwrap_or_else(Utc::now);
    Ok(NewComplaint {
        code: format!("CMP-2026-{:06}", 101 + store.complaint_count()?),
        complaint_type: "Pothole".into(),
        description: "Deep pothole near the bus stop".into(),
        priority: Priority::High,
        area: "Shivaji Nagar".into(),
        landmark: Some("Opposite bus depot".into()),
        address: None,
        sub_zone: Some("SZ-2".into()),
        submitted_by: CITIZEN,
        ward_id: Some(DEMO_WARD),
        submitted_on,
        deadline: Some(submitted_on + Duration::days(7)),
    })
}

async fn run_demo(desk: &ComplaintDesk, store: &SqliteComplaintStore) -> Result<()> {
    let person = |id: PersonId| -> Result<Person> {
        store
            .get_person(id)?
            .ok_or_else(|| anyhow::anyhow!("demo person {id} missing"))
    };
    let citizen = person(CITIZEN)?;
    let officer = person(OFFICER)?;
    let crew = person(MAINTENANCE)?;

    let (snapshot, filed) = desk.file_complaint(&demo_complaint(store)?)?;
    let complaint_id = snapshot.complaint_id;
    report("filed", filed).await?;

    report(
        "assign officer",
        desk.assign(complaint_id, &officer, &officer, Some("Taking this one".into()))?,
    )
    .await?;
    report(
        "assign crew",
        desk.assign(complaint_id, &officer, &crew, Some("Crew 3 on site tomorrow".into()))?,
    )
    .await?;
    report(
        "start work",
        desk.change_status(complaint_id, Status::InProgress, &crew, None)?,
    )
    .await?;
    report(
        "resolve",
        desk.change_status(complaint_id, Status::Resolved, &crew, Some("Patched and rolled".into()))?,
    )
    .await?;
    report(
        "close",
        desk.change_status(complaint_id, Status::Closed, &officer, None)?,
    )
    .await?;
    report(
        "reopen",
        desk.change_status(complaint_id, Status::Reopened, &citizen, Some("Surface already cracking".into()))?,
    )
    .await?;

    // A rejected request changes nothing and notifies nobody.
    match desk.change_status(complaint_id, Status::Closed, &citizen, None) {
        Ok(_) => println!("unexpected: citizen closed a reopened complaint"),
        Err(e) => println!("{:<15} rejected: {e}", "citizen close"),
    }
    Ok(())
}

async fn report(step: &str, handle: JoinHandle<BroadcastResult>) -> Result<()> {
    let result = handle.await?;
    println!(
        "{step:<15} success={} sent={} failed={} total={}",
        result.success, result.emails_sent, result.failed_count, result.total_recipients
    );
    for r in &result.recipients {
        println!("    {:<28} {:<17} delivered={}", r.email, r.role.as_str(), r.delivered);
    }
    Ok(())
}

async fn run_ipc_loop(desk: &ComplaintDesk, store: &SqliteComplaintStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = stdin.lock().read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Get { complaint_id } => match store.load_complaint(complaint_id)? {
                Some(snapshot) => serde_json::to_value(&snapshot)?,
                None => serde_json::json!({ "error": format!("complaint {complaint_id} not found") }),
            },
            IpcCommand::Next { complaint_id, actor_id } => {
                let (status, actor) = (store.current_status(complaint_id)?, store.get_person(actor_id)?);
                match (status, actor) {
                    (Some(status), Some(actor)) => serde_json::json!({
                        "status": status,
                        "next": lifecycle::next_statuses(status, actor.role),
                    }),
                    _ => serde_json::json!({ "error": "unknown complaint or actor" }),
                }
            }
            IpcCommand::Assign { complaint_id, actor_id, assignee_id, comment } => {
                match (store.get_person(actor_id)?, store.get_person(assignee_id)?) {
                    (Some(actor), Some(assignee)) => {
                        outcome(desk.assign(complaint_id, &actor, &assignee, comment)).await?
                    }
                    _ => serde_json::json!({ "error": "unknown actor or assignee" }),
                }
            }
            IpcCommand::Status { complaint_id, status, actor_id, comment } => match store.get_person(actor_id)? {
                Some(actor) => outcome(desk.change_status(complaint_id, status, &actor, comment)).await?,
                None => serde_json::json!({ "error": format!("unknown actor {actor_id}") }),
            },
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Rejections are reported to the caller; broadcast results are awaited so
/// the reply carries the delivery summary.
async fn outcome(
    request: civicdesk_core::error::NotifyResult<JoinHandle<BroadcastResult>>,
) -> Result<serde_json::Value> {
    Ok(match request {
        Ok(handle) => serde_json::json!({ "ok": true, "broadcast": handle.await? }),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Running the demo twice against the same database must not collide on
    /// people, ward staff or complaint codes.
    #[test]
    fn seeding_and_filing_can_repeat() {
        let store = SqliteComplaintStore::in_memory().unwrap();
        store.migrate().unwrap();

        seed_demo(&store).unwrap();
        let first = store.insert_complaint(&demo_complaint(&store).unwrap()).unwrap();
        seed_demo(&store).unwrap();
        let second = store.insert_complaint(&demo_complaint(&store).unwrap()).unwrap();

        let codes: Vec<String> = [first, second]
            .into_iter()
            .map(|id| store.load_complaint(id).unwrap().unwrap().code)
            .collect();
        assert_eq!(codes, vec!["CMP-2026-000101", "CMP-2026-000102"]);
        let ward = store.get_ward(DEMO_WARD).unwrap().unwrap();
        assert_eq!(ward.staff.len(), 2);
    }
}
