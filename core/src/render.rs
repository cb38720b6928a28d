//! Template rendering — subject, plain text and HTML for one recipient.
//!
//! RULE: Rendering is a pure function of (recipient, complaint, event,
//! config, branding). No clock reads, no I/O. Rendering the same input twice
//! yields byte-identical output.
//!
//! Every message template and the HTML layout are compiled into handlebars
//! registries once, when the renderer is built. Message templates render
//! as plain text in strict mode: a placeholder with no value is a render
//! error for that recipient. The HTML layout escapes every value.
//!
//! Visibility is decided by the recipient's template:
//!   show_internal_comments   → transition comment and recent history
//!   show_assignment_details  → officer/team names, acting user, event extras
//!   show_citizen_info        → citizen name and contact details

use crate::{
    branding::{Branding, BrandingCache, BrandingSource},
    complaint::{ComplaintSnapshot, Person},
    config::{FieldLabels, LocaleTable, NotifyConfig},
    error::{NotifyError, NotifyResult},
    event::BroadcastEvent,
    resolver::Recipient,
    types::{Priority, Status, TemplateKind},
};
use chrono::{DateTime, Utc};
use handlebars::{no_escape, Handlebars};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Used when neither the recipient's locale nor the default locale has a
/// subject for the status.
pub const GENERIC_SUBJECT: &str =
    "[{{appName}}] Complaint {{complaintId}} status changed to {{status}}";
pub const GENERIC_INTRO: &str = "Complaint {{complaintId}} status changed to {{status}}.";

const HTML_LAYOUT: &str = include_str!("../templates/message.html.hbs");
const HTML_LAYOUT_NAME: &str = "layout/html";

const HISTORY_LIMIT: usize = 3;
const DATE_FORMAT: &str = "%d %b %Y, %H:%M UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, Copy)]
enum Part {
    Subject,
    Intro,
}

impl Part {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Intro   => "intro",
        }
    }
}

pub struct TemplateRenderer {
    config: Arc<NotifyConfig>,
    branding: BrandingCache,
    messages: Handlebars<'static>,
    layout: Handlebars<'static>,
}

#[derive(Debug, Clone, Serialize)]
struct Row {
    label: String,
    value: String,
}

impl Row {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// Rendered pieces shared by the text body and the HTML layout.
#[derive(Debug, Serialize)]
struct Body {
    greeting: String,
    intro: String,
    overdue: Option<String>,
    details_title: String,
    details: Vec<Row>,
    comment: Option<Row>,
    history_title: String,
    history: Vec<String>,
    footer: String,
}

#[derive(Serialize)]
struct HtmlContext<'a> {
    subject: &'a str,
    app_name: &'a str,
    org_name: &'a str,
    logo_url: Option<&'a str>,
    body: &'a Body,
}

impl TemplateRenderer {
    /// Compile every message table and the HTML layout.
    /// A template that does not parse is a configuration error.
    pub fn new(config: Arc<NotifyConfig>, branding: Arc<dyn BrandingSource>) -> NotifyResult<Self> {
        let mut messages = Handlebars::new();
        messages.set_strict_mode(true);
        messages.register_escape_fn(no_escape);

        register(&mut messages, &generic_key(Part::Subject), GENERIC_SUBJECT)?;
        register(&mut messages, &generic_key(Part::Intro), GENERIC_INTRO)?;
        for table in config.messages.tables() {
            register(&mut messages, &label_key("greeting", &table.locale), &table.labels.greeting)?;
            register(&mut messages, &label_key("footer", &table.locale), &table.labels.footer)?;
            for (kind, set) in &table.kinds {
                for (status, source) in &set.subjects {
                    let name = message_key(Part::Subject, &table.locale, *kind, *status);
                    register(&mut messages, &name, source)?;
                }
                for (status, source) in &set.intros {
                    let name = message_key(Part::Intro, &table.locale, *kind, *status);
                    register(&mut messages, &name, source)?;
                }
            }
        }

        let mut layout = Handlebars::new();
        register(&mut layout, HTML_LAYOUT_NAME, HTML_LAYOUT)?;

        log::debug!(
            "renderer ready: {} message templates across {} locale(s)",
            messages.get_templates().len(),
            config.messages.locales().len()
        );
        Ok(Self {
            config,
            branding: BrandingCache::new(branding),
            messages,
            layout,
        })
    }

    pub fn branding(&self) -> &Branding {
        self.branding.get()
    }

    pub fn render(
        &self,
        recipient: &Recipient,
        complaint: &ComplaintSnapshot,
        event: &BroadcastEvent,
    ) -> NotifyResult<RenderedMessage> {
        if event.complaint_id != complaint.complaint_id {
            return Err(render_error(
                recipient,
                format!(
                    "event is for complaint {} but snapshot is {}",
                    event.complaint_id, complaint.complaint_id
                ),
            ));
        }

        let branding = self.branding.get();
        let locale = recipient.locale.as_deref();
        let kind = recipient.template.template_kind;
        let table = self.config.messages.table(locale);

        let vars = json!({
            "complaintId": complaint.code,
            "status": self.status_label(table, event.new_status),
            "appName": branding.app_name,
            "orgName": branding.org_name,
            "name": recipient.person.name,
        });
        let fill = |name: String| {
            self.messages
                .render(&name, &vars)
                .map_err(|e| render_error(recipient, format!("{name}: {e}")))
        };

        let subject = fill(self.message_name(Part::Subject, kind, locale, event.new_status))?
            .trim()
            .to_string();
        if subject.is_empty() {
            return Err(render_error(recipient, "subject rendered empty".into()));
        }

        let body = Body {
            greeting: fill(label_key("greeting", &table.locale))?,
            intro: fill(self.message_name(Part::Intro, kind, locale, event.new_status))?,
            overdue: complaint.is_overdue().then(|| table.labels.overdue.clone()),
            details_title: table.labels.details.clone(),
            details: self.details(table, recipient, complaint, event),
            comment: self.comment(&table.labels, recipient, event),
            history_title: table.labels.history.clone(),
            history: self.history(table, recipient, complaint),
            footer: fill(label_key("footer", &table.locale))?,
        };

        let html = self
            .layout
            .render(
                HTML_LAYOUT_NAME,
                &HtmlContext {
                    subject: &subject,
                    app_name: &branding.app_name,
                    org_name: &branding.org_name,
                    logo_url: branding.logo_url.as_deref(),
                    body: &body,
                },
            )
            .map_err(|e| render_error(recipient, format!("html layout: {e}")))?;

        Ok(RenderedMessage {
            text: body.to_text(),
            subject,
            html,
        })
    }

    /// Registered template for (part, kind, status): the recipient's locale
    /// first, then the default locale, then the generic text.
    fn message_name(
        &self,
        part: Part,
        kind: TemplateKind,
        locale: Option<&str>,
        status: Status,
    ) -> String {
        let catalog = &self.config.messages;
        locale
            .and_then(|l| catalog.exact(l))
            .into_iter()
            .chain(std::iter::once(catalog.default_table()))
            .map(|table| message_key(part, &table.locale, kind, status))
            .find(|name| self.messages.has_template(name))
            .unwrap_or_else(|| generic_key(part))
    }

    fn status_label(&self, table: &LocaleTable, status: Status) -> String {
        table
            .status_label(status)
            .or_else(|| self.config.messages.default_table().status_label(status))
            .unwrap_or(status.as_str())
            .to_string()
    }

    fn priority_label(&self, table: &LocaleTable, priority: Priority) -> String {
        table
            .priority_labels
            .get(&priority)
            .or_else(|| self.config.messages.default_table().priority_labels.get(&priority))
            .map(String::as_str)
            .unwrap_or(priority.as_str())
            .to_string()
    }

    fn details(
        &self,
        table: &LocaleTable,
        recipient: &Recipient,
        complaint: &ComplaintSnapshot,
        event: &BroadcastEvent,
    ) -> Vec<Row> {
        let labels = &table.labels;
        let template = &recipient.template;
        let mut rows = vec![
            Row::new(&labels.complaint_id, complaint.code.as_str()),
            Row::new(&labels.complaint_type, complaint.complaint_type.as_str()),
            Row::new(&labels.status, self.status_label(table, event.new_status)),
        ];
        if let Some(previous) = event.previous_status {
            rows.push(Row::new(&labels.previous_status, self.status_label(table, previous)));
        }
        rows.push(Row::new(&labels.priority, self.priority_label(table, complaint.priority)));
        rows.push(Row::new(&labels.location, complaint.area.as_str()));

        let optional = [
            (&labels.landmark, complaint.landmark.as_ref()),
            (&labels.address, complaint.address.as_ref()),
            (&labels.sub_zone, complaint.sub_zone.as_ref()),
            (&labels.ward, complaint.ward.as_ref().map(|w| &w.name)),
        ];
        for (label, value) in optional {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                rows.push(Row::new(label, value.as_str()));
            }
        }

        rows.push(Row::new(&labels.submitted_on, format_date(complaint.submitted_on)));
        if let Some(deadline) = complaint.deadline {
            let mut value = format_date(deadline);
            if complaint.is_overdue() {
                value = format!("{value} ({})", labels.overdue);
            }
            rows.push(Row::new(&labels.deadline, value));
        }
        if let Some(resolved) = complaint.resolved_on {
            rows.push(Row::new(&labels.resolved_on, format_date(resolved)));
        }

        if template.show_assignment_details {
            let name_or_unassigned = |p: Option<&Person>| {
                p.map(|p| p.name.clone())
                    .unwrap_or_else(|| labels.unassigned.clone())
            };
            rows.push(Row::new(
                &labels.ward_officer,
                name_or_unassigned(complaint.ward_officer.as_ref()),
            ));
            rows.push(Row::new(
                &labels.maintenance_team,
                name_or_unassigned(complaint.maintenance_team.as_ref()),
            ));
            if let Some(actor) = complaint.find_person(event.acting_user_id) {
                rows.push(Row::new(&labels.updated_by, actor.name.as_str()));
            }
            // Internal ids mean nothing to the reader.
            for (key, value) in event.additional_data.iter().filter(|(k, _)| !k.ends_with("_id")) {
                rows.push(Row::new(&humanize_key(key), display_value(value)));
            }
        }

        if template.show_citizen_info {
            if let Some(citizen) = &complaint.submitted_by {
                rows.push(Row::new(&labels.citizen, citizen.name.as_str()));
                let contact: Vec<&str> = [citizen.contact_email(), citizen.phone.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter(|c| !c.trim().is_empty())
                    .collect();
                if !contact.is_empty() {
                    rows.push(Row::new(&labels.contact, contact.join(" / ")));
                }
            }
        }

        rows
    }

    fn comment(
        &self,
        labels: &FieldLabels,
        recipient: &Recipient,
        event: &BroadcastEvent,
    ) -> Option<Row> {
        if !recipient.template.show_internal_comments {
            return None;
        }
        event
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| Row::new(&labels.comment, c))
    }

    fn history(
        &self,
        table: &LocaleTable,
        recipient: &Recipient,
        complaint: &ComplaintSnapshot,
    ) -> Vec<String> {
        if !recipient.template.show_internal_comments {
            return Vec::new();
        }
        complaint
            .recent_history(HISTORY_LIMIT)
            .map(|entry| {
                let mut line = format!("{}: ", format_date(entry.changed_on));
                if let Some(from) = entry.from_status {
                    line.push_str(&self.status_label(table, from));
                    line.push_str(" -> ");
                }
                line.push_str(&self.status_label(table, entry.to_status));
                if let Some(by) = &entry.changed_by {
                    line.push_str(&format!(" ({})", by.name));
                }
                if let Some(comment) = entry.comment.as_deref().filter(|c| !c.trim().is_empty()) {
                    line.push_str(&format!(": {}", comment.trim()));
                }
                line
            })
            .collect()
    }
}

impl Body {
    fn to_text(&self) -> String {
        let mut lines = vec![self.greeting.clone(), String::new(), self.intro.clone()];
        if let Some(overdue) = &self.overdue {
            lines.push(format!("[{overdue}]"));
        }
        lines.push(String::new());
        lines.push(format!("{}:", self.details_title));
        for row in &self.details {
            lines.push(format!("- {}: {}", row.label, row.value));
        }
        if let Some(row) = &self.comment {
            lines.push(String::new());
            lines.push(format!("{}: {}", row.label, row.value));
        }
        if !self.history.is_empty() {
            lines.push(String::new());
            lines.push(format!("{}:", self.history_title));
            for entry in &self.history {
                lines.push(format!("- {entry}"));
            }
        }
        lines.push(String::new());
        lines.push("--".into());
        lines.push(self.footer.clone());
        lines.join("\n")
    }
}

fn register(registry: &mut Handlebars<'static>, name: &str, source: &str) -> NotifyResult<()> {
    registry
        .register_template_string(name, source)
        .map_err(|e| NotifyError::Config(format!("template {name}: {e}")))
}

fn message_key(part: Part, locale: &str, kind: TemplateKind, status: Status) -> String {
    format!("{}/{locale}/{}/{}", part.as_str(), kind.as_str(), status.as_str())
}

fn label_key(label: &str, locale: &str) -> String {
    format!("{label}/{locale}")
}

fn generic_key(part: Part) -> String {
    format!("{}/generic", part.as_str())
}

fn render_error(recipient: &Recipient, reason: String) -> NotifyError {
    NotifyError::RecipientRender {
        email: recipient.email.clone(),
        role: recipient.role,
        reason,
    }
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// "assignment_type" → "Assignment type".
fn humanize_key(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}
