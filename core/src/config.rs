//! Notification configuration: per-role templates, per-locale message
//! tables, branding and engine settings.
//!
//! RULE: Configuration is loaded once at startup and never mutated.
//! Share it behind an Arc; nothing in the engine keeps a global copy.

use crate::{
    error::{NotifyError, NotifyResult},
    types::{Priority, Role, Status, TemplateKind},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

// ── Templates ──────────────────────────────────────────────────────

/// What a role is notified about and how much it gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub role: Role,
    pub allowed_statuses: BTreeSet<Status>,
    pub show_internal_comments: bool,
    pub show_assignment_details: bool,
    pub show_citizen_info: bool,
    pub template_kind: TemplateKind,
    /// Lower value = higher precedence.
    pub priority: u32,
}

impl NotificationTemplate {
    pub fn allows(&self, status: Status) -> bool {
        self.allowed_statuses.contains(&status)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TemplatesFile {
    templates: Vec<NotificationTemplate>,
}

/// Exactly one template per role, keyed by role.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<Role, NotificationTemplate>,
}

impl TemplateRegistry {
    pub fn new(templates: Vec<NotificationTemplate>) -> NotifyResult<Self> {
        let mut by_role: HashMap<Role, NotificationTemplate> = HashMap::new();
        let mut priorities = BTreeSet::new();
        for template in templates {
            if !priorities.insert(template.priority) {
                return Err(NotifyError::Config(format!(
                    "template priority {} used more than once",
                    template.priority
                )));
            }
            let role = template.role;
            if by_role.insert(role, template).is_some() {
                return Err(NotifyError::Config(format!(
                    "role {role} has more than one template"
                )));
            }
        }
        if let Some(missing) = Role::ALL.iter().find(|r| !by_role.contains_key(r)) {
            return Err(NotifyError::Config(format!("role {missing} has no template")));
        }
        Ok(Self { templates: by_role })
    }

    pub fn get(&self, role: Role) -> Option<&NotificationTemplate> {
        self.templates.get(&role)
    }

    /// Templates ordered from highest to lowest precedence.
    pub fn by_precedence(&self) -> Vec<&NotificationTemplate> {
        let mut all: Vec<_> = self.templates.values().collect();
        all.sort_by_key(|t| t.priority);
        all
    }
}

// ── Message tables ─────────────────────────────────────────────────

/// Fixed labels used in message bodies. `greeting` may use `{{name}}`,
/// `footer` may use `{{orgName}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLabels {
    pub greeting: String,
    pub complaint_id: String,
    pub complaint_type: String,
    pub status: String,
    pub previous_status: String,
    pub priority: String,
    pub location: String,
    pub landmark: String,
    pub address: String,
    pub sub_zone: String,
    pub ward: String,
    pub submitted_on: String,
    pub deadline: String,
    pub resolved_on: String,
    pub comment: String,
    pub ward_officer: String,
    pub maintenance_team: String,
    pub citizen: String,
    pub contact: String,
    pub updated_by: String,
    pub details: String,
    pub history: String,
    pub overdue: String,
    pub unassigned: String,
    pub footer: String,
}

/// Subject and opening line per status for one template kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSet {
    #[serde(default)]
    pub subjects: HashMap<Status, String>,
    #[serde(default)]
    pub intros: HashMap<Status, String>,
}

/// Everything needed to render in one locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleTable {
    pub locale: String,
    pub status_labels: HashMap<Status, String>,
    pub priority_labels: HashMap<Priority, String>,
    pub labels: FieldLabels,
    #[serde(default)]
    pub kinds: HashMap<TemplateKind, MessageSet>,
}

impl LocaleTable {
    pub fn status_label(&self, status: Status) -> Option<&str> {
        self.status_labels.get(&status).map(String::as_str)
    }
}

/// Locale tables with the organization's default locale always present.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default: LocaleTable,
    others: HashMap<String, LocaleTable>,
}

impl MessageCatalog {
    pub fn new(default_locale: &str, tables: Vec<LocaleTable>) -> NotifyResult<Self> {
        let mut default = None;
        let mut others = HashMap::new();
        for table in tables {
            let key = normalize_locale(&table.locale);
            if key == normalize_locale(default_locale) {
                default = Some(table);
            } else if others.insert(key, table).is_some() {
                return Err(NotifyError::Config("duplicate locale table".into()));
            }
        }
        let default = default.ok_or_else(|| {
            NotifyError::Config(format!("default locale '{default_locale}' has no message table"))
        })?;
        Ok(Self { default, others })
    }

    pub fn default_table(&self) -> &LocaleTable {
        &self.default
    }

    /// The table for a locale, if one exists. "en-IN" falls back to "en".
    pub fn exact(&self, locale: &str) -> Option<&LocaleTable> {
        let key = normalize_locale(locale);
        if key == normalize_locale(&self.default.locale) {
            return Some(&self.default);
        }
        self.others.get(&key).or_else(|| {
            let primary = key.split('-').next().unwrap_or(key.as_str());
            if primary == normalize_locale(&self.default.locale) {
                Some(&self.default)
            } else {
                self.others.get(primary)
            }
        })
    }

    /// The recipient's table, or the default table.
    pub fn table(&self, locale: Option<&str>) -> &LocaleTable {
        locale.and_then(|l| self.exact(l)).unwrap_or(&self.default)
    }

    /// Every table, default first.
    pub fn tables(&self) -> impl Iterator<Item = &LocaleTable> {
        std::iter::once(&self.default).chain(self.others.values())
    }

    pub fn locales(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self.others.values().map(|t| t.locale.as_str()).collect();
        all.sort_unstable();
        all.insert(0, self.default.locale.as_str());
        all
    }
}

fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_ascii_lowercase()
}

// ── Branding & settings ────────────────────────────────────────────

/// Organization branding as configured. Any field may be missing;
/// see branding.rs for the fallback defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandingConfig {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub default_locale: String,
    /// Upper bound for a single transport call.
    pub send_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_locale: "en".into(),
            send_timeout_ms: 10_000,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub settings: Settings,
    pub templates: TemplateRegistry,
    pub messages: MessageCatalog,
    pub branding: BrandingConfig,
}

impl NotifyConfig {
    /// Load from a data directory laid out like data/ in this repository:
    /// templates.json, branding.json, settings.json, messages/*.json.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let templates_file: TemplatesFile = read_json(&format!("{data_dir}/templates.json"))?;
        let branding: BrandingConfig = read_json(&format!("{data_dir}/branding.json"))?;
        let settings: Settings = read_json(&format!("{data_dir}/settings.json"))?;

        let messages_dir = format!("{data_dir}/messages");
        let mut paths: Vec<_> = std::fs::read_dir(&messages_dir)
            .map_err(|e| anyhow::anyhow!("Cannot read {messages_dir}: {e}"))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        let tables = paths
            .iter()
            .map(|p| read_json::<LocaleTable>(&p.to_string_lossy()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self::from_parts(settings, templates_file.templates, tables, branding)?)
    }

    /// The configuration shipped in data/, embedded at compile time.
    pub fn builtin() -> anyhow::Result<Self> {
        let templates_file: TemplatesFile =
            serde_json::from_str(include_str!("../../data/templates.json"))?;
        let branding: BrandingConfig =
            serde_json::from_str(include_str!("../../data/branding.json"))?;
        let settings: Settings = serde_json::from_str(include_str!("../../data/settings.json"))?;
        let tables = vec![
            serde_json::from_str::<LocaleTable>(include_str!("../../data/messages/en.json"))?,
            serde_json::from_str::<LocaleTable>(include_str!("../../data/messages/hi.json"))?,
        ];
        Ok(Self::from_parts(settings, templates_file.templates, tables, branding)?)
    }

    pub fn from_parts(
        settings: Settings,
        templates: Vec<NotificationTemplate>,
        tables: Vec<LocaleTable>,
        branding: BrandingConfig,
    ) -> NotifyResult<Self> {
        if settings.send_timeout_ms == 0 {
            return Err(NotifyError::Config("send_timeout_ms must be positive".into()));
        }
        let templates = TemplateRegistry::new(templates)?;
        let messages = MessageCatalog::new(&settings.default_locale, tables)?;
        Ok(Self {
            settings,
            templates,
            messages,
            branding,
        })
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.send_timeout_ms)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}
