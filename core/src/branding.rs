//! Organization branding used in message subjects and layouts.

use crate::config::BrandingConfig;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

pub const DEFAULT_APP_NAME: &str = "Civic Desk";
pub const DEFAULT_ORG_NAME: &str = "Municipal Corporation";

/// Where branding comes from (settings table, config file, ...).
/// Every getter may come back empty; callers fall back to defaults.
pub trait BrandingSource: Send + Sync {
    fn app_name(&self) -> Option<String>;
    fn org_name(&self) -> Option<String>;
    fn logo_url(&self) -> Option<String>;
}

impl BrandingSource for BrandingConfig {
    fn app_name(&self) -> Option<String> {
        self.app_name.clone()
    }

    fn org_name(&self) -> Option<String> {
        self.org_name.clone()
    }

    fn logo_url(&self) -> Option<String> {
        self.logo_url.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub app_name: String,
    pub org_name: String,
    pub logo_url: Option<String>,
}

impl Branding {
    pub fn resolve(source: &dyn BrandingSource) -> Self {
        Self {
            app_name: non_blank(source.app_name()).unwrap_or_else(|| DEFAULT_APP_NAME.into()),
            org_name: non_blank(source.org_name()).unwrap_or_else(|| DEFAULT_ORG_NAME.into()),
            logo_url: non_blank(source.logo_url()),
        }
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.into(),
            org_name: DEFAULT_ORG_NAME.into(),
            logo_url: None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads the source once, on first use, and keeps the answer.
pub struct BrandingCache {
    source: Arc<dyn BrandingSource>,
    resolved: OnceLock<Branding>,
}

impl BrandingCache {
    pub fn new(source: Arc<dyn BrandingSource>) -> Self {
        Self {
            source,
            resolved: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &Branding {
        self.resolved.get_or_init(|| {
            let branding = Branding::resolve(self.source.as_ref());
            log::debug!("branding resolved: app={} org={}", branding.app_name, branding.org_name);
            branding
        })
    }
}
