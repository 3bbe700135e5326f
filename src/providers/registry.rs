use super::driver::Driver;
use crate::config::Settings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured external AI backend, as persisted by the embedding
/// application. Read-only for this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Unique code identifying the provider row (e.g. "openai-main").
    pub code: String,
    pub driver: Driver,
    /// Free-form configuration map: api_key, model, base_url, organization,
    /// api_version. Unknown keys are ignored.
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl ProviderRecord {
    fn config_value(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A provider is usable only when enabled with a non-empty credential.
    pub fn is_usable(&self) -> bool {
        self.is_enabled && self.config_value("api_key").is_some()
    }

    /// Explicitly configured model, if any.
    pub fn configured_model(&self) -> Option<&str> {
        self.config_value("model")
    }
}

/// Read access to the provider configuration store (owned by the caller).
pub trait ProviderStore: Send + Sync {
    fn providers(&self) -> anyhow::Result<Vec<ProviderRecord>>;
}

/// Filter to the usable subset and order it: the default provider first when
/// usable, the rest in their stored order. `is_default` is a priority hint
/// only — a disabled or uncredentialed default is simply skipped.
pub fn usable_providers(records: &[ProviderRecord]) -> Vec<&ProviderRecord> {
    let mut ordered: Vec<&ProviderRecord> = Vec::with_capacity(records.len());
    ordered.extend(records.iter().filter(|r| r.is_usable() && r.is_default));
    ordered.extend(records.iter().filter(|r| r.is_usable() && !r.is_default));
    ordered
}

/// Request-scoped resolved provider configuration.
///
/// Built once per call from the record plus the deployment settings and
/// threaded explicitly through the call chain. Never written to any shared
/// state: concurrent requests for different providers must not observe each
/// other's overrides.
#[derive(Debug, Clone)]
pub struct RuntimeProvider {
    pub code: String,
    pub driver: Driver,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: String,
    pub organization: Option<String>,
    pub api_version: Option<String>,
}

impl RuntimeProvider {
    pub fn resolve(record: &ProviderRecord, _settings: &Settings) -> Self {
        Self {
            code: record.code.clone(),
            driver: record.driver,
            api_key: record
                .config_value("api_key")
                .unwrap_or_default()
                .to_string(),
            model: record.config_value("model").map(str::to_string),
            base_url: record
                .config_value("base_url")
                .unwrap_or(record.driver.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            organization: record.config_value("organization").map(str::to_string),
            api_version: record.config_value("api_version").map(str::to_string),
        }
    }

    /// Chat model for this call: record override or the driver default.
    pub fn chat_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(self.driver.default_chat_model())
    }
}
