use serde::Deserialize;
use std::collections::HashMap;

/// Deployment-level generation settings.
///
/// Owned by the embedding application (admin settings, tenant config, …) and
/// passed in at service construction. Everything here is read-only for the
/// lifetime of a request; per-provider runtime configuration is resolved
/// separately for each call (see `providers::registry::RuntimeProvider`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active storefront locale (BCP 47 primary subtag, e.g. "fr").
    pub locale: String,
    /// Editorial tone injected into every prompt.
    pub tone: String,
    /// Short description of the business, injected as prompt context.
    pub business_context: String,
    /// Full request timeout applied to each provider call.
    pub request_timeout_secs: u64,
    /// TCP connect timeout applied to each provider call.
    pub connect_timeout_secs: u64,
    /// Side of the square canvas produced by the image preparer.
    pub image_target_px: u32,
    /// Hard ceiling on every encoded image artifact (canvas, mask, payload).
    pub image_max_bytes: usize,
    /// Per-field character-limit overrides (field name → max chars).
    pub length_limits: HashMap<String, usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "fr".into(),
            tone: "professionnel et chaleureux".into(),
            business_context: String::new(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            image_target_px: 1024,
            image_max_bytes: 4 * 1024 * 1024,
            length_limits: HashMap::new(),
        }
    }
}

impl Settings {
    /// Character ceiling for a target field, with settings overrides taking
    /// precedence over the built-in defaults.
    pub fn max_len(&self, field: &str) -> usize {
        if let Some(limit) = self.length_limits.get(field) {
            return *limit;
        }
        match field {
            "meta_title" => 70,
            "meta_description" => 160,
            "name" | "title" => 120,
            "description" | "content" => 5000,
            _ => 1000,
        }
    }
}
