use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Capability/protocol family a provider implements.
///
/// The family decides the request shape, the auth header convention and which
/// operations are available; a closed set by design so response extraction
/// stays exhaustive (no reflective probing of SDK objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Driver {
    /// Default API root when the provider record carries no `base_url`.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Default chat model when the provider record carries no `model`.
    pub fn default_chat_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Image endpoints are an OpenAI-family capability.
    pub fn supports_images(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

/// Image model families, keyed on the configured model name.
///
/// `Edit` models accept a source image directly; `LegacyEdit` models need the
/// source image plus a separate transparent mask; `GenerationOnly` models
/// reject source images outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModelFamily {
    Edit,
    LegacyEdit,
    GenerationOnly,
}

impl ImageModelFamily {
    /// Classify a configured model name. Unknown names are treated as
    /// edit-capable so that newer models keep working without a code change;
    /// only explicitly known generation-only models are restricted.
    pub fn classify(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("dall-e-3") {
            Self::GenerationOnly
        } else if model.starts_with("dall-e-2") {
            Self::LegacyEdit
        } else {
            Self::Edit
        }
    }

    pub fn accepts_source_image(self) -> bool {
        !matches!(self, Self::GenerationOnly)
    }
}

/// Default model used for image calls when the provider record has none.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

#[cfg(test)]
mod tests {
    use super::{DEFAULT_IMAGE_MODEL, Driver, ImageModelFamily};
    use std::str::FromStr;

    #[test]
    fn driver_round_trips_through_snake_case() {
        assert_eq!(Driver::OpenAi.to_string(), "open_ai");
        assert_eq!(Driver::from_str("anthropic").unwrap(), Driver::Anthropic);
        assert!(Driver::from_str("mystery").is_err());
    }

    #[test]
    fn only_openai_family_supports_images() {
        assert!(Driver::OpenAi.supports_images());
        assert!(!Driver::Anthropic.supports_images());
        assert!(!Driver::Gemini.supports_images());
    }

    #[test]
    fn image_family_classification() {
        assert_eq!(
            ImageModelFamily::classify("gpt-image-1"),
            ImageModelFamily::Edit
        );
        assert_eq!(
            ImageModelFamily::classify("dall-e-2"),
            ImageModelFamily::LegacyEdit
        );
        assert_eq!(
            ImageModelFamily::classify("DALL-E-3"),
            ImageModelFamily::GenerationOnly
        );
        // Unknown models stay permissive.
        assert_eq!(
            ImageModelFamily::classify("future-image-model"),
            ImageModelFamily::Edit
        );
        assert_eq!(
            ImageModelFamily::classify(DEFAULT_IMAGE_MODEL),
            ImageModelFamily::Edit
        );
    }

    #[test]
    fn generation_only_rejects_source_images() {
        assert!(!ImageModelFamily::GenerationOnly.accepts_source_image());
        assert!(ImageModelFamily::Edit.accepts_source_image());
        assert!(ImageModelFamily::LegacyEdit.accepts_source_image());
    }
}
