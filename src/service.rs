use crate::assistant::{
    AnalyticsAssembler, AssistantTurn, Intent, OrderStore, ProductNameStore, clamp_history,
    resolve_product_name, temporal,
};
use crate::config::Settings;
use crate::error::{AttemptError, Result};
use crate::image::{prepare_source_image, run_image_call};
use crate::orchestrator::run_with_fallback;
use crate::prompt::{self, GenerationRequest};
use crate::providers::{ChatCall, ProviderStore, build_provider_client, chat, usable_providers};
use crate::response;
use anyhow::Context as _;
use std::sync::Arc;
use tera::Tera;

const GENERATION_TEMPERATURE: f64 = 0.7;
const ASSISTANT_TEMPERATURE: f64 = 0.4;

/// Read access to stored binary assets (source images, by reference).
pub trait AssetStore: Send + Sync {
    fn read(&self, reference: &str) -> anyhow::Result<Vec<u8>>;
}

/// Sanitized output of one text generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedField {
    pub field: String,
    pub value: String,
}

/// Decoded output of one image generation/edit.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub provider_code: String,
}

/// One image generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// References into the asset store; the first one becomes the edit source.
    pub source_image_ids: Vec<String>,
    pub product_id: Option<u64>,
}

/// Assistant answer plus the resolution the answer was grounded on.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub reply: String,
    pub intent: Intent,
    pub period_label: String,
}

/// Facade over the whole generation subsystem.
///
/// Holds the deployment settings, the consumed collaborator stores and one
/// shared HTTP client. No mutable state: per-provider runtime configuration
/// is resolved per call inside the orchestrator.
pub struct AiService {
    settings: Settings,
    providers: Arc<dyn ProviderStore>,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductNameStore>,
    assets: Arc<dyn AssetStore>,
    client: reqwest::Client,
}

impl AiService {
    pub fn new(
        settings: Settings,
        providers: Arc<dyn ProviderStore>,
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductNameStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        let client = build_provider_client(&settings);
        Self {
            settings,
            providers,
            orders,
            products,
            assets,
            client,
        }
    }

    /// Generate one sanitized catalog/CMS field value.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedField> {
        request.validate()?;
        let records = self.providers.providers()?;

        let mut engine = Tera::default();
        let prompt_text = prompt::build_generation_prompt(&mut engine, &self.settings, request)?;
        let field = request.target_field.clone();
        let max_chars = self.settings.max_len(&field);

        let value = run_with_fallback(&records, &self.settings, "generate", |provider| {
            let client = self.client.clone();
            let prompt_text = prompt_text.clone();
            let field = field.clone();
            async move {
                let text = chat(
                    &client,
                    &provider,
                    &ChatCall {
                        system: None,
                        user: &prompt_text,
                        temperature: GENERATION_TEMPERATURE,
                    },
                )
                .await?;
                let raw = response::extract_field(&text, &field).map_err(|message| {
                    AttemptError::Contract {
                        provider: provider.code.clone(),
                        message,
                    }
                })?;
                Ok(response::sanitize_field(&field, &raw, max_chars))
            }
        })
        .await?;

        Ok(GeneratedField { field, value })
    }

    /// Answer a free-text analytics question grounded on aggregate metrics.
    pub async fn ask(&self, message: &str, history: &[AssistantTurn]) -> Result<AssistantReply> {
        let (intent, period) = temporal::resolve_now(message);
        tracing::debug!(%intent, period = period.label.as_str(), "resolved assistant question");

        let assembler =
            AnalyticsAssembler::new(self.orders.as_ref(), self.products.as_ref(), &self.settings.locale);
        let report = assembler.assemble(intent, &period, message)?;
        let report_json =
            serde_json::to_string_pretty(&report).context("serializing analytics report")?;

        let mut engine = Tera::default();
        let prompt_text = prompt::build_assistant_prompt(
            &mut engine,
            &self.settings,
            message,
            &period.label,
            &report_json,
            &clamp_history(history),
        )?;

        let records = self.providers.providers()?;
        let reply = run_with_fallback(&records, &self.settings, "ask", |provider| {
            let client = self.client.clone();
            let prompt_text = prompt_text.clone();
            async move {
                chat(
                    &client,
                    &provider,
                    &ChatCall {
                        system: None,
                        user: &prompt_text,
                        temperature: ASSISTANT_TEMPERATURE,
                    },
                )
                .await
            }
        })
        .await?;

        Ok(AssistantReply {
            reply,
            intent,
            period_label: period.label,
        })
    }

    /// Generate or edit a product image.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let records = self.providers.providers()?;
        let has_source = !request.source_image_ids.is_empty();

        // Model compatibility is checked for the whole usable chain before
        // any asset read or network call.
        for record in usable_providers(&records) {
            crate::image::check_source_compatibility(
                &record.code,
                record.configured_model(),
                has_source,
            )?;
        }

        let prepared = match request.source_image_ids.first() {
            Some(reference) => {
                let bytes = self.assets.read(reference)?;
                Some(prepare_source_image(
                    &bytes,
                    self.settings.image_target_px,
                    self.settings.image_max_bytes,
                )?)
            }
            None => None,
        };

        let prompt_text = self.image_prompt(request);
        let max_bytes = self.settings.image_max_bytes;

        let (payload, provider_code) =
            run_with_fallback(&records, &self.settings, "generate_image", |provider| {
                let client = self.client.clone();
                let prompt_text = prompt_text.clone();
                let prepared = prepared.clone();
                async move {
                    let code = provider.code.clone();
                    let payload =
                        run_image_call(&client, &provider, &prompt_text, prepared.as_ref(), max_bytes)
                            .await?;
                    Ok((payload, code))
                }
            })
            .await?;

        Ok(GeneratedImage {
            bytes: payload.bytes,
            mime_type: payload.mime_type,
            provider_code,
        })
    }

    /// Enrich the caller prompt with the product name when one is referenced.
    fn image_prompt(&self, request: &ImageRequest) -> String {
        let base = request.prompt.trim();
        match request.product_id {
            Some(product_id) => {
                let name =
                    resolve_product_name(self.products.as_ref(), &self.settings.locale, product_id);
                format!("{base}\nProduit concerné : {name}.")
            }
            None => base.to_string(),
        }
    }
}
