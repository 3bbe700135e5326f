use super::prepare::PreparedImage;
use crate::error::{AttemptError, ConfigError};
use crate::providers::{DEFAULT_IMAGE_MODEL, ImageModelFamily, RuntimeProvider};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Decoded image returned by a provider.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Reject an explicitly configured generation-only model combined with a
/// source image, before any network call. An unset model falls back to an
/// edit-capable default and is never rejected.
pub fn check_source_compatibility(
    provider_code: &str,
    configured_model: Option<&str>,
    has_source_image: bool,
) -> Result<(), ConfigError> {
    if !has_source_image {
        return Ok(());
    }
    if let Some(model) = configured_model
        && !ImageModelFamily::classify(model).accepts_source_image()
    {
        return Err(ConfigError::IncompatibleImageModel {
            provider: provider_code.to_string(),
            model: model.to_string(),
        });
    }
    Ok(())
}

/// Run one image call against `provider`: an edit when a prepared source
/// image is supplied, a plain generation otherwise.
pub async fn run_image_call(
    client: &Client,
    provider: &RuntimeProvider,
    prompt: &str,
    prepared: Option<&PreparedImage>,
    max_bytes: usize,
) -> Result<ImagePayload, AttemptError> {
    if !provider.driver.supports_images() {
        return Err(AttemptError::Transient {
            provider: provider.code.clone(),
            message: format!("driver {} has no image endpoint", provider.driver),
        });
    }

    let model = provider.model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL);
    let family = ImageModelFamily::classify(model);

    let (status, body) = match prepared {
        None => generate(client, provider, model, family, prompt).await?,
        Some(prepared) => {
            if !family.accepts_source_image() {
                // Guarded again here in case the upfront check was bypassed.
                return Err(AttemptError::Contract {
                    provider: provider.code.clone(),
                    message: format!("model {model} cannot accept a source image"),
                });
            }
            let (status, body) =
                edit(client, provider, model, family, prompt, prepared, true).await?;
            if !status.is_success() && family == ImageModelFamily::Edit && mentions_unsupported_fidelity(&body)
            {
                // One compatibility retry without the high-fidelity parameter.
                tracing::warn!(
                    provider = provider.code.as_str(),
                    model,
                    "provider rejected input_fidelity, retrying once without it"
                );
                edit(client, provider, model, family, prompt, prepared, false).await?
            } else {
                (status, body)
            }
        }
    };

    if !status.is_success() {
        return Err(AttemptError::Transient {
            provider: provider.code.clone(),
            message: format!("HTTP {status}: {body}"),
        });
    }

    decode_image_payload(&provider.code, &body, max_bytes)
}

async fn generate(
    client: &Client,
    provider: &RuntimeProvider,
    model: &str,
    family: ImageModelFamily,
    prompt: &str,
) -> Result<(StatusCode, String), AttemptError> {
    let request = client
        .post(format!("{}/v1/images/generations", provider.base_url))
        .bearer_auth(&provider.api_key)
        .json(&GenerationBody {
            model,
            prompt,
            size: "1024x1024".to_string(),
            // gpt-image models always return base64; dall-e must be asked.
            response_format: (family != ImageModelFamily::Edit).then_some("b64_json"),
        });
    send(provider, request).await
}

async fn edit(
    client: &Client,
    provider: &RuntimeProvider,
    model: &str,
    family: ImageModelFamily,
    prompt: &str,
    prepared: &PreparedImage,
    with_fidelity: bool,
) -> Result<(StatusCode, String), AttemptError> {
    let image_part = png_part(&provider.code, prepared.canvas_png.clone(), "source.png")?;
    let mut form = Form::new()
        .text("model", model.to_string())
        .text("prompt", prompt.to_string())
        .text("size", format!("{0}x{0}", prepared.side_px))
        .part("image", image_part);

    match family {
        ImageModelFamily::Edit => {
            if with_fidelity {
                form = form.text("input_fidelity", "high");
            }
        }
        ImageModelFamily::LegacyEdit => {
            // The legacy edit endpoint needs the transparent mask as a
            // separate attachment and only replies in base64 on request.
            let mask_part = png_part(&provider.code, prepared.mask_png.clone(), "mask.png")?;
            form = form.part("mask", mask_part).text("response_format", "b64_json");
        }
        ImageModelFamily::GenerationOnly => unreachable!("rejected before building the request"),
    }

    let request = client
        .post(format!("{}/v1/images/edits", provider.base_url))
        .bearer_auth(&provider.api_key)
        .multipart(form);
    send(provider, request).await
}

fn png_part(provider_code: &str, bytes: Vec<u8>, filename: &str) -> Result<Part, AttemptError> {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime::IMAGE_PNG.as_ref())
        .map_err(|e| AttemptError::Transient {
            provider: provider_code.to_string(),
            message: format!("failed to build multipart attachment: {e}"),
        })
}

async fn send(
    provider: &RuntimeProvider,
    request: reqwest::RequestBuilder,
) -> Result<(StatusCode, String), AttemptError> {
    let response = request.send().await.map_err(|e| AttemptError::Transient {
        provider: provider.code.clone(),
        message: e.to_string(),
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|e| AttemptError::Transient {
        provider: provider.code.clone(),
        message: e.to_string(),
    })?;
    Ok((status, body))
}

/// Vendor error text signalling the high-fidelity parameter is unknown.
/// Substring matching is fragile but providers expose no structured code for
/// this today; kept to a single retry.
fn mentions_unsupported_fidelity(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("input_fidelity")
        && ["unknown", "unsupported", "unrecognized", "unexpected"]
            .iter()
            .any(|marker| lower.contains(marker))
}

/// Decode the base64 payload out of a 2xx image response body and enforce
/// the size ceiling plus the MIME allow-list (PNG/JPEG/WEBP).
fn decode_image_payload(
    provider_code: &str,
    body: &str,
    max_bytes: usize,
) -> Result<ImagePayload, AttemptError> {
    let contract = |message: String| AttemptError::Contract {
        provider: provider_code.to_string(),
        message,
    };

    let response: ImageResponse = serde_json::from_str(body)
        .map_err(|e| contract(format!("undecodable image response: {e}")))?;
    let encoded = response
        .data
        .into_iter()
        .find_map(|d| d.b64_json)
        .ok_or_else(|| contract("image response carries no b64_json payload".into()))?;

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| contract(format!("image payload is not valid base64: {e}")))?;
    if bytes.len() > max_bytes {
        return Err(contract(format!(
            "image payload is {} bytes, above the {max_bytes}-byte ceiling",
            bytes.len()
        )));
    }

    let sniffed = infer::get(&bytes)
        .map(|info| info.mime_type().to_string())
        .ok_or_else(|| contract("image payload has no recognizable format".into()))?;
    let parsed: mime::Mime = sniffed
        .parse()
        .map_err(|_| contract(format!("unparsable MIME type {sniffed}")))?;
    let allowed = parsed.type_() == mime::IMAGE
        && (parsed.subtype() == mime::PNG
            || parsed.subtype() == mime::JPEG
            || parsed.subtype().as_str() == "webp");
    if !allowed {
        return Err(contract(format!("MIME type {sniffed} is not allowed")));
    }

    Ok(ImagePayload {
        bytes,
        mime_type: sniffed,
    })
}
