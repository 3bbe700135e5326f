use super::registry::RuntimeProvider;
use crate::error::AttemptError;
use crate::providers::driver::Driver;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_DEFAULT_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

/// One text completion call, provider-agnostic.
#[derive(Debug, Clone, Copy)]
pub struct ChatCall<'a> {
    pub system: Option<&'a str>,
    pub user: &'a str,
    pub temperature: f64,
}

// ─── OpenAI-family wire shapes ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

// ─── Anthropic wire shapes ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

// ─── Gemini wire shapes ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

// ─── Closed extraction set ──────────────────────────────────────────────────

/// Decoded provider reply, one variant per driver family.
///
/// Extraction is exhaustive over this closed set; a new provider family means
/// a new variant here, never runtime probing of unknown shapes.
#[derive(Debug)]
enum ChatReply {
    OpenAi(OpenAiResponse),
    Anthropic(AnthropicResponse),
    Gemini(GeminiResponse),
}

impl ChatReply {
    fn extract_text(self) -> Option<String> {
        let text = match self {
            Self::OpenAi(resp) => resp.choices.into_iter().next()?.message.content?,
            Self::Anthropic(resp) => {
                let parts: Vec<String> = resp
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        AnthropicBlock::Text { text } => Some(text),
                        AnthropicBlock::Other => None,
                    })
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                parts.join("\n")
            }
            Self::Gemini(resp) => {
                let parts: Vec<String> = resp
                    .candidates
                    .into_iter()
                    .next()?
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                parts.join("")
            }
        };
        let text = text.trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

// ─── Call entry point ───────────────────────────────────────────────────────

/// Send one chat completion to `provider` and extract the reply text.
///
/// Network/HTTP failures map to [`AttemptError::Transient`]; a 2xx body with
/// no extractable text maps to [`AttemptError::Contract`]. Both end this
/// provider's attempt and let the fallback chain continue.
pub async fn chat(
    client: &Client,
    provider: &RuntimeProvider,
    call: &ChatCall<'_>,
) -> Result<String, AttemptError> {
    let response = send_request(client, provider, call).await?;

    let status = response.status();
    let body = response.text().await.map_err(|e| transient(provider, &e))?;

    if !status.is_success() {
        return Err(AttemptError::Transient {
            provider: provider.code.clone(),
            message: format!("HTTP {status}: {}", excerpt(&body)),
        });
    }

    let reply = decode_reply(provider.driver, &body).map_err(|e| AttemptError::Contract {
        provider: provider.code.clone(),
        message: format!("undecodable response body: {e}"),
    })?;

    reply.extract_text().ok_or_else(|| AttemptError::Contract {
        provider: provider.code.clone(),
        message: "response contains no extractable text".into(),
    })
}

async fn send_request(
    client: &Client,
    provider: &RuntimeProvider,
    call: &ChatCall<'_>,
) -> Result<reqwest::Response, AttemptError> {
    let model = provider.chat_model();

    let request = match provider.driver {
        Driver::OpenAi => {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = call.system {
                messages.push(OpenAiMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(OpenAiMessage {
                role: "user",
                content: call.user,
            });

            let mut request = client
                .post(format!("{}/v1/chat/completions", provider.base_url))
                .bearer_auth(&provider.api_key)
                .json(&OpenAiRequest {
                    model,
                    messages,
                    temperature: call.temperature,
                });
            if let Some(org) = &provider.organization {
                request = request.header("OpenAI-Organization", org);
            }
            request
        }
        Driver::Anthropic => client
            .post(format!("{}/v1/messages", provider.base_url))
            .header("x-api-key", &provider.api_key)
            .header(
                "anthropic-version",
                provider
                    .api_version
                    .as_deref()
                    .unwrap_or(ANTHROPIC_DEFAULT_VERSION),
            )
            .json(&AnthropicRequest {
                model,
                max_tokens: ANTHROPIC_MAX_TOKENS,
                system: call.system,
                messages: vec![AnthropicMessage {
                    role: "user",
                    content: call.user,
                }],
                temperature: call.temperature,
            }),
        Driver::Gemini => client
            .post(format!(
                "{}/v1beta/models/{model}:generateContent",
                provider.base_url
            ))
            .query(&[("key", provider.api_key.as_str())])
            .json(&GeminiRequest {
                contents: vec![GeminiContent {
                    role: Some("user"),
                    parts: vec![GeminiPart { text: call.user }],
                }],
                system_instruction: call.system.map(|text| GeminiContent {
                    role: None,
                    parts: vec![GeminiPart { text }],
                }),
            }),
    };

    request.send().await.map_err(|e| transient(provider, &e))
}

fn decode_reply(driver: Driver, body: &str) -> Result<ChatReply, serde_json::Error> {
    Ok(match driver {
        Driver::OpenAi => ChatReply::OpenAi(serde_json::from_str(body)?),
        Driver::Anthropic => ChatReply::Anthropic(serde_json::from_str(body)?),
        Driver::Gemini => ChatReply::Gemini(serde_json::from_str(body)?),
    })
}

fn transient(provider: &RuntimeProvider, err: &dyn std::fmt::Display) -> AttemptError {
    AttemptError::Transient {
        provider: provider.code.clone(),
        message: err.to_string(),
    }
}

/// First few hundred chars of an error body, enough for diagnosis without
/// logging entire payloads.
fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
