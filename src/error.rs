use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the generation subsystem.
///
/// Only the aggregated outcome of an operation crosses the library boundary:
/// a configuration problem (nothing was attempted), a terminal failure (every
/// usable provider was attempted and the last cause is attached), or an
/// internal failure from a collaborator store. Individual provider attempts
/// are logged, never surfaced.
#[derive(Debug, Error)]
pub enum GenError {
    // ── Config / request validation ─────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Fallback chain exhausted ────────────────────────────────────────
    #[error("all usable providers failed (last: {provider})")]
    Terminal {
        provider: String,
        #[source]
        cause: AttemptError,
    },

    // ── Collaborator stores (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Configuration errors ────────────────────────────────────────────────────

/// Problems detected before any provider is contacted. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no usable AI provider is configured (enabled with a credential)")]
    NoUsableProvider,

    #[error("field {field} is not supported for context {context}")]
    UnsupportedField { context: String, field: String },

    #[error(
        "model {model} on provider {provider} cannot edit a source image; \
         configure an edit-capable model (e.g. gpt-image-1) or remove the source images"
    )]
    IncompatibleImageModel { provider: String, model: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Per-attempt errors ──────────────────────────────────────────────────────

/// Failure of one provider attempt inside the fallback chain.
///
/// `Transient` covers network/timeout/HTTP failures; `Contract` covers a
/// response the provider delivered but that violates the structured-output
/// contract (unparsable JSON, missing text, oversize or disallowed image
/// payload). Both end that provider's attempt and move the chain forward.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("provider {provider} request failed: {message}")]
    Transient { provider: String, message: String },

    #[error("provider {provider} violated the response contract: {message}")]
    Contract { provider: String, message: String },
}

impl AttemptError {
    pub fn provider(&self) -> &str {
        match self {
            Self::Transient { provider, .. } | Self::Contract { provider, .. } => provider,
        }
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, GenError>;
