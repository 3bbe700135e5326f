#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::return_self_not_must_use
)]

pub mod assistant;
pub mod config;
pub mod error;
pub mod image;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod response;
pub mod service;

pub use config::Settings;
pub use error::{AttemptError, ConfigError, GenError, Result};
pub use prompt::{GenerationContext, GenerationRequest};
pub use service::{
    AiService, AssetStore, AssistantReply, GeneratedField, GeneratedImage, ImageRequest,
};
