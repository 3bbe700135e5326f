// ── Image pipeline: canvas/mask preparation + provider request building ─────
pub mod prepare;
pub mod request;

pub use prepare::{PreparedImage, prepare_source_image};
pub use request::{ImagePayload, check_source_compatibility, run_image_call};
