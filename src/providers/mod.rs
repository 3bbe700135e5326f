// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod chat;
pub mod client;
pub mod driver;
pub mod registry;

// ── Re-exports ──────────────────────────────────────────────────────────────
pub use chat::{ChatCall, chat};
pub use client::build_provider_client;
pub use driver::{DEFAULT_IMAGE_MODEL, Driver, ImageModelFamily};
pub use registry::{ProviderRecord, ProviderStore, RuntimeProvider, usable_providers};
