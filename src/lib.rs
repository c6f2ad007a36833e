// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod client;
pub mod compliance;
pub mod config;
pub mod error;
pub mod gate;
pub mod generation;
pub mod invoker;
pub mod metrics;
pub mod notify;
pub mod providers;
pub mod topics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::compliance::{ComplianceVerdict, FallbackPolicy};
pub use crate::error::{ErrorKind, ProviderError};
pub use crate::generation::{ContentRequest, GenerationResult, Platform};
pub use crate::invoker::ProviderFallbackInvoker;
pub use crate::providers::ProviderKind;

use axum::Router;

/// Router built from on-disk config and environment (no metrics recorder).
pub async fn app() -> anyhow::Result<Router> {
    let state = AppState::from_env()?;
    Ok(router(state))
}
