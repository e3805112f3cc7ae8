//! Narration service seam
//!
//! The segment generator talks to the narration service only through
//! [`NarrationService`]; every failure surfaces as
//! [`Error::NarrationUnavailable`](crate::error::Error::NarrationUnavailable).

pub mod client;
pub mod personality;

pub use client::HttpNarrationClient;
pub use personality::Personality;

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

#[async_trait]
pub trait NarrationService: Send + Sync {
    /// Generate intro text for a prompt
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Synthesize speech for `text` and return the written audio file
    async fn synthesize(&self, content_item_id: Uuid, text: &str) -> Result<PathBuf>;

    /// Reachability probe
    async fn health(&self) -> Result<()>;
}
