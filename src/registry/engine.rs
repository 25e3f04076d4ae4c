//! Container engine collaborator interface
//!
//! Everything the synchronization core needs from the local image service: tagging,
//! streaming push/pull, listing the image store and exporting images. The engine owns
//! the registry protocol; callers only see byte streams of progress output.

use crate::error::Result;
use crate::registry::auth::AuthToken;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;

/// Raw output of a long-running engine call, chunked as it arrives
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// One entry of the local image store
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Option<Vec<String>>,
}

impl ImageSummary {
    pub fn tags(&self) -> &[String] {
        self.repo_tags.as_deref().unwrap_or_default()
    }
}

#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Human-readable endpoint for logs
    fn endpoint(&self) -> String;

    /// Check that the engine answers
    async fn ping(&self) -> Result<()>;

    /// Create `target` as an additional reference to the local image `source`
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Upload `reference` to its registry
    async fn push(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream>;

    /// Download `reference` from its registry
    async fn pull(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream>;

    /// All images in the local store, in store order
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Export the named images as one tar stream
    async fn save(&self, names: &[String]) -> Result<ByteStream>;
}
