//! In-memory container engine

use async_trait::async_trait;
use futures::StreamExt;
use image_sync::error::{Result, SyncError};
use image_sync::registry::{AuthToken, ByteStream, EngineClient, ImageSummary};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Status line the fake engine streams when nothing else is configured
pub const DEFAULT_STATUS: &[u8] = b"{\"status\":\"Layer already exists\",\"id\":\"5f70bf18a086\"}\n";

#[derive(Default)]
pub struct FakeEngine {
    calls: AtomicUsize,
    tags: Mutex<Vec<(String, String)>>,
    tokens: Mutex<Vec<String>>,
    failing_tags: HashSet<String>,
    failing_transfers: HashSet<String>,
    streams: HashMap<String, Vec<Vec<u8>>>,
    hang: bool,
    images: Vec<ImageSummary>,
    list_error: Option<String>,
    export: Vec<Vec<u8>>,
    export_error: Option<String>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tagging `source` fails
    pub fn fail_tag(mut self, source: &str) -> Self {
        self.failing_tags.insert(source.to_string());
        self
    }

    /// Push or pull of `reference` is rejected before streaming
    pub fn fail_transfer(mut self, reference: &str) -> Self {
        self.failing_transfers.insert(reference.to_string());
        self
    }

    /// Chunks streamed back for `reference`
    pub fn with_stream(mut self, reference: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.streams.insert(reference.to_string(), chunks);
        self
    }

    /// Push and pull streams never end
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_images(mut self, images: Vec<ImageSummary>) -> Self {
        self.images = images;
        self
    }

    /// Listing the local store fails with a network error
    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Chunks returned by an image export
    pub fn with_export(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.export = chunks;
        self
    }

    /// The export stream fails after its chunks
    pub fn failing_export(mut self, message: &str) -> Self {
        self.export_error = Some(message.to_string());
        self
    }

    /// Every engine call so far, of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(source, target)` pairs tagged so far
    pub fn tags(&self) -> Vec<(String, String)> {
        self.tags.lock().unwrap().clone()
    }

    /// Registry tokens handed to push and pull, in call order
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn transfer(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(auth.as_str().to_string());

        if self.failing_transfers.contains(reference) {
            return Err(SyncError::Engine {
                status: 404,
                message: format!("repository {} not found", reference),
            });
        }
        if self.hang {
            return Ok(futures::stream::pending().boxed());
        }

        let chunks = self
            .streams
            .get(reference)
            .cloned()
            .unwrap_or_else(|| vec![DEFAULT_STATUS.to_vec()]);
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    fn endpoint(&self) -> String {
        "fake://engine".to_string()
    }

    async fn ping(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_tags.contains(source) {
            return Err(SyncError::Engine {
                status: 404,
                message: format!("No such image: {}", source),
            });
        }
        self.tags
            .lock()
            .unwrap()
            .push((source.to_string(), target.to_string()));
        Ok(())
    }

    async fn push(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream> {
        self.transfer(reference, auth)
    }

    async fn pull(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream> {
        self.transfer(reference, auth)
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.list_error {
            return Err(SyncError::Network(message.clone()));
        }
        Ok(self.images.clone())
    }

    async fn save(&self, _names: &[String]) -> Result<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut chunks: Vec<Result<Vec<u8>>> = self.export.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.export_error {
            chunks.push(Err(SyncError::Network(message.clone())));
        }
        Ok(futures::stream::iter(chunks).boxed())
    }
}

pub fn image(id: &str, tags: &[&str]) -> ImageSummary {
    ImageSummary {
        id: id.to_string(),
        repo_tags: if tags.is_empty() {
            None
        } else {
            Some(tags.iter().map(|tag| tag.to_string()).collect())
        },
    }
}
