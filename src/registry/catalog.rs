//! Local image store inventory

use crate::error::Result;
use crate::registry::engine::EngineClient;
use std::sync::Arc;

pub struct ImageCatalog {
    engine: Arc<dyn EngineClient>,
}

impl ImageCatalog {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        Self { engine }
    }

    /// Every repository:tag of every local image, flattened in store order
    pub async fn list_identifiers(&self) -> Result<Vec<String>> {
        let images = self
            .engine
            .list_images()
            .await
            .map_err(|e| e.into_catalog())?;

        Ok(images
            .iter()
            .flat_map(|image| image.tags().iter().cloned())
            .collect())
    }

    /// Image IDs, one per image
    pub async fn list_image_ids(&self) -> Result<Vec<String>> {
        let images = self
            .engine
            .list_images()
            .await
            .map_err(|e| e.into_catalog())?;

        Ok(images.into_iter().map(|image| image.id).collect())
    }

    /// Names to hand to an image export: all tags, or the ID for untagged images
    pub async fn list_export_names(&self) -> Result<Vec<String>> {
        let images = self
            .engine
            .list_images()
            .await
            .map_err(|e| e.into_catalog())?;

        Ok(images
            .iter()
            .flat_map(|image| {
                if image.tags().is_empty() {
                    vec![image.id.clone()]
                } else {
                    image.tags().to_vec()
                }
            })
            .collect())
    }
}
