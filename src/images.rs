use crate::error::Result;
use crate::models::ImageReference;
use crate::traits::SourceAdapter;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a chapter reference into page images in reading order.
pub struct ImageResolver {
    adapter: Arc<dyn SourceAdapter>,
}

impl ImageResolver {
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self { adapter }
    }

    /// An empty result means the chapter has no pages; it is not an error here.
    pub async fn resolve(&self, chapter_ref: &str) -> Result<Vec<ImageReference>> {
        let images: Vec<ImageReference> = self
            .adapter
            .list_images(chapter_ref)
            .await?
            .into_iter()
            .filter(|image| !image.url.trim().is_empty())
            .collect();

        for (index, image) in images.iter().enumerate() {
            debug!("[IMAGES] page {:03}: {}", index + 1, image.url);
        }
        info!("[IMAGES] {} pages for chapter {} on {}", images.len(), chapter_ref, self.adapter.name());

        Ok(images)
    }
}
