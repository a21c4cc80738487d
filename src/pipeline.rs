use crate::archive::ArchiveBuilder;
use crate::catalog::ChapterCatalogResolver;
use crate::config::{ArchiveConfig, Config};
use crate::error::{ChapterZipError, Result};
use crate::images::ImageResolver;
use crate::models::{ArchiveResult, ChapterSummary, MangaSummary, NO_TITLE};
use crate::registry::SourceRegistry;
use crate::traits::SourceAdapter;
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::info;

/// Search, catalog and archive operations against a single source.
///
/// Holds no per-request state; every call talks to the source afresh.
pub struct ChapterPipeline {
    adapter: Arc<dyn SourceAdapter>,
    languages: Vec<String>,
    archive: ArchiveConfig,
}

impl ChapterPipeline {
    pub fn new(adapter: Arc<dyn SourceAdapter>, config: &Config) -> Self {
        Self {
            adapter,
            languages: config.catalog.languages.clone(),
            archive: config.archive.clone(),
        }
    }

    pub fn for_source(registry: &SourceRegistry, name: &str, config: &Config) -> Result<Self> {
        let adapter = registry
            .get_source(name)
            .ok_or_else(|| ChapterZipError::source_not_found(name))?;
        Ok(Self::new(adapter, config))
    }

    pub fn source_name(&self) -> &str {
        self.adapter.name()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<MangaSummary>> {
        let mut results = self.adapter.search(query).await?;
        for manga in &mut results {
            if manga.title.trim().is_empty() {
                manga.title = NO_TITLE.to_string();
            }
        }
        Ok(results)
    }

    pub async fn list_chapters(&self, manga_ref: &str, lang_pref: &[String]) -> Result<Vec<ChapterSummary>> {
        ChapterCatalogResolver::new(self.adapter.clone(), &self.languages)
            .resolve(manga_ref, lang_pref)
            .await
    }

    pub async fn build_archive(&self, chapter_ref: &str, title: &str, chapter_label: &str) -> Result<ArchiveResult> {
        self.build_archive_with_progress(chapter_ref, title, chapter_label, ProgressBar::hidden())
            .await
    }

    pub async fn build_archive_with_progress(
        &self,
        chapter_ref: &str,
        title: &str,
        chapter_label: &str,
        progress: ProgressBar,
    ) -> Result<ArchiveResult> {
        let images = ImageResolver::new(self.adapter.clone()).resolve(chapter_ref).await?;
        if images.is_empty() {
            return Err(ChapterZipError::NoImagesFound(chapter_ref.to_string()));
        }

        info!(
            "[PIPELINE] Building archive for '{}' chapter {} ({} pages)",
            title,
            chapter_label,
            images.len()
        );

        ArchiveBuilder::new(self.adapter.http_client().clone(), &self.archive)
            .with_progress(progress)
            .build(&images, title, chapter_label)
            .await
    }
}
