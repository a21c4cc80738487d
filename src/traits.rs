use crate::error::Result;
use crate::models::{ChapterOrder, ChapterSummary, ImageReference, MangaSummary};
use crate::utils::HttpClient;

/// One upstream source of manga, chapters and page images.
///
/// Empty results are successes; only transport, status and payload failures
/// are errors.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Configured display name of the source
    fn name(&self) -> &str;

    /// Direction in which `list_chapters` returns chapters
    fn chapter_order(&self) -> ChapterOrder;

    /// Client carrying the source's identity, used for image fetches
    fn http_client(&self) -> &HttpClient;

    async fn search(&self, query: &str) -> Result<Vec<MangaSummary>>;

    /// Chapters of `manga_ref` translated into `lang`, in native order
    async fn list_chapters(&self, manga_ref: &str, lang: &str) -> Result<Vec<ChapterSummary>>;

    /// Page images of `chapter_ref` in reading order
    async fn list_images(&self, chapter_ref: &str) -> Result<Vec<ImageReference>>;
}
