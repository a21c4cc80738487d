use crate::error::Result;
use crate::models::{ChapterOrder, ChapterSummary};
use crate::traits::SourceAdapter;
use std::sync::Arc;
use tracing::{debug, info};

pub const UNKNOWN_VOLUME: &str = "?";
pub const UNNUMBERED_CHAPTER: &str = "Extra/Special";

/// Resolves the chapter catalog of a manga on one source.
///
/// Languages are tried in preference order and the first one with any
/// chapters wins; catalogs of different languages are never merged.
pub struct ChapterCatalogResolver {
    adapter: Arc<dyn SourceAdapter>,
    default_languages: Vec<String>,
}

impl ChapterCatalogResolver {
    pub fn new(adapter: Arc<dyn SourceAdapter>, default_languages: &[String]) -> Self {
        Self {
            adapter,
            default_languages: default_languages.to_vec(),
        }
    }

    pub async fn resolve(&self, manga_ref: &str, lang_pref: &[String]) -> Result<Vec<ChapterSummary>> {
        let languages = if lang_pref.is_empty() {
            self.default_languages.as_slice()
        } else {
            lang_pref
        };

        for lang in languages {
            let chapters = self.adapter.list_chapters(manga_ref, lang).await?;
            if chapters.is_empty() {
                debug!("[CATALOG] No '{}' chapters for {} on {}", lang, manga_ref, self.adapter.name());
                continue;
            }

            info!(
                "[CATALOG] Using {} '{}' chapters for {} on {}",
                chapters.len(),
                lang,
                manga_ref,
                self.adapter.name()
            );
            return Ok(normalize(chapters, self.adapter.chapter_order()));
        }

        info!("[CATALOG] No chapters in any of {:?} for {}", languages, manga_ref);
        Ok(Vec::new())
    }
}

/// Puts chapters in ascending order and fills in missing volume and number labels.
pub fn normalize(mut chapters: Vec<ChapterSummary>, order: ChapterOrder) -> Vec<ChapterSummary> {
    if order == ChapterOrder::Descending {
        chapters.reverse();
    }

    for chapter in &mut chapters {
        if chapter.volume.as_deref().map_or(true, |v| v.trim().is_empty()) {
            chapter.volume = Some(UNKNOWN_VOLUME.to_string());
        }
        if chapter.number.trim().is_empty() {
            chapter.number = UNNUMBERED_CHAPTER.to_string();
        }
    }

    chapters
}
