use crate::config::{ApiConfig, HttpConfig, SiteConfig};
use crate::error::Result;
use crate::models::{ChapterOrder, ChapterSummary, ImageReference, MangaSummary, NO_TITLE};
use crate::traits::SourceAdapter;
use crate::utils::HttpClient;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Deserialize)]
struct Collection<T> {
    data: Vec<T>,
    total: Option<u32>,
}

#[derive(Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default, deserialize_with = "localized")]
    title: BTreeMap<String, String>,
    #[serde(default)]
    alt_titles: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "localized")]
    description: BTreeMap<String, String>,
    status: Option<String>,
    year: Option<i32>,
    content_rating: Option<String>,
    original_language: Option<String>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    kind: String,
    attributes: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    volume: Option<String>,
    chapter: Option<String>,
    title: Option<String>,
    pages: Option<u32>,
    external_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHome {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

/// Localized strings arrive as `{"en": "..."}`, but an empty set is
/// sometimes sent as `[]`.
fn localized<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Localized {
        Map(BTreeMap<String, Option<String>>),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Localized::deserialize(deserializer)? {
        Localized::Map(map) => map
            .into_iter()
            .filter_map(|(lang, text)| text.filter(|t| !t.trim().is_empty()).map(|t| (lang, t)))
            .collect(),
        Localized::Other(_) => BTreeMap::new(),
    })
}

/// Adapter for a versioned JSON REST API in the MangaDex style.
pub struct ApiAdapter {
    name: String,
    base_url: String,
    api: ApiConfig,
    languages: Vec<String>,
    http_client: HttpClient,
}

impl ApiAdapter {
    /// `languages` narrows search to manga translated into any of them.
    pub fn new(http: &HttpConfig, site: &SiteConfig, languages: &[String]) -> Result<Self> {
        Ok(Self {
            name: site.name.clone(),
            base_url: site.base_url.trim_end_matches('/').to_string(),
            api: site.api.clone().unwrap_or_default(),
            languages: languages.to_vec(),
            http_client: HttpClient::new(http, site)?,
        })
    }

    fn to_summary(&self, manga: MangaData) -> MangaSummary {
        let attributes = manga.attributes;

        let title = ["en", "ja"]
            .iter()
            .find_map(|lang| attributes.title.get(*lang))
            .or_else(|| attributes.title.values().next())
            .cloned()
            .unwrap_or_else(|| NO_TITLE.to_string());

        let mut alt_titles: Vec<String> = Vec::new();
        for entry in &attributes.alt_titles {
            let Some(map) = entry.as_object() else { continue };
            for text in map.values().filter_map(|v| v.as_str()).map(str::trim) {
                if !text.is_empty() && text != title && !alt_titles.iter().any(|t| t == text) {
                    alt_titles.push(text.to_string());
                }
            }
        }

        let description = attributes
            .description
            .get("en")
            .or_else(|| attributes.description.values().next())
            .cloned();

        let cover_url = manga
            .relationships
            .iter()
            .find(|r| r.kind == "cover_art")
            .and_then(|r| r.attributes.as_ref())
            .and_then(|a| a.get("fileName"))
            .and_then(|f| f.as_str())
            .map(|file| format!("{}/covers/{}/{}", self.api.cover_base_url, manga.id, file))
            .unwrap_or_else(|| self.api.placeholder_cover.clone());

        let mut metadata = BTreeMap::new();
        if let Some(status) = attributes.status {
            metadata.insert("status".to_string(), status);
        }
        if let Some(year) = attributes.year {
            metadata.insert("year".to_string(), year.to_string());
        }
        if let Some(rating) = attributes.content_rating {
            metadata.insert("content_rating".to_string(), rating);
        }
        if let Some(lang) = attributes.original_language {
            metadata.insert("original_language".to_string(), lang);
        }

        MangaSummary {
            id_or_url: manga.id,
            title,
            alt_titles,
            cover_url: Some(cover_url),
            description,
            metadata,
        }
    }

    fn to_chapter(chapter: ChapterData) -> ChapterSummary {
        let attributes = chapter.attributes;
        ChapterSummary {
            id_or_url: chapter.id,
            number: attributes.chapter.unwrap_or_default(),
            volume: attributes.volume.filter(|v| !v.is_empty()),
            title: attributes.title.filter(|t| !t.trim().is_empty()),
            page_count: attributes.pages,
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn chapter_order(&self) -> ChapterOrder {
        ChapterOrder::Ascending
    }

    fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    async fn search(&self, query: &str) -> Result<Vec<MangaSummary>> {
        let url = format!("{}/manga", self.base_url);
        let mut params = vec![
            ("title", query.to_string()),
            ("limit", self.api.search_limit.to_string()),
            ("includes[]", "cover_art".to_string()),
        ];
        for lang in &self.languages {
            params.push(("availableTranslatedLanguage[]", lang.clone()));
        }

        info!("[API] {} search: {}", self.name, query);
        let response: Collection<MangaData> = self.http_client.get_json(&url, &params).await?;

        let results: Vec<_> = response.data.into_iter().map(|m| self.to_summary(m)).collect();
        info!("[API] {} search returned {} results", self.name, results.len());
        Ok(results)
    }

    async fn list_chapters(&self, manga_ref: &str, lang: &str) -> Result<Vec<ChapterSummary>> {
        let url = format!("{}/manga/{}/feed", self.base_url, manga_ref);
        let mut chapters = Vec::new();
        let mut offset = 0u32;

        loop {
            let params = [
                ("translatedLanguage[]", lang.to_string()),
                ("order[volume]", "asc".to_string()),
                ("order[chapter]", "asc".to_string()),
                ("limit", self.api.feed_page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            let page: Collection<ChapterData> = self.http_client.get_json(&url, &params).await?;
            let fetched = page.data.len() as u32;

            for chapter in page.data {
                if chapter.attributes.external_url.is_some() {
                    debug!("[API] Skipping externally hosted chapter {}", chapter.id);
                    continue;
                }
                chapters.push(Self::to_chapter(chapter));
            }

            offset += fetched;
            match page.total {
                Some(total) if fetched > 0 && offset < total => continue,
                _ => break,
            }
        }

        info!("[API] Found {} '{}' chapters for {}", chapters.len(), lang, manga_ref);
        Ok(chapters)
    }

    async fn list_images(&self, chapter_ref: &str) -> Result<Vec<ImageReference>> {
        let url = format!("{}/at-home/server/{}", self.base_url, chapter_ref);
        let at_home: AtHome = self.http_client.get_json(&url, &[]).await?;

        let chapter = at_home.chapter;
        let (quality, files) = if !chapter.data.is_empty() {
            ("data", chapter.data)
        } else {
            ("data-saver", chapter.data_saver)
        };

        let base = at_home.base_url.trim_end_matches('/');
        let images: Vec<_> = files
            .iter()
            .map(|file| ImageReference::new(format!("{}/{}/{}/{}", base, quality, chapter.hash, file)))
            .collect();

        info!("[API] Resolved {} '{}' images for chapter {}", images.len(), quality, chapter_ref);
        Ok(images)
    }
}
