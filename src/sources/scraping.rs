use crate::config::{HttpConfig, SelectorsConfig, SiteConfig};
use crate::error::Result;
use crate::models::{ChapterOrder, ChapterSummary, ImageReference, MangaSummary};
use crate::traits::SourceAdapter;
use crate::utils::{resolve_url, HttpClient};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

struct CompiledSelectors {
    search_item: Selector,
    search_link: Selector,
    chapter_item: Selector,
    chapter_link: Selector,
    image: Selector,
    anchor: Selector,
    cover: Selector,
}

/// Adapter for sites that only publish HTML pages.
///
/// Parsing is driven by the selectors configured for the site. A selector
/// that matches nothing produces an empty result.
pub struct ScrapingAdapter {
    name: String,
    base_url: String,
    search_path: String,
    newest_first: bool,
    selectors: CompiledSelectors,
    number_regex: Regex,
    bare_number_regex: Regex,
    http_client: HttpClient,
}

impl ScrapingAdapter {
    pub fn new(http: &HttpConfig, site: &SiteConfig) -> Result<Self> {
        let configured = site.selectors.clone().unwrap_or_default();

        Ok(Self {
            name: site.name.clone(),
            base_url: site.base_url.trim_end_matches('/').to_string(),
            search_path: configured.search_path.clone(),
            newest_first: site.newest_first,
            selectors: CompiledSelectors::compile(&configured)?,
            number_regex: compile_regex(r"(?i)chapter\s*([0-9]+(?:\.[0-9]+)?)")?,
            bare_number_regex: compile_regex(r"([0-9]+(?:\.[0-9]+)?)")?,
            http_client: HttpClient::new(http, site)?,
        })
    }

    fn absolute(&self, href: &str) -> String {
        resolve_url(&self.base_url, href)
    }

    fn parse_search(&self, html: &str) -> Vec<MangaSummary> {
        let document = Html::parse_document(html);
        let mut results = Vec::new();

        for item in document.select(&self.selectors.search_item) {
            let Some(link) = item.select(&self.selectors.search_link).next() else {
                continue;
            };

            let title = text_of(link);
            let href = link.value().attr("href").unwrap_or_default();
            if title.is_empty() || href.is_empty() {
                continue;
            }

            let cover_url = item
                .select(&self.selectors.cover)
                .next()
                .and_then(lazy_src)
                .map(|src| self.absolute(src));

            results.push(MangaSummary {
                id_or_url: self.absolute(href),
                title,
                alt_titles: Vec::new(),
                cover_url,
                description: None,
                metadata: Default::default(),
            });
        }

        results
    }

    /// "Chapter N" when present, else the first number in the label.
    /// Empty only when the label carries no digits at all.
    fn chapter_number(&self, label: &str) -> String {
        [&self.number_regex, &self.bare_number_regex]
            .into_iter()
            .find_map(|regex| regex.captures(label).and_then(|caps| caps.get(1)))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn parse_chapters(&self, html: &str) -> Vec<ChapterSummary> {
        let document = Html::parse_document(html);
        let mut chapters = Vec::new();

        for item in document.select(&self.selectors.chapter_item) {
            let Some(link) = item.select(&self.selectors.chapter_link).next() else {
                continue;
            };

            let href = link
                .value()
                .attr("href")
                .or_else(|| {
                    item.select(&self.selectors.anchor)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                })
                .unwrap_or_default();
            if href.is_empty() {
                continue;
            }

            let label = text_of(link);
            let number = self.chapter_number(&label);

            let mut chapter = ChapterSummary::new(self.absolute(href), number);
            if !label.is_empty() {
                chapter.title = Some(label);
            }

            debug!("[SCRAPING] chapter '{}' at {}", chapter.number, chapter.id_or_url);
            chapters.push(chapter);
        }

        chapters
    }

    fn parse_images(&self, html: &str) -> Vec<ImageReference> {
        let document = Html::parse_document(html);

        document
            .select(&self.selectors.image)
            .filter_map(lazy_src)
            .map(|src| ImageReference::new(self.absolute(src)))
            .collect()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ScrapingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn chapter_order(&self) -> ChapterOrder {
        if self.newest_first {
            ChapterOrder::Descending
        } else {
            ChapterOrder::Ascending
        }
    }

    fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    async fn search(&self, query: &str) -> Result<Vec<MangaSummary>> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let url = format!("{}{}{}", self.base_url, self.search_path, encoded);
        info!("[SCRAPING] {} search: {}", self.name, url);

        let html = self.http_client.get_text(&url).await?;
        let results = self.parse_search(&html);

        info!("[SCRAPING] {} search returned {} results", self.name, results.len());
        Ok(results)
    }

    async fn list_chapters(&self, manga_ref: &str, lang: &str) -> Result<Vec<ChapterSummary>> {
        let url = self.absolute(manga_ref);
        // The listing page carries a single language; `lang` cannot narrow it.
        debug!("[SCRAPING] {} ignores language filter '{}'", self.name, lang);

        let html = self.http_client.get_text(&url).await?;
        let chapters = self.parse_chapters(&html);

        info!("[SCRAPING] Found {} chapters at {}", chapters.len(), url);
        Ok(chapters)
    }

    async fn list_images(&self, chapter_ref: &str) -> Result<Vec<ImageReference>> {
        let url = self.absolute(chapter_ref);

        let html = self.http_client.get_text(&url).await?;
        let images = self.parse_images(&html);

        info!("[SCRAPING] Found {} images at {}", images.len(), url);
        Ok(images)
    }
}

impl CompiledSelectors {
    fn compile(config: &SelectorsConfig) -> Result<Self> {
        Ok(Self {
            search_item: parse_selector(&config.search_item)?,
            search_link: parse_selector(&config.search_link)?,
            chapter_item: parse_selector(&config.chapter_item)?,
            chapter_link: parse_selector(&config.chapter_link)?,
            image: parse_selector(&config.image)?,
            anchor: parse_selector("a[href]")?,
            cover: parse_selector("img")?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        config::ConfigError::Message(format!("Invalid selector '{}': {}", css, e)).into()
    })
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        config::ConfigError::Message(format!("Invalid pattern '{}': {}", pattern, e)).into()
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// `data-src` for lazy-loaded images, `src` otherwise.
fn lazy_src(element: ElementRef<'_>) -> Option<&str> {
    ["data-src", "src"]
        .into_iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
}
