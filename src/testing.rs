use crate::config::Config;
use crate::error::Result;
use crate::models::{ChapterOrder, ChapterSummary, ImageReference, MangaSummary};
use crate::traits::SourceAdapter;
use crate::utils::HttpClient;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory source that records every call it receives.
pub struct FakeSource {
    pub order: ChapterOrder,
    pub search_results: Vec<MangaSummary>,
    pub chapters: HashMap<String, Vec<ChapterSummary>>,
    pub images: Vec<ImageReference>,
    pub calls: Mutex<Vec<String>>,
    http_client: HttpClient,
}

impl FakeSource {
    pub fn new(order: ChapterOrder) -> Self {
        let config = Config::default();
        let site = config.get_site_config("mangadex").unwrap();
        Self {
            order,
            search_results: Vec::new(),
            chapters: HashMap::new(),
            images: Vec::new(),
            calls: Mutex::new(Vec::new()),
            http_client: HttpClient::new(&config.http, site).unwrap(),
        }
    }

    pub fn with_chapters(mut self, lang: &str, numbers: &[&str]) -> Self {
        let chapters = numbers
            .iter()
            .map(|n| ChapterSummary::new(format!("{}-{}", lang, n), *n))
            .collect();
        self.chapters.insert(lang.to_string(), chapters);
        self
    }

    pub fn with_images(mut self, urls: &[String]) -> Self {
        self.images = urls.iter().map(|u| ImageReference::new(u.clone())).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl SourceAdapter for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn chapter_order(&self) -> ChapterOrder {
        self.order
    }

    fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    async fn search(&self, query: &str) -> Result<Vec<MangaSummary>> {
        self.record(format!("search:{}", query));
        Ok(self.search_results.clone())
    }

    async fn list_chapters(&self, manga_ref: &str, lang: &str) -> Result<Vec<ChapterSummary>> {
        self.record(format!("chapters:{}:{}", manga_ref, lang));
        Ok(self.chapters.get(lang).cloned().unwrap_or_default())
    }

    async fn list_images(&self, chapter_ref: &str) -> Result<Vec<ImageReference>> {
        self.record(format!("images:{}", chapter_ref));
        Ok(self.images.clone())
    }
}
