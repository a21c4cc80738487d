use crate::config::Config;
use crate::error::Result;
use crate::models::SourceKind;
use crate::sources::{ApiAdapter, ScrapingAdapter};
use crate::traits::SourceAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry for managing source adapters
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Builds one adapter per configured source, picking the variant by `kind`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        for (key, site) in &config.sources {
            let adapter: Arc<dyn SourceAdapter> = match site.kind {
                SourceKind::Scraping => Arc::new(ScrapingAdapter::new(&config.http, site)?),
                SourceKind::Api => {
                    Arc::new(ApiAdapter::new(&config.http, site, &config.catalog.languages)?)
                }
            };
            debug!("Registered {} source '{}' ({})", site.kind, key, site.base_url);
            registry.register_source(key, adapter);
        }

        Ok(registry)
    }

    pub fn register_source(&mut self, name: &str, adapter: Arc<dyn SourceAdapter>) {
        self.sources.insert(name.to_string(), adapter);
    }

    pub fn get_source(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
