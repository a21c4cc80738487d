use crate::error::Result;
use crate::models::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub default_source: String,
    pub http: HttpConfig,
    pub archive: ArchiveConfig,
    pub catalog: CatalogConfig,
    pub sources: HashMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub max_concurrent_downloads: usize,
    pub default_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Languages tried in order when the caller gives none.
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    /// The site lists its newest chapter first.
    #[serde(default)]
    pub newest_first: bool,
    pub selectors: Option<SelectorsConfig>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorsConfig {
    /// Appended to `base_url`, followed by the url-encoded query.
    pub search_path: String,
    pub search_item: String,
    pub search_link: String,
    pub chapter_item: String,
    pub chapter_link: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub cover_base_url: String,
    pub placeholder_cover: String,
    pub search_limit: u32,
    pub feed_page_size: u32,
}

impl Config {
    /// Layers built-in defaults, the TOML file at `path` (when it exists) and
    /// `CHAPTERZIP__SECTION__KEY` environment variables, in that order.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = toml::to_string(&Config::default())
            .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

        let settings = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml))
            .add_source(
                config::File::from(path.as_ref())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("CHAPTERZIP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_site_config(&self, site_name: &str) -> Option<&SiteConfig> {
        self.sources.get(site_name)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sources = HashMap::new();

        sources.insert("mangafire".to_string(), SiteConfig {
            name: "MangaFire".to_string(),
            kind: SourceKind::Scraping,
            base_url: "https://mangafire.to".to_string(),
            user_agent: Some(BROWSER_USER_AGENT.to_string()),
            referer: Some("https://mangafire.to/".to_string()),
            headers: None,
            newest_first: true,
            selectors: Some(SelectorsConfig::default()),
            api: None,
        });

        sources.insert("mangadex".to_string(), SiteConfig {
            name: "MangaDex".to_string(),
            kind: SourceKind::Api,
            base_url: "https://api.mangadex.org".to_string(),
            user_agent: None,
            referer: None,
            headers: None,
            newest_first: false,
            selectors: None,
            api: Some(ApiConfig::default()),
        });

        Config {
            default_source: "mangadex".to_string(),
            http: HttpConfig {
                timeout_secs: 15,
                connect_timeout_secs: 10,
                user_agent: format!("chapterzip/{}", env!("CARGO_PKG_VERSION")),
            },
            archive: ArchiveConfig {
                max_concurrent_downloads: 4,
                default_extension: "jpg".to_string(),
            },
            catalog: CatalogConfig {
                languages: vec!["en".to_string(), "ja".to_string()],
            },
            sources,
        }
    }
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            search_path: "/search?keyword=".to_string(),
            search_item: ".film-list .flw-item".to_string(),
            search_link: ".film-name a".to_string(),
            chapter_item: ".manga-chapter .mc-item".to_string(),
            chapter_link: ".chapter-name".to_string(),
            image: ".read-content img".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cover_base_url: "https://uploads.mangadex.org".to_string(),
            placeholder_cover: "https://via.placeholder.com/256x362?text=No+Cover".to_string(),
            search_limit: 20,
            feed_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.default_source, "mangadex");
        assert_eq!(config.catalog.languages, vec!["en", "ja"]);
        assert_eq!(config.archive.default_extension, "jpg");
        assert!(config.get_site_config("mangafire").is_some());
        assert_eq!(config.get_site_config("mangadex").unwrap().kind, SourceKind::Api);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
default_source = "mangafire"

[archive]
max_concurrent_downloads = 8

[catalog]
languages = ["fr"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_source, "mangafire");
        assert_eq!(config.archive.max_concurrent_downloads, 8);
        assert_eq!(config.archive.default_extension, "jpg");
        assert_eq!(config.catalog.languages, vec!["fr"]);
        assert_eq!(config.http.timeout_secs, 15);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save(&path).unwrap();

        let config = Config::load(&path).unwrap();
        let site = config.get_site_config("mangafire").unwrap();
        assert!(site.newest_first);
        assert_eq!(site.selectors.as_ref().unwrap().image, ".read-content img");
    }
}
