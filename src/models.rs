use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Title shown when a source offers none.
pub const NO_TITLE: &str = "No Title";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaSummary {
    pub id_or_url: String,
    pub title: String,
    pub alt_titles: Vec<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// One entry of a chapter catalog.
///
/// `number` is a label, not a float: sources publish "Extra" or "Special"
/// chapters alongside numbered ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id_or_url: String,
    pub number: String,
    pub volume: Option<String>,
    pub title: Option<String>,
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReference {
    pub url: String,
    pub suggested_extension: Option<String>,
}

/// A finished archive, held in memory until the transport ships it.
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub attempted: usize,
    pub succeeded: usize,
}

/// Direction in which a source lists chapters natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Scraping,
    Api,
}

impl ChapterSummary {
    pub fn new(id_or_url: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id_or_url: id_or_url.into(),
            number: number.into(),
            volume: None,
            title: None,
            page_count: None,
        }
    }
}

impl ImageReference {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let suggested_extension = extension_of(&url);
        Self {
            url,
            suggested_extension,
        }
    }
}

/// Extension of the last path segment of `url`, ignoring query and fragment.
pub fn extension_of(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Scraping => f.pad("scraping"),
            SourceKind::Api => f.pad("api"),
        }
    }
}
