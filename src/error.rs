use thiserror::Error;

/// Cause of a failed conversation with an upstream source.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ChapterZipError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] UpstreamError),

    #[error("No images found for chapter: {0}")]
    NoImagesFound(String),

    #[error("Every image fetch failed ({attempted} attempted), archive would be empty")]
    ArchiveEmpty { attempted: usize },

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("ZIP compression error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChapterZipError {
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::UpstreamUnavailable(UpstreamError::Status {
            url: url.into(),
            status,
        })
    }

    pub fn source_not_found(name: impl Into<String>) -> Self {
        Self::SourceNotFound(name.into())
    }

    /// Whether the caller may reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for ChapterZipError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(UpstreamError::Http(err))
    }
}

impl From<serde_json::Error> for ChapterZipError {
    fn from(err: serde_json::Error) -> Self {
        Self::UpstreamUnavailable(UpstreamError::Payload(err))
    }
}

pub type Result<T> = std::result::Result<T, ChapterZipError>;
