use crate::config::ArchiveConfig;
use crate::error::{ChapterZipError, Result};
use crate::models::{ArchiveResult, ImageReference};
use crate::utils::HttpClient;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::io::{Cursor, Seek, Write};
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAX_TITLE_CHARS: usize = 50;

/// Source of raw image bytes.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
impl ImageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStats {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Fetches page images and packs them into a zip archive.
///
/// Fetches run concurrently up to `max_concurrent_downloads`, but entries are
/// written strictly in reference order: entry `NNN` is always reference `NNN`.
/// A page that cannot be fetched is skipped and counted, never fatal, unless
/// every page fails.
pub struct ArchiveBuilder<F> {
    fetcher: F,
    max_concurrent: usize,
    default_extension: String,
    progress: ProgressBar,
}

impl<F: ImageFetcher> ArchiveBuilder<F> {
    pub fn new(fetcher: F, config: &ArchiveConfig) -> Self {
        Self {
            fetcher,
            max_concurrent: config.max_concurrent_downloads.max(1),
            default_extension: config.default_extension.clone(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Builds the whole archive in memory.
    pub async fn build(
        &self,
        images: &[ImageReference],
        title: &str,
        chapter_label: &str,
    ) -> Result<ArchiveResult> {
        let (cursor, stats) = self.build_into(images, Cursor::new(Vec::new())).await?;

        Ok(ArchiveResult {
            bytes: cursor.into_inner(),
            filename: archive_filename(title, chapter_label),
            attempted: stats.attempted,
            succeeded: stats.succeeded,
        })
    }

    /// Streams the archive into `sink` and hands the sink back once the
    /// central directory is written.
    ///
    /// Dropping the returned future stops further fetches; bytes already
    /// written to `sink` stay as they are.
    pub async fn build_into<W: Write + Seek>(
        &self,
        images: &[ImageReference],
        sink: W,
    ) -> Result<(W, ArchiveStats)> {
        let mut zip = ZipWriter::new(sink);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut stats = ArchiveStats {
            attempted: 0,
            succeeded: 0,
        };

        self.progress.set_length(images.len() as u64);

        let mut fetches = stream::iter(images.iter().enumerate())
            .map(|(index, image)| async move {
                let started = Instant::now();
                let result = self.fetcher.fetch(&image.url).await;
                (index + 1, image, result, started.elapsed())
            })
            .buffered(self.max_concurrent);

        while let Some((page, image, result, elapsed)) = fetches.next().await {
            stats.attempted += 1;

            match result {
                Ok(bytes) => {
                    let name = entry_name(page, image, &self.default_extension);
                    debug!("[ARCHIVE] {} <- {} ({} bytes in {:?})", name, image.url, bytes.len(), elapsed);
                    zip.start_file(name, options)?;
                    zip.write_all(&bytes)?;
                    stats.succeeded += 1;
                }
                Err(e) => {
                    warn!("[ARCHIVE] Skipping page {} ({}) after {:?}: {}", page, image.url, elapsed, e);
                }
            }

            self.progress.inc(1);
        }

        if stats.succeeded == 0 {
            self.progress.abandon_with_message("no pages downloaded");
            return Err(ChapterZipError::ArchiveEmpty {
                attempted: stats.attempted,
            });
        }

        let sink = zip.finish()?;
        self.progress.finish_with_message("archive ready");
        info!(
            "[ARCHIVE] Packed {}/{} pages",
            stats.succeeded, stats.attempted
        );

        Ok((sink, stats))
    }
}

/// `NNN.ext`, taking `ext` from the reference hint, else the default.
fn entry_name(page: usize, image: &ImageReference, default_extension: &str) -> String {
    let extension = image
        .suggested_extension
        .as_deref()
        .unwrap_or(default_extension);
    format!("{:03}.{}", page, extension)
}

/// Download filename for a chapter archive.
///
/// Only alphanumerics, spaces, `_` and `-` survive; the title is cut to 50
/// characters and runs of whitespace become `_`.
pub fn archive_filename(title: &str, chapter_label: &str) -> String {
    let mut title = sanitize(title, Some(MAX_TITLE_CHARS));
    if title.is_empty() {
        title = "manga".to_string();
    }

    let chapter = sanitize(chapter_label, None);
    if chapter.is_empty() {
        format!("{}.zip", title)
    } else {
        format!("{}_{}.zip", title, chapter)
    }
}

fn sanitize(text: &str, max_chars: Option<usize>) -> String {
    let kept = text
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'));
    let kept: String = match max_chars {
        Some(limit) => kept.take(limit).collect(),
        None => kept.collect(),
    };

    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::{HashMap, HashSet};
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves `url` as its own bytes, after a per-url delay.
    struct FakeFetcher {
        failing: HashSet<String>,
        delays: HashMap<String, u64>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                failing: HashSet::new(),
                delays: HashMap::new(),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if let Some(ms) = self.delays.get(url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(url) {
                return Err(ChapterZipError::status(url, 404));
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    fn refs(urls: &[String]) -> Vec<ImageReference> {
        urls.iter().map(|u| ImageReference::new(u.clone())).collect()
    }

    fn entries(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = String::new();
                file.read_to_string(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    fn builder(fetcher: FakeFetcher, concurrency: usize) -> ArchiveBuilder<FakeFetcher> {
        let mut config = Config::default().archive;
        config.max_concurrent_downloads = concurrency;
        ArchiveBuilder::new(fetcher, &config)
    }

    #[tokio::test]
    async fn entries_follow_reference_order_under_concurrency() {
        let urls: Vec<String> = (1..=6)
            .map(|i| format!("https://cdn.example.org/p/{}.png", i))
            .collect();
        let mut fetcher = FakeFetcher::new();
        // Later pages finish first.
        for (i, url) in urls.iter().enumerate() {
            fetcher.delays.insert(url.clone(), (60 - i * 10) as u64);
        }

        let builder = builder(fetcher, 4);
        let result = builder.build(&refs(&urls), "Berserk", "1").await.unwrap();

        assert_eq!(result.attempted, 6);
        assert_eq!(result.succeeded, 6);
        let entries = entries(&result.bytes);
        assert_eq!(entries.len(), result.succeeded);
        for (i, (name, content)) in entries.iter().enumerate() {
            assert_eq!(name, &format!("{:03}.png", i + 1));
            assert_eq!(content, &urls[i]);
        }
        let peak = builder.fetcher.peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= 4, "peak concurrency was {}", peak);
    }

    #[tokio::test]
    async fn failed_pages_are_skipped_and_counted() {
        let urls: Vec<String> = vec![
            "https://cdn.example.org/1.jpg".into(),
            "https://cdn.example.org/2.jpg".into(),
            "https://cdn.example.org/3".into(),
        ];
        let mut fetcher = FakeFetcher::new();
        fetcher.failing.insert(urls[1].clone());

        let result = builder(fetcher, 2).build(&refs(&urls), "T", "2").await.unwrap();

        assert_eq!(result.attempted, 3);
        assert_eq!(result.succeeded, 2);
        let names: Vec<_> = entries(&result.bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["001.jpg", "003.jpg"]);
    }

    #[tokio::test]
    async fn all_failures_is_archive_empty() {
        let urls: Vec<String> = (1..=5).map(|i| format!("https://cdn.example.org/{}.jpg", i)).collect();
        let mut fetcher = FakeFetcher::new();
        fetcher.failing.extend(urls.iter().cloned());

        let builder = builder(fetcher, 3);
        let err = builder.build(&refs(&urls), "T", "1").await.unwrap_err();

        assert!(matches!(err, ChapterZipError::ArchiveEmpty { attempted: 5 }));
        assert_eq!(builder.fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn fetches_over_http_and_skips_bad_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/1.webp").with_body("one").create_async().await;
        server.mock("GET", "/2.webp").with_status(404).create_async().await;
        server.mock("GET", "/3").with_body("three").create_async().await;

        let config = Config::default();
        let site = config.get_site_config("mangafire").unwrap();
        let client = HttpClient::new(&config.http, site).unwrap();
        let urls: Vec<String> = ["/1.webp", "/2.webp", "/3"]
            .iter()
            .map(|p| format!("{}{}", server.url(), p))
            .collect();

        let result = ArchiveBuilder::new(client, &config.archive)
            .build(&refs(&urls), "Naruto", "700")
            .await
            .unwrap();

        assert_eq!((result.attempted, result.succeeded), (3, 2));
        assert_eq!(
            entries(&result.bytes),
            vec![
                ("001.webp".to_string(), "one".to_string()),
                ("003.jpg".to_string(), "three".to_string()),
            ]
        );
    }

    #[test]
    fn entry_extension_uses_hint_then_default() {
        let hinted = ImageReference {
            url: "https://cdn.example.org/img/77.jpg?sig=x".into(),
            suggested_extension: Some("gif".into()),
        };
        assert_eq!(entry_name(7, &hinted, "jpg"), "007.gif");

        let plain = ImageReference::new("https://cdn.example.org/img/77");
        assert_eq!(entry_name(7, &plain, "jpg"), "007.jpg");

        let from_url = ImageReference::new("https://cdn.example.org/a/0012.PNG?x=1.jpg");
        assert_eq!(entry_name(1234, &from_url, "jpg"), "1234.png");
    }

    #[tokio::test]
    async fn timed_out_page_is_skipped() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stalled = format!("http://{}/2.jpg", listener.local_addr().unwrap());
        let holder = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/1.jpg").with_body("one").create_async().await;

        let mut config = Config::default();
        config.http.timeout_secs = 1;
        let site = config.get_site_config("mangadex").unwrap();
        let client = HttpClient::new(&config.http, site).unwrap();
        let urls = vec![format!("{}/1.jpg", server.url()), stalled];

        let started = Instant::now();
        let result = ArchiveBuilder::new(client, &config.archive)
            .build(&refs(&urls), "T", "1")
            .await
            .unwrap();
        holder.abort();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!((result.attempted, result.succeeded), (2, 1));
        assert_eq!(entries(&result.bytes), vec![("001.jpg".to_string(), "one".to_string())]);
    }

    #[test]
    fn filename_is_sanitized() {
        let filename = archive_filename("Naruto: Shippuden!", "700");
        assert_eq!(filename, "Naruto_Shippuden_700.zip");

        let stem = filename.trim_end_matches(".zip");
        assert!(stem
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-')));
    }

    #[test]
    fn filename_title_is_truncated() {
        let title = "A".repeat(80);
        let filename = archive_filename(&title, "Extra/Special");
        assert_eq!(filename, format!("{}_ExtraSpecial.zip", "A".repeat(MAX_TITLE_CHARS)));
    }

    #[test]
    fn filename_survives_empty_title() {
        assert_eq!(archive_filename("!!!", "1"), "manga_1.zip");
        assert_eq!(archive_filename("One Piece", ""), "One_Piece.zip");
    }
}
