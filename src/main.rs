use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{info, warn};

mod archive;
mod catalog;
mod config;
mod error;
mod images;
mod models;
mod pipeline;
mod registry;
mod sources;
mod traits;
mod utils;

#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::error::ChapterZipError;
use crate::pipeline::ChapterPipeline;
use crate::registry::SourceRegistry;

#[derive(Parser)]
#[command(name = "chapterzip")]
#[command(about = "Search manga sources and download chapters as zip archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a source for manga
    Search {
        /// Search text
        query: String,
        /// Source name from config (defaults to `default_source`)
        #[arg(short, long)]
        source: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the chapters of a manga, oldest first
    Chapters {
        /// Manga id or URL as returned by `search`
        manga_ref: String,
        #[arg(short, long)]
        source: Option<String>,
        /// Preferred languages in order, e.g. `-l en -l ja`
        #[arg(short, long = "lang")]
        langs: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Download a chapter as a zip archive
    Download {
        /// Chapter id or URL as returned by `chapters`
        chapter_ref: String,
        /// Manga title used to name the archive
        #[arg(short, long, default_value = "Manga")]
        title: String,
        /// Chapter label used to name the archive
        #[arg(short = 'n', long, default_value = "")]
        chapter: String,
        #[arg(short, long)]
        source: Option<String>,
        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// List configured sources
    Sources,
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    if let Err(err) = run(cli).await {
        if err.downcast_ref::<ChapterZipError>().map_or(false, ChapterZipError::is_retryable) {
            warn!("The source could not be reached, try again later");
        }
        return Err(err);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        return run_init(&cli.config);
    }

    let config = Config::load(&cli.config)?;
    let registry = SourceRegistry::from_config(&config)?;

    match cli.command {
        Commands::Init => {}
        Commands::Search { query, source, json } => {
            let pipeline = pipeline_for(&registry, &config, source.as_deref())?;
            run_search(&pipeline, &query, json).await?;
        }
        Commands::Chapters { manga_ref, source, langs, json } => {
            let pipeline = pipeline_for(&registry, &config, source.as_deref())?;
            run_chapters(&pipeline, &manga_ref, &langs, json).await?;
        }
        Commands::Download { chapter_ref, title, chapter, source, output } => {
            let pipeline = pipeline_for(&registry, &config, source.as_deref())?;
            run_download(&pipeline, &chapter_ref, &title, &chapter, &output).await?;
        }
        Commands::Sources => show_sources(&config, &registry),
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("chapterzip={}", level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn pipeline_for(registry: &SourceRegistry, config: &Config, source: Option<&str>) -> Result<ChapterPipeline> {
    let name = source.unwrap_or(&config.default_source);
    Ok(ChapterPipeline::for_source(registry, name, config)?)
}

fn run_init(config_path: &str) -> Result<()> {
    if std::path::Path::new(config_path).exists() {
        warn!("{} already exists, leaving it untouched", config_path);
        return Ok(());
    }

    Config::default().save(config_path)?;
    info!("Wrote default configuration to {}", config_path);
    Ok(())
}

async fn run_search(pipeline: &ChapterPipeline, query: &str, json: bool) -> Result<()> {
    let results = pipeline.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matches for '{}' on {}", query, pipeline.source_name());
        return Ok(());
    }

    println!("{:<40} {}", "Title", "Reference");
    println!("{}", "-".repeat(80));
    for manga in results {
        println!("{:<40} {}", manga.title, manga.id_or_url);
    }

    Ok(())
}

async fn run_chapters(pipeline: &ChapterPipeline, manga_ref: &str, langs: &[String], json: bool) -> Result<()> {
    let chapters = pipeline.list_chapters(manga_ref, langs).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chapters)?);
        return Ok(());
    }

    if chapters.is_empty() {
        println!("No chapters available for {}", manga_ref);
        return Ok(());
    }

    println!("{:<8} {:<14} {:<30} {}", "Volume", "Chapter", "Title", "Reference");
    println!("{}", "-".repeat(90));
    for chapter in chapters {
        println!(
            "{:<8} {:<14} {:<30} {}",
            chapter.volume.unwrap_or_default(),
            chapter.number,
            chapter.title.unwrap_or_default(),
            chapter.id_or_url
        );
    }

    Ok(())
}

async fn run_download(
    pipeline: &ChapterPipeline,
    chapter_ref: &str,
    title: &str,
    chapter: &str,
    output: &std::path::Path,
) -> Result<()> {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let result = pipeline
        .build_archive_with_progress(chapter_ref, title, chapter, progress)
        .await?;

    tokio::fs::create_dir_all(output).await?;
    let path = output.join(&result.filename);
    tokio::fs::write(&path, &result.bytes).await?;

    if result.succeeded < result.attempted {
        warn!(
            "{} of {} pages could not be downloaded",
            result.attempted - result.succeeded,
            result.attempted
        );
    }
    println!(
        "✅ Saved {} ({}/{} pages)",
        path.display(),
        result.succeeded,
        result.attempted
    );

    Ok(())
}

fn show_sources(config: &Config, registry: &SourceRegistry) {
    println!("{:<14} {:<10} {:<12} {}", "Name", "Kind", "Display", "Base URL");
    println!("{}", "-".repeat(70));
    for name in registry.names() {
        if let Some(site) = config.get_site_config(name) {
            let marker = if name == config.default_source { " (default)" } else { "" };
            println!(
                "{:<14} {:<10} {:<12} {}{}",
                name, site.kind, site.name, site.base_url, marker
            );
        }
    }
}
