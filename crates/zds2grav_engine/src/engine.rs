use std::path::{Path, PathBuf};
use std::sync::Arc;

use grav_logging::grav_info;
use url::Url;
use zds2grav_core::{convert, ConversionConfig, ConversionError, PageDescriptor};

use crate::archive::ArchiveError;
use crate::decode::DecodeError;
use crate::fetch::{FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
use crate::filename::{page_filename, sanitize_component, DEFAULT_TEMPLATE};
use crate::frontmatter::{build_markdown_document, FrontMatterError};
use crate::media::{collect_media, MediaBatch, DEFAULT_MEDIA_WORKERS};
use crate::persist::{PageDirWriter, PersistError};
use crate::scrape::ScrapeError;
use crate::source::{load_source, SourceLocator, DEFAULT_PLATFORM_URL};
use crate::{EngineEvent, FetchError, RunSummary, Stage, StageProgress};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("cannot fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("invalid source {input}: {reason}")]
    InvalidSource { input: String, reason: String },
    #[error("cannot start the async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Where and how pages are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Parent of the document directory; defaults per source kind.
    pub to: Option<PathBuf>,
    /// Name of the document directory; defaults to the document slug.
    pub slug: Option<String>,
    pub template_name: String,
    pub lang: Option<String>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            to: None,
            slug: None,
            template_name: DEFAULT_TEMPLATE.to_string(),
            lang: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub platform_url: Url,
    pub fetch: FetchSettings,
    pub media_workers: usize,
    pub conversion: ConversionConfig,
    pub output: OutputOptions,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            platform_url: default_platform_url(),
            fetch: FetchSettings::default(),
            media_workers: DEFAULT_MEDIA_WORKERS,
            conversion: ConversionConfig::default(),
            output: OutputOptions::default(),
        }
    }
}

pub fn default_platform_url() -> Url {
    Url::parse(DEFAULT_PLATFORM_URL).expect("platform url constant")
}

/// Converts one source into a Grav page tree on disk.
pub struct Engine {
    settings: EngineSettings,
    fetcher: Arc<dyn Fetcher>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch.clone()));
        Self { settings, fetcher }
    }

    pub fn with_fetcher(settings: EngineSettings, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { settings, fetcher }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run [`Engine::run`] on a runtime owned by this call.
    pub fn run_blocking(&self, source: &str, sink: &dyn ProgressSink) -> Result<RunSummary, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        runtime.block_on(self.run(source, sink))
    }

    /// Load, convert, retrieve media, then write.
    ///
    /// Nothing touches the disk until the conversion has succeeded and every
    /// page has been rendered.
    pub async fn run(&self, source: &str, sink: &dyn ProgressSink) -> Result<RunSummary, EngineError> {
        let settings = &self.settings;
        let locator = SourceLocator::parse(source, &settings.platform_url)?;
        let loaded = load_source(&locator, &settings.platform_url, self.fetcher.as_ref(), sink).await?;

        sink.emit(EngineEvent::Progress(StageProgress::new(Stage::Converting)));
        let conversion = convert(&loaded.raw, &settings.conversion)?;

        let filename = page_filename(&settings.output.template_name, settings.output.lang.as_deref());
        let rendered = conversion
            .pages
            .iter()
            .map(|page| Ok((page, build_markdown_document(&page.header, &page.body)?)))
            .collect::<Result<Vec<_>, EngineError>>()?;

        sink.emit(EngineEvent::Progress(StageProgress::with_detail(
            Stage::FetchingMedia,
            format!("{} images", conversion.media.len()),
        )));
        let media = collect_media(
            &conversion.media,
            Some(&loaded.archive),
            &settings.platform_url,
            self.fetcher.as_ref(),
            settings.media_workers,
            sink,
        )
        .await;

        let root = document_root(&locator, &settings.output, &conversion.document.slug);
        sink.emit(EngineEvent::Progress(StageProgress::with_detail(
            Stage::Writing,
            root.display().to_string(),
        )));
        let mut media_written = 0;
        for (page, document) in &rendered {
            media_written += write_page(&root, page, &filename, document, &media)?;
        }

        let summary = RunSummary {
            root,
            pages_written: rendered.len(),
            media_written,
            media_skipped: media.skipped.len(),
            warnings: conversion.report.len(),
        };
        grav_info!(
            "{} pages written, {} warnings",
            summary.pages_written,
            summary.warnings
        );
        sink.emit(EngineEvent::Completed(summary.clone()));
        sink.emit(EngineEvent::Progress(StageProgress::new(Stage::Done)));
        Ok(summary)
    }
}

/// `<to>/<slug>`, see [`OutputOptions`].
pub fn document_root(locator: &SourceLocator, output: &OutputOptions, document_slug: &str) -> PathBuf {
    let parent = output
        .to
        .clone()
        .unwrap_or_else(|| locator.default_output_parent());
    let slug = match output.slug.as_deref() {
        Some(slug) => sanitize_component(slug, document_slug),
        None => document_slug.to_string(),
    };
    parent.join(slug)
}

/// Write one page file and its co-located images; returns how many images
/// were written.
fn write_page(
    root: &Path,
    page: &PageDescriptor,
    filename: &str,
    document: &str,
    media: &MediaBatch,
) -> Result<usize, EngineError> {
    let dir = page
        .path_segments
        .iter()
        .fold(root.to_path_buf(), |dir, segment| dir.join(segment));
    let writer = PageDirWriter::create(dir)?;
    writer.write(filename, document)?;

    let mut written = 0;
    for asset in &page.assets {
        if let Some(bytes) = media.files.get(&asset.resolved_name) {
            writer.write(&asset.resolved_name, bytes)?;
            written += 1;
        }
    }
    Ok(written)
}
