//! Locating and loading the document to convert.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use grav_logging::grav_info;
use url::Url;
use zds2grav_core::{ExternalMetadata, RawDocument};

use crate::archive::{read_archive, read_archive_file, ExportArchive};
use crate::decode::decode_text;
use crate::fetch::{Fetcher, ProgressSink};
use crate::scrape::scrape_content_page;
use crate::{EngineError, EngineEvent, FetchKind, Stage, StageProgress};

pub const DEFAULT_PLATFORM_URL: &str = "https://zestedesavoir.com";

/// What the user pointed the converter at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// A published content page on the platform.
    Remote(Url),
    /// An export archive on disk.
    Local(PathBuf),
}

impl SourceLocator {
    /// `http(s)://` arguments must live on `platform`; anything else is a
    /// path to a local archive.
    pub fn parse(arg: &str, platform: &Url) -> Result<Self, EngineError> {
        let arg = arg.trim();
        let lower = arg.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Ok(Self::Local(PathBuf::from(arg)));
        }

        let url = Url::parse(arg).map_err(|err| EngineError::InvalidSource {
            input: arg.to_string(),
            reason: err.to_string(),
        })?;
        let same_origin = url.scheme() == platform.scheme()
            && url.host_str() == platform.host_str()
            && url.port_or_known_default() == platform.port_or_known_default();
        if !same_origin || !url.path().starts_with(platform.path()) {
            return Err(EngineError::InvalidSource {
                input: arg.to_string(),
                reason: format!("only content published on {platform} can be fetched"),
            });
        }
        Ok(Self::Remote(url))
    }

    /// Directory the document tree lands in when none is given: next to a
    /// local archive, or the working directory for remote content.
    pub fn default_output_parent(&self) -> PathBuf {
        match self {
            Self::Local(path) => path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            Self::Remote(_) => PathBuf::from("."),
        }
    }
}

/// A source ready for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub raw: RawDocument,
    pub archive: ExportArchive,
}

pub async fn load_source(
    locator: &SourceLocator,
    platform: &Url,
    fetcher: &dyn Fetcher,
    sink: &dyn ProgressSink,
) -> Result<LoadedSource, EngineError> {
    match locator {
        SourceLocator::Local(path) => {
            sink.emit(EngineEvent::Progress(StageProgress::with_detail(
                Stage::Unpacking,
                path.display().to_string(),
            )));
            let archive = read_archive_file(path)?;
            Ok(assemble(archive, ExternalMetadata::default()))
        }
        SourceLocator::Remote(url) => load_remote(url, platform, fetcher, sink).await,
    }
}

async fn load_remote(
    url: &Url,
    platform: &Url,
    fetcher: &dyn Fetcher,
    sink: &dyn ProgressSink,
) -> Result<LoadedSource, EngineError> {
    sink.emit(EngineEvent::Progress(StageProgress::with_detail(
        Stage::Downloading,
        url.to_string(),
    )));
    let page = fetcher
        .fetch(url.as_str(), FetchKind::Page, sink)
        .await
        .map_err(|source| EngineError::Fetch {
            url: url.to_string(),
            source,
        })?;
    let html = decode_text(&page.bytes, page.metadata.content_type.as_deref())?;

    sink.emit(EngineEvent::Progress(StageProgress::new(Stage::Scraping)));
    let content = scrape_content_page(&html.text, platform)?;
    grav_info!("downloading content archive from {}", content.download_link);

    let download = fetcher
        .fetch(&content.download_link, FetchKind::Archive, sink)
        .await
        .map_err(|source| EngineError::Fetch {
            url: content.download_link.clone(),
            source,
        })?;

    sink.emit(EngineEvent::Progress(StageProgress::new(Stage::Unpacking)));
    let archive = read_archive(Cursor::new(download.bytes))?;
    let external = ExternalMetadata {
        authors: content.authors,
        tags: content.tags,
        categories: content.categories,
        published: content.published,
        canonical_url: Some(url.to_string()),
    };
    Ok(assemble(archive, external))
}

fn assemble(archive: ExportArchive, external: ExternalMetadata) -> LoadedSource {
    let raw = RawDocument {
        manifest: archive.manifest.clone(),
        texts: archive.texts.clone(),
        external,
    };
    LoadedSource { raw, archive }
}
