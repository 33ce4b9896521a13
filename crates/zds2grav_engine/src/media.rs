//! Retrieval of image bytes for resolved media references.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use grav_logging::grav_debug;
use url::Url;
use zds2grav_core::MediaReference;

use crate::archive::ExportArchive;
use crate::fetch::{Fetcher, ProgressSink};
use crate::{EngineEvent, FetchKind};

pub const DEFAULT_MEDIA_WORKERS: usize = 4;

/// Where the bytes of a reference can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    Archive(String),
    Remote(Url),
    Unavailable,
}

/// Archive entries win; absolute URLs are fetched as-is and root-relative
/// paths are joined to the platform. Other relative paths have no source.
pub fn locate(
    reference: &MediaReference,
    archive: Option<&ExportArchive>,
    platform: &Url,
) -> MediaLocation {
    let source = reference.source.as_str();
    if let Some(archive) = archive {
        if archive.media_entry(source).is_some() {
            return MediaLocation::Archive(source.trim_start_matches("./").to_string());
        }
    }
    if reference.is_remote() {
        return match Url::parse(source) {
            Ok(url) => MediaLocation::Remote(url),
            Err(_) => MediaLocation::Unavailable,
        };
    }
    if source.starts_with('/') && !source.starts_with("//") {
        if let Ok(url) = platform.join(source) {
            return MediaLocation::Remote(url);
        }
    }
    MediaLocation::Unavailable
}

/// Image bytes keyed by `resolved_name`, plus what could not be retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaBatch {
    pub files: BTreeMap<String, Vec<u8>>,
    pub skipped: Vec<String>,
}

/// Retrieve every reference with at most `workers` downloads in flight.
///
/// A failed retrieval is reported through `sink` and skipped; it never
/// aborts the batch.
pub async fn collect_media(
    references: &[MediaReference],
    archive: Option<&ExportArchive>,
    platform: &Url,
    fetcher: &dyn Fetcher,
    workers: usize,
    sink: &dyn ProgressSink,
) -> MediaBatch {
    let mut batch = MediaBatch::default();
    let mut downloads = Vec::new();

    for reference in references {
        match locate(reference, archive, platform) {
            MediaLocation::Archive(entry) => {
                if let Some(bytes) = archive.and_then(|a| a.media.get(&entry)) {
                    batch
                        .files
                        .insert(reference.resolved_name.clone(), bytes.clone());
                }
            }
            MediaLocation::Remote(url) => downloads.push((reference, url)),
            MediaLocation::Unavailable => {
                sink.emit(EngineEvent::MediaSkipped {
                    source: reference.source.clone(),
                    reason: "no known location to fetch it from".to_string(),
                });
                batch.skipped.push(reference.source.clone());
            }
        }
    }

    let results: Vec<_> = stream::iter(downloads)
        .map(|(reference, url)| async move {
            grav_debug!("downloading image {url}");
            let result = fetcher.fetch(url.as_str(), FetchKind::Media, sink).await;
            (reference, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    for (reference, result) in results {
        match result {
            Ok(output) => {
                batch
                    .files
                    .insert(reference.resolved_name.clone(), output.bytes);
            }
            Err(err) => {
                sink.emit(EngineEvent::MediaSkipped {
                    source: reference.source.clone(),
                    reason: err.to_string(),
                });
                batch.skipped.push(reference.source.clone());
            }
        }
    }
    batch.skipped.sort();
    batch
}
