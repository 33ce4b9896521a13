//! Reader for the `.zip` export a content page offers for download.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use grav_logging::grav_debug;
use zip::ZipArchive;

use crate::decode::{decode_text, DecodeError};

const MANIFEST: &str = "manifest.json";

/// Contents of an export archive, split by use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportArchive {
    pub manifest: String,
    /// Markdown entries keyed by their in-archive path.
    pub texts: BTreeMap<String, String>,
    /// Every other file entry, kept for image lookup.
    pub media: BTreeMap<String, Vec<u8>>,
}

impl ExportArchive {
    /// Bytes of an archive entry referenced from markdown (`./img/a.png`
    /// and `img/a.png` name the same entry).
    pub fn media_entry(&self, reference: &str) -> Option<&[u8]> {
        let key = reference.trim_start_matches("./");
        self.media.get(key).map(Vec::as_slice)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot read export archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export archive has no manifest.json")]
    MissingManifest,
    #[error("cannot decode {entry}: {source}")]
    Decode {
        entry: String,
        #[source]
        source: DecodeError,
    },
}

/// Read an export archive from disk.
pub fn read_archive_file(path: &Path) -> Result<ExportArchive, ArchiveError> {
    let file = std::fs::File::open(path)?;
    read_archive(file)
}

/// Read an export archive from any [`Read`] + [`Seek`] source, such as a
/// downloaded buffer wrapped in a `Cursor`.
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<ExportArchive, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut export = ExportArchive::default();
    let mut manifest = None;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().trim_start_matches("./").to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        if name == MANIFEST {
            manifest = Some(decode_entry(&name, &bytes)?);
        } else if name.to_ascii_lowercase().ends_with(".md") {
            let text = decode_entry(&name, &bytes)?;
            export.texts.insert(name, text);
        } else {
            export.media.insert(name, bytes);
        }
    }

    export.manifest = manifest.ok_or(ArchiveError::MissingManifest)?;
    grav_debug!(
        "export archive holds {} text units and {} other files",
        export.texts.len(),
        export.media.len()
    );
    Ok(export)
}

fn decode_entry(name: &str, bytes: &[u8]) -> Result<String, ArchiveError> {
    decode_text(bytes, None)
        .map(|decoded| decoded.text)
        .map_err(|source| ArchiveError::Decode {
            entry: name.to_string(),
            source,
        })
}
