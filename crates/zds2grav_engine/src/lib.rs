//! zds2grav engine: loading sources, retrieving media and writing Grav pages.
mod archive;
mod decode;
mod engine;
mod fetch;
mod filename;
mod frontmatter;
mod media;
mod persist;
mod scrape;
mod source;
mod types;

pub use archive::{read_archive, read_archive_file, ArchiveError, ExportArchive};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use engine::{
    default_platform_url, document_root, Engine, EngineError, EngineSettings, OutputOptions,
};
pub use fetch::{FetchSettings, Fetcher, LogProgressSink, ProgressSink, ReqwestFetcher};
pub use filename::{page_filename, sanitize_component, DEFAULT_TEMPLATE};
pub use frontmatter::{build_markdown_document, FrontMatterError};
pub use media::{collect_media, locate, MediaBatch, MediaLocation, DEFAULT_MEDIA_WORKERS};
pub use persist::{prepare_dir, PageDirWriter, PersistError};
pub use scrape::{scrape_content_page, ContentPage, ScrapeError};
pub use source::{load_source, LoadedSource, SourceLocator, DEFAULT_PLATFORM_URL};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchKind, FetchMetadata, FetchOutput, RunSummary,
    Stage, StageProgress,
};
