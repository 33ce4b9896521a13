//! zds2grav core: pure conversion of a Zeste de Savoir document tree into
//! Grav page descriptors. No I/O happens here.
mod config;
mod convert;
mod error;
mod header;
mod media;
mod model;
mod parse;
mod project;
mod rewrite;
mod slug;

pub use config::{ConversionConfig, ARTICLE_MAX_DEPTH, DEFAULT_AUTHOR, DEFAULT_MAX_NESTING_DEPTH};
pub use convert::{convert, Conversion};
pub use error::{ConversionError, ConversionWarning, IssueReport};
pub use header::{
    build_header, format_date, grav_license, Author, HeaderSubject, PageHeader, Taxonomy,
    GRAV_DATE_FORMAT,
};
pub use media::{MediaIndex, MediaReference};
pub use model::{
    DocumentType, ExternalMetadata, NodeKind, NodeMetadata, RawDocument, SourceDocument,
    SourceNode,
};
pub use parse::parse_document;
pub use project::{
    build_link_index, numbered_segment, project, rank_width, PageDescriptor, PageRole, Projection,
};
pub use rewrite::{
    image_sources, relative_path, rewrite_body, shift_headings, LinkIndex, LinkTarget,
    RewriteContext, Rewritten,
};
pub use slug::normalize_slug;
