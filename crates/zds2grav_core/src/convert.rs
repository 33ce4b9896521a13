use grav_logging::{grav_debug, grav_info, grav_warn, DocumentScope};

use crate::config::ConversionConfig;
use crate::error::{ConversionError, IssueReport};
use crate::media::{MediaIndex, MediaReference};
use crate::model::{RawDocument, SourceDocument};
use crate::parse::parse_document;
use crate::project::{project, PageDescriptor};
use crate::rewrite::image_sources;

/// Everything a writer needs to materialize one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub document: SourceDocument,
    /// Pages in traversal order, parents before their children.
    pub pages: Vec<PageDescriptor>,
    /// Every resolved media reference, ordered by source.
    pub media: Vec<MediaReference>,
    pub report: IssueReport,
}

/// Run the whole pipeline on one raw document.
///
/// Either the complete page set is returned or nothing is; fatal problems
/// surface before any page exists.
pub fn convert(
    raw: &RawDocument,
    config: &ConversionConfig,
) -> Result<Conversion, ConversionError> {
    let document = parse_document(raw, config)?;
    let _scope = DocumentScope::enter(document.slug.clone());

    let sources: Vec<String> = document
        .bodies()
        .into_iter()
        .flat_map(image_sources)
        .collect();
    let media = MediaIndex::resolve(sources.iter().map(String::as_str));
    grav_debug!(
        "{} image references resolved to {} files",
        sources.len(),
        media.len()
    );

    let projection = project(&document, &media, config)?;

    let mut report = IssueReport::new();
    for warning in &projection.warnings {
        grav_warn!("{warning}");
    }
    report.extend(projection.warnings);

    grav_info!(
        "{} '{}' projected onto {} pages",
        document.kind,
        document.title,
        projection.pages.len()
    );

    Ok(Conversion {
        pages: projection.pages,
        media: media.references().cloned().collect(),
        report,
        document,
    })
}
