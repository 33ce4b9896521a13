//! Tree projector: source tree → ordered Grav page descriptors.
//!
//! Hierarchy and sibling order are encoded in directory names only: every
//! page lives in a `NN.slug` directory whose number is the node's 1-based
//! rank among its siblings.

use std::collections::{BTreeMap, BTreeSet};

use grav_logging::grav_trace;

use crate::config::ConversionConfig;
use crate::error::{ConversionError, ConversionWarning};
use crate::header::{build_header, HeaderSubject, PageHeader};
use crate::media::{MediaIndex, MediaReference};
use crate::model::{NodeKind, SourceDocument, SourceNode};
use crate::rewrite::{rewrite_body, shift_headings, LinkIndex, LinkTarget, RewriteContext};
use crate::slug::normalize_slug;

const MIN_RANK_WIDTH: usize = 2;
const SECTION_RULE: &str = "\n\n\n------\n\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRole {
    /// The whole document: a flat article, or the landing page of a
    /// sectioned one.
    Document,
    Container,
    Extract,
}

/// One output page, ready for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub path_segments: Vec<String>,
    pub role: PageRole,
    pub header: PageHeader,
    pub body: String,
    pub assets: BTreeSet<MediaReference>,
}

impl PageDescriptor {
    /// Segments joined with `/`; empty for the landing page.
    pub fn path(&self) -> String {
        self.path_segments.join("/")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub pages: Vec<PageDescriptor>,
    pub warnings: Vec<ConversionWarning>,
}

/// Directory name for the sibling at 1-based `rank`.
pub fn numbered_segment(rank: usize, width: usize, slug: &str) -> String {
    format!("{rank:0width$}.{slug}")
}

/// Zero-padding width for a group of `count` siblings.
pub fn rank_width(count: usize) -> usize {
    count.to_string().len().max(MIN_RANK_WIDTH)
}

fn sorted_children(children: &[SourceNode]) -> Vec<&SourceNode> {
    let mut sorted: Vec<&SourceNode> = children.iter().collect();
    sorted.sort_by_key(|child| child.order);
    sorted
}

/// Stack frame of the depth-first walks below.
struct Visit<'a> {
    node: &'a SourceNode,
    segments: Vec<String>,
    position: Vec<usize>,
}

fn child_visits<'a>(
    children: &'a [SourceNode],
    parent_segments: &[String],
    parent_position: &[usize],
) -> Vec<Visit<'a>> {
    let sorted = sorted_children(children);
    let width = rank_width(sorted.len());
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, node)| {
            let mut segments = parent_segments.to_vec();
            segments.push(numbered_segment(index + 1, width, &node.slug));
            let mut position = parent_position.to_vec();
            position.push(index + 1);
            Visit {
                node,
                segments,
                position,
            }
        })
        .collect()
}

/// Pre-order walk over every node below the root, siblings in ascending
/// `order`. Uses an explicit stack; depth is already bounded by the parser.
fn walk(document: &SourceDocument) -> Vec<Visit<'_>> {
    let mut visits = Vec::new();
    let mut stack: Vec<Visit<'_>> = child_visits(&document.children, &[], &[]);
    stack.reverse();
    while let Some(visit) = stack.pop() {
        let mut children = child_visits(visit.node.children(), &visit.segments, &visit.position);
        children.reverse();
        stack.extend(children);
        visits.push(visit);
    }
    visits
}

fn flat_page_segments(document: &SourceDocument) -> Vec<String> {
    vec![numbered_segment(1, MIN_RANK_WIDTH, &document.slug)]
}

fn heading_anchor(node: &SourceNode) -> String {
    let anchor = normalize_slug(&node.title);
    if anchor.is_empty() {
        node.slug.clone()
    } else {
        anchor
    }
}

/// Repeated headings of one page get `-1`, `-2`, ... in document order, the
/// way Markdown renderers number duplicate heading ids.
fn unique_anchor(base: String, uses: &mut BTreeMap<String, usize>) -> String {
    let seen = uses.entry(base.clone()).or_default();
    let anchor = match *seen {
        0 => base,
        n => format!("{base}-{n}"),
    };
    *seen += 1;
    anchor
}

/// Map every legacy identifier of the document onto its projected location.
///
/// Nodes are known by their slug (only when no other node shares it) and by
/// the positional anchor the platform renders, such as `2-1-details` for the
/// first child of the second top-level section.
pub fn build_link_index(document: &SourceDocument) -> LinkIndex {
    let flat = document.is_flat();
    let flat_segments = flat_page_segments(document);
    let visits = walk(document);

    let mut slug_uses: BTreeMap<&str, usize> = BTreeMap::new();
    for visit in &visits {
        *slug_uses.entry(visit.node.slug.as_str()).or_default() += 1;
    }

    let mut anchor_uses: BTreeMap<String, usize> = BTreeMap::new();
    let mut index = LinkIndex::new();
    for visit in &visits {
        let target = if flat {
            LinkTarget {
                segments: flat_segments.clone(),
                anchor: Some(unique_anchor(heading_anchor(visit.node), &mut anchor_uses)),
            }
        } else {
            LinkTarget {
                segments: visit.segments.clone(),
                anchor: None,
            }
        };
        let positional = visit
            .position
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("-");
        index.insert(format!("{positional}-{}", visit.node.slug), target.clone());
        if slug_uses.get(visit.node.slug.as_str()) == Some(&1) {
            index.insert(visit.node.slug.clone(), target);
        }
    }
    index
}

/// Shared state of one projection run.
struct Projector<'a> {
    document: &'a SourceDocument,
    media: &'a MediaIndex,
    links: LinkIndex,
    config: &'a ConversionConfig,
    warnings: Vec<ConversionWarning>,
}

impl Projector<'_> {
    fn rewrite(
        &mut self,
        body: &str,
        page: &[String],
        assets: &mut BTreeSet<MediaReference>,
    ) -> String {
        let rewritten = rewrite_body(
            body,
            RewriteContext {
                links: &self.links,
                media: self.media,
                page,
            },
        );
        assets.extend(rewritten.assets);
        self.warnings.extend(rewritten.warnings);
        rewritten.body
    }

    /// Introduction, then the conclusion after a horizontal rule.
    fn sections(
        &mut self,
        introduction: Option<&str>,
        conclusion: Option<&str>,
        page: &[String],
        assets: &mut BTreeSet<MediaReference>,
    ) -> String {
        let mut body = String::new();
        if let Some(introduction) = introduction {
            body.push_str(&self.rewrite(introduction, page, assets));
        }
        if let Some(conclusion) = conclusion {
            body.push_str(SECTION_RULE);
            body.push_str(&self.rewrite(conclusion, page, assets));
        }
        body.trim().to_string()
    }

    fn page(
        &self,
        path_segments: Vec<String>,
        role: PageRole,
        subject: HeaderSubject<'_>,
        body: String,
        assets: BTreeSet<MediaReference>,
    ) -> Result<PageDescriptor, ConversionError> {
        let header = build_header(self.document, subject, !path_segments.is_empty(), self.config)?;
        grav_trace!("projected /{} ({:?})", path_segments.join("/"), role);
        Ok(PageDescriptor {
            path_segments,
            role,
            header,
            body,
            assets,
        })
    }

    fn flat(&mut self) -> Result<Vec<PageDescriptor>, ConversionError> {
        let document = self.document;
        let segments = flat_page_segments(document);
        let mut assets = BTreeSet::new();

        let mut body = match document.introduction.as_deref() {
            Some(introduction) => self.rewrite(introduction, &segments, &mut assets),
            None => String::new(),
        };
        for extract in sorted_children(&document.children) {
            body.push_str("\n\n\n# ");
            body.push_str(&extract.title);
            body.push_str("\n\n");
            for text in extract.bodies() {
                let rewritten = self.rewrite(text, &segments, &mut assets);
                body.push_str(&shift_headings(&rewritten));
            }
        }
        if let Some(conclusion) = document.conclusion.as_deref() {
            body.push_str(SECTION_RULE);
            body.push_str(&self.rewrite(conclusion, &segments, &mut assets));
        }

        let page = self.page(
            segments,
            PageRole::Document,
            HeaderSubject::Document,
            body.trim().to_string(),
            assets,
        )?;
        Ok(vec![page])
    }

    fn sectioned(&mut self) -> Result<Vec<PageDescriptor>, ConversionError> {
        let document = self.document;
        let mut pages = Vec::new();

        if document.introduction.is_some() || document.conclusion.is_some() {
            let mut assets = BTreeSet::new();
            let body = self.sections(
                document.introduction.as_deref(),
                document.conclusion.as_deref(),
                &[],
                &mut assets,
            );
            pages.push(self.page(
                Vec::new(),
                PageRole::Document,
                HeaderSubject::Document,
                body,
                assets,
            )?);
        }

        for visit in walk(document) {
            let mut assets = BTreeSet::new();
            let (role, body) = match &visit.node.kind {
                NodeKind::Container {
                    introduction,
                    conclusion,
                    ..
                } => {
                    let body = self.sections(
                        introduction.as_deref(),
                        conclusion.as_deref(),
                        &visit.segments,
                        &mut assets,
                    );
                    (PageRole::Container, body)
                }
                NodeKind::Extract { text } => {
                    let body = self.rewrite(text, &visit.segments, &mut assets);
                    (PageRole::Extract, body)
                }
            };
            pages.push(self.page(
                visit.segments,
                role,
                HeaderSubject::Node(visit.node),
                body,
                assets,
            )?);
        }
        Ok(pages)
    }
}

/// Project the document onto Grav pages.
///
/// A flat document (only extracts below the root) becomes exactly one page
/// at `01.<document slug>`. A sectioned document becomes one index page per
/// container and one page per extract nested beneath it, preceded by a
/// landing page when the root has an introduction or a conclusion.
pub fn project(
    document: &SourceDocument,
    media: &MediaIndex,
    config: &ConversionConfig,
) -> Result<Projection, ConversionError> {
    let mut projector = Projector {
        document,
        media,
        links: build_link_index(document),
        config,
        warnings: Vec::new(),
    };
    let pages = if document.is_flat() {
        projector.flat()?
    } else {
        projector.sectioned()?
    };
    Ok(Projection {
        pages,
        warnings: projector.warnings,
    })
}
