//! Per-page metadata header generation.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::ConversionConfig;
use crate::error::ConversionError;
use crate::model::{SourceDocument, SourceNode};

/// Grav's default date format (`system.yaml` → `pages.dateformat.default`).
pub const GRAV_DATE_FORMAT: &str = "%H:%M %d-%m-%Y";

/// Front matter of one Grav page. Field names follow Grav's page headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageHeader {
    pub title: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub taxonomy: Taxonomy,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    pub tag: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
}

/// Which part of the tree a page stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSubject<'a> {
    /// The document as a whole: the flat page, or the landing page of a
    /// sectioned document.
    Document,
    Node(&'a SourceNode),
}

/// Build the header of a page.
///
/// Node values win over document values, which win over the configured
/// defaults. `visible` is true for pages that sit in a numbered directory.
pub fn build_header(
    document: &SourceDocument,
    subject: HeaderSubject<'_>,
    numbered: bool,
    config: &ConversionConfig,
) -> Result<PageHeader, ConversionError> {
    if document.title.trim().is_empty() {
        return Err(ConversionError::MissingRequiredMetadata { field: "title" });
    }

    let node = match subject {
        HeaderSubject::Document => None,
        HeaderSubject::Node(node) => Some(&node.metadata),
    };

    let authors = node
        .and_then(|meta| meta.authors.clone())
        .unwrap_or_else(|| document.authors.clone());
    let tags = node
        .and_then(|meta| meta.tags.clone())
        .unwrap_or_else(|| document.tags.clone());
    let categories = node
        .and_then(|meta| meta.categories.clone())
        .unwrap_or_else(|| document.categories.clone());
    let published = node
        .and_then(|meta| meta.published)
        .or(document.published);
    let licence = node
        .and_then(|meta| meta.licence.clone())
        .or_else(|| document.licence.clone())
        .or_else(|| config.default_licence.clone());

    let (title, summary, canonical) = match subject {
        HeaderSubject::Document => (
            document.title.clone(),
            document.description.clone(),
            document.canonical_url.clone(),
        ),
        HeaderSubject::Node(node) => (
            node.title.clone(),
            node.metadata
                .description
                .clone()
                .or_else(|| document.description.clone()),
            None,
        ),
    };

    let author_name = if authors.is_empty() {
        config.default_author.clone()
    } else {
        authors.join(", ")
    };

    Ok(PageHeader {
        title,
        summary,
        taxonomy: Taxonomy {
            tag: tags,
            category: categories,
            author: authors,
        },
        author: Author { name: author_name },
        date: published.map(format_date),
        license: licence.map(|l| grav_license(&l)),
        visible: numbered,
        canonical,
    })
}

pub fn format_date(date: NaiveDateTime) -> String {
    date.format(GRAV_DATE_FORMAT).to_string()
}

/// Shorten Creative Commons licences (`CC BY-SA` → `by-sa`); other licences
/// pass through unchanged.
pub fn grav_license(licence: &str) -> String {
    let licence = licence.trim();
    if !licence.starts_with("CC") {
        return licence.to_string();
    }
    let lower = licence.to_lowercase();
    match lower.strip_prefix("cc ") {
        Some(short) => short.trim().to_string(),
        None => lower,
    }
}
