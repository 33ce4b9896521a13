//! Document model parser: manifest JSON + text units → [`SourceDocument`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use grav_logging::grav_debug;
use serde::Deserialize;

use crate::config::ConversionConfig;
use crate::error::ConversionError;
use crate::model::{
    DocumentType, NodeKind, NodeMetadata, RawDocument, SourceDocument, SourceNode,
};
use crate::slug::normalize_slug;

const MIN_MANIFEST_VERSION: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: Option<serde_json::Number>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    slug: Option<String>,
    introduction: Option<String>,
    conclusion: Option<String>,
    children: Option<Vec<RawChild>>,
    #[serde(flatten)]
    meta: RawMeta,
}

#[derive(Debug, Deserialize)]
struct RawChild {
    object: Option<String>,
    title: Option<String>,
    slug: Option<String>,
    order: Option<u32>,
    text: Option<String>,
    introduction: Option<String>,
    conclusion: Option<String>,
    children: Option<Vec<RawChild>>,
    #[serde(flatten)]
    meta: RawMeta,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    description: Option<String>,
    licence: Option<String>,
    authors: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    pubdate: Option<String>,
}

/// Build the canonical tree from a raw manifest and its text units.
///
/// Fails with [`ConversionError::MissingRequiredMetadata`] when the document
/// has no title, [`ConversionError::UnsupportedStructure`] when nesting goes
/// deeper than the document type allows, and
/// [`ConversionError::MalformedDocument`] for every other structural defect.
pub fn parse_document(
    raw: &RawDocument,
    config: &ConversionConfig,
) -> Result<SourceDocument, ConversionError> {
    let manifest: RawManifest = serde_json::from_str(&raw.manifest)
        .map_err(|err| ConversionError::malformed(format!("invalid manifest json: {err}")))?;

    if let Some(version) = &manifest.version {
        let supported = version
            .as_f64()
            .is_some_and(|value| value >= MIN_MANIFEST_VERSION);
        if !supported {
            return Err(ConversionError::UnsupportedVersion {
                found: version.to_string(),
            });
        }
    }

    let title = non_blank(manifest.title.as_deref()).ok_or(
        ConversionError::MissingRequiredMetadata { field: "title" },
    )?;
    let kind_raw = non_blank(manifest.kind.as_deref())
        .ok_or_else(|| ConversionError::malformed("document has no type"))?;
    let kind = DocumentType::from_manifest(kind_raw)
        .ok_or_else(|| ConversionError::malformed(format!("unknown document type {kind_raw}")))?;
    let slug = required_slug(manifest.slug.as_deref(), "document")?;

    let parser = TreeParser {
        texts: &raw.texts,
        kind,
        limit: config.depth_limit(kind),
    };
    let children = parser.parse_children(manifest.children.as_deref(), 1, &slug)?;

    let meta = manifest.meta;
    let external = &raw.external;
    let published = match meta.pubdate.as_deref().or(external.published.as_deref()) {
        Some(raw_date) => Some(parse_date(raw_date)?),
        None => None,
    };

    let document = SourceDocument {
        kind,
        title: title.to_string(),
        slug,
        description: meta.description.filter(|d| !d.trim().is_empty()),
        licence: meta.licence.filter(|l| !l.trim().is_empty()),
        authors: non_empty_or(meta.authors, &external.authors),
        tags: non_empty_or(meta.tags, &external.tags),
        categories: non_empty_or(meta.categories, &external.categories),
        published,
        canonical_url: external.canonical_url.clone(),
        introduction: parser.text_unit(manifest.introduction.as_deref())?,
        conclusion: parser.text_unit(manifest.conclusion.as_deref())?,
        children,
    };
    grav_debug!(
        "parsed {} '{}' with {} top-level children",
        document.kind,
        document.slug,
        document.children.len()
    );
    Ok(document)
}

struct TreeParser<'a> {
    texts: &'a BTreeMap<String, String>,
    kind: DocumentType,
    limit: usize,
}

impl TreeParser<'_> {
    /// Parse the children of a container sitting at `depth - 1`.
    ///
    /// The depth check runs before any child is visited, so recursion never
    /// exceeds `limit` frames however deep the manifest nests.
    fn parse_children(
        &self,
        raw: Option<&[RawChild]>,
        depth: usize,
        parent: &str,
    ) -> Result<Vec<SourceNode>, ConversionError> {
        let raw = raw.unwrap_or_default();
        if raw.is_empty() {
            return Err(ConversionError::malformed(format!(
                "container {parent} has no children"
            )));
        }
        if depth > self.limit {
            return Err(ConversionError::UnsupportedStructure {
                kind: self.kind,
                depth,
                limit: self.limit,
            });
        }

        // Positional orders would collide with declared ones.
        let declared = raw.iter().filter(|child| child.order.is_some()).count();
        if declared != 0 && declared != raw.len() {
            return Err(ConversionError::malformed(format!(
                "children of {parent} mix declared and positional orders: \
                 {declared} of {} declare one",
                raw.len()
            )));
        }

        let mut children = Vec::with_capacity(raw.len());
        for (index, child) in raw.iter().enumerate() {
            children.push(self.parse_node(child, index, depth, parent)?);
        }

        let mut orders = HashSet::new();
        let mut slugs = HashSet::new();
        for child in &children {
            if !orders.insert(child.order) {
                return Err(ConversionError::malformed(format!(
                    "duplicate order {} among children of {parent}",
                    child.order
                )));
            }
            if !slugs.insert(child.slug.as_str()) {
                return Err(ConversionError::malformed(format!(
                    "duplicate slug {} among children of {parent}",
                    child.slug
                )));
            }
        }
        children.sort_by_key(|child| child.order);
        Ok(children)
    }

    fn parse_node(
        &self,
        raw: &RawChild,
        index: usize,
        depth: usize,
        parent: &str,
    ) -> Result<SourceNode, ConversionError> {
        let title = non_blank(raw.title.as_deref()).ok_or_else(|| {
            ConversionError::malformed(format!("child {} of {parent} has no title", index + 1))
        })?;
        let slug = required_slug(raw.slug.as_deref(), title)?;
        let order = raw.order.unwrap_or(index as u32 + 1);

        let is_container = match raw.object.as_deref() {
            Some("container") => true,
            Some("extract") => false,
            Some(other) => {
                return Err(ConversionError::malformed(format!(
                    "node {slug} has unknown object type {other}"
                )))
            }
            None if raw.children.is_some() => true,
            None if raw.text.is_some() => false,
            None => {
                return Err(ConversionError::malformed(format!(
                    "cannot tell whether node {slug} is a container or an extract"
                )))
            }
        };

        let kind = if is_container {
            NodeKind::Container {
                introduction: self.text_unit(raw.introduction.as_deref())?,
                conclusion: self.text_unit(raw.conclusion.as_deref())?,
                children: self.parse_children(raw.children.as_deref(), depth + 1, &slug)?,
            }
        } else {
            let text = self.text_unit(raw.text.as_deref())?.ok_or_else(|| {
                ConversionError::malformed(format!("extract {slug} has no text"))
            })?;
            NodeKind::Extract { text }
        };

        Ok(SourceNode {
            title: title.to_string(),
            slug,
            order,
            metadata: node_metadata(&raw.meta)?,
            kind,
        })
    }

    /// Resolve a text unit reference; `Ok(None)` when nothing is referenced.
    fn text_unit(&self, reference: Option<&str>) -> Result<Option<String>, ConversionError> {
        let Some(reference) = reference.filter(|r| !r.trim().is_empty()) else {
            return Ok(None);
        };
        self.texts
            .get(reference)
            .map(|text| Some(text.trim().to_string()))
            .ok_or_else(|| ConversionError::malformed(format!("text unit {reference} not found")))
    }
}

fn node_metadata(meta: &RawMeta) -> Result<NodeMetadata, ConversionError> {
    let published = match meta.pubdate.as_deref() {
        Some(raw) => Some(parse_date(raw)?),
        None => None,
    };
    Ok(NodeMetadata {
        authors: meta.authors.clone().filter(|a| !a.is_empty()),
        tags: meta.tags.clone().filter(|t| !t.is_empty()),
        categories: meta.categories.clone().filter(|c| !c.is_empty()),
        description: meta.description.clone().filter(|d| !d.trim().is_empty()),
        licence: meta.licence.clone().filter(|l| !l.trim().is_empty()),
        published,
    })
}

fn required_slug(raw: Option<&str>, owner: &str) -> Result<String, ConversionError> {
    let raw = non_blank(raw)
        .ok_or_else(|| ConversionError::malformed(format!("{owner} has no slug")))?;
    let slug = normalize_slug(raw);
    if slug.is_empty() {
        return Err(ConversionError::malformed(format!(
            "slug {raw:?} of {owner} normalizes to nothing"
        )));
    }
    Ok(slug)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty_or(primary: Option<Vec<String>>, fallback: &[String]) -> Vec<String> {
    match primary {
        Some(values) if !values.is_empty() => values,
        _ => fallback.to_vec(),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` and bare `YYYY-MM-DD` dates.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDateTime, ConversionError> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.naive_local());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(date);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ConversionError::malformed(format!("invalid publication date {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(manifest: &str, texts: &[(&str, &str)]) -> RawDocument {
        RawDocument {
            manifest: manifest.to_string(),
            texts: texts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..RawDocument::default()
        }
    }

    #[test]
    fn declared_orders_sort_children() {
        let doc = parse_document(
            &raw(
                r#"{"type":"ARTICLE","title":"T","slug":"t","children":[
                    {"object":"extract","title":"B","slug":"b","order":2,"text":"b.md"},
                    {"object":"extract","title":"A","slug":"a","order":1,"text":"a.md"}]}"#,
                &[("a.md", "A"), ("b.md", "B")],
            ),
            &ConversionConfig::default(),
        )
        .unwrap();
        let slugs: Vec<_> = doc.children.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);
    }

    #[test]
    fn mixed_declared_and_positional_orders_are_refused() {
        let err = parse_document(
            &raw(
                r#"{"type":"ARTICLE","title":"T","slug":"t","children":[
                    {"object":"extract","title":"A","slug":"a","text":"a.md"},
                    {"object":"extract","title":"B","slug":"b","order":1,"text":"b.md"}]}"#,
                &[("a.md", "A"), ("b.md", "B")],
            ),
            &ConversionConfig::default(),
        )
        .unwrap_err();
        match err {
            ConversionError::MalformedDocument { reason } => {
                assert!(reason.contains("mix declared and positional orders"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn kind_is_inferred_without_object_field() {
        let doc = parse_document(
            &raw(
                r#"{"type":"opinion","title":"T","slug":"t","children":[
                    {"title":"S","slug":"s","children":[{"title":"E","slug":"e","text":"e.md"}]}]}"#,
                &[("e.md", "  body \n")],
            ),
            &ConversionConfig::default(),
        )
        .unwrap();
        assert!(doc.children[0].is_container());
        assert_eq!(
            doc.children[0].children()[0].kind,
            NodeKind::Extract {
                text: "body".to_string()
            }
        );
    }

    #[test]
    fn old_manifest_versions_are_rejected() {
        let err = parse_document(
            &raw(r#"{"version":1,"type":"ARTICLE","title":"T","slug":"t"}"#, &[]),
            &ConversionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConversionError::UnsupportedVersion {
                found: "1".to_string()
            }
        );
    }

    #[test]
    fn minor_manifest_versions_are_accepted() {
        let doc = parse_document(
            &raw(
                r#"{"version":2.1,"type":"ARTICLE","title":"T","slug":"t","children":[
                    {"object":"extract","title":"A","slug":"a","text":"a.md"}]}"#,
                &[("a.md", "A")],
            ),
            &ConversionConfig::default(),
        );
        assert!(doc.is_ok());
    }

    #[test]
    fn dates_accept_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 5, 17)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_date("2020-05-17T14:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_date("2020-05-17T14:30:00").unwrap(), expected);
        assert_eq!(
            parse_date("2020-05-17").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_date("17/05/2020").is_err());
    }

    #[test]
    fn external_metadata_fills_missing_root_fields() {
        let mut input = raw(
            r#"{"type":"ARTICLE","title":"T","slug":"t","tags":["rust"],"children":[
                {"object":"extract","title":"A","slug":"a","text":"a.md"}]}"#,
            &[("a.md", "A")],
        );
        input.external.tags = vec!["ignored".to_string()];
        input.external.authors = vec!["Clem".to_string()];
        let doc = parse_document(&input, &ConversionConfig::default()).unwrap();
        assert_eq!(doc.tags, vec!["rust".to_string()]);
        assert_eq!(doc.authors, vec!["Clem".to_string()]);
    }
}
