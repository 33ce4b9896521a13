//! Canonical in-memory document tree built by [`crate::parse_document`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of publication, as declared by the manifest `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Article,
    Opinion,
    Tutorial,
}

impl DocumentType {
    /// Matches the manifest value case-insensitively (`ARTICLE`, `opinion`, ...).
    pub fn from_manifest(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "article" => Some(Self::Article),
            "opinion" => Some(Self::Opinion),
            "tutorial" => Some(Self::Tutorial),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Opinion => "opinion",
            Self::Tutorial => "tutorial",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw source handed over by the input collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    /// `manifest.json` contents.
    pub manifest: String,
    /// Text units keyed by the path the manifest uses to reference them.
    pub texts: BTreeMap<String, String>,
    /// Metadata that does not live in the export archive.
    pub external: ExternalMetadata,
}

/// Metadata gathered outside the manifest, typically scraped from the
/// published content page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalMetadata {
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<String>,
    pub canonical_url: Option<String>,
}

/// Per-node metadata overrides. `None` means "inherit from the document".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub authors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub description: Option<String>,
    pub licence: Option<String>,
    pub published: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Container {
        introduction: Option<String>,
        conclusion: Option<String>,
        children: Vec<SourceNode>,
    },
    Extract {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub title: String,
    pub slug: String,
    pub order: u32,
    pub metadata: NodeMetadata,
    pub kind: NodeKind,
}

impl SourceNode {
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container { .. })
    }

    /// Children in ascending `order`; empty for extracts.
    pub fn children(&self) -> &[SourceNode] {
        match &self.kind {
            NodeKind::Container { children, .. } => children,
            NodeKind::Extract { .. } => &[],
        }
    }

    /// Every markdown body carried directly by this node.
    pub fn bodies(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Container {
                introduction,
                conclusion,
                ..
            } => introduction
                .iter()
                .chain(conclusion.iter())
                .map(String::as_str)
                .collect(),
            NodeKind::Extract { text } => vec![text.as_str()],
        }
    }
}

/// Root of the tree: the document itself plus its top-level children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub kind: DocumentType,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub licence: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<NaiveDateTime>,
    pub canonical_url: Option<String>,
    pub introduction: Option<String>,
    pub conclusion: Option<String>,
    pub children: Vec<SourceNode>,
}

impl SourceDocument {
    /// A flat document has only extracts below the root and becomes one page.
    pub fn is_flat(&self) -> bool {
        self.children.iter().all(|child| !child.is_container())
    }

    /// Every markdown body in the tree, root first, in traversal order.
    pub fn bodies(&self) -> Vec<&str> {
        let mut bodies: Vec<&str> = self
            .introduction
            .iter()
            .chain(self.conclusion.iter())
            .map(String::as_str)
            .collect();
        let mut stack: Vec<&SourceNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            bodies.extend(node.bodies());
            stack.extend(node.children().iter().rev());
        }
        bodies
    }
}
