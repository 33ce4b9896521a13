use std::fmt;

use crate::model::DocumentType;

/// Fatal conversion failures. Any of these aborts the run with no output.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },
    #[error("unsupported structure: {kind} nests to depth {depth}, at most {limit} is supported")]
    UnsupportedStructure {
        kind: DocumentType,
        depth: usize,
        limit: usize,
    },
    #[error("missing required metadata: {field}")]
    MissingRequiredMetadata { field: &'static str },
    #[error("unsupported manifest version {found} (only version 2 and later are supported)")]
    UnsupportedVersion { found: String },
}

impl ConversionError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }
}

/// Non-fatal issues collected while converting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionWarning {
    /// An in-document link points at an identifier no node carries.
    /// The link is left as written.
    UnresolvedLink { page: String, target: String },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionWarning::UnresolvedLink { page, target } => {
                let page = if page.is_empty() { "/" } else { page.as_str() };
                write!(f, "unresolved link {target} in page {page}")
            }
        }
    }
}

/// Append-only list of warnings returned next to a successful conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueReport {
    warnings: Vec<ConversionWarning>,
}

impl IssueReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ConversionWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = ConversionWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }
}
