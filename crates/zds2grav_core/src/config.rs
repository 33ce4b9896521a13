use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTHOR: &str = "Anonymous";
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 3;

/// Articles and opinions are either flat or sectioned once.
pub const ARTICLE_MAX_DEPTH: usize = 2;

/// Options that influence fallback metadata and structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub default_author: String,
    pub default_licence: Option<String>,
    pub max_nesting_depth: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_author: DEFAULT_AUTHOR.to_string(),
            default_licence: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ConversionConfig {
    /// Deepest node level accepted for a document of the given type.
    pub fn depth_limit(&self, kind: crate::DocumentType) -> usize {
        match kind {
            crate::DocumentType::Tutorial => self.max_nesting_depth,
            crate::DocumentType::Article | crate::DocumentType::Opinion => {
                ARTICLE_MAX_DEPTH.min(self.max_nesting_depth)
            }
        }
    }
}
