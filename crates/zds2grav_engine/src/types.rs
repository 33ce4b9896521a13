use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Scraping,
    Unpacking,
    Converting,
    FetchingMedia,
    Writing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    pub stage: Stage,
    pub bytes: Option<u64>,
    pub detail: Option<String>,
}

impl StageProgress {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            bytes: None,
            detail: None,
        }
    }

    pub fn with_detail(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            bytes: None,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(StageProgress),
    /// An image could not be retrieved; pages still reference its name.
    MediaSkipped { source: String, reason: String },
    Completed(RunSummary),
}

/// What a finished run left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub root: PathBuf,
    pub pages_written: usize,
    pub media_written: usize,
    pub media_skipped: usize,
    pub warnings: usize,
}

/// What kind of resource a request is expected to return. Each kind accepts
/// its own set of content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Page,
    Archive,
    Media,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why a request produced no usable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    /// The declared length or the bytes received so far exceed `limit`.
    TooLarge { limit: u64, received: u64 },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl => f.write_str("malformed url"),
            Self::HttpStatus(code) => write!(f, "server answered {code}"),
            Self::Timeout => f.write_str("timed out"),
            Self::RedirectLimitExceeded => f.write_str("too many redirects"),
            Self::TooLarge { limit, received } => {
                write!(f, "body of {received} bytes exceeds the {limit} byte limit")
            }
            Self::UnsupportedContentType { content_type } => {
                write!(f, "unexpected content type {content_type}")
            }
            Self::Network => f.write_str("network failure"),
        }
    }
}
