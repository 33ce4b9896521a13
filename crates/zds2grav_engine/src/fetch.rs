use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use grav_logging::{grav_debug, grav_info, grav_warn};
use reqwest::header::CONTENT_TYPE;

use crate::{
    EngineEvent, FailureKind, FetchError, FetchKind, FetchMetadata, FetchOutput, Stage,
    StageProgress,
};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub page_content_types: Vec<String>,
    pub archive_content_types: Vec<String>,
    /// Entries ending in `/*` accept a whole family, e.g. `image/*`.
    pub media_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 5,
            max_bytes: 50 * 1024 * 1024,
            page_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            archive_content_types: vec![
                "application/zip".to_string(),
                "application/x-zip-compressed".to_string(),
                "application/octet-stream".to_string(),
            ],
            media_content_types: vec![
                "image/*".to_string(),
                "application/octet-stream".to_string(),
            ],
        }
    }
}

impl FetchSettings {
    fn allowed_for(&self, kind: FetchKind) -> &[String] {
        match kind {
            FetchKind::Page => &self.page_content_types,
            FetchKind::Archive => &self.archive_content_types,
            FetchKind::Media => &self.media_content_types,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that turns engine events into log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(progress) => match (progress.detail, progress.bytes) {
                (Some(detail), _) => grav_info!("{:?}: {detail}", progress.stage),
                (None, Some(bytes)) => grav_debug!("{:?}: {bytes} bytes", progress.stage),
                (None, None) => grav_debug!("{:?}", progress.stage),
            },
            EngineEvent::MediaSkipped { source, reason } => {
                grav_warn!("skipping image {source}: {reason}")
            }
            EngineEvent::Completed(summary) => grav_info!(
                "wrote {} pages and {} images to {}",
                summary.pages_written,
                summary.media_written,
                summary.root.display()
            ),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        kind: FetchKind,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutput, FetchError>;
}

/// [`Fetcher`] over HTTP(S). Every request gets its own client so the
/// redirect count can be reported per request.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self) -> Result<(reqwest::Client, Arc<AtomicUsize>), FetchError> {
        let hops = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hops);
        let limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            seen.store(count, Ordering::Relaxed);
            if count >= limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok((client, hops))
    }

    fn accepts(&self, kind: FetchKind, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        self.settings.allowed_for(kind).iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(family) => essence
                    .split_once('/')
                    .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(family)),
                None => allowed.eq_ignore_ascii_case(essence),
            }
        })
    }

    fn too_large(&self, received: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                limit: self.settings.max_bytes,
                received,
            },
            "response too large",
        )
    }

    /// Status, declared length and content type, checked before the body is
    /// read. Returns the content type header.
    fn check_head(
        &self,
        kind: FetchKind,
        response: &reqwest::Response,
    ) -> Result<Option<String>, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        match response.content_length() {
            Some(declared) if declared > self.settings.max_bytes => {
                return Err(self.too_large(declared))
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        match content_type.as_deref() {
            Some(ct) if !self.accepts(kind, ct) => Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: ct.to_string(),
                },
                format!("not acceptable as {kind:?}"),
            )),
            _ => Ok(content_type),
        }
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        stage: Stage,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let total = (body.len() + chunk.len()) as u64;
            if total > self.settings.max_bytes {
                return Err(self.too_large(total));
            }
            body.extend_from_slice(&chunk);
            sink.emit(EngineEvent::Progress(StageProgress {
                stage,
                bytes: Some(total),
                detail: None,
            }));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        kind: FetchKind,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutput, FetchError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let (client, hops) = self.client()?;
        let response = client.get(target).send().await.map_err(map_reqwest_error)?;

        let content_type = self.check_head(kind, &response)?;
        let final_url = response.url().to_string();
        let stage = match kind {
            FetchKind::Media => Stage::FetchingMedia,
            FetchKind::Page | FetchKind::Archive => Stage::Downloading,
        };
        let bytes = self.read_body(response, stage, sink).await?;
        grav_debug!("fetched {url} ({} bytes)", bytes.len());

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: hops.load(Ordering::Relaxed),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
