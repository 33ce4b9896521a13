use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use grav_logging::grav_info;
use serde::{Deserialize, Serialize};
use url::Url;
use zds2grav_core::ConversionConfig;
use zds2grav_engine::{
    EngineSettings, FetchSettings, OutputOptions, DEFAULT_MEDIA_WORKERS, DEFAULT_PLATFORM_URL,
};

use crate::cli::Cli;

/// Contents of the `--config` RON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub conversion: ConversionConfig,
    pub platform_url: String,
    pub media_workers: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            conversion: ConversionConfig::default(),
            platform_url: DEFAULT_PLATFORM_URL.to_string(),
            media_workers: DEFAULT_MEDIA_WORKERS,
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_bytes: fetch.max_bytes,
        }
    }
}

/// Defaults when no file is given; a file that cannot be read or parsed is
/// an error since the user asked for it explicitly.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<AppSettings> {
    let Some(path) = path else {
        return Ok(AppSettings::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read settings file {}", path.display()))?;
    let settings: AppSettings = ron::from_str(&content)
        .with_context(|| format!("cannot parse settings file {}", path.display()))?;
    grav_info!("loaded settings from {}", path.display());
    Ok(settings)
}

impl AppSettings {
    /// Command-line flags win over the file.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(author) = &cli.default_author {
            self.conversion.default_author = author.clone();
        }
        if let Some(licence) = &cli.default_licence {
            self.conversion.default_licence = Some(licence.clone());
        }
        if let Some(depth) = cli.max_nesting_depth {
            self.conversion.max_nesting_depth = depth;
        }
        if let Some(workers) = cli.media_workers {
            self.media_workers = workers;
        }
    }

    pub fn into_engine_settings(self, output: OutputOptions) -> anyhow::Result<EngineSettings> {
        let platform_url = Url::parse(&self.platform_url)
            .with_context(|| format!("invalid platform url {}", self.platform_url))?;
        let fetch = FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_bytes,
            ..FetchSettings::default()
        };
        Ok(EngineSettings {
            platform_url,
            fetch,
            media_workers: self.media_workers.max(1),
            conversion: self.conversion,
            output,
        })
    }
}

pub fn output_options(cli: &Cli) -> OutputOptions {
    OutputOptions {
        to: cli.to.clone(),
        slug: cli.slug.clone(),
        template_name: cli.template_name.clone(),
        lang: cli.lang.clone(),
    }
}
