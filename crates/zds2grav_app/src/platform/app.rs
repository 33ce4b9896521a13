use anyhow::Context;
use grav_logging::{grav_error, grav_info};
use zds2grav_engine::{Engine, LogProgressSink};

use crate::cli::Cli;
use crate::platform::settings::{load_settings, output_options};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = load_settings(cli.config.as_deref())?;
    settings.apply_overrides(&cli);
    let engine_settings = settings.into_engine_settings(output_options(&cli))?;

    grav_info!("converting {}", cli.source);
    let engine = Engine::new(engine_settings);
    let summary = engine
        .run_blocking(&cli.source, &LogProgressSink)
        .inspect_err(|err| grav_error!("conversion of {} failed: {err}", cli.source))
        .with_context(|| format!("cannot convert {}", cli.source))?;

    println!("{}", summary.root.display());
    if summary.warnings > 0 || summary.media_skipped > 0 {
        grav_info!(
            "done with {} warnings and {} missing images",
            summary.warnings,
            summary.media_skipped
        );
    }
    Ok(())
}
