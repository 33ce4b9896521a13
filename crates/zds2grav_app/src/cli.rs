use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;
use zds2grav_engine::DEFAULT_TEMPLATE;

use crate::platform::logging::LogDestination;

/// Convert a Zeste de Savoir article, opinion or tutorial into a Grav page tree.
#[derive(Debug, Parser)]
#[command(name = "zds2grav", version)]
pub struct Cli {
    /// URL of the published content, or path to its downloaded .zip export
    pub source: String,

    /// Grav template of the generated pages (`item` for blog entries)
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template_name: String,

    /// Language suffix of the page files, e.g. `fr` for `item.fr.md`
    #[arg(long)]
    pub lang: Option<String>,

    /// Directory name of the document; defaults to its slug
    #[arg(long)]
    pub slug: Option<String>,

    /// Where the document directory is created; defaults to the archive's
    /// directory, or the current one for remote content
    #[arg(long)]
    pub to: Option<PathBuf>,

    /// RON settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub default_author: Option<String>,

    #[arg(long)]
    pub default_licence: Option<String>,

    /// Deepest section level accepted for tutorials
    #[arg(long)]
    pub max_nesting_depth: Option<usize>,

    /// Concurrent image downloads
    #[arg(long)]
    pub media_workers: Option<usize>,

    /// Also write the log to ./zds2grav.log
    #[arg(long)]
    pub log_file: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        if self.log_file {
            LogDestination::Both
        } else {
            LogDestination::Terminal
        }
    }
}
