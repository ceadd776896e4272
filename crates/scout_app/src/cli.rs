use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find and download media referenced by web pages", long_about = None)]
pub(crate) struct Cli {
    /// RON config file (defaults to ./scout.ron)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List the media candidates found at a URL
    Scan { url: String },

    /// Download one media URL
    Download {
        url: String,

        /// Directory to save into; the file is named after the media title
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exact file path to save to
        #[arg(short, long, conflicts_with = "output")]
        file: Option<PathBuf>,
    },

    /// Show title and thumbnail for a media URL
    Probe { url: String },
}
