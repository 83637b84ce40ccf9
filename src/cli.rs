use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};

pub const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;
pub const DEFAULT_SIMILAR_K: i64 = 5;

#[derive(Debug, Default)]
pub struct CliSources {
    pub interval_from_cli: bool,
}

impl CliSources {
    pub(crate) fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            interval_from_cli: matches
                .subcommand_matches("ingest")
                .is_some_and(|ingest| value_from_cli(ingest, "interval")),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "framescope",
    about = "Sample video frames, index their color histograms and find similar frames",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Lock extraction to a specific decoder backend
    #[arg(short = 'b', long = "backend", global = true)]
    pub backend: Option<String>,

    /// Directory holding one frame directory per video
    #[arg(long = "frames-dir", global = true, value_name = "DIR")]
    pub frames_dir: Option<PathBuf>,

    /// JSON snapshot of the local vector store
    #[arg(long = "snapshot", global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Base URL of the remote similarity index
    #[arg(long = "remote-url", global = true, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Ignore any configured remote index
    #[arg(long = "local-only", global = true)]
    pub local_only: bool,

    /// Indent JSON output
    #[arg(long = "pretty", global = true)]
    pub pretty: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract frames from a video and index their descriptors
    Ingest {
        /// Input video path
        video: PathBuf,

        /// Seconds between sampled frames
        #[arg(
            short = 'i',
            long = "interval",
            id = "interval",
            default_value_t = DEFAULT_INTERVAL_SECONDS
        )]
        interval: f64,

        /// Use this id instead of one derived from the file contents
        #[arg(long = "video-id")]
        video_id: Option<String>,
    },

    /// List the frames most similar to a stored frame
    Similar {
        frame_id: String,

        /// Number of results
        #[arg(
            short = 'k',
            long = "limit",
            default_value_t = DEFAULT_SIMILAR_K,
            allow_negative_numbers = true
        )]
        k: i64,
    },

    /// List the extracted frames of a video
    Frames { video_id: String },

    /// Print the metadata of a video
    Probe { video: PathBuf },

    /// Print the list of available decoder backends
    Backends,
}
