use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Configure, submit and track EFT gridpack production jobs for the MadGraph gridpack-generation tool chain.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure and submit every job described by a sweep file.
    Submit(SubmitArgs),
    /// Show the phase of the jobs found in a gridpack working directory.
    Track(TrackArgs),
    /// Remove every artifact of one job so it can be submitted again.
    Clean(JobArgs),
    /// Unpack a finished gridpack and generate events from it.
    Run(RunArgs),
}

/// Arguments for the `submit` subcommand.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Path to the sweep description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Materialize the configurations without handing them to a batch backend.
    #[arg(long)]
    pub dry_run: bool,

    /// Set a specific configuration value, overriding the sweep file.
    /// Can be used multiple times. Example: -S sweep.runs=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `track` subcommand.
#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Working directory of the gridpack-generation checkout.
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub dir: PathBuf,

    /// Architecture field of the tarball names.
    #[arg(long, default_value = "slc6_amd64_gcc630")]
    pub arch: String,

    /// Release field of the tarball names.
    #[arg(long, default_value = "CMSSW_9_3_0")]
    pub release: String,

    /// Only track processes matching this pattern. Can be repeated.
    #[arg(short, long = "process", value_name = "REGEX")]
    pub processes: Vec<String>,

    /// Only track tags matching this pattern. Can be repeated.
    #[arg(short, long = "tag", value_name = "REGEX")]
    pub tags: Vec<String>,

    /// Only track run fields (e.g. `run0`) matching this pattern. Can be repeated.
    #[arg(short, long = "run", value_name = "REGEX")]
    pub runs: Vec<String>,

    /// Integrating jobs older than this many minutes are left out of Integrate(f).
    /// Negative disables the cutoff.
    #[arg(long, value_name = "MIN", allow_hyphen_values = true)]
    pub integrate_cutoff: Option<i64>,

    /// Minutes without a log write before a running job counts as stuck.
    /// Negative disables the cutoff.
    #[arg(long, value_name = "MIN", allow_hyphen_values = true)]
    pub stuck_cutoff: Option<i64>,

    /// Minutes a tarball must stay untouched before its job counts as finished.
    /// Negative disables the cutoff.
    #[arg(long, value_name = "MIN", allow_hyphen_values = true)]
    pub tarball_cutoff: Option<i64>,

    /// Print the last N log lines of every integrating job.
    #[arg(short = 'n', long, value_name = "N")]
    pub lines: Option<usize>,
}

/// Identifies one job of a sweep file.
#[derive(Args, Debug)]
pub struct JobArgs {
    /// Path to the sweep description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Name of a `[[process]]` entry in the sweep file.
    #[arg(short, long, required = true)]
    pub process: String,

    #[arg(short, long, required = true)]
    pub tag: String,

    #[arg(short, long, required = true)]
    pub run: u32,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Number of events to generate.
    #[arg(short, long, default_value_t = 10_000)]
    pub events: u64,

    /// Random seed handed to the generation script.
    #[arg(short, long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1)]
    pub cores: u32,
}
