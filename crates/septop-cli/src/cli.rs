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
    about = "SepTop CLI - Plan Separated Topologies relative binding free-energy calculations and combine their results.",
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
    /// Write the protocol settings, defaults plus any overrides, as TOML.
    Settings(SettingsArgs),
    /// Validate a transformation and list the execution units it would create.
    Plan(PlanArgs),
    /// Combine unit result files into the relative binding free energy.
    Gather(GatherArgs),
}

/// Settings sources shared by every command that needs protocol settings.
#[derive(Args, Debug, Default)]
pub struct SettingsSource {
    /// Path to a settings file in TOML format. Missing keys keep their defaults.
    #[arg(short, long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Override the number of independent repeats.
    #[arg(short, long, value_name = "INT")]
    pub repeats: Option<usize>,

    /// Set a specific settings value, overriding the settings file.
    /// Can be used multiple times. Example: -S complex-simulation-settings.n-replicas=12
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `settings` subcommand.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub source: SettingsSource,

    /// Write the settings to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SettingsSource,

    /// Chemical system of end state A, as JSON.
    #[arg(long, required = true, value_name = "PATH")]
    pub state_a: PathBuf,

    /// Chemical system of end state B, as JSON.
    #[arg(long, required = true, value_name = "PATH")]
    pub state_b: PathBuf,

    /// Also write the plan as JSON to this file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `gather` subcommand.
#[derive(Args, Debug)]
pub struct GatherArgs {
    /// Unit result files, or directories searched recursively for them.
    #[arg(required = true, value_name = "PATH")]
    pub results: Vec<PathBuf>,

    /// Also write the combined estimate as JSON to this file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
