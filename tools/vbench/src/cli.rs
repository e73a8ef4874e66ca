//! Command-line interface definitions for vbench.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Allocator benchmark analysis.
#[derive(Parser)]
#[command(name = "vbench", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Print only errors and the final output.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with stage timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Build the Markdown report described by a configuration file.
    Report(ReportArgs),
    /// Print summary statistics of one result file.
    Stats(StatsArgs),
    /// Print baseline ratios of one result file.
    Ratios(RatiosArgs),
    /// Write the analysis of a configuration file as JSON.
    Export(ExportArgs),
}

/// Arguments for the `report` subcommand.
#[derive(Parser)]
pub struct ReportArgs {
    /// Analysis configuration (TOML).
    #[arg(long, short = 'c', default_value = "vbench.toml")]
    pub config: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Input file options shared by `stats` and `ratios`.
#[derive(Parser)]
pub struct InputArgs {
    /// Benchmark result file with a header row.
    pub input: PathBuf,

    /// Field delimiter.
    #[arg(long, short = 'd', default_value_t = ',')]
    pub delimiter: char,
}

/// Arguments for the `stats` subcommand.
#[derive(Parser)]
pub struct StatsArgs {
    /// Input file.
    #[command(flatten)]
    pub input: InputArgs,

    /// Group by operation as well as allocator and size.
    #[arg(long)]
    pub by_operation: bool,
}

/// Arguments for the `ratios` subcommand.
#[derive(Parser)]
pub struct RatiosArgs {
    /// Input file.
    #[command(flatten)]
    pub input: InputArgs,

    /// Reference allocator.
    #[arg(long, short = 'b')]
    pub baseline: String,

    /// Only compare this operation (e.g. `allocation`, `free`).
    #[arg(long)]
    pub operation: Option<String>,

    /// Report competitor / baseline instead of baseline / competitor.
    #[arg(long)]
    pub inverse: bool,
}

/// Arguments for the `export` subcommand.
#[derive(Parser)]
pub struct ExportArgs {
    /// Analysis configuration (TOML).
    #[arg(long, short = 'c', default_value = "vbench.toml")]
    pub config: PathBuf,

    /// Output JSON file.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}
