//! Allocator benchmark analysis tool.
//!
//! Reads the CSV files written by the valloc benchmark harnesses, compares
//! every allocator against a baseline and writes a Markdown report, terminal
//! tables or a JSON export for plotting.
//!
//! Pipeline: load config → load sources → aggregate → compare → render.

mod cli;
mod config;
mod output;
mod verbose;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use valloc_perf::aggregate::{self, GroupBy};
use valloc_perf::compare::{self, Orientation};
use valloc_perf::config::SourceConfig;
use valloc_perf::sample::Operation;
use valloc_perf::{export, pipeline};

use verbose::{Timer, dprintln, vprintln};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    match cli.command {
        cli::Command::Report(ref args) => cmd_report(args),
        cli::Command::Stats(ref args) => cmd_stats(args),
        cli::Command::Ratios(ref args) => cmd_ratios(args),
        cli::Command::Export(ref args) => cmd_export(args),
    }
}

/// Build the configured report and write it to a file or stdout.
fn cmd_report(args: &cli::ReportArgs) -> Result<()> {
    let config = config::load(&args.config)?;
    let tables = config::load_tables(&config)?;

    let report = {
        let _t = Timer::start("analysis");
        pipeline::run(&config, &tables)
            .with_context(|| format!("analysis of {} failed", args.config.display()))?
    };
    vprintln!("  {} report sections", report.sections().len());

    let text = report.render();
    match &args.output {
        Some(path) => {
            write_file(path, &text)?;
            dprintln!("Report written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Print per-group statistics of a single file.
fn cmd_stats(args: &cli::StatsArgs) -> Result<()> {
    let table = config::load_table(&input_source(&args.input))?;
    let group_by = if args.by_operation {
        GroupBy::AllocatorOperationSize
    } else {
        GroupBy::AllocatorSize
    };
    let aggregates = aggregate::aggregate(&table, group_by)?;
    output::print_stats_table(&aggregates);
    Ok(())
}

/// Print baseline ratios of a single file.
fn cmd_ratios(args: &cli::RatiosArgs) -> Result<()> {
    let table = config::load_table(&input_source(&args.input))?;
    let aggregates = match &args.operation {
        Some(name) => aggregate::aggregate_operation(&table, &Operation::parse(name))?,
        None => aggregate::aggregate(&table, GroupBy::AllocatorOperationSize)?,
    };
    let orientation = if args.inverse {
        Orientation::CompetitorOverBaseline
    } else {
        Orientation::BaselineOverCompetitor
    };
    let set = compare::ratios(&aggregates, &args.baseline, orientation)?;
    vprintln!(
        "  {} ratios, {} incomparable sizes",
        set.len(),
        set.incomparable().len()
    );
    output::print_ratio_table(&set);
    Ok(())
}

/// Write the JSON export of a configured analysis.
fn cmd_export(args: &cli::ExportArgs) -> Result<()> {
    let config = config::load(&args.config)?;
    let tables = config::load_tables(&config)?;

    let exported = {
        let _t = Timer::start("analysis");
        export::export(&config, &tables)?
    };
    let json = export::to_json(&exported).context("failed to serialize export")?;
    write_file(&args.output, &json)?;
    dprintln!("Export written to {}", args.output.display());
    Ok(())
}

/// Long-layout source for a file given on the command line.
fn input_source(args: &cli::InputArgs) -> SourceConfig {
    let name = args
        .input
        .file_stem()
        .map_or_else(|| "input".to_string(), |s| s.to_string_lossy().into_owned());
    let mut source = SourceConfig::new(name, &args.input);
    source.delimiter = args.delimiter;
    source
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
