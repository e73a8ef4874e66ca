//! Analysis configuration loading.

use std::path::Path;

use anyhow::{Context, Result, bail};
use valloc_perf::config::{AnalysisConfig, ColumnMap, SourceConfig, WideColumns};
use valloc_perf::sample::{self, SampleTable};

use crate::verbose::{Timer, dprintln, vprintln};

/// Read and validate a TOML configuration.
///
/// Relative source paths are resolved against the directory of the
/// configuration file, so a config can sit next to its result files.
pub fn load(path: &Path) -> Result<AnalysisConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut config: AnalysisConfig =
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;

    if config.sources.is_empty() {
        bail!("{}: no [[sources]] configured", path.display());
    }
    for (i, source) in config.sources.iter().enumerate() {
        if config.sources[..i].iter().any(|s| s.name == source.name) {
            bail!("{}: duplicate source name '{}'", path.display(), source.name);
        }
    }

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for source in &mut config.sources {
        if source.path.is_relative() {
            source.path = base.join(&source.path);
        }
    }

    vprintln!(
        "loaded {}: baseline '{}', {} source(s), {} band(s)",
        path.display(),
        config.baseline,
        config.sources.len(),
        config.bands.len()
    );
    Ok(config)
}

/// Load every configured source, in order.
pub fn load_tables(config: &AnalysisConfig) -> Result<Vec<SampleTable>> {
    let _t = Timer::start("load sources");
    config.sources.iter().map(load_table).collect()
}

/// Load one source.
pub fn load_table(source: &SourceConfig) -> Result<SampleTable> {
    vprintln!("  {}: {}", source.name, column_mapping(source));
    let table = sample::load(source)?;
    dprintln!(
        "  Loaded {} ({} samples from {})",
        source.name,
        table.len(),
        source.path.display()
    );
    Ok(table)
}

/// One-line description of how a source's columns map to sample fields.
fn column_mapping(source: &SourceConfig) -> String {
    let mut parts = match &source.wide {
        Some(WideColumns {
            allocator,
            size,
            times,
            ..
        }) => {
            let mut parts = vec![
                format!("wide, allocator '{allocator}'"),
                format!("size <- {}", size.as_deref().unwrap_or("(none)")),
            ];
            parts.extend(times.iter().map(|(op, column)| format!("{op} <- {column}")));
            parts
        }
        None => {
            let ColumnMap {
                allocator,
                size,
                time,
                operation,
                ..
            } = &source.columns;
            vec![
                format!("allocator <- {allocator}"),
                format!("size <- {size}"),
                format!("time <- {time}"),
                format!(
                    "operation <- {}",
                    operation.as_deref().unwrap_or("operation|test_type")
                ),
            ]
        }
    };
    let context = source
        .wide
        .as_ref()
        .map_or(source.columns.context.as_deref(), |w| w.context.as_deref());
    if let Some(context) = context {
        parts.push(format!("context <- {context}"));
    }
    parts.join(", ")
}
