//! Configuration types for an analysis run.
//!
//! Deserialized from the `vbench.toml` file passed to the CLI. Paths are kept
//! as written; the CLI resolves them against the config file's directory.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::bands::SizeBand;
use crate::compare::Orientation;

/// Top-level analysis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Allocator used as the ratio reference.
    pub baseline: String,
    /// Which side of the ratio the baseline sits on.
    #[serde(default)]
    pub orientation: Orientation,
    /// Benchmark result files, in report order.
    pub sources: Vec<SourceConfig>,
    /// Named size bands for the banded summary. No bands, no banded section.
    #[serde(default)]
    pub bands: Vec<SizeBand>,
    /// Report presentation options.
    #[serde(default)]
    pub report: ReportConfig,
}

/// One benchmark result file and how to read it.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Short name used in section labels (e.g. "basic", "segmented").
    pub name: String,
    /// Path to the delimited text file.
    pub path: PathBuf,
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Header names for the long (one sample per row) layout.
    #[serde(default)]
    pub columns: ColumnMap,
    /// Wide layout: one time column per operation. Overrides `columns`.
    #[serde(default)]
    pub wide: Option<WideColumns>,
    /// Context tags to compare (e.g. cache off vs cache on).
    #[serde(default)]
    pub contexts: Option<ContextPair>,
}

impl SourceConfig {
    /// A long-layout, comma-separated source with the default column names.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            delimiter: default_delimiter(),
            columns: ColumnMap::default(),
            wide: None,
            contexts: None,
        }
    }
}

/// Header names of the logical sample columns.
///
/// Matching against the file header is case-insensitive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    /// Allocator name column.
    pub allocator: String,
    /// Block size column (bytes).
    pub size: String,
    /// Measured time column (seconds).
    pub time: String,
    /// Operation discriminator. When unset, `operation` is tried, then `test_type`.
    pub operation: Option<String>,
    /// Optional context tag column (thread id, cache flag).
    pub context: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            allocator: "allocator".into(),
            size: "size".into(),
            time: "time".into(),
            operation: None,
            context: None,
        }
    }
}

/// Wide layout where each row carries several operation timings.
#[derive(Debug, Clone, Deserialize)]
pub struct WideColumns {
    /// Allocator name applied to every sample of the file.
    pub allocator: String,
    /// Block size column (bytes). Without one, every sample has size 1.
    #[serde(default)]
    pub size: Option<String>,
    /// Operation name to time column (e.g. `free = "cleanup_time"`).
    pub times: BTreeMap<String, String>,
    /// Optional context tag column.
    #[serde(default)]
    pub context: Option<String>,
}

/// Two context tags whose mean times are compared.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextPair {
    /// Reference tag, the denominator of the improvement.
    pub reference: String,
    /// Candidate tag.
    pub candidate: String,
}

/// Report presentation options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Top-level report heading.
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Allocator performance report".into(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}
