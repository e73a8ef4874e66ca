//! Machine-readable dump of an analysis run.

use serde::Serialize;

use crate::aggregate::{self, AggregateRecord, Aggregates, GroupKey};
use crate::bands::{self, BandSummary};
use crate::compare::{ContextImprovement, Incomparable, Orientation, RatioRecord, RatioSet};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::pipeline;
use crate::sample::{Operation, SampleTable};

/// Whole-run export.
#[derive(Debug, Serialize)]
pub struct Export {
    /// Reference allocator.
    pub baseline: String,
    /// Ratio orientation.
    pub orientation: Orientation,
    /// Per-source results in configuration order.
    pub sources: Vec<SourceExport>,
}

/// Results for one source.
#[derive(Debug, Serialize)]
pub struct SourceExport {
    /// Source name.
    pub name: String,
    /// Number of ingested samples.
    pub samples: usize,
    /// Statistics per (allocator, operation, size).
    pub statistics: Vec<AggregateRow>,
    /// Ratios against the baseline, one entry per measured operation.
    pub ratios: Vec<OperationRatios>,
    /// Allocation/free averages, when both were measured.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub combined: Vec<AggregateRow>,
    /// Allocation means per configured band.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<BandSummary>,
    /// Context comparison, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<ContextImprovement>,
    /// Analyses skipped for this source.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Ratios of one operation against the baseline.
#[derive(Debug, Serialize)]
pub struct OperationRatios {
    /// Operation the ratios were computed for.
    pub operation: Operation,
    /// Ratio records ordered by competitor, then size.
    pub records: Vec<RatioRecord>,
    /// Baseline sizes missing for a competitor.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomparable: Vec<Incomparable>,
}

impl OperationRatios {
    fn new(operation: &Operation, set: &RatioSet) -> Self {
        Self {
            operation: operation.clone(),
            records: set.iter().cloned().collect(),
            incomparable: set.incomparable().to_vec(),
        }
    }
}

/// One aggregate record with its key, flattened.
#[derive(Debug, Serialize)]
pub struct AggregateRow {
    /// Allocator name.
    pub allocator: String,
    /// Operation, absent for single-operation groupings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Block size in bytes.
    pub size: u64,
    /// Statistics.
    #[serde(flatten)]
    pub record: AggregateRecord,
}

impl AggregateRow {
    fn new(key: &GroupKey, record: &AggregateRecord) -> Self {
        Self {
            allocator: key.allocator.clone(),
            operation: key.operation.clone(),
            size: key.size,
            record: *record,
        }
    }
}

fn rows(aggregates: &Aggregates) -> Vec<AggregateRow> {
    aggregates
        .iter()
        .map(|(key, record)| AggregateRow::new(key, record))
        .collect()
}

/// Analyze every table and collect the results for serialization.
pub fn export(config: &AnalysisConfig, tables: &[SampleTable]) -> Result<Export> {
    let mut sources = Vec::with_capacity(tables.len());
    for table in tables {
        let analysis = pipeline::analyze_source(table, config)?;
        let bands = if config.bands.is_empty()
            || !analysis.statistics.has_operation(&Operation::Allocation)
        {
            Vec::new()
        } else {
            let allocation = aggregate::aggregate_operation(table, &Operation::Allocation)?;
            bands::summarize(&allocation, &config.bands)
        };

        sources.push(SourceExport {
            name: table.source().to_string(),
            samples: table.len(),
            statistics: rows(&analysis.statistics),
            ratios: analysis
                .ratios
                .iter()
                .map(|(op, set)| OperationRatios::new(op, set))
                .collect(),
            combined: analysis.combined.as_ref().map(rows).unwrap_or_default(),
            bands,
            contexts: analysis.contexts.map(|(_, improvement)| improvement),
            notes: analysis.notes,
        });
    }

    Ok(Export {
        baseline: config.baseline.clone(),
        orientation: config.orientation,
        sources,
    })
}

/// Pretty-printed JSON for an export.
pub fn to_json(export: &Export) -> serde_json::Result<String> {
    serde_json::to_string_pretty(export)
}
