//! The standard multi-source analysis run.
//!
//! Sources are analyzed in configuration order, then compared against each
//! other. Optional sections that cannot be computed for a source (no
//! baseline samples for an operation, an incomplete allocation/free pair)
//! are replaced by a note line; everything else propagates.

use crate::aggregate::{self, AggregateRecord, Aggregates, GroupBy};
use crate::bands;
use crate::compare::{self, ContextImprovement, Orientation, Ratio, RatioSet};
use crate::config::{AnalysisConfig, ContextPair};
use crate::error::{AnalysisError, Result};
use crate::report::{self, Report, ReportBuilder, SectionContent};
use crate::sample::{Operation, SampleTable};

/// Per-source analysis results, also used by the JSON export.
#[derive(Debug, Clone)]
pub struct SourceAnalysis {
    /// Statistics grouped by (allocator, operation, size).
    pub statistics: Aggregates,
    /// Per-operation ratios against the baseline, by operation.
    pub ratios: Vec<(Operation, RatioSet)>,
    /// Allocation/free averages, when every allocator and size has both.
    pub combined: Option<Aggregates>,
    /// Ratios of the allocation/free averages against the baseline.
    pub combined_ratios: Option<RatioSet>,
    /// Context comparison, when the source configures one.
    pub contexts: Option<(ContextPair, ContextImprovement)>,
    /// Reasons optional analyses were skipped.
    pub notes: Vec<String>,
}

/// Analyze one table against the configured baseline.
pub fn analyze_source(table: &SampleTable, config: &AnalysisConfig) -> Result<SourceAnalysis> {
    let statistics = aggregate::aggregate(table, GroupBy::AllocatorOperationSize)?;
    let mut notes = Vec::new();

    let mut ratios = Vec::new();
    for op in statistics.operations() {
        let per_op = aggregate::aggregate_operation(table, op)?;
        match compare::ratios(&per_op, &config.baseline, config.orientation) {
            Ok(set) if set.is_empty() && set.incomparable().is_empty() => {
                notes.push(format!("- {op}: no allocator to compare with '{}'", config.baseline));
            }
            Ok(set) => ratios.push((op.clone(), set)),
            Err(AnalysisError::NoData { .. }) => {
                notes.push(format!("- {op}: baseline '{}' not measured", config.baseline));
            }
            Err(e) => return Err(e),
        }
    }

    let has_pair = statistics.has_operation(&Operation::Allocation)
        && statistics.has_operation(&Operation::Free);
    let combined = if has_pair {
        match aggregate::combine(table, &Operation::Allocation, &Operation::Free) {
            Ok(combined) => Some(combined),
            Err(e @ AnalysisError::MissingPair { .. }) => {
                notes.push(format!("- combined average skipped: {e}"));
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    let combined_ratios = match &combined {
        Some(combined) => match compare::ratios(combined, &config.baseline, config.orientation) {
            Ok(set) if set.is_empty() && set.incomparable().is_empty() => {
                notes.push(format!(
                    "- combined average: no allocator to compare with '{}'",
                    config.baseline
                ));
                None
            }
            Ok(set) => Some(set),
            Err(AnalysisError::NoData { .. }) => {
                notes.push(format!(
                    "- combined average: baseline '{}' not measured",
                    config.baseline
                ));
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    let pair = config
        .sources
        .iter()
        .find(|source| source.name == table.source())
        .and_then(|source| source.contexts.as_ref());
    let contexts = match pair {
        Some(pair) => match compare::context_improvement(table, &pair.reference, &pair.candidate) {
            Ok(improvement) => Some((pair.clone(), improvement)),
            Err(e @ AnalysisError::NoData { .. }) => {
                notes.push(format!("- context comparison skipped: {e}"));
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(SourceAnalysis {
        statistics,
        ratios,
        combined,
        combined_ratios,
        contexts,
        notes,
    })
}

/// Run the full analysis over already-loaded tables and build the report.
pub fn run(config: &AnalysisConfig, tables: &[SampleTable]) -> Result<Report> {
    let names: Vec<&str> = tables.iter().map(SampleTable::source).collect();
    let orientation = match config.orientation {
        Orientation::BaselineOverCompetitor => "baseline / competitor",
        Orientation::CompetitorOverBaseline => "competitor / baseline",
    };
    let mut builder = ReportBuilder::new(&config.report.title).lines(
        "Overview",
        vec![
            format!("- baseline allocator: {}", config.baseline),
            format!("- ratio orientation: {orientation}"),
            format!("- sources: {}", names.join(", ")),
        ],
    );

    let mut allocation_ratios: Vec<(String, RatioSet)> = Vec::new();
    for table in tables {
        let analysis = analyze_source(table, config)?;
        builder = source_sections(builder, table, config, &analysis)?;
        if let Some((_, set)) = analysis
            .ratios
            .into_iter()
            .find(|(op, _)| *op == Operation::Allocation)
        {
            allocation_ratios.push((table.source().to_string(), set));
        }
    }

    if allocation_ratios.len() > 1 {
        builder = builder.lines("Cross-source comparison", cross_source_lines(&allocation_ratios));
    }

    Ok(builder.build())
}

fn source_sections(
    mut builder: ReportBuilder,
    table: &SampleTable,
    config: &AnalysisConfig,
    analysis: &SourceAnalysis,
) -> Result<ReportBuilder> {
    let name = table.source();
    builder = builder.section(
        format!("{name}: statistics"),
        SectionContent::Aggregates(analysis.statistics.clone()),
    );

    let extremes = extreme_lines(&analysis.statistics);
    if !extremes.is_empty() {
        builder = builder.lines(format!("{name}: slowest and fastest sizes"), extremes);
    }

    if let Some(combined) = &analysis.combined {
        builder = builder.section(
            format!("{name}: average of allocation and free"),
            SectionContent::Aggregates(combined.clone()),
        );
    }
    if let Some(set) = &analysis.combined_ratios {
        builder = builder.section(
            format!("{name}: average ratios"),
            SectionContent::Ratios {
                set: set.clone(),
                summary: true,
            },
        );
    }

    for (op, set) in &analysis.ratios {
        builder = builder.section(
            format!("{name}: {op} ratios"),
            SectionContent::Ratios {
                set: set.clone(),
                summary: true,
            },
        );
    }

    if analysis.statistics.has_operation(&Operation::Allocation)
        && analysis.statistics.has_operation(&Operation::Free)
    {
        builder = builder.section(
            format!("{name}: allocation/free ratio"),
            SectionContent::OperationRatios(compare::operation_ratios(
                &analysis.statistics,
                &Operation::Allocation,
                &Operation::Free,
            )),
        );
    }

    if !config.bands.is_empty() && analysis.statistics.has_operation(&Operation::Allocation) {
        let allocation = aggregate::aggregate_operation(table, &Operation::Allocation)?;
        builder = builder.section(
            format!("{name}: allocation by size band"),
            SectionContent::Bands(bands::summarize(&allocation, &config.bands)),
        );
    }

    if analysis.statistics.has_operation(&Operation::Text) {
        let text = aggregate::aggregate_operation(table, &Operation::Text)?;
        let lines = text
            .allocators()
            .into_iter()
            .map(|allocator| {
                let means: Vec<f64> = text
                    .series(allocator, None)
                    .iter()
                    .map(|(_, r)| r.mean)
                    .collect();
                let mean = means.iter().sum::<f64>() / means.len() as f64;
                format!("- {allocator}: {}", report::seconds(mean))
            })
            .collect();
        builder = builder.lines(format!("{name}: text workload"), lines);
    }

    if let Some((pair, improvement)) = &analysis.contexts {
        builder = builder.lines(
            format!("{name}: context comparison"),
            context_lines(pair, improvement),
        );
    }

    if !analysis.notes.is_empty() {
        builder = builder.lines(format!("{name}: notes"), analysis.notes.clone());
    }

    Ok(builder)
}

fn context_lines(pair: &ContextPair, improvement: &ContextImprovement) -> Vec<String> {
    let stats = |tag: &str, r: &AggregateRecord| {
        format!(
            "- {tag}: mean {}, stddev {}, min {}, max {} ({} samples)",
            report::seconds(r.mean),
            report::seconds(r.stddev),
            report::seconds(r.min),
            report::seconds(r.max),
            r.count
        )
    };
    let pct = match improvement.improvement_pct {
        Ratio::Value(pct) => format!("{pct:.2}%"),
        Ratio::Undefined => Ratio::Undefined.to_string(),
    };
    vec![
        stats(&pair.reference, &improvement.reference),
        stats(&pair.candidate, &improvement.candidate),
        format!("- improvement of {} over {}: {pct}", pair.candidate, pair.reference),
    ]
}

/// Slowest/fastest size per allocator and operation.
fn extreme_lines(statistics: &Aggregates) -> Vec<String> {
    let mut lines = Vec::new();
    for allocator in statistics.allocators() {
        if statistics.sizes(allocator).len() < 2 {
            continue;
        }
        for op in statistics.operations() {
            let Ok(found) = compare::time_extrema(statistics, allocator, Some(op)) else {
                continue;
            };
            if found.max.size == found.min.size {
                continue;
            }
            lines.push(format!(
                "- {allocator} {op}: slowest {} at {} bytes, fastest {} at {} bytes",
                report::seconds(found.max.mean),
                found.max.size,
                report::seconds(found.min.mean),
                found.min.size
            ));
        }
    }
    lines
}

fn cross_source_lines(sets: &[(String, RatioSet)]) -> Vec<String> {
    let mut lines = Vec::new();
    for (source, set) in sets {
        for (competitor, operation) in set.series_keys() {
            let label = set.orientation().label(set.baseline(), &competitor);
            let mean = match set.mean_ratio(&competitor, operation.as_ref()) {
                Ok(mean) => format!("{mean:.4}"),
                Err(_) => "undefined".to_string(),
            };
            lines.push(format!("- {source}: mean {label} allocation ratio {mean}"));
        }
    }
    if lines.is_empty() {
        lines.push("- no allocator measured in more than one source".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::SizeBand;
    use crate::config::{ReportConfig, SourceConfig};
    use crate::sample::load_from_reader;

    const BASIC: &str = "allocator,size,operation,time\n\
        valloc,16,allocation,0.000400\n\
        valloc,16,free,0.000200\n\
        valloc,4096,allocation,0.000800\n\
        valloc,4096,free,0.000100\n\
        malloc,16,allocation,0.000100\n\
        malloc,16,free,0.000100\n\
        malloc,4096,allocation,0.000400\n\
        malloc,4096,free,0.000200\n";

    const SEGMENTED: &str = "allocator,size,test_type,time\n\
        valloc,16,allocation,0.000300\n\
        malloc,16,allocation,0.000100\n\
        calloc,16,allocation,0.000150\n\
        valloc,4096,text,0.002000\n\
        malloc,4096,text,0.001000\n";

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            baseline: "valloc".into(),
            orientation: Orientation::BaselineOverCompetitor,
            sources: vec![
                SourceConfig::new("basic", "basic.csv"),
                SourceConfig::new("segmented", "segmented.csv"),
            ],
            bands: vec![SizeBand::up_to("small", 256), SizeBand::exact("medium", 4096)],
            report: ReportConfig::default(),
        }
    }

    fn tables(config: &AnalysisConfig) -> Vec<SampleTable> {
        vec![
            load_from_reader(&config.sources[0], BASIC.as_bytes()).unwrap(),
            load_from_reader(&config.sources[1], SEGMENTED.as_bytes()).unwrap(),
        ]
    }

    #[test]
    fn analyze_basic_source() {
        let config = config();
        let tables = tables(&config);
        let analysis = analyze_source(&tables[0], &config).unwrap();
        assert_eq!(analysis.statistics.len(), 8);
        assert_eq!(analysis.ratios.len(), 2);
        assert_eq!(analysis.combined.unwrap().len(), 4);
        let set = analysis.combined_ratios.unwrap();
        // valloc (0.0004 + 0.0002) / 2 vs malloc (0.0001 + 0.0001) / 2.
        let ratio = set.get("malloc", None, 16).unwrap().ratio.value().unwrap();
        assert!((ratio - 3.0).abs() < 1e-9);
        assert!(analysis.notes.is_empty());
    }

    #[test]
    fn report_has_expected_sections() {
        let config = config();
        let report = run(&config, &tables(&config)).unwrap();
        let labels: Vec<&str> = report.sections().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Overview",
                "basic: statistics",
                "basic: slowest and fastest sizes",
                "basic: average of allocation and free",
                "basic: average ratios",
                "basic: allocation ratios",
                "basic: free ratios",
                "basic: allocation/free ratio",
                "basic: allocation by size band",
                "segmented: statistics",
                "segmented: allocation ratios",
                "segmented: text ratios",
                "segmented: allocation by size band",
                "segmented: text workload",
                "Cross-source comparison",
            ]
        );

        let text = report.render();
        assert!(text.contains("- valloc: 0.002000s"), "{text}");
        assert!(text.contains("- basic: mean valloc/malloc allocation ratio 3.0000"), "{text}");
        assert!(text.contains("- segmented: mean valloc/calloc allocation ratio 2.0000"), "{text}");
    }

    #[test]
    fn report_is_deterministic() {
        let config = config();
        let first = run(&config, &tables(&config)).unwrap().render();
        let second = run(&config, &tables(&config)).unwrap().render();
        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_pair_becomes_note() {
        let config = config();
        let data = "allocator,size,operation,time\n\
            valloc,16,allocation,0.1\n\
            valloc,16,free,0.1\n\
            valloc,32,allocation,0.1\n";
        let table = load_from_reader(&config.sources[0], data.as_bytes()).unwrap();
        let analysis = analyze_source(&table, &config).unwrap();
        assert!(analysis.combined.is_none());
        assert!(analysis.combined_ratios.is_none());
        assert!(analysis.ratios.is_empty());
        assert_eq!(
            analysis.notes[..2],
            [
                "- allocation: no allocator to compare with 'valloc'",
                "- free: no allocator to compare with 'valloc'",
            ]
        );
        assert!(analysis.notes[2].contains("no 'free' samples"), "{:?}", analysis.notes);
    }

    #[test]
    fn sections_without_baseline_allocator() {
        let config = config();
        let data = "allocator,size,operation,time\n\
            malloc,16,allocation,0.000200\n\
            malloc,16,free,0.000100\n\
            malloc,32,allocation,0.000400\n\
            malloc,32,free,0.000100\n";
        let table = load_from_reader(&config.sources[0], data.as_bytes()).unwrap();
        let analysis = analyze_source(&table, &config).unwrap();
        assert_eq!(analysis.combined.as_ref().map(Aggregates::len), Some(2));
        assert!(analysis.combined_ratios.is_none());
        assert_eq!(
            analysis.notes,
            [
                "- allocation: baseline 'valloc' not measured",
                "- free: baseline 'valloc' not measured",
                "- combined average: baseline 'valloc' not measured",
            ]
        );

        let report = run(&config, &[table]).unwrap();
        let labels: Vec<&str> = report.sections().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Overview",
                "basic: statistics",
                "basic: slowest and fastest sizes",
                "basic: average of allocation and free",
                "basic: allocation/free ratio",
                "basic: allocation by size band",
                "basic: notes",
            ]
        );
    }

    #[test]
    fn allocation_free_ratio_survives_incomplete_pair() {
        let config = config();
        let data = "allocator,size,operation,time\n\
            valloc,16,allocation,0.2\n\
            valloc,16,free,0.1\n\
            valloc,32,allocation,0.1\n";
        let table = load_from_reader(&config.sources[0], data.as_bytes()).unwrap();
        let report = run(&config, &[table]).unwrap();
        let labels: Vec<&str> = report.sections().iter().map(|s| s.label.as_str()).collect();
        assert!(labels.contains(&"basic: allocation/free ratio"), "{labels:?}");
        assert!(!labels.contains(&"basic: average of allocation and free"), "{labels:?}");
    }

    #[test]
    fn context_comparison_section() {
        let mut config = config();
        config.sources[0].columns.context = Some("use_cache".into());
        config.sources[0].contexts = Some(ContextPair {
            reference: "0".into(),
            candidate: "1".into(),
        });
        let data = "allocator,size,operation,time,use_cache\n\
            valloc,1,thread_cache,2.0,0\n\
            valloc,1,thread_cache,2.0,0\n\
            valloc,1,thread_cache,1.5,1\n";
        let table = load_from_reader(&config.sources[0], data.as_bytes()).unwrap();
        let report = run(&config, &[table]).unwrap();
        let section = report
            .sections()
            .iter()
            .find(|s| s.label == "basic: context comparison")
            .unwrap();
        assert_eq!(
            section.lines,
            [
                "- 0: mean 2.000000s, stddev 0.000000s, min 2.000000s, max 2.000000s (2 samples)",
                "- 1: mean 1.500000s, stddev 0.000000s, min 1.500000s, max 1.500000s (1 samples)",
                "- improvement of 1 over 0: 25.00%",
            ]
        );
    }

    #[test]
    fn missing_context_becomes_note() {
        let mut config = config();
        config.sources[0].contexts = Some(ContextPair {
            reference: "off".into(),
            candidate: "on".into(),
        });
        let table = load_from_reader(&config.sources[0], BASIC.as_bytes()).unwrap();
        let analysis = analyze_source(&table, &config).unwrap();
        assert!(analysis.contexts.is_none());
        assert!(analysis.notes[0].contains("context 'off'"), "{:?}", analysis.notes);
    }

    #[test]
    fn empty_table_fails_the_run() {
        let config = config();
        let err = run(&config, &[SampleTable::new("empty")]).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyGroup { .. }));
    }
}
