//! End-to-end analysis over result files shaped like the harness output.

use std::path::PathBuf;

use valloc_perf::AnalysisError;
use valloc_perf::config::AnalysisConfig;
use valloc_perf::export;
use valloc_perf::pipeline;
use valloc_perf::sample::{self, SampleTable};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

const CONFIG: &str = r#"
baseline = "valloc"

[[sources]]
name = "basic"
path = "basic_performance_results.csv"

[[sources]]
name = "segmented"
path = "benchmark_results.csv"

[[sources]]
name = "multithread"
path = "multithread_results.csv"
[sources.wide]
allocator = "valloc"
size = "block_size"
[sources.wide.times]
allocation = "allocation_time"
free = "cleanup_time"

[[sources]]
name = "thread_cache"
path = "benchmark_thread_cache.csv"
contexts = { reference = "0", candidate = "1" }
[sources.wide]
allocator = "valloc"
context = "use_cache"
[sources.wide.times]
thread_cache = "execution_time"

[[bands]]
name = "small"
max = 256

[[bands]]
name = "medium"
exact = 4096

[[bands]]
name = "large"
exact = 1048576

[report]
title = "valloc performance analysis"
"#;

fn config() -> AnalysisConfig {
    let mut config: AnalysisConfig = toml::from_str(CONFIG).unwrap();
    for source in &mut config.sources {
        source.path = fixture_dir().join(&source.path);
    }
    config
}

fn tables(config: &AnalysisConfig) -> Vec<SampleTable> {
    config
        .sources
        .iter()
        .map(|source| sample::load(source).unwrap())
        .collect()
}

fn section<'a>(report: &'a valloc_perf::report::Report, label: &str) -> &'a [String] {
    &report
        .sections()
        .iter()
        .find(|s| s.label == label)
        .unwrap_or_else(|| panic!("no section '{label}'"))
        .lines
}

#[test]
fn loads_every_layout() {
    let config = config();
    let tables = tables(&config);
    let sizes: Vec<usize> = tables.iter().map(SampleTable::len).collect();
    assert_eq!(sizes, [16, 7, 6, 4]);
    assert_eq!(tables[2].source(), "multithread");
}

#[test]
fn basic_allocation_ratios_and_extrema() {
    let config = config();
    let report = pipeline::run(&config, &tables(&config)).unwrap();
    let lines = section(&report, "basic: allocation ratios");
    assert!(lines.contains(&"| valloc/malloc | 16 | 2.0000 |".to_string()), "{lines:?}");
    assert!(lines.contains(&"| valloc/malloc | 1048576 | 0.5000 |".to_string()), "{lines:?}");
    assert!(lines.contains(
        &"- valloc/malloc: max 2.0000 at 16 bytes, min 0.5000 at 1048576 bytes".to_string()
    ));
    assert!(lines.contains(&"- valloc/malloc: mean ratio 1.3750".to_string()));
}

#[test]
fn banded_summary_uses_configured_bands() {
    let config = config();
    let report = pipeline::run(&config, &tables(&config)).unwrap();
    assert_eq!(
        section(&report, "basic: allocation by size band"),
        [
            "### small (<= 256 bytes)",
            "- malloc: 0.000150s",
            "- valloc: 0.000300s",
            "",
            "### medium (4096 bytes)",
            "- malloc: 0.000800s",
            "- valloc: 0.000800s",
            "",
            "### large (1048576 bytes)",
            "- malloc: 0.008000s",
            "- valloc: 0.004000s",
        ]
    );
    let segmented = section(&report, "segmented: allocation by size band");
    assert!(segmented.contains(&"- calloc: n/a".to_string()), "{segmented:?}");
}

#[test]
fn text_workload_and_cross_source() {
    let config = config();
    let report = pipeline::run(&config, &tables(&config)).unwrap();
    assert_eq!(
        section(&report, "segmented: text workload"),
        ["- calloc: 0.004000s", "- malloc: 0.001000s", "- valloc: 0.002000s"]
    );
    assert_eq!(
        section(&report, "Cross-source comparison"),
        [
            "- basic: mean valloc/malloc allocation ratio 1.3750",
            "- segmented: mean valloc/calloc allocation ratio 1.0000",
            "- segmented: mean valloc/malloc allocation ratio 2.0000",
        ]
    );
}

#[test]
fn multithread_cleanup_ratios() {
    let config = config();
    let report = pipeline::run(&config, &tables(&config)).unwrap();
    let lines = section(&report, "multithread: allocation/free ratio");
    assert!(lines.contains(&"| valloc | allocation/free | 1024 | 4.0000 |".to_string()), "{lines:?}");
    assert!(lines.contains(
        &"- valloc: max 5.0000x at 65536 bytes, min 2.0000x at 4096 bytes".to_string()
    ));
    let notes = section(&report, "multithread: notes");
    assert!(notes.contains(&"- allocation: no allocator to compare with 'valloc'".to_string()));
    assert!(notes.contains(
        &"- combined average: no allocator to compare with 'valloc'".to_string()
    ));
}

#[test]
fn thread_cache_improvement() {
    let config = config();
    let report = pipeline::run(&config, &tables(&config)).unwrap();
    let lines = section(&report, "thread_cache: context comparison");
    assert_eq!(lines[2], "- improvement of 1 over 0: 25.00%");
}

#[test]
fn report_is_byte_identical_across_runs() {
    let config = config();
    let first = pipeline::run(&config, &tables(&config)).unwrap().render();
    let second = pipeline::run(&config, &tables(&config)).unwrap().render();
    assert_eq!(first, second);
    assert!(first.starts_with("# valloc performance analysis\n\n## Overview\n"));
}

#[test]
fn export_serializes_every_source() {
    let config = config();
    let exported = export::export(&config, &tables(&config)).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&export::to_json(&exported).unwrap()).unwrap();
    let sources = json["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 4);
    assert_eq!(sources[0]["name"], "basic");
    assert_eq!(sources[0]["statistics"].as_array().unwrap().len(), 16);
    assert!(sources[3]["contexts"]["improvement_pct"].is_number());

    let basic: Vec<&str> = sources[0]["ratios"]
        .as_array()
        .unwrap()
        .iter()
        .map(|set| set["operation"].as_str().unwrap())
        .collect();
    assert_eq!(basic, ["allocation", "free"]);
    let first = &sources[0]["ratios"][0]["records"][0];
    assert_eq!(first["competitor"], "malloc");
    assert!(first.get("operation").is_none());
}

#[test]
fn bad_row_is_reported_with_line() {
    let mut source = config().sources.remove(0);
    source.name = "broken".into();
    source.path = fixture_dir().join("broken.csv");
    match sample::load(&source) {
        Err(AnalysisError::Ingest { source, reason }) => {
            assert_eq!(source, "broken");
            assert!(reason.starts_with("line 3: invalid size 'sixteen'"), "{reason}");
        }
        other => panic!("expected ingest error, got {other:?}"),
    }
}
