//! Sample store: loading benchmark result tables.
//!
//! Each source is read independently into a [`SampleTable`] that remembers
//! where it came from. Nothing here merges sources; callers hand several
//! tables to the later stages when they want a cross-source view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;

use crate::config::{ColumnMap, SourceConfig, WideColumns};
use crate::error::{AnalysisError, Result};

/// Header names tried, in order, when no operation column is configured.
const OPERATION_HEADERS: [&str; 2] = ["operation", "test_type"];

/// Size recorded for wide-layout workloads that have no block size.
const UNSIZED: u64 = 1;

/// The benchmarked action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    /// Block allocation.
    Allocation,
    /// Block deallocation.
    Free,
    /// Composite text manipulation workload.
    Text,
    /// Any other named workload, kept verbatim.
    Other(String),
}

impl Operation {
    /// Parse an operation discriminator as written by the benchmark harness.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "allocation" => Self::Allocation,
            "free" => Self::Free,
            "text" | "text_operations" => Self::Text,
            _ => Self::Other(name.to_string()),
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Allocation => "allocation",
            Self::Free => "free",
            Self::Text => "text",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

/// One timing measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Allocator name.
    pub allocator: String,
    /// Benchmarked action.
    pub operation: Operation,
    /// Block size in bytes (always positive).
    pub size: u64,
    /// Elapsed time in seconds (finite, non-negative).
    pub time: f64,
    /// Optional context tag (thread id, cache flag, ...).
    pub context: Option<String>,
}

/// Samples read from one source.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    source: String,
    samples: Vec<Sample>,
}

impl SampleTable {
    /// Create an empty table for the named source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            samples: Vec::new(),
        }
    }

    /// Create a table from already-built samples.
    pub fn from_samples(source: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            source: source.into(),
            samples,
        }
    }

    /// Source identifier this table was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Append a sample.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// All samples in load order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the table has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// A new table with the samples matching `keep`, same provenance.
    pub fn filter(&self, keep: impl Fn(&Sample) -> bool) -> Self {
        Self {
            source: self.source.clone(),
            samples: self.samples.iter().filter(|s| keep(s)).cloned().collect(),
        }
    }
}

/// Load a benchmark result file.
pub fn load(source: &SourceConfig) -> Result<SampleTable> {
    let file = File::open(&source.path).map_err(|e| {
        AnalysisError::ingest(
            &source.name,
            format!("reading {}: {e}", source.path.display()),
        )
    })?;
    load_from_reader(source, file)
}

/// Parse benchmark results from any reader, using the source's layout.
pub fn load_from_reader<R: io::Read>(source: &SourceConfig, reader: R) -> Result<SampleTable> {
    let delimiter = u8::try_from(source.delimiter).map_err(|_| {
        AnalysisError::ingest(
            &source.name,
            format!("delimiter {:?} is not a single-byte character", source.delimiter),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::ingest(&source.name, format!("reading header: {e}")))?
        .clone();

    match &source.wide {
        Some(wide) => read_wide(&source.name, &mut reader, &headers, wide),
        None => read_long(&source.name, &mut reader, &headers, &source.columns),
    }
}

/// Resolved field positions for the long layout.
struct LongLayout {
    allocator: usize,
    size: usize,
    time: usize,
    operation: usize,
    context: Option<usize>,
}

fn read_long<R: io::Read>(
    name: &str,
    reader: &mut csv::Reader<R>,
    headers: &csv::StringRecord,
    columns: &ColumnMap,
) -> Result<SampleTable> {
    let operation = match &columns.operation {
        Some(column) => require_column(name, headers, column)?,
        None => OPERATION_HEADERS
            .iter()
            .find_map(|column| find_column(headers, column))
            .ok_or_else(|| {
                AnalysisError::ingest(
                    name,
                    "missing required column 'operation' (or 'test_type')",
                )
            })?,
    };
    let layout = LongLayout {
        allocator: require_column(name, headers, &columns.allocator)?,
        size: require_column(name, headers, &columns.size)?,
        time: require_column(name, headers, &columns.time)?,
        operation,
        context: columns
            .context
            .as_deref()
            .map(|column| require_column(name, headers, column))
            .transpose()?,
    };

    let mut table = SampleTable::new(name);
    for (index, record) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let record =
            record.map_err(|e| AnalysisError::ingest(name, format!("line {line}: {e}")))?;

        let allocator = field(name, &record, layout.allocator, line)?;
        if allocator.is_empty() {
            return Err(AnalysisError::ingest(
                name,
                format!("line {line}: empty allocator name"),
            ));
        }

        table.push(Sample {
            allocator: allocator.to_string(),
            operation: Operation::parse(field(name, &record, layout.operation, line)?),
            size: parse_size(name, field(name, &record, layout.size, line)?, line)?,
            time: parse_time(name, field(name, &record, layout.time, line)?, line)?,
            context: layout
                .context
                .map(|idx| field(name, &record, idx, line).map(str::to_string))
                .transpose()?,
        });
    }

    Ok(table)
}

fn read_wide<R: io::Read>(
    name: &str,
    reader: &mut csv::Reader<R>,
    headers: &csv::StringRecord,
    wide: &WideColumns,
) -> Result<SampleTable> {
    if wide.times.is_empty() {
        return Err(AnalysisError::ingest(name, "wide layout declares no time columns"));
    }
    let size_idx = wide
        .size
        .as_deref()
        .map(|column| require_column(name, headers, column))
        .transpose()?;
    let context_idx = wide
        .context
        .as_deref()
        .map(|column| require_column(name, headers, column))
        .transpose()?;
    let times = wide
        .times
        .iter()
        .map(|(op, column)| Ok((Operation::parse(op), require_column(name, headers, column)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut table = SampleTable::new(name);
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record =
            record.map_err(|e| AnalysisError::ingest(name, format!("line {line}: {e}")))?;
        let size = match size_idx {
            Some(idx) => parse_size(name, field(name, &record, idx, line)?, line)?,
            None => UNSIZED,
        };
        let context = context_idx
            .map(|idx| field(name, &record, idx, line).map(str::to_string))
            .transpose()?;

        for (operation, idx) in &times {
            table.push(Sample {
                allocator: wide.allocator.clone(),
                operation: operation.clone(),
                size,
                time: parse_time(name, field(name, &record, *idx, line)?, line)?,
                context: context.clone(),
            });
        }
    }

    Ok(table)
}

fn find_column(headers: &csv::StringRecord, column: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(column))
}

fn require_column(name: &str, headers: &csv::StringRecord, column: &str) -> Result<usize> {
    find_column(headers, column).ok_or_else(|| {
        AnalysisError::ingest(name, format!("missing required column '{column}'"))
    })
}

fn field<'r>(
    name: &str,
    record: &'r csv::StringRecord,
    idx: usize,
    line: usize,
) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| AnalysisError::ingest(name, format!("line {line}: missing field {idx}")))
}

fn parse_size(name: &str, text: &str, line: usize) -> Result<u64> {
    match text.parse::<u64>() {
        Ok(size) if size > 0 => Ok(size),
        Ok(_) => Err(AnalysisError::ingest(name, format!("line {line}: size must be positive"))),
        Err(e) => Err(AnalysisError::ingest(
            name,
            format!("line {line}: invalid size '{text}': {e}"),
        )),
    }
}

fn parse_time(name: &str, text: &str, line: usize) -> Result<f64> {
    match text.parse::<f64>() {
        Ok(time) if time.is_finite() && time >= 0.0 => Ok(time),
        Ok(_) => Err(AnalysisError::ingest(
            name,
            format!("line {line}: time '{text}' is not a non-negative number"),
        )),
        Err(e) => Err(AnalysisError::ingest(
            name,
            format!("line {line}: invalid time '{text}': {e}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn basic_source() -> SourceConfig {
        SourceConfig::new("basic", "basic_performance_results.csv")
    }

    #[test]
    fn load_basic_layout() {
        let data = "allocator,size,operation,time\n\
                    valloc,16,allocation,0.000120\n\
                    valloc,16,free,0.000080\n\
                    malloc,16,allocation,0.000050\n";
        let table = load_from_reader(&basic_source(), data.as_bytes()).unwrap();
        assert_eq!(table.source(), "basic");
        assert_eq!(table.len(), 3);
        assert_eq!(table.samples()[0].allocator, "valloc");
        assert_eq!(table.samples()[1].operation, Operation::Free);
        assert_eq!(table.samples()[2].size, 16);
        assert!((table.samples()[2].time - 0.00005).abs() < 1e-12);
        assert_eq!(table.samples()[0].context, None);
    }

    #[test]
    fn headers_match_case_insensitively() {
        let data = "Allocator,Size,Operation,Time\nvalloc,32,allocation_loop,0.5\n";
        let table = load_from_reader(&basic_source(), data.as_bytes()).unwrap();
        assert_eq!(
            table.samples()[0].operation,
            Operation::Other("allocation_loop".into())
        );
    }

    #[test]
    fn test_type_is_accepted_as_discriminator() {
        let data = "allocator,size,test_type,time\ncalloc,4096,text,0.25\n";
        let table = load_from_reader(&basic_source(), data.as_bytes()).unwrap();
        assert_eq!(table.samples()[0].operation, Operation::Text);
    }

    #[test]
    fn custom_delimiter_and_columns() {
        let mut source = basic_source();
        source.delimiter = ';';
        source.columns.allocator = "alloc".into();
        source.columns.time = "seconds".into();
        source.columns.context = Some("thread".into());
        let data = "alloc;size;operation;seconds;thread\nvalloc;64;free;0.1;3\n";
        let table = load_from_reader(&source, data.as_bytes()).unwrap();
        assert_eq!(table.samples()[0].context.as_deref(), Some("3"));
    }

    #[test]
    fn missing_time_column_is_ingest_error() {
        let data = "allocator,size,operation\nvalloc,16,allocation\n";
        let err = load_from_reader(&basic_source(), data.as_bytes()).unwrap_err();
        match err {
            AnalysisError::Ingest { source, reason } => {
                assert_eq!(source, "basic");
                assert!(reason.contains("'time'"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_discriminator_is_ingest_error() {
        let data = "allocator,size,time\nvalloc,16,0.1\n";
        let err = load_from_reader(&basic_source(), data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("test_type"));
    }

    #[test]
    fn bad_rows_report_line_numbers() {
        let data = "allocator,size,operation,time\nvalloc,16,free,0.1\nvalloc,0,free,0.1\n";
        let err = load_from_reader(&basic_source(), data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");

        let data = "allocator,size,operation,time\nvalloc,16,free,-1\n";
        let err = load_from_reader(&basic_source(), data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn unreadable_file_is_ingest_error() {
        let source = SourceConfig::new("ghost", "/nonexistent/valloc/results.csv");
        assert!(matches!(load(&source), Err(AnalysisError::Ingest { .. })));
    }

    #[test]
    fn wide_layout_yields_one_sample_per_operation() {
        let mut times = BTreeMap::new();
        times.insert("allocation".to_string(), "allocation_time".to_string());
        times.insert("free".to_string(), "cleanup_time".to_string());
        let mut source = SourceConfig::new("multithread", "multithread_results.csv");
        source.wide = Some(WideColumns {
            allocator: "valloc".into(),
            size: Some("block_size".into()),
            times,
            context: None,
        });

        let data = "block_size,allocation_time,cleanup_time\n1024,0.004,0.001\n2048,0.006,0.002\n";
        let table = load_from_reader(&source, data.as_bytes()).unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.samples().iter().all(|s| s.allocator == "valloc"));
        assert_eq!(table.samples()[0].operation, Operation::Allocation);
        assert_eq!(table.samples()[1].operation, Operation::Free);
        assert_eq!(table.samples()[3].size, 2048);
    }

    #[test]
    fn wide_layout_without_size_column() {
        let mut times = BTreeMap::new();
        times.insert("thread_cache".to_string(), "execution_time".to_string());
        let mut source = SourceConfig::new("thread_cache", "benchmark_thread_cache.csv");
        source.wide = Some(WideColumns {
            allocator: "valloc".into(),
            size: None,
            times,
            context: Some("use_cache".into()),
        });

        let data = "thread_id,use_cache,execution_time
0,0,0.002
0,1,0.001
";
        let table = load_from_reader(&source, data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.samples().iter().all(|s| s.size == 1));
        assert_eq!(table.samples()[1].context.as_deref(), Some("1"));
        assert_eq!(
            table.samples()[0].operation,
            Operation::Other("thread_cache".into())
        );
    }

    #[test]
    fn operation_names_round_trip_through_strings() {
        for name in ["allocation", "free", "text", "allocation_loop"] {
            let op = Operation::parse(name);
            assert_eq!(String::from(op), name);
        }
        assert_eq!(Operation::parse("text_operations"), Operation::Text);
    }
}
