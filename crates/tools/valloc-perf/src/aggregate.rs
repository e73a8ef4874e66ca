//! Grouping and summary statistics over sample tables.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AnalysisError, Result};
use crate::sample::{Operation, SampleTable};

/// Grouping key contract for [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// (allocator, size), for single-operation tables.
    AllocatorSize,
    /// (allocator, operation, size), for mixed tables.
    AllocatorOperationSize,
}

/// Key of an aggregate record.
///
/// Ordering is allocator name, then operation, then ascending size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    /// Allocator name.
    pub allocator: String,
    /// Operation, when grouping by operation.
    pub operation: Option<Operation>,
    /// Block size in bytes.
    pub size: u64,
}

impl GroupKey {
    /// Key without an operation component.
    pub fn new(allocator: impl Into<String>, size: u64) -> Self {
        Self {
            allocator: allocator.into(),
            operation: None,
            size,
        }
    }

    /// Key with an operation component.
    pub fn with_operation(allocator: impl Into<String>, operation: Operation, size: u64) -> Self {
        Self {
            allocator: allocator.into(),
            operation: Some(operation),
            size,
        }
    }
}

/// Summary statistics of one group, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateRecord {
    /// Arithmetic mean.
    pub mean: f64,
    /// Smallest time.
    pub min: f64,
    /// Largest time.
    pub max: f64,
    /// Median time.
    pub median: f64,
    /// Sample standard deviation (0 for a single sample).
    pub stddev: f64,
    /// Number of contributing samples.
    pub count: usize,
}

impl AggregateRecord {
    /// Compute statistics from a mutable slice of times.
    ///
    /// The slice is sorted in place. Returns `None` if the slice is empty.
    pub fn compute(times: &mut [f64]) -> Option<Self> {
        let n = times.len();
        if n == 0 {
            return None;
        }

        times.sort_unstable_by(f64::total_cmp);

        let min = times[0];
        let max = times[n - 1];
        let median = if n % 2 == 0 {
            (times[n / 2 - 1] + times[n / 2]) / 2.0
        } else {
            times[n / 2]
        };

        let count = n as f64;
        // Rounding can push the mean of equal values just outside [min, max].
        let mean = (times.iter().sum::<f64>() / count).clamp(min, max);

        let stddev = if n > 1 {
            let var_sum: f64 = times.iter().map(|&t| (t - mean) * (t - mean)).sum();
            (var_sum / (count - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            mean,
            min,
            max,
            median,
            stddev,
            count: n,
        })
    }

    /// Record for the average of two operations measured at the same key.
    fn average(a: &Self, b: &Self) -> Self {
        Self {
            mean: (a.mean + b.mean) / 2.0,
            min: (a.min + b.min) / 2.0,
            max: (a.max + b.max) / 2.0,
            median: (a.median + b.median) / 2.0,
            stddev: ((a.stddev * a.stddev + b.stddev * b.stddev) / 2.0).sqrt(),
            count: a.count + b.count,
        }
    }
}

/// Aggregate records of one table, keyed and ordered by [`GroupKey`].
#[derive(Debug, Clone)]
pub struct Aggregates {
    source: String,
    group_by: GroupBy,
    records: BTreeMap<GroupKey, AggregateRecord>,
}

impl Aggregates {
    /// Source identifier of the table the records were computed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Grouping used to build the records.
    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up one record.
    pub fn get(&self, key: &GroupKey) -> Option<&AggregateRecord> {
        self.records.get(key)
    }

    /// All records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &AggregateRecord)> {
        self.records.iter()
    }

    /// Distinct allocator names, sorted.
    pub fn allocators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.keys().map(|k| k.allocator.as_str()).collect();
        names.dedup();
        names
    }

    /// Distinct operations present, sorted. Empty for `AllocatorSize` grouping.
    pub fn operations(&self) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> = self
            .records
            .keys()
            .filter_map(|k| k.operation.as_ref())
            .collect();
        ops.sort();
        ops.dedup();
        ops
    }

    /// Distinct sizes measured for an allocator, ascending.
    pub fn sizes(&self, allocator: &str) -> Vec<u64> {
        let mut sizes: Vec<u64> = self
            .records
            .keys()
            .filter(|k| k.allocator == allocator)
            .map(|k| k.size)
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Returns `true` if any record has the given operation.
    pub fn has_operation(&self, operation: &Operation) -> bool {
        self.records
            .keys()
            .any(|k| k.operation.as_ref() == Some(operation))
    }

    /// Records of one allocator (and operation) in ascending size order.
    pub fn series(
        &self,
        allocator: &str,
        operation: Option<&Operation>,
    ) -> Vec<(u64, &AggregateRecord)> {
        self.records
            .iter()
            .filter(|(k, _)| k.allocator == allocator && k.operation.as_ref() == operation)
            .map(|(k, r)| (k.size, r))
            .collect()
    }
}

/// Group a table and reduce each group to summary statistics.
///
/// Fails with [`AnalysisError::EmptyGroup`] only if the table is empty.
pub fn aggregate(table: &SampleTable, group_by: GroupBy) -> Result<Aggregates> {
    if table.is_empty() {
        return Err(AnalysisError::EmptyGroup {
            source: table.source().to_string(),
        });
    }

    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for sample in table.samples() {
        let key = GroupKey {
            allocator: sample.allocator.clone(),
            operation: match group_by {
                GroupBy::AllocatorSize => None,
                GroupBy::AllocatorOperationSize => Some(sample.operation.clone()),
            },
            size: sample.size,
        };
        groups.entry(key).or_default().push(sample.time);
    }

    let records = groups
        .into_iter()
        .filter_map(|(key, mut times)| AggregateRecord::compute(&mut times).map(|r| (key, r)))
        .collect();

    Ok(Aggregates {
        source: table.source().to_string(),
        group_by,
        records,
    })
}

/// Aggregate the samples of a single operation, grouped by (allocator, size).
pub fn aggregate_operation(table: &SampleTable, operation: &Operation) -> Result<Aggregates> {
    let filtered = table.filter(|s| &s.operation == operation);
    if filtered.is_empty() {
        return Err(AnalysisError::EmptyGroup {
            source: format!("{} [{operation}]", table.source()),
        });
    }
    aggregate(&filtered, GroupBy::AllocatorSize)
}

/// Average two operations per (allocator, size).
///
/// The combined mean is the arithmetic mean of the two operation means.
/// Every (allocator, size) with samples for either operation must have both;
/// otherwise this fails with [`AnalysisError::MissingPair`].
pub fn combine(table: &SampleTable, first: &Operation, second: &Operation) -> Result<Aggregates> {
    let per_op = aggregate(table, GroupBy::AllocatorOperationSize)?;

    let mut pairs: BTreeMap<GroupKey, (Option<&AggregateRecord>, Option<&AggregateRecord>)> =
        BTreeMap::new();
    for (key, record) in per_op.iter() {
        let Some(op) = key.operation.as_ref() else {
            continue;
        };
        let slot = pairs
            .entry(GroupKey::new(key.allocator.clone(), key.size))
            .or_default();
        if op == first {
            slot.0 = Some(record);
        } else if op == second {
            slot.1 = Some(record);
        }
    }
    pairs.retain(|_, (a, b)| a.is_some() || b.is_some());

    if pairs.is_empty() {
        return Err(AnalysisError::no_data(format!(
            "{first}+{second} in '{}'",
            table.source()
        )));
    }

    let mut records = BTreeMap::new();
    for (key, pair) in pairs {
        let record = match pair {
            (Some(a), Some(b)) => AggregateRecord::average(a, b),
            (None, _) => return Err(missing_pair(key, first)),
            (_, None) => return Err(missing_pair(key, second)),
        };
        records.insert(key, record);
    }

    Ok(Aggregates {
        source: table.source().to_string(),
        group_by: GroupBy::AllocatorSize,
        records,
    })
}

fn missing_pair(key: GroupKey, missing: &Operation) -> AnalysisError {
    AnalysisError::MissingPair {
        allocator: key.allocator,
        size: key.size,
        missing: missing.clone(),
    }
}
