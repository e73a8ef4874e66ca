//! Allocator-to-allocator ratios and extremum detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::{AggregateRecord, Aggregates, GroupKey};
use crate::error::{AnalysisError, Result};
use crate::sample::{Operation, SampleTable};

/// Which side of a ratio the baseline allocator sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// `baseline / competitor`.
    #[default]
    BaselineOverCompetitor,
    /// `competitor / baseline`.
    CompetitorOverBaseline,
}

impl Orientation {
    /// Human-readable ratio label, e.g. `valloc/malloc`.
    pub fn label(self, baseline: &str, competitor: &str) -> String {
        match self {
            Self::BaselineOverCompetitor => format!("{baseline}/{competitor}"),
            Self::CompetitorOverBaseline => format!("{competitor}/{baseline}"),
        }
    }
}

/// A ratio value, or `Undefined` when the denominator is zero or not finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "Option<f64>")]
pub enum Ratio {
    /// Finite quotient.
    Value(f64),
    /// Zero, missing or non-finite denominator.
    Undefined,
}

impl Ratio {
    /// `numerator / denominator`, never `inf` or `NaN`.
    pub fn between(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return Self::Undefined;
        }
        let value = numerator / denominator;
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Undefined
        }
    }

    /// The quotient, if defined.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }

    /// Returns `true` if the ratio is undefined.
    pub fn is_undefined(self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl From<Ratio> for Option<f64> {
    fn from(ratio: Ratio) -> Self {
        ratio.value()
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.4}"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

/// A point of a size-indexed series, as seen by [`extrema`].
pub trait SizedValue {
    /// Block size of the point.
    fn size(&self) -> u64;
    /// Value of the point; `None` points are skipped.
    fn value(&self) -> Option<f64>;
    /// Series description used in error messages.
    fn series(&self) -> String;
}

/// Ratio between the baseline and one competitor at one size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioRecord {
    /// Reference allocator.
    pub baseline: String,
    /// Compared allocator.
    pub competitor: String,
    /// Operation, when the aggregates were grouped by operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Block size in bytes.
    pub size: u64,
    /// The ratio.
    pub ratio: Ratio,
}

impl SizedValue for RatioRecord {
    fn size(&self) -> u64 {
        self.size
    }

    fn value(&self) -> Option<f64> {
        self.ratio.value()
    }

    fn series(&self) -> String {
        series_name(&self.baseline, &self.competitor, self.operation.as_ref())
    }
}

/// A competitor size that the baseline has but the competitor lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incomparable {
    /// Competitor allocator.
    pub competitor: String,
    /// Operation of the baseline record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Baseline size missing for the competitor.
    pub size: u64,
}

type SeriesKey = (String, Option<Operation>);

/// All ratios against one baseline, ordered by competitor, operation, size.
#[derive(Debug, Clone)]
pub struct RatioSet {
    source: String,
    baseline: String,
    orientation: Orientation,
    records: BTreeMap<(String, Option<Operation>, u64), RatioRecord>,
    incomparable: Vec<Incomparable>,
}

impl RatioSet {
    /// Source the aggregates came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Reference allocator.
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Ratio orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Number of ratio records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no ratio could be computed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &RatioRecord> {
        self.records.values()
    }

    /// Look up one ratio.
    pub fn get(
        &self,
        competitor: &str,
        operation: Option<&Operation>,
        size: u64,
    ) -> Option<&RatioRecord> {
        self.records
            .get(&(competitor.to_string(), operation.cloned(), size))
    }

    /// Baseline sizes that some competitor was not benchmarked at.
    pub fn incomparable(&self) -> &[Incomparable] {
        &self.incomparable
    }

    /// Distinct (competitor, operation) series, sorted.
    pub fn series_keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self
            .records
            .keys()
            .map(|(c, op, _)| (c.clone(), op.clone()))
            .collect();
        keys.dedup();
        keys
    }

    /// One series in ascending size order.
    pub fn series(&self, competitor: &str, operation: Option<&Operation>) -> Vec<&RatioRecord> {
        self.records
            .values()
            .filter(|r| r.competitor == competitor && r.operation.as_ref() == operation)
            .collect()
    }

    /// Mean of the defined ratios of one series.
    pub fn mean_ratio(&self, competitor: &str, operation: Option<&Operation>) -> Result<f64> {
        let values: Vec<f64> = self
            .series(competitor, operation)
            .iter()
            .filter_map(|r| r.ratio.value())
            .collect();
        if values.is_empty() {
            return Err(AnalysisError::no_data(series_name(
                &self.baseline,
                competitor,
                operation,
            )));
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Compute `baseline` vs competitor ratios for every size the baseline has.
///
/// Competitors are matched on (operation, size). A baseline size missing for
/// a competitor is recorded as incomparable instead of being zero-filled.
/// Fails with [`AnalysisError::NoData`] if the baseline has no records.
pub fn ratios(
    aggregates: &Aggregates,
    baseline: &str,
    orientation: Orientation,
) -> Result<RatioSet> {
    let competitors: Vec<&str> = aggregates
        .allocators()
        .into_iter()
        .filter(|&name| name != baseline)
        .collect();

    let mut records = BTreeMap::new();
    let mut incomparable = Vec::new();
    let mut baseline_seen = false;

    for (key, base) in aggregates.iter().filter(|(k, _)| k.allocator == baseline) {
        baseline_seen = true;
        for &competitor in &competitors {
            let competitor_key = GroupKey {
                allocator: competitor.to_string(),
                operation: key.operation.clone(),
                size: key.size,
            };
            let Some(other) = aggregates.get(&competitor_key) else {
                incomparable.push(Incomparable {
                    competitor: competitor.to_string(),
                    operation: key.operation.clone(),
                    size: key.size,
                });
                continue;
            };

            let ratio = match orientation {
                Orientation::BaselineOverCompetitor => Ratio::between(base.mean, other.mean),
                Orientation::CompetitorOverBaseline => Ratio::between(other.mean, base.mean),
            };
            records.insert(
                (competitor.to_string(), key.operation.clone(), key.size),
                RatioRecord {
                    baseline: baseline.to_string(),
                    competitor: competitor.to_string(),
                    operation: key.operation.clone(),
                    size: key.size,
                    ratio,
                },
            );
        }
    }

    if !baseline_seen {
        return Err(AnalysisError::no_data(format!(
            "baseline '{baseline}' in '{}'",
            aggregates.source()
        )));
    }
    incomparable.sort_by(|a, b| {
        (&a.competitor, &a.operation, a.size).cmp(&(&b.competitor, &b.operation, b.size))
    });

    Ok(RatioSet {
        source: aggregates.source().to_string(),
        baseline: baseline.to_string(),
        orientation,
        records,
        incomparable,
    })
}

/// Largest and smallest points of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrema<T> {
    /// Point with the maximum value.
    pub max: T,
    /// Point with the minimum value.
    pub min: T,
}

/// Find the maximum and minimum of one series.
///
/// Points without a value are skipped. Ties go to the first point in
/// ascending-size order. Fails with [`AnalysisError::NoData`] if no point
/// has a value.
pub fn extrema<'a, T, I>(points: I) -> Result<Extrema<T>>
where
    T: SizedValue + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut points: Vec<&T> = points.into_iter().collect();
    // Stable sort keeps input order among equal sizes.
    points.sort_by_key(|p| p.size());

    let mut best: Option<(&T, f64, &T, f64)> = None;
    for &point in &points {
        let Some(value) = point.value() else {
            continue;
        };
        best = Some(match best {
            None => (point, value, point, value),
            Some((max, max_v, min, min_v)) => {
                let (max, max_v) = if value > max_v { (point, value) } else { (max, max_v) };
                let (min, min_v) = if value < min_v { (point, value) } else { (min, min_v) };
                (max, max_v, min, min_v)
            }
        });
    }

    match best {
        Some((max, _, min, _)) => Ok(Extrema {
            max: max.clone(),
            min: min.clone(),
        }),
        None => Err(AnalysisError::no_data(
            points
                .first()
                .map_or_else(|| "<empty>".to_string(), |p| p.series()),
        )),
    }
}

/// Mean time of one aggregate group at a size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizePoint {
    /// Block size in bytes.
    pub size: u64,
    /// Mean time in seconds.
    pub mean: f64,
}

impl SizedValue for SizePoint {
    fn size(&self) -> u64 {
        self.size
    }

    fn value(&self) -> Option<f64> {
        Some(self.mean)
    }

    fn series(&self) -> String {
        format!("mean times at {} bytes", self.size)
    }
}

/// Slowest and fastest sizes of one allocator (and operation).
pub fn time_extrema(
    aggregates: &Aggregates,
    allocator: &str,
    operation: Option<&Operation>,
) -> Result<Extrema<SizePoint>> {
    let points: Vec<SizePoint> = aggregates
        .series(allocator, operation)
        .into_iter()
        .map(|(size, r)| SizePoint { size, mean: r.mean })
        .collect();
    if points.is_empty() {
        let what = operation.map_or_else(String::new, |op| format!(" {op}"));
        return Err(AnalysisError::no_data(format!(
            "{allocator}{what} times in '{}'",
            aggregates.source()
        )));
    }
    extrema(&points)
}

/// Ratio of two operation means of one allocator at one size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRatio {
    /// Allocator name.
    pub allocator: String,
    /// Block size in bytes.
    pub size: u64,
    /// Numerator operation.
    pub numerator: Operation,
    /// Denominator operation.
    pub denominator: Operation,
    /// `numerator mean / denominator mean`, undefined if either side is absent.
    pub ratio: Ratio,
}

impl SizedValue for OperationRatio {
    fn size(&self) -> u64 {
        self.size
    }

    fn value(&self) -> Option<f64> {
        self.ratio.value()
    }

    fn series(&self) -> String {
        format!("{} {}/{}", self.allocator, self.numerator, self.denominator)
    }
}

/// Per (allocator, size) ratio of two operations.
///
/// Expects aggregates grouped by operation. Keys with only one of the two
/// operations yield an undefined ratio.
pub fn operation_ratios(
    aggregates: &Aggregates,
    numerator: &Operation,
    denominator: &Operation,
) -> Vec<OperationRatio> {
    let mut sides: BTreeMap<(String, u64), (Option<AggregateRecord>, Option<AggregateRecord>)> =
        BTreeMap::new();
    for (key, record) in aggregates.iter() {
        let Some(op) = key.operation.as_ref() else {
            continue;
        };
        if op != numerator && op != denominator {
            continue;
        }
        let slot = sides.entry((key.allocator.clone(), key.size)).or_default();
        if op == numerator {
            slot.0 = Some(*record);
        } else {
            slot.1 = Some(*record);
        }
    }

    sides
        .into_iter()
        .map(|((allocator, size), (num, den))| OperationRatio {
            allocator,
            size,
            numerator: numerator.clone(),
            denominator: denominator.clone(),
            ratio: match (num, den) {
                (Some(n), Some(d)) => Ratio::between(n.mean, d.mean),
                _ => Ratio::Undefined,
            },
        })
        .collect()
}

/// Mean times under two context tags and the relative improvement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextImprovement {
    /// Statistics of the reference context (e.g. cache disabled).
    pub reference: AggregateRecord,
    /// Statistics of the candidate context (e.g. cache enabled).
    pub candidate: AggregateRecord,
    /// `(reference - candidate) / reference * 100`.
    pub improvement_pct: Ratio,
}

/// Compare the samples tagged `reference` against those tagged `candidate`.
pub fn context_improvement(
    table: &SampleTable,
    reference: &str,
    candidate: &str,
) -> Result<ContextImprovement> {
    let stats = |tag: &str| {
        let mut times: Vec<f64> = table
            .samples()
            .iter()
            .filter(|s| s.context.as_deref() == Some(tag))
            .map(|s| s.time)
            .collect();
        AggregateRecord::compute(&mut times).ok_or_else(|| {
            AnalysisError::no_data(format!("context '{tag}' in '{}'", table.source()))
        })
    };
    let reference = stats(reference)?;
    let candidate = stats(candidate)?;

    let improvement_pct = match Ratio::between(reference.mean - candidate.mean, reference.mean) {
        Ratio::Value(v) => Ratio::Value(v * 100.0),
        Ratio::Undefined => Ratio::Undefined,
    };

    Ok(ContextImprovement {
        reference,
        candidate,
        improvement_pct,
    })
}

fn series_name(baseline: &str, competitor: &str, operation: Option<&Operation>) -> String {
    match operation {
        Some(op) => format!("{baseline} vs {competitor} ({op})"),
        None => format!("{baseline} vs {competitor}"),
    }
}
