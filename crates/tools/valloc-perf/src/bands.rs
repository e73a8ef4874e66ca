//! Named size bands for categorical report summaries.
//!
//! Band boundaries always come from configuration; a band is either an exact
//! size or an inclusive range with optional ends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::Aggregates;

/// A named block-size band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBand {
    /// Band name (e.g. "small").
    pub name: String,
    /// Matches exactly this size. Takes precedence over `min`/`max`.
    #[serde(default)]
    pub exact: Option<u64>,
    /// Inclusive lower bound.
    #[serde(default)]
    pub min: Option<u64>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub max: Option<u64>,
}

impl SizeBand {
    /// Band of all sizes up to and including `max`.
    pub fn up_to(name: impl Into<String>, max: u64) -> Self {
        Self {
            name: name.into(),
            exact: None,
            min: None,
            max: Some(max),
        }
    }

    /// Band of exactly one size.
    pub fn exact(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            exact: Some(size),
            min: None,
            max: None,
        }
    }

    /// Band of sizes in `min..=max`.
    pub fn range(name: impl Into<String>, min: u64, max: u64) -> Self {
        Self {
            name: name.into(),
            exact: None,
            min: Some(min),
            max: Some(max),
        }
    }

    /// Returns `true` if `size` falls in the band.
    pub fn contains(&self, size: u64) -> bool {
        if let Some(exact) = self.exact {
            return size == exact;
        }
        self.min.is_none_or(|min| size >= min) && self.max.is_none_or(|max| size <= max)
    }

    /// Short description of the band's sizes.
    pub fn describe(&self) -> String {
        match (self.exact, self.min, self.max) {
            (Some(exact), _, _) => format!("{exact} bytes"),
            (None, Some(min), Some(max)) => format!("{min}-{max} bytes"),
            (None, Some(min), None) => format!(">= {min} bytes"),
            (None, None, Some(max)) => format!("<= {max} bytes"),
            (None, None, None) => "all sizes".to_string(),
        }
    }
}

/// Per-allocator mean time within one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSummary {
    /// The band.
    pub band: SizeBand,
    /// Allocator to mean of the record means in the band, `None` if the
    /// allocator has no size in it.
    pub means: BTreeMap<String, Option<f64>>,
}

/// Summarize aggregates by band.
///
/// The value for an allocator is the mean of its record means whose size
/// falls in the band. Pass single-operation aggregates.
pub fn summarize(aggregates: &Aggregates, bands: &[SizeBand]) -> Vec<BandSummary> {
    let allocators = aggregates.allocators();
    bands
        .iter()
        .map(|band| {
            let means = allocators
                .iter()
                .map(|&allocator| {
                    let values: Vec<f64> = aggregates
                        .iter()
                        .filter(|(k, _)| k.allocator == allocator && band.contains(k.size))
                        .map(|(_, r)| r.mean)
                        .collect();
                    let mean = (!values.is_empty())
                        .then(|| values.iter().sum::<f64>() / values.len() as f64);
                    (allocator.to_string(), mean)
                })
                .collect();
            BandSummary {
                band: band.clone(),
                means,
            }
        })
        .collect()
}
