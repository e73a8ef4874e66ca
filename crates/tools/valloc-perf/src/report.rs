//! Report synthesis: labeled sections rendered as Markdown.
//!
//! Sections appear in the order they are added. Every collection rendered
//! here is ordered, so the same inputs always produce the same bytes.

use std::fmt::Write as _;

use crate::aggregate::{Aggregates, GroupBy};
use crate::bands::BandSummary;
use crate::compare::{self, OperationRatio, RatioSet};

/// What a section is built from.
#[derive(Debug, Clone)]
pub enum SectionContent {
    /// Aggregate statistics table.
    Aggregates(Aggregates),
    /// Ratio table, optionally followed by per-series max/min and mean lines.
    Ratios {
        /// The ratios.
        set: RatioSet,
        /// Append extrema and mean ratio lines per series.
        summary: bool,
    },
    /// Operation-to-operation ratios with per-allocator extrema.
    OperationRatios(Vec<OperationRatio>),
    /// Per-band allocator means.
    Bands(Vec<BandSummary>),
    /// Prose lines, used verbatim.
    Lines(Vec<String>),
}

/// A rendered section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    /// Section heading.
    pub label: String,
    /// Rendered lines, without trailing newlines.
    pub lines: Vec<String>,
}

/// A finished report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    /// Report heading.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sections in order.
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    /// Render the report as Markdown.
    pub fn render(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            out.push('\n');
            let _ = writeln!(out, "## {}", section.label);
            out.push('\n');
            for line in &section.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Incremental report builder.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    title: String,
    sections: Vec<ReportSection>,
}

impl ReportBuilder {
    /// Start a report with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Append a section rendered from `content`.
    #[must_use]
    pub fn section(mut self, label: impl Into<String>, content: SectionContent) -> Self {
        self.sections.push(ReportSection {
            label: label.into(),
            lines: render_content(&content),
        });
        self
    }

    /// Append a prose section.
    #[must_use]
    pub fn lines(self, label: impl Into<String>, lines: Vec<String>) -> Self {
        self.section(label, SectionContent::Lines(lines))
    }

    /// Number of sections added so far.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns `true` if no section was added.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Finish the report.
    pub fn build(self) -> Report {
        Report {
            title: self.title,
            sections: self.sections,
        }
    }
}

/// Build a report from labeled sections, in the given order.
pub fn build(title: &str, sections: Vec<(String, SectionContent)>) -> Report {
    sections
        .into_iter()
        .fold(ReportBuilder::new(title), |builder, (label, content)| {
            builder.section(label, content)
        })
        .build()
}

/// Format seconds with fixed precision.
pub fn seconds(value: f64) -> String {
    format!("{value:.6}s")
}

fn render_content(content: &SectionContent) -> Vec<String> {
    match content {
        SectionContent::Aggregates(aggs) => render_aggregates(aggs),
        SectionContent::Ratios { set, summary } => render_ratios(set, *summary),
        SectionContent::OperationRatios(ratios) => render_operation_ratios(ratios),
        SectionContent::Bands(bands) => render_bands(bands),
        SectionContent::Lines(lines) => lines.clone(),
    }
}

fn render_aggregates(aggs: &Aggregates) -> Vec<String> {
    let by_op = aggs.group_by() == GroupBy::AllocatorOperationSize;
    let mut lines = Vec::with_capacity(aggs.len() + 2);
    if by_op {
        lines.push(
            "| allocator | operation | size (B) | mean (s) | min (s) | max (s) | median (s) | stddev (s) | n |"
                .to_string(),
        );
        lines.push("|---|---|---:|---:|---:|---:|---:|---:|---:|".to_string());
    } else {
        lines.push(
            "| allocator | size (B) | mean (s) | min (s) | max (s) | median (s) | stddev (s) | n |"
                .to_string(),
        );
        lines.push("|---|---:|---:|---:|---:|---:|---:|---:|".to_string());
    }

    for (key, r) in aggs.iter() {
        let op = match (&key.operation, by_op) {
            (Some(op), true) => format!(" {op} |"),
            (None, true) => " - |".to_string(),
            (_, false) => String::new(),
        };
        lines.push(format!(
            "| {} |{op} {} | {:.6} | {:.6} | {:.6} | {:.6} | {:.6} | {} |",
            key.allocator, key.size, r.mean, r.min, r.max, r.median, r.stddev, r.count
        ));
    }
    lines
}

fn render_ratios(set: &RatioSet, summary: bool) -> Vec<String> {
    let with_op = set.iter().any(|r| r.operation.is_some());
    let mut lines = Vec::new();
    if with_op {
        lines.push("| ratio | operation | size (B) | value |".to_string());
        lines.push("|---|---|---:|---:|".to_string());
    } else {
        lines.push("| ratio | size (B) | value |".to_string());
        lines.push("|---|---:|---:|".to_string());
    }
    for r in set.iter() {
        let label = set.orientation().label(set.baseline(), &r.competitor);
        let op = match (&r.operation, with_op) {
            (Some(op), true) => format!(" {op} |"),
            (None, true) => " - |".to_string(),
            (_, false) => String::new(),
        };
        lines.push(format!("| {label} |{op} {} | {} |", r.size, r.ratio));
    }

    if !set.incomparable().is_empty() {
        lines.push(String::new());
        for missing in set.incomparable() {
            let op = missing
                .operation
                .as_ref()
                .map_or_else(String::new, |op| format!(" {op}"));
            lines.push(format!(
                "- incomparable: {}{op} has no measurement at {} bytes",
                missing.competitor, missing.size
            ));
        }
    }

    if summary {
        lines.push(String::new());
        for (competitor, operation) in set.series_keys() {
            let label = set.orientation().label(set.baseline(), &competitor);
            let label = match &operation {
                Some(op) => format!("{label} ({op})"),
                None => label,
            };
            let series = set.series(&competitor, operation.as_ref());
            match compare::extrema(series) {
                Ok(found) => lines.push(format!(
                    "- {label}: max {} at {} bytes, min {} at {} bytes",
                    found.max.ratio, found.max.size, found.min.ratio, found.min.size
                )),
                Err(_) => lines.push(format!("- {label}: no defined ratios")),
            }
            if let Ok(mean) = set.mean_ratio(&competitor, operation.as_ref()) {
                lines.push(format!("- {label}: mean ratio {mean:.4}"));
            }
        }
    }
    lines
}

fn render_operation_ratios(ratios: &[OperationRatio]) -> Vec<String> {
    let mut lines = vec![
        "| allocator | ratio | size (B) | value |".to_string(),
        "|---|---|---:|---:|".to_string(),
    ];
    for r in ratios {
        lines.push(format!(
            "| {} | {}/{} | {} | {} |",
            r.allocator, r.numerator, r.denominator, r.size, r.ratio
        ));
    }

    let mut allocators: Vec<&str> = ratios.iter().map(|r| r.allocator.as_str()).collect();
    allocators.sort_unstable();
    allocators.dedup();
    if !allocators.is_empty() {
        lines.push(String::new());
    }
    for allocator in allocators {
        let series = ratios.iter().filter(|r| r.allocator == allocator);
        match compare::extrema(series) {
            Ok(found) => lines.push(format!(
                "- {allocator}: max {}x at {} bytes, min {}x at {} bytes",
                found.max.ratio, found.max.size, found.min.ratio, found.min.size
            )),
            Err(_) => lines.push(format!("- {allocator}: no defined ratios")),
        }
    }
    lines
}

fn render_bands(bands: &[BandSummary]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, summary) in bands.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!(
            "### {} ({})",
            summary.band.name,
            summary.band.describe()
        ));
        for (allocator, mean) in &summary.means {
            match mean {
                Some(mean) => lines.push(format!("- {allocator}: {}", seconds(*mean))),
                None => lines.push(format!("- {allocator}: n/a")),
            }
        }
    }
    lines
}
