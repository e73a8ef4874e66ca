//! Terminal tables for statistics and ratios.

use valloc_perf::aggregate::{Aggregates, GroupBy};
use valloc_perf::compare::{self, RatioSet};
use valloc_perf::sample::Operation;

/// Print aggregate statistics as a formatted table.
pub fn print_stats_table(aggregates: &Aggregates) {
    if aggregates.is_empty() {
        println!("  No samples to display.");
        return;
    }

    let with_op = aggregates.group_by() == GroupBy::AllocatorOperationSize;
    let name_width = aggregates
        .iter()
        .map(|(k, _)| k.allocator.len())
        .max()
        .unwrap_or(9)
        .max(9);
    let op_width = if with_op {
        aggregates
            .iter()
            .filter_map(|(k, _)| k.operation.as_ref())
            .map(|op| op.as_str().len())
            .max()
            .unwrap_or(9)
            .max(9)
    } else {
        0
    };

    println!();
    let op_header = if with_op {
        format!("  {:<op_width$}", "Operation")
    } else {
        String::new()
    };
    println!(
        "  {:<name_width$}{op_header}  {:>10}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}  {:>7}",
        "Allocator", "Size (B)", "Mean (s)", "Median (s)", "Min (s)", "Max (s)", "Stddev (s)", "Samples",
    );
    let op_rule = if with_op {
        format!("  {:-<op_width$}", "")
    } else {
        String::new()
    };
    println!(
        "  {:-<name_width$}{op_rule}  {:->10}  {:->12}  {:->12}  {:->12}  {:->12}  {:->12}  {:->7}",
        "", "", "", "", "", "", "", "",
    );

    for (key, r) in aggregates.iter() {
        let op = match (&key.operation, with_op) {
            (Some(op), true) => format!("  {:<op_width$}", op.as_str()),
            _ => String::new(),
        };
        println!(
            "  {:<name_width$}{op}  {:>10}  {:>12.6}  {:>12.6}  {:>12.6}  {:>12.6}  {:>12.6}  {:>7}",
            key.allocator, key.size, r.mean, r.median, r.min, r.max, r.stddev, r.count,
        );
    }
    println!();
}

/// Print a ratio set with per-series extrema and mean.
pub fn print_ratio_table(set: &RatioSet) {
    if set.is_empty() {
        println!("  No allocator shares a size with '{}'.", set.baseline());
        return;
    }

    let labels: Vec<String> = set
        .iter()
        .map(|r| series_label(set, &r.competitor, r.operation.as_ref()))
        .collect();
    let label_width = labels.iter().map(String::len).max().unwrap_or(5).max(5);

    println!();
    println!("  {:<label_width$}  {:>10}  {:>10}", "Ratio", "Size (B)", "Value");
    println!("  {:-<label_width$}  {:->10}  {:->10}", "", "", "");
    for (label, record) in labels.iter().zip(set.iter()) {
        println!(
            "  {:<label_width$}  {:>10}  {:>10}",
            label,
            record.size,
            record.ratio.to_string(),
        );
    }

    println!();
    for (competitor, operation) in set.series_keys() {
        let label = series_label(set, &competitor, operation.as_ref());
        let series = set.series(&competitor, operation.as_ref());
        match compare::extrema(series) {
            Ok(found) => println!(
                "  {label}: max {} at {} B, min {} at {} B",
                found.max.ratio, found.max.size, found.min.ratio, found.min.size
            ),
            Err(_) => println!("  {label}: no defined ratio"),
        }
        if let Ok(mean) = set.mean_ratio(&competitor, operation.as_ref()) {
            println!("  {label}: mean ratio {mean:.4}");
        }
    }
    for missing in set.incomparable() {
        println!(
            "  {} has no measurement at {} B",
            missing.competitor, missing.size
        );
    }
    println!();
}

fn series_label(set: &RatioSet, competitor: &str, operation: Option<&Operation>) -> String {
    let label = set.orientation().label(set.baseline(), competitor);
    match operation {
        Some(op) => format!("{label} ({op})"),
        None => label,
    }
}
