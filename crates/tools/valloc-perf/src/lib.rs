//! Analysis of allocator micro-benchmark results.
//!
//! Loads delimited benchmark tables (allocator, operation, block size, time),
//! reduces them to per-group statistics, compares every allocator against a
//! baseline, and renders a deterministic Markdown report. A JSON export of the
//! same results is available for further tooling.
//!
//! The library never prints; progress output belongs to the caller.

pub mod aggregate;
pub mod bands;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod sample;

pub use error::{AnalysisError, Result};
