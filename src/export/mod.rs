//! Export module for benchmark reports.
//!
//! Writes the JSON report document and renders the terminal tables.

pub mod report;
pub mod table;

pub use report::{BenchmarkReport, ReportConfig};
pub use table::{render_capability_matrix, render_results_table};
