//! Output formatting module
//!
//! Provides various output formats for run summaries and listings.

mod formatter;

pub use formatter::{write_results_to_file, OutputFormat, ResultFormatter};
