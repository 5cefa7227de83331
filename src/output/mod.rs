//! Output formatting module
//!
//! Renders verification outcomes and benchmark exits.

mod formatter;

pub use formatter::{write_outcome_to_file, OutputFormat, ResultFormatter};
