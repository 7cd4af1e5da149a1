//! Turning collected test output into comparison reports.

pub mod parse;
pub mod report;
pub mod split;

pub use parse::parse_results;
pub use report::{generate_report, render_table};
pub use split::split_log;
