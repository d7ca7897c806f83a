//! Output formatting helpers for the CLI.
//!
//! Every command prints either JSON (`--json`) or a human-readable table.

mod json;
mod text;

// Re-export public API
pub use json::print_json;
pub use text::{entries_table, lots_table, print_lot, print_outcome, print_report};
