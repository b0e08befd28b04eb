#![warn(missing_docs)]
//! Report aggregation for hvm-bench.
//!
//! Renders a sparse [`ResultMatrix`] into grouped, column-aligned plain-text
//! comparison tables: one block per mode, rows grouped by benchmark file with
//! one row per runtime, columns in revision resolution order.

mod table;

pub use table::{format_duration, render};
