//! Formatting helpers for terminal output.

pub mod format;

pub use format::{check_mark, format_date, format_date_range, progress_bar, truncate_string};
