//! Utility functions for string handling.

pub mod format;

pub use format::{contains_ignore_case, truncate_string};
