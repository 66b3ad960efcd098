//! Utility functions for memory mapping operations.

pub mod alignment;

pub use alignment::{is_aligned, page_size};
