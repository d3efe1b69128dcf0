//! Output module for crawl summaries
//!
//! This module handles:
//! - Printing the statistics a crawl returns
//! - Reading back the state of a database-backed crawl

pub mod stats;

pub use stats::{
    format_statistics, load_statistics, print_statistics, print_stored_statistics,
    StoredStatistics,
};
