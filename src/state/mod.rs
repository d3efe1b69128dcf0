//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Lifecycle of one crawl run (not started, running, stopping, completed)
//! - `PhaseCell`: Lock-free holder enforcing legal phase transitions
//! - `StopReason`: Why a run stopped early

mod phase;

// Re-export main types
pub use phase::{CrawlPhase, PhaseCell, StopReason};
