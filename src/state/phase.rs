//! Crawl phase definitions for tracking a run's lifecycle
//!
//! A run moves `NotStarted -> Running -> (Stopping) -> Completed`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlPhase {
    /// `crawl()` has not been called yet, or seeds are still being queued
    #[default]
    NotStarted,

    /// Downloads are being dispatched
    Running,

    /// A stop was requested; in-flight downloads drain, no new ones start
    Stopping,

    /// Terminal: nothing in flight and nothing more will be dispatched
    Completed,
}

impl CrawlPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if new downloads may still start in this phase
    pub fn is_dispatching(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Completed)
                | (Self::Stopping, Self::Completed)
        )
    }

    /// Converts the phase to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Completed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Completed,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic holder for the current [`CrawlPhase`]
///
/// Transitions are checked with [`CrawlPhase::can_transition_to`] and applied
/// with compare-and-swap, so concurrent callers racing for the same
/// transition see exactly one winner.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(CrawlPhase::NotStarted.as_u8()))
    }

    pub fn get(&self) -> CrawlPhase {
        CrawlPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves to `next` if that is legal from the current phase
    ///
    /// # Returns
    ///
    /// * `Ok(previous)` - The transition happened
    /// * `Err(current)` - The current phase does not allow it; nothing changed
    pub fn transition(&self, next: CrawlPhase) -> Result<CrawlPhase, CrawlPhase> {
        let mut current = self.get();
        loop {
            if !current.can_transition_to(next) {
                return Err(current);
            }
            match self.0.compare_exchange(
                current.as_u8(),
                next.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => current = CrawlPhase::from_u8(actual),
            }
        }
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a crawl stopped before running out of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// `cancel()` was called
    Cancelled,
    /// The wall-clock limit elapsed
    MaxCrawlTime,
    /// The crawled-page limit was reached
    MaxDownloads,
    /// Too many downloads failed
    MaxDownloadErrors,
    /// No seed URL was admitted
    SeedRejected,
    /// The queue or history store failed
    StorageFailure,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Cancelled => "cancelled",
            Self::MaxCrawlTime => "max crawl time reached",
            Self::MaxDownloads => "max downloads reached",
            Self::MaxDownloadErrors => "max download errors reached",
            Self::SeedRejected => "no seed accepted",
            Self::StorageFailure => "storage failure",
        };
        write!(f, "{}", text)
    }
}
