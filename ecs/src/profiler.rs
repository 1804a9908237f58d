//! Per-frame system timings.

use crate::schedule::Phase;
use std::time::Duration;

/// One system execution within a frame, in schedule order.
#[derive(Clone, Debug)]
pub struct SystemSample {
    pub name: &'static str,
    pub phase: Phase,
    pub priority: i32,
    pub duration: Duration,
}

/// Timings of the most recently completed frame, in execution order.
/// UPDATE samples precede RENDER samples by construction.
#[derive(Clone, Debug, Default)]
pub struct FrameProfile {
    pub frame: u64,
    pub samples: Vec<SystemSample>,
}

impl FrameProfile {
    pub fn total(&self) -> Duration {
        self.samples.iter().map(|s| s.duration).sum()
    }

    /// Longest sample of the frame, if any system ran.
    pub fn hottest(&self) -> Option<&SystemSample> {
        self.samples.iter().max_by_key(|s| s.duration)
    }
}
