//! Report rate control for outbound telemetry

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often the telemetry reporter sends an Info packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReportRate {
    /// Send every published sample immediately
    Immediate,

    /// Send the latest sample at most this many times per second
    Hz(u32),
}

impl ReportRate {
    /// Interval between reports, `None` for [`ReportRate::Immediate`].
    ///
    /// `Hz(0)` is treated as immediate rather than dividing by zero.
    pub fn interval(self) -> Option<Duration> {
        match self {
            ReportRate::Immediate | ReportRate::Hz(0) => None,
            ReportRate::Hz(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

impl Default for ReportRate {
    fn default() -> Self {
        ReportRate::Hz(20)
    }
}
