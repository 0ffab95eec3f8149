//! Run metadata.
//!
//! The simulator records a small summary of every run: how many events
//! were dispatched, how long the run took on the wall clock, where
//! simulated time ended up, and why the loop stopped. Wall-clock data
//! is observational only — simulated time never depends on it.

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use crate::error::SimError;
use crate::time::SimTime;

/// Why a run loop halted.
#[derive(Debug)]
pub enum TerminationReason {
    /// The event heap drained completely.
    NoEvents,
    /// The next event lies beyond the `max_time` horizon.
    MaxTimeReached,
    /// The configured stop condition returned true.
    StopConditionMet,
    /// A cooperative stop was requested via the stop flag.
    StopRequested,
    /// A fatal error aborted the run; the offending event's context is
    /// carried in the error variant.
    Error(SimError),
}

impl TerminationReason {
    /// Returns `true` for the error variant.
    pub fn is_error(&self) -> bool {
        matches!(self, TerminationReason::Error(_))
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::NoEvents => write!(f, "no events remain"),
            TerminationReason::MaxTimeReached => write!(f, "max time reached"),
            TerminationReason::StopConditionMet => write!(f, "stop condition satisfied"),
            TerminationReason::StopRequested => write!(f, "stop requested"),
            TerminationReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Summary of one `Simulator::run` call.
#[derive(Debug)]
pub struct RunSummary {
    /// Number of events handed to user code. A batch invocation counts
    /// as the size of its batch.
    pub num_events: u64,

    /// Wall-clock time at which the run cycle started.
    pub start_wall_time: SystemTime,

    /// Wall-clock duration of the run cycle.
    pub duration: Duration,

    /// Simulated time after the last dispatched frontier.
    pub final_sim_time: SimTime,

    /// Why the run loop halted.
    pub termination_reason: TerminationReason,

    /// Dispatched-event counts per receiving object, present when
    /// profiling is enabled.
    pub per_object_counts: Option<BTreeMap<String, u64>>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events, final {}, {} ({:?})",
            self.num_events, self.final_sim_time, self.termination_reason, self.duration
        )
    }
}

/// Tracks the wall-clock span of a run cycle.
///
/// Started by `Simulator::initialize` so the recorded start covers
/// init-time scheduling as well as the loop itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunTimer {
    started_instant: Instant,
    started_system: SystemTime,
}

impl RunTimer {
    pub(crate) fn start() -> Self {
        RunTimer {
            started_instant: Instant::now(),
            started_system: SystemTime::now(),
        }
    }

    pub(crate) fn start_wall_time(&self) -> SystemTime {
        self.started_system
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        assert_eq!(TerminationReason::NoEvents.to_string(), "no events remain");
        assert_eq!(
            TerminationReason::MaxTimeReached.to_string(),
            "max time reached"
        );
        let err = TerminationReason::Error(SimError::NotInitialized);
        assert!(err.to_string().contains("not been initialized"));
        assert!(err.is_error());
        assert!(!TerminationReason::StopRequested.is_error());
    }

    #[test]
    fn test_timer_measures_forward() {
        let timer = RunTimer::start();
        let elapsed = timer.elapsed();
        assert!(elapsed >= Duration::ZERO);
        assert!(timer.start_wall_time() <= SystemTime::now());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            num_events: 4,
            start_wall_time: SystemTime::UNIX_EPOCH,
            duration: Duration::from_millis(3),
            final_sim_time: SimTime::new(24.0),
            termination_reason: TerminationReason::MaxTimeReached,
            per_object_counts: None,
        };
        let text = summary.to_string();
        assert!(text.contains("4 events"));
        assert!(text.contains("T=24"));
        assert!(text.contains("max time reached"));
    }
}
