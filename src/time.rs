/// Simulation time for the deterministic kernel.
///
/// Represents a point on the simulated timeline with no dependency on
/// `std::time`. Time advances only when the run loop dispatches events —
/// never from wall-clock observation. The ordering on `SimTime` is the
/// kernel's sole synchronization primitive.

use std::cmp::Ordering;

/// A point in simulated time.
///
/// Wraps an `f64` (the timeline is continuous; delays like `0.5` are
/// legal) and provides the total order the event heap requires.
/// `NaN` values are rejected at every scheduling boundary, so ordinary
/// kernel code only ever compares well-behaved values; the `Ord` impl
/// uses `f64::total_cmp` so that even a `NaN` smuggled past a boundary
/// cannot break heap invariants.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(f64);

impl SimTime {
    /// The zero-point of simulated time.
    pub const ZERO: SimTime = SimTime(0.0);

    /// A time later than every finite time; useful as an unbounded
    /// `max_time` for `Simulator::run`.
    pub const FAR_FUTURE: SimTime = SimTime(f64::INFINITY);

    /// Create a `SimTime` from a raw value.
    #[inline]
    pub fn new(value: f64) -> Self {
        SimTime(value)
    }

    /// Return the raw value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Compute the time `delay` after `self`.
    #[inline]
    pub fn plus(self, delay: f64) -> SimTime {
        SimTime(self.0 + delay)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self < other
    }

    /// Elapsed simulated time since `other`, or `None` if `other` is
    /// later than `self`.
    #[inline]
    pub fn duration_since(self, other: SimTime) -> Option<f64> {
        if other <= self {
            Some(self.0 - other.0)
        } else {
            None
        }
    }

    /// Returns `true` if the underlying value is NaN.
    #[inline]
    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(value)
    }
}

// Hand-written comparisons keep `Eq`/`Ord` consistent with each other:
// a derived `PartialEq` would use IEEE equality, which disagrees with
// `total_cmp` on `-0.0` and `NaN`.
impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(SimTime::ZERO.value(), 0.0);
    }

    #[test]
    fn test_ordering() {
        let t1 = SimTime::new(10.0);
        let t2 = SimTime::new(20.0);
        assert!(t1 < t2);
        assert!(t1.is_before(t2));
        assert!(!t2.is_before(t1));
    }

    #[test]
    fn test_fractional_times_order() {
        let t1 = SimTime::new(1.25);
        let t2 = SimTime::new(1.5);
        assert!(t1 < t2);
    }

    #[test]
    fn test_plus() {
        let t = SimTime::new(100.0);
        assert_eq!(t.plus(50.0), SimTime::new(150.0));
        assert_eq!(t.plus(0.0), t);
    }

    #[test]
    fn test_duration_since() {
        let t1 = SimTime::new(10.0);
        let t2 = SimTime::new(30.0);
        assert_eq!(t2.duration_since(t1), Some(20.0));
        assert_eq!(t1.duration_since(t2), None);
    }

    #[test]
    fn test_far_future_beats_everything_finite() {
        assert!(SimTime::new(f64::MAX) < SimTime::FAR_FUTURE);
    }

    #[test]
    fn test_negative_zero_orders_before_zero() {
        // total_cmp puts -0.0 before +0.0; the kernel never produces
        // -0.0, but the ordering must still be total and consistent.
        let neg = SimTime::new(-0.0);
        let pos = SimTime::new(0.0);
        assert!(neg < pos);
        assert_ne!(neg, pos);
    }

    #[test]
    fn test_nan_detection() {
        assert!(SimTime::new(f64::NAN).is_nan());
        assert!(!SimTime::new(1.0).is_nan());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", SimTime::new(42.0)), "T=42");
        assert_eq!(format!("{}", SimTime::new(2.5)), "T=2.5");
    }
}
