//! Simulation time.

/// Simulated time. Always non-negative, possibly infinite for passive models.
pub type Time = f64;

/// Time of a model that will never have an internal transition on its own.
pub const INFINITY: Time = f64::INFINITY;

/// Anything that can be ordered in a pending event queue.
pub trait Timed {
    /// The time at which the item is due.
    fn time_next(&self) -> Time;
}

/// Checks if `time` can be used as a simulation time: not NaN and not negative.
#[must_use]
pub fn is_valid_time(time: Time) -> bool {
    time >= 0.0
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, true)]
    #[case(12.5, true)]
    #[case(INFINITY, true)]
    #[case(-1.0, false)]
    #[case(f64::NAN, false)]
    fn test_valid_time(#[case] time: Time, #[case] valid: bool) {
        assert_eq!(is_valid_time(time), valid);
    }
}
