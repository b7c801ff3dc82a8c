use crate::shared::rational::Rational;

/// Presentation time of the next frame, derived from how many frames the
/// stream has committed so far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamClock {
    time_base: Rational,
}

impl StreamClock {
    pub fn new(time_base: Rational) -> Self {
        Self { time_base }
    }

    /// Seconds elapsed after `frames_emitted` frames.
    pub fn seconds(&self, frames_emitted: u64) -> f64 {
        frames_emitted as f64 * self.time_base.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.0)]
    #[case(1, 0.04)]
    #[case(25, 1.0)]
    #[case(250, 10.0)]
    fn test_seconds_at_25_fps(#[case] frames: u64, #[case] expected: f64) {
        let clock = StreamClock::new(Rational::new(1, 25));
        assert_relative_eq!(clock.seconds(frames), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_denominator_reads_as_zero() {
        let clock = StreamClock::new(Rational::new(1, 0));
        assert_relative_eq!(clock.seconds(100), 0.0);
    }
}
