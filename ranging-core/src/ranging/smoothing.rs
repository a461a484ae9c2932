//! Recursive single-variable smoother for the distance estimate.
//!
//! Scalar Kalman form: each update blends the raw measurement into the
//! running estimate with a gain derived from the error covariance, shrinks
//! the covariance by the same gain, then adds a fixed process-noise term so
//! the filter keeps adapting instead of freezing on old state. The state is
//! four `f32` values and the update is four arithmetic operations, cheap
//! enough for the measurement path.

/// Filter state and tuning for one measurement series.
///
/// Deterministic: the same input sequence from the same initial state
/// produces bit-identical outputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceSmoother {
    estimate: f32,
    error_covariance: f32,
    process_noise: f32,
    measurement_noise: f32,
}

impl DistanceSmoother {
    /// Reference tuning for echo flight times in microseconds.
    pub const DEFAULT_MEASUREMENT_NOISE: f32 = 40.0;
    pub const DEFAULT_ERROR_COVARIANCE: f32 = 40.0;
    pub const DEFAULT_PROCESS_NOISE: f32 = 0.5;

    /// Cold-start state with the reference tuning.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_tuning(
            Self::DEFAULT_MEASUREMENT_NOISE,
            Self::DEFAULT_ERROR_COVARIANCE,
            Self::DEFAULT_PROCESS_NOISE,
        )
    }

    /// Cold-start state with explicit tuning.
    #[must_use]
    pub const fn with_tuning(
        measurement_noise: f32,
        error_covariance: f32,
        process_noise: f32,
    ) -> Self {
        Self {
            estimate: 0.0,
            error_covariance,
            process_noise,
            measurement_noise,
        }
    }

    /// Folds one validated measurement into the estimate and returns the
    /// updated estimate.
    pub fn update(&mut self, raw: f32) -> f32 {
        let gain = self.error_covariance / (self.error_covariance + self.measurement_noise);
        self.estimate += gain * (raw - self.estimate);
        self.error_covariance = (1.0 - gain) * self.error_covariance + self.process_noise;
        self.estimate
    }

    #[must_use]
    pub const fn estimate(&self) -> f32 {
        self.estimate
    }

    #[must_use]
    pub const fn error_covariance(&self) -> f32 {
        self.error_covariance
    }
}

impl Default for DistanceSmoother {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(value: f32) -> u32 {
        value.to_bits()
    }

    #[test]
    fn identical_inputs_produce_bit_identical_outputs() {
        let inputs = [15_000.0, 14_980.0, 15_020.0, 15_010.0, 14_995.0];

        let mut first = DistanceSmoother::new();
        let mut second = DistanceSmoother::new();

        for raw in inputs {
            assert_eq!(bits(first.update(raw)), bits(second.update(raw)));
        }
        assert_eq!(bits(first.estimate()), bits(second.estimate()));
        assert_eq!(bits(first.error_covariance()), bits(second.error_covariance()));
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let mut smoother = DistanceSmoother::new();
        let mut previous = smoother.estimate();
        assert_eq!(bits(previous), bits(0.0));

        for _ in 0..64 {
            let estimate = smoother.update(100.0);
            assert!(estimate > previous);
            assert!(estimate <= 100.0);
            previous = estimate;
        }
        assert!(previous > 99.0);
    }

    #[test]
    fn first_cold_start_update_splits_the_gain_evenly() {
        // Covariance and measurement noise start equal, so the first gain
        // is exactly one half.
        let mut smoother = DistanceSmoother::new();
        assert_eq!(bits(smoother.update(100.0)), bits(50.0));
    }

    #[test]
    fn process_noise_keeps_the_filter_responsive() {
        let mut smoother = DistanceSmoother::new();
        for _ in 0..200 {
            smoother.update(100.0);
        }
        let settled_covariance = smoother.error_covariance();
        // The additive term keeps the covariance bounded away from zero.
        assert!(settled_covariance >= DistanceSmoother::DEFAULT_PROCESS_NOISE);

        // A step change still moves the estimate promptly.
        let before_step = smoother.estimate();
        let after_step = smoother.update(200.0);
        assert!(after_step > before_step + 5.0);
    }

    #[test]
    fn tuning_is_recorded_as_given() {
        let smoother = DistanceSmoother::with_tuning(10.0, 20.0, 0.25);
        assert_eq!(bits(smoother.error_covariance()), bits(20.0));
        assert_eq!(bits(smoother.estimate()), bits(0.0));
    }
}
