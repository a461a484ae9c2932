//! Plausibility gate for raw echo durations.

/// Closed acceptance window for raw echo durations, in microseconds.
///
/// Durations under the floor are electrical chatter; durations over the
/// ceiling are echoes from beyond the transducer's rated range. Both ends
/// are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlausibilityWindow {
    min_micros: u64,
    max_micros: u64,
}

impl PlausibilityWindow {
    /// Reference window for the stock transducer.
    pub const DEFAULT: Self = Self {
        min_micros: 20,
        max_micros: 20_000,
    };

    /// Window accepting durations in `[min_micros, max_micros]`.
    #[must_use]
    pub const fn new(min_micros: u64, max_micros: u64) -> Self {
        Self {
            min_micros,
            max_micros,
        }
    }

    #[must_use]
    pub const fn min_micros(&self) -> u64 {
        self.min_micros
    }

    #[must_use]
    pub const fn max_micros(&self) -> u64 {
        self.max_micros
    }

    /// Whether `duration_micros` lies inside the window, both ends included.
    #[must_use]
    pub const fn is_valid(&self, duration_micros: u64) -> bool {
        duration_micros >= self.min_micros && duration_micros <= self.max_micros
    }
}

impl Default for PlausibilityWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_on_both_ends() {
        let window = PlausibilityWindow::new(20, 20_000);
        assert!(window.is_valid(20));
        assert!(window.is_valid(20_000));
        assert!(!window.is_valid(19));
        assert!(!window.is_valid(20_001));
    }

    #[test]
    fn interior_durations_are_valid() {
        let window = PlausibilityWindow::default();
        assert!(window.is_valid(21));
        assert!(window.is_valid(15_000));
        assert!(window.is_valid(19_999));
    }

    #[test]
    fn extremes_are_rejected() {
        let window = PlausibilityWindow::default();
        assert!(!window.is_valid(0));
        assert!(!window.is_valid(u64::MAX));
    }

    #[test]
    fn default_matches_the_reference_window() {
        let window = PlausibilityWindow::default();
        assert_eq!(window.min_micros(), 20);
        assert_eq!(window.max_micros(), 20_000);
    }
}
