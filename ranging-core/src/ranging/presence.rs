//! Windowed majority vote over boolean pulse detections.
//!
//! Receiver nodes sample the echo line on a timer and get a noisy stream of
//! hits. The debouncer keeps the last `N` samples and reports presence only
//! while at least half the window agrees, so single-sample flicker never
//! reaches the telemetry channel.

use heapless::HistoryBuf;

/// Reference window capacity.
pub const PRESENCE_WINDOW: usize = 32;

/// Direction of a presence change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceTransition {
    Appeared,
    Vanished,
}

/// Result of folding one detection into the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresenceUpdate {
    /// Debounced value after the push.
    pub present: bool,
    /// Set when this push flipped the debounced value.
    pub transition: Option<PresenceTransition>,
}

/// Majority-vote debouncer over the last `N` detections.
///
/// The threshold stays fixed at `N / 2` even while the window is still
/// filling, so a handful of early positives cannot fake presence.
#[derive(Debug)]
pub struct PresenceDetector<const N: usize = PRESENCE_WINDOW> {
    window: HistoryBuf<bool, N>,
    present: bool,
}

impl<const N: usize> PresenceDetector<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: HistoryBuf::new(),
            present: false,
        }
    }

    /// Votes needed for the window to count as present.
    #[must_use]
    pub const fn threshold() -> usize {
        N / 2
    }

    /// Folds one detection into the window and reports the debounced value
    /// plus any transition this push caused.
    pub fn push(&mut self, detected: bool) -> PresenceUpdate {
        self.window.write(detected);
        let hits = self.window.oldest_ordered().filter(|&&hit| hit).count();
        let present = hits >= Self::threshold();

        let transition = match (self.present, present) {
            (false, true) => Some(PresenceTransition::Appeared),
            (true, false) => Some(PresenceTransition::Vanished),
            _ => None,
        };
        self.present = present;

        PresenceUpdate {
            present,
            transition,
        }
    }

    /// Current debounced value.
    #[must_use]
    pub const fn present(&self) -> bool {
        self.present
    }

    /// Samples currently held (≤ `N`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl<const N: usize> Default for PresenceDetector<N> {
    fn default() -> Self {
        Self::new()
    }
}
