//! Fader touch guard
//!
//! Keeps the motor of a touched fader still: while a hand is on the cap the
//! strip is held back from draining. Releasing it hands the strip back to the
//! scheduler with a value-only refresh so the fader settles on the host value.

use std::collections::BTreeSet;

use crate::surface::{SurfaceElement, TrackIndex};

/// Tracks whose fader is currently touched
#[derive(Debug, Default)]
pub struct TouchGuard {
    touched: BTreeSet<TrackIndex>,
}

impl TouchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the track was not already touched
    pub fn touch(&mut self, track: TrackIndex) -> bool {
        self.touched.insert(track)
    }

    /// Returns true if the track was touched
    pub fn release(&mut self, track: TrackIndex) -> bool {
        self.touched.remove(&track)
    }

    /// Whether draining `element` must wait
    pub fn holds(&self, element: SurfaceElement) -> bool {
        match element {
            SurfaceElement::TrackStrip(track) => self.touched.contains(&track),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    pub fn clear(&mut self) {
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_holds_only_that_strip() {
        let mut guard = TouchGuard::new();

        assert!(guard.touch(3));
        assert!(!guard.touch(3));

        assert!(guard.holds(SurfaceElement::TrackStrip(3)));
        assert!(!guard.holds(SurfaceElement::TrackStrip(4)));
        // Meters keep moving under a touched fader
        assert!(!guard.holds(SurfaceElement::MeterBank(3)));
    }

    #[test]
    fn test_release() {
        let mut guard = TouchGuard::new();
        guard.touch(1);

        assert!(guard.release(1));
        assert!(!guard.release(1));
        assert!(guard.is_empty());
    }
}
