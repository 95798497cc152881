//! Meter samples - latest value per meter bank
//!
//! Meters never enter the [`DirtySet`](super::DirtySet). Samples collected
//! between two ticks collapse to the newest one per track, and the scheduler
//! takes the whole queue once per tick.

use std::collections::BTreeMap;

use crate::surface::TrackIndex;

#[derive(Debug, Default)]
pub struct MeterQueue {
    latest: BTreeMap<TrackIndex, f32>,
}

impl MeterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample; returns true when it replaced an older one
    pub fn offer(&mut self, track: TrackIndex, level: f32) -> bool {
        self.latest.insert(track, level).is_some()
    }

    /// Take every pending sample, lowest track first
    pub fn take(&mut self) -> Vec<(TrackIndex, f32)> {
        std::mem::take(&mut self.latest).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_sample_wins() {
        let mut queue = MeterQueue::new();

        assert!(!queue.offer(2, 0.25));
        assert!(queue.offer(2, 0.75));
        assert!(!queue.offer(0, 0.5));

        assert_eq!(queue.take(), vec![(0, 0.5), (2, 0.75)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_empties_queue() {
        let mut queue = MeterQueue::new();
        queue.offer(1, 0.1);
        assert_eq!(queue.len(), 1);

        queue.take();
        assert!(queue.take().is_empty());
    }
}
