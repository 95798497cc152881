//! Dirty Set - which surface elements need a hardware update
//!
//! Records are keyed by [`SurfaceElement`], so repeated marks collapse into
//! one record whose intent only ever grows (`ValueOnly` to `FullRepaint`).
//!
//! ## Lifecycle
//!
//! ```text
//!  mark ──► pending ──drain──► in flight ──acknowledge──► gone
//!              ▲                   │
//!              └──────requeue──────┘   (push failed: original intent kept)
//! ```
//!
//! Draining orders by drain tier first, then by the sequence number the
//! record was created with, so the oldest dirty element of a tier always
//! goes first and nothing starves under a steady stream of newer marks.

pub mod coalescer;
pub mod meters;

use std::collections::HashMap;

use crate::surface::{SurfaceElement, UpdateIntent};

/// Merged update request for one element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRecord {
    pub intent: UpdateIntent,
    /// Creation order; promotion and repeated marks keep it
    pub seq: u64,
    /// Consecutive failed pushes
    pub failures: u32,
}

/// What a mark did to the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Inserted,
    Promoted,
    Unchanged,
}

/// Deduplicating record of stale surface elements
#[derive(Debug, Default)]
pub struct DirtySet {
    pending: HashMap<SurfaceElement, DirtyRecord>,
    in_flight: HashMap<SurfaceElement, DirtyRecord>,
    next_seq: u64,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an element dirty, merging with any pending record
    pub fn mark(&mut self, element: SurfaceElement, intent: UpdateIntent) -> MarkOutcome {
        if let Some(record) = self.pending.get_mut(&element) {
            let merged = record.intent.merge(intent);
            if merged == record.intent {
                return MarkOutcome::Unchanged;
            }
            record.intent = merged;
            return MarkOutcome::Promoted;
        }

        let seq = self.bump_seq();
        self.pending.insert(
            element,
            DirtyRecord {
                intent,
                seq,
                failures: 0,
            },
        );
        MarkOutcome::Inserted
    }

    /// Take up to `max` records in drain order
    pub fn drain(&mut self, max: usize) -> Vec<(SurfaceElement, UpdateIntent)> {
        self.drain_where(max, |_| true)
    }

    /// Take up to `max` records in drain order, skipping elements `eligible` rejects
    ///
    /// Skipped records stay pending with their position intact.
    pub fn drain_where<F>(&mut self, max: usize, eligible: F) -> Vec<(SurfaceElement, UpdateIntent)>
    where
        F: Fn(&SurfaceElement) -> bool,
    {
        if max == 0 || self.pending.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<(SurfaceElement, u8, u64)> = self
            .pending
            .iter()
            .filter(|(element, _)| eligible(element))
            .map(|(element, record)| (*element, element.drain_tier(), record.seq))
            .collect();
        candidates.sort_unstable_by_key(|&(_, tier, seq)| (tier, seq));
        candidates.truncate(max);

        let mut drained = Vec::with_capacity(candidates.len());
        for (element, _, _) in candidates {
            if let Some(record) = self.pending.remove(&element) {
                drained.push((element, record.intent));
                self.in_flight.insert(element, record);
            }
        }
        drained
    }

    /// The sink accepted an in-flight element; forget it
    pub fn acknowledge(&mut self, element: SurfaceElement) -> bool {
        self.in_flight.remove(&element).is_some()
    }

    /// The sink rejected an in-flight element; put it back
    ///
    /// The original intent and creation order are kept. A mark that arrived
    /// meanwhile is merged in. Returns the consecutive failure count.
    pub fn requeue(&mut self, element: SurfaceElement) -> Option<u32> {
        let record = self.in_flight.remove(&element)?;
        let failures = record.failures.saturating_add(1);

        let merged = match self.pending.get(&element) {
            Some(newer) => DirtyRecord {
                intent: record.intent.merge(newer.intent),
                seq: record.seq.min(newer.seq),
                failures,
            },
            None => DirtyRecord { failures, ..record },
        };
        self.pending.insert(element, merged);
        Some(failures)
    }

    pub fn get(&self, element: &SurfaceElement) -> Option<&DirtyRecord> {
        self.pending.get(element)
    }

    pub fn contains(&self, element: &SurfaceElement) -> bool {
        self.pending.contains_key(element)
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SurfaceElement, &DirtyRecord)> {
        self.pending.iter()
    }

    /// Drop everything, including in-flight records and the sequence counter
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
        self.next_seq = 0;
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
