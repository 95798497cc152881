//! Surface element identity and update intent

use std::fmt;

/// Host mixer track index
pub type TrackIndex = u16;

/// Button LED notes on an MCU-class surface
pub mod buttons {
    /// Per-strip button rows, strip 1 first
    pub const REC_ARM_FIRST: u8 = 0x00;
    pub const SOLO_FIRST: u8 = 0x08;
    pub const MUTE_FIRST: u8 = 0x10;
    pub const SELECT_FIRST: u8 = 0x18;

    pub const CYCLE: u8 = 0x56;
    pub const CLICK: u8 = 0x59;
    pub const REWIND: u8 = 0x5B;
    pub const FAST_FORWARD: u8 = 0x5C;
    pub const STOP: u8 = 0x5D;
    pub const PLAY: u8 = 0x5E;
    pub const RECORD: u8 = 0x5F;
    /// "BEATS" time-display LED, driven by the host beat indicator
    pub const BEAT: u8 = 0x72;

    /// Transport LEDs, each tracked as its own element
    pub const TRANSPORT: [u8; 8] = [CYCLE, CLICK, REWIND, FAST_FORWARD, STOP, PLAY, RECORD, BEAT];

    /// Global view / window LEDs, pushed together as the Global element
    pub const GLOBAL_VIEW: [u8; 8] = [0x3E, 0x3F, 0x40, 0x41, 0x42, 0x43, 0x44, 0x45];
}

/// Kind of updatable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Global,
    TransportLed,
    DisplayLine,
    TrackStrip,
    MeterBank,
}

impl ElementKind {
    /// Drain tier: lower drains first.
    ///
    /// Transport and display desync is more noticeable than a stale strip,
    /// and a stale strip more than a stale meter.
    pub fn drain_tier(self) -> u8 {
        match self {
            ElementKind::Global | ElementKind::TransportLed | ElementKind::DisplayLine => 0,
            ElementKind::TrackStrip => 1,
            ElementKind::MeterBank => 2,
        }
    }
}

/// One physically updatable unit of the surface
///
/// Track indices are unsigned: the host's "-1 = all tracks" sentinel is
/// expanded by the coalescer and can never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceElement {
    /// Non-transport global LEDs (view/window indicators)
    Global,
    /// A single transport LED, by note number
    TransportLed(u8),
    /// One line of the character display (0 = upper, 1 = lower)
    DisplayLine(u8),
    /// Fader, V-Pot ring, strip buttons and scribble text of one track
    TrackStrip(TrackIndex),
    /// Level meter of one track
    MeterBank(TrackIndex),
}

impl SurfaceElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            SurfaceElement::Global => ElementKind::Global,
            SurfaceElement::TransportLed(_) => ElementKind::TransportLed,
            SurfaceElement::DisplayLine(_) => ElementKind::DisplayLine,
            SurfaceElement::TrackStrip(_) => ElementKind::TrackStrip,
            SurfaceElement::MeterBank(_) => ElementKind::MeterBank,
        }
    }

    /// Index within the kind, None for the singleton Global element
    pub fn index(&self) -> Option<u32> {
        match *self {
            SurfaceElement::Global => None,
            SurfaceElement::TransportLed(note) => Some(note as u32),
            SurfaceElement::DisplayLine(line) => Some(line as u32),
            SurfaceElement::TrackStrip(track) | SurfaceElement::MeterBank(track) => Some(track as u32),
        }
    }

    pub fn drain_tier(&self) -> u8 {
        self.kind().drain_tier()
    }
}

impl fmt::Display for SurfaceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceElement::Global => write!(f, "global"),
            SurfaceElement::TransportLed(note) => write!(f, "transport-led:{:02X}", note),
            SurfaceElement::DisplayLine(line) => write!(f, "display:{}", line),
            SurfaceElement::TrackStrip(track) => write!(f, "strip:{}", track),
            SurfaceElement::MeterBank(track) => write!(f, "meter:{}", track),
        }
    }
}

/// How much of an element must be rewritten
///
/// Ordered so that `max` is the merge: a full repaint always satisfies a
/// pending value-only request, and an intent is never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateIntent {
    /// Only the changing values (fader position, LED states, ring)
    ValueOnly,
    /// Everything, including static content such as names
    FullRepaint,
}

impl UpdateIntent {
    pub fn merge(self, other: UpdateIntent) -> UpdateIntent {
        self.max(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_never_downgrades() {
        use crate::surface::UpdateIntent::*;
        assert_eq!(ValueOnly.merge(ValueOnly), ValueOnly);
        assert_eq!(ValueOnly.merge(FullRepaint), FullRepaint);
        assert_eq!(FullRepaint.merge(ValueOnly), FullRepaint);
        assert_eq!(FullRepaint.merge(FullRepaint), FullRepaint);
    }

    #[test]
    fn test_drain_tiers() {
        assert_eq!(SurfaceElement::Global.drain_tier(), 0);
        assert_eq!(SurfaceElement::TransportLed(buttons::PLAY).drain_tier(), 0);
        assert_eq!(SurfaceElement::DisplayLine(1).drain_tier(), 0);
        assert_eq!(SurfaceElement::TrackStrip(3).drain_tier(), 1);
        assert_eq!(SurfaceElement::MeterBank(3).drain_tier(), 2);
    }

    #[test]
    fn test_index() {
        assert_eq!(SurfaceElement::Global.index(), None);
        assert_eq!(SurfaceElement::TrackStrip(12).index(), Some(12));
        assert_eq!(SurfaceElement::TransportLed(buttons::PLAY).index(), Some(0x5E));
    }
}
