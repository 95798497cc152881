//! Per-unit surface layout
//!
//! Each physical unit (main or extender) runs its own engine. The layout
//! says which elements exist on that unit and which host tracks its strips
//! currently show.

use serde::{Deserialize, Serialize};

use super::element::{buttons, SurfaceElement, TrackIndex};

/// Number of character display lines
pub const DISPLAY_LINES: u8 = 2;

/// Maximum strips on one MCU-class unit
pub const MAX_STRIPS: u8 = 8;

/// Role of a physical unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Main unit: strips, display, transport section
    #[default]
    Main,
    /// Extender: strips and display only
    Extender,
}

impl DeviceRole {
    /// Mackie SysEx device id for this role
    pub fn device_id(self) -> u8 {
        match self {
            DeviceRole::Main => 0x14,
            DeviceRole::Extender => 0x15,
        }
    }
}

/// Elements present on one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceLayout {
    role: DeviceRole,
    strip_count: u8,
    track_offset: TrackIndex,
}

impl SurfaceLayout {
    /// Create a layout; `strip_count` is clamped to 1..=8
    pub fn new(role: DeviceRole, strip_count: u8, track_offset: TrackIndex) -> Self {
        Self {
            role,
            strip_count: strip_count.clamp(1, MAX_STRIPS),
            track_offset,
        }
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn strip_count(&self) -> u8 {
        self.strip_count
    }

    /// Whether this unit has a transport section and global LEDs
    pub fn has_transport(&self) -> bool {
        self.role == DeviceRole::Main
    }

    /// Host tracks currently shown on this unit's strips
    pub fn known_tracks(&self) -> impl Iterator<Item = TrackIndex> {
        let start = self.track_offset;
        let end = start.saturating_add(self.strip_count as TrackIndex);
        start..end
    }

    pub fn is_known_track(&self, track: TrackIndex) -> bool {
        self.strip_for_track(track).is_some()
    }

    /// Physical strip (0-based) showing `track`
    pub fn strip_for_track(&self, track: TrackIndex) -> Option<u8> {
        let strip = track.checked_sub(self.track_offset)?;
        (strip < self.strip_count as TrackIndex).then_some(strip as u8)
    }

    /// Host track shown on physical strip `strip` (0-based)
    pub fn track_for_strip(&self, strip: u8) -> Option<TrackIndex> {
        (strip < self.strip_count).then(|| self.track_offset.saturating_add(strip as TrackIndex))
    }

    /// Transport LED notes on this unit (none on an extender)
    pub fn transport_leds(&self) -> &'static [u8] {
        if self.has_transport() {
            &buttons::TRANSPORT
        } else {
            &[]
        }
    }

    pub fn display_lines(&self) -> impl Iterator<Item = SurfaceElement> {
        (0..DISPLAY_LINES).map(SurfaceElement::DisplayLine)
    }

    pub fn track_strips(&self) -> impl Iterator<Item = SurfaceElement> {
        self.known_tracks().map(SurfaceElement::TrackStrip)
    }

    /// Whether `element` exists on this unit
    pub fn contains(&self, element: SurfaceElement) -> bool {
        match element {
            SurfaceElement::Global => self.has_transport(),
            SurfaceElement::TransportLed(note) => self.transport_leds().contains(&note),
            SurfaceElement::DisplayLine(line) => line < DISPLAY_LINES,
            SurfaceElement::TrackStrip(track) | SurfaceElement::MeterBank(track) => {
                self.is_known_track(track)
            }
        }
    }

    /// Every element of this unit, in drain-tier order
    pub fn all_elements(&self) -> Vec<SurfaceElement> {
        let mut elements = Vec::new();
        if self.has_transport() {
            elements.push(SurfaceElement::Global);
        }
        elements.extend(self.transport_leds().iter().map(|&n| SurfaceElement::TransportLed(n)));
        elements.extend(self.display_lines());
        elements.extend(self.track_strips());
        elements.extend(self.known_tracks().map(SurfaceElement::MeterBank));
        elements
    }
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        Self::new(DeviceRole::Main, MAX_STRIPS, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_unit_elements() {
        let layout = SurfaceLayout::default();
        let all = layout.all_elements();

        // global + 8 transport + 2 display + 8 strips + 8 meters
        assert_eq!(all.len(), 27);
        assert_eq!(all[0], SurfaceElement::Global);
        assert!(all.contains(&SurfaceElement::TransportLed(buttons::PLAY)));
        assert!(all.contains(&SurfaceElement::MeterBank(7)));
    }

    #[test]
    fn test_extender_has_no_transport() {
        let layout = SurfaceLayout::new(DeviceRole::Extender, 8, 8);

        assert!(!layout.contains(SurfaceElement::Global));
        assert!(!layout.contains(SurfaceElement::TransportLed(buttons::PLAY)));
        assert_eq!(layout.all_elements().len(), 2 + 8 + 8);
        assert_eq!(layout.known_tracks().collect::<Vec<_>>(), (8..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_strip_track_mapping() {
        let layout = SurfaceLayout::new(DeviceRole::Extender, 4, 10);

        assert_eq!(layout.strip_for_track(10), Some(0));
        assert_eq!(layout.strip_for_track(13), Some(3));
        assert_eq!(layout.strip_for_track(14), None);
        assert_eq!(layout.strip_for_track(9), None);
        assert_eq!(layout.track_for_strip(2), Some(12));
        assert_eq!(layout.track_for_strip(4), None);
    }

    #[test]
    fn test_strip_count_is_clamped() {
        assert_eq!(SurfaceLayout::new(DeviceRole::Main, 0, 0).strip_count(), 1);
        assert_eq!(SurfaceLayout::new(DeviceRole::Main, 20, 0).strip_count(), 8);
    }

    #[test]
    fn test_role_device_ids() {
        assert_eq!(DeviceRole::Main.device_id(), 0x14);
        assert_eq!(DeviceRole::Extender.device_id(), 0x15);
    }
}
