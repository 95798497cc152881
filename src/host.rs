//! Host State Reader
//!
//! The engine never caches host values: everything pushed to the surface is
//! read through [`HostStateReader`] at drain time. [`MixerSnapshot`] is a
//! plain in-memory host used by the standalone runner and by tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::classifier::{CategorySet, ChangeCategory, Fader, HardwareInputEvent};
use crate::midi::convert;
use crate::surface::{
    buttons, LedState, StripValue, SurfaceElement, SurfaceLayout, SurfaceValue, TrackIndex,
};

/// Authoritative, side-effect-free view of host state
pub trait HostStateReader {
    /// Current value for an element, or None if the host has nothing for it
    fn read_current_value(&self, element: SurfaceElement) -> Option<SurfaceValue>;

    /// Current meter level (0.0-1.0) for a track
    fn read_meter(&self, track: TrackIndex) -> Option<f32>;
}

impl<T: HostStateReader + ?Sized> HostStateReader for &T {
    fn read_current_value(&self, element: SurfaceElement) -> Option<SurfaceValue> {
        (**self).read_current_value(element)
    }

    fn read_meter(&self, track: TrackIndex) -> Option<f32> {
        (**self).read_meter(track)
    }
}

/// One mixer track
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackState {
    pub name: String,
    /// Fader level, 0.0-1.0
    pub level: f32,
    /// Pan, -1.0 (left) to 1.0 (right)
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    pub selected: bool,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: 0.8,
            pan: 0.0,
            mute: false,
            solo: false,
            armed: false,
            selected: false,
        }
    }
}

/// In-memory mixer and transport state
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MixerSnapshot {
    pub tracks: BTreeMap<TrackIndex, TrackState>,
    /// LED state by note number
    pub leds: BTreeMap<u8, LedState>,
    /// Display lines, top first
    pub display: Vec<String>,
    pub meters: BTreeMap<TrackIndex, f32>,
}

/// Pan change per V-Pot detent
const PAN_STEP: f32 = 0.05;

impl MixerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track state, created with defaults if missing
    pub fn track_mut(&mut self, track: TrackIndex) -> &mut TrackState {
        self.tracks.entry(track).or_default()
    }

    pub fn remove_track(&mut self, track: TrackIndex) -> Option<TrackState> {
        self.meters.remove(&track);
        self.tracks.remove(&track)
    }

    pub fn set_led(&mut self, note: u8, state: LedState) {
        self.leds.insert(note, state);
    }

    pub fn led(&self, note: u8) -> LedState {
        self.leds.get(&note).copied().unwrap_or_default()
    }

    pub fn set_display_line(&mut self, line: usize, text: impl Into<String>) {
        if self.display.len() <= line {
            self.display.resize(line + 1, String::new());
        }
        self.display[line] = text.into();
    }

    pub fn set_meter(&mut self, track: TrackIndex, level: f32) {
        self.meters.insert(track, level.clamp(0.0, 1.0));
    }

    /// Apply surface input the way a host mixer would
    ///
    /// Returns the categories the host would report as changed.
    pub fn apply_input(&mut self, layout: &SurfaceLayout, event: &HardwareInputEvent) -> CategorySet {
        let mut changed = CategorySet::empty();

        match *event {
            HardwareInputEvent::FaderMove {
                fader: Fader::Strip(strip),
                value,
            } => {
                if let Some(track) = layout.track_for_strip(strip) {
                    self.track_mut(track).level = convert::from_14bit_to_unit(value);
                    changed.insert(ChangeCategory::MixerControls);
                }
            }
            HardwareInputEvent::VPot { strip, delta } => {
                if let Some(track) = layout.track_for_strip(strip) {
                    let state = self.track_mut(track);
                    state.pan = (state.pan + delta as f32 * PAN_STEP).clamp(-1.0, 1.0);
                    changed.insert(ChangeCategory::MixerControls);
                }
            }
            HardwareInputEvent::Button { note, pressed: true } => {
                changed = self.press(layout, note);
            }
            _ => {}
        }

        if !changed.is_empty() {
            trace!("Input {:?} changed {:?}", event, changed.iter().collect::<Vec<_>>());
        }
        changed
    }

    fn press(&mut self, layout: &SurfaceLayout, note: u8) -> CategorySet {
        let mut changed = CategorySet::empty();
        let strip_button = |first: u8| {
            note.checked_sub(first)
                .filter(|strip| *strip < layout.strip_count())
                .and_then(|strip| layout.track_for_strip(strip))
        };

        if let Some(track) = strip_button(buttons::REC_ARM_FIRST) {
            let state = self.track_mut(track);
            state.armed = !state.armed;
            changed.insert(ChangeCategory::MixerControls);
        } else if let Some(track) = strip_button(buttons::SOLO_FIRST) {
            let state = self.track_mut(track);
            state.solo = !state.solo;
            changed.insert(ChangeCategory::MixerControls);
        } else if let Some(track) = strip_button(buttons::MUTE_FIRST) {
            let state = self.track_mut(track);
            state.mute = !state.mute;
            changed.insert(ChangeCategory::MixerControls);
        } else if let Some(track) = strip_button(buttons::SELECT_FIRST) {
            for (index, state) in self.tracks.iter_mut() {
                state.selected = *index == track;
            }
            self.track_mut(track).selected = true;
            changed.insert(ChangeCategory::MixerSelection);
        } else {
            match note {
                buttons::PLAY => {
                    self.set_led(buttons::PLAY, LedState::On);
                    self.set_led(buttons::STOP, LedState::Off);
                }
                buttons::STOP => {
                    self.set_led(buttons::PLAY, LedState::Off);
                    self.set_led(buttons::RECORD, LedState::Off);
                    self.set_led(buttons::STOP, LedState::On);
                }
                buttons::RECORD | buttons::CYCLE | buttons::CLICK => {
                    let toggled = if self.led(note) == LedState::Off {
                        LedState::On
                    } else {
                        LedState::Off
                    };
                    self.set_led(note, toggled);
                }
                other => {
                    debug!("Button {:#04X} has no host action", other);
                    return changed;
                }
            }
            changed.insert(ChangeCategory::Leds);
        }

        changed
    }
}

impl HostStateReader for MixerSnapshot {
    fn read_current_value(&self, element: SurfaceElement) -> Option<SurfaceValue> {
        match element {
            SurfaceElement::Global => Some(SurfaceValue::Leds(
                buttons::GLOBAL_VIEW
                    .iter()
                    .map(|&note| (note, self.led(note)))
                    .collect(),
            )),
            SurfaceElement::TransportLed(note) => Some(SurfaceValue::Led(self.led(note))),
            SurfaceElement::DisplayLine(line) => Some(SurfaceValue::Text(
                self.display.get(line as usize).cloned().unwrap_or_default(),
            )),
            SurfaceElement::TrackStrip(track) => self.tracks.get(&track).map(|state| {
                SurfaceValue::Strip(StripValue {
                    fader: convert::unit_to_14bit(state.level),
                    ring: convert::pan_to_ring(state.pan),
                    mute: state.mute,
                    solo: state.solo,
                    armed: state.armed,
                    selected: state.selected,
                    name: Some(state.name.clone()),
                })
            }),
            SurfaceElement::MeterBank(track) => self.read_meter(track).map(SurfaceValue::Meter),
        }
    }

    fn read_meter(&self, track: TrackIndex) -> Option<f32> {
        self.meters.get(&track).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::DeviceRole;

    #[test]
    fn test_strip_value_from_track() {
        let mut host = MixerSnapshot::new();
        let track = host.track_mut(3);
        track.name = "Bass".to_string();
        track.level = 1.0;
        track.pan = -1.0;
        track.mute = true;

        let value = host.read_current_value(SurfaceElement::TrackStrip(3));
        assert_eq!(
            value,
            Some(SurfaceValue::Strip(StripValue {
                fader: 16383,
                ring: 1,
                mute: true,
                name: Some("Bass".to_string()),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn test_missing_track_reads_nothing() {
        let host = MixerSnapshot::new();
        assert_eq!(host.read_current_value(SurfaceElement::TrackStrip(0)), None);
        assert_eq!(host.read_current_value(SurfaceElement::MeterBank(0)), None);
        // Unset LEDs and lines still have a value
        assert_eq!(
            host.read_current_value(SurfaceElement::TransportLed(buttons::PLAY)),
            Some(SurfaceValue::Led(LedState::Off))
        );
        assert_eq!(
            host.read_current_value(SurfaceElement::DisplayLine(1)),
            Some(SurfaceValue::Text(String::new()))
        );
    }

    #[test]
    fn test_display_line_grows() {
        let mut host = MixerSnapshot::new();
        host.set_display_line(1, "bottom");
        assert_eq!(host.display, vec![String::new(), "bottom".to_string()]);
    }

    #[test]
    fn test_fader_move_updates_level() {
        let layout = SurfaceLayout::new(DeviceRole::Main, 8, 8);
        let mut host = MixerSnapshot::new();

        let changed = host.apply_input(
            &layout,
            &HardwareInputEvent::FaderMove {
                fader: Fader::Strip(1),
                value: 16383,
            },
        );

        assert!(changed.contains(ChangeCategory::MixerControls));
        assert_eq!(host.tracks[&9].level, 1.0);
    }

    #[test]
    fn test_select_is_exclusive() {
        let layout = SurfaceLayout::default();
        let mut host = MixerSnapshot::new();
        host.track_mut(0).selected = true;

        let changed = host.apply_input(
            &layout,
            &HardwareInputEvent::Button {
                note: buttons::SELECT_FIRST + 2,
                pressed: true,
            },
        );

        assert!(changed.contains(ChangeCategory::MixerSelection));
        assert!(!host.tracks[&0].selected);
        assert!(host.tracks[&2].selected);
    }

    #[test]
    fn test_transport_buttons_drive_leds() {
        let layout = SurfaceLayout::default();
        let mut host = MixerSnapshot::new();

        let press = |note| HardwareInputEvent::Button { note, pressed: true };
        assert!(host.apply_input(&layout, &press(buttons::PLAY)).contains(ChangeCategory::Leds));
        assert_eq!(host.led(buttons::PLAY), LedState::On);

        host.apply_input(&layout, &press(buttons::STOP));
        assert_eq!(host.led(buttons::PLAY), LedState::Off);

        // Releases and unmapped buttons change nothing
        let release = HardwareInputEvent::Button {
            note: buttons::PLAY,
            pressed: false,
        };
        assert!(host.apply_input(&layout, &release).is_empty());
        assert!(host.apply_input(&layout, &press(0x65)).is_empty());
    }

    #[test]
    fn test_snapshot_from_yaml() {
        let yaml = r#"
tracks:
  0: { name: "Kick", level: 0.5 }
leds:
  94: on
display: ["hello"]
"#;
        let host: MixerSnapshot = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(host.tracks[&0].name, "Kick");
        assert_eq!(host.tracks[&0].pan, 0.0);
        assert_eq!(host.led(buttons::PLAY), LedState::On);
    }
}
