//! Change Classifier
//!
//! Turns the two raw event sources into typed events:
//! - host refresh notifications (bitmask) into a [`CategorySet`]
//! - surface MIDI and SysEx into [`HardwareInputEvent`]s
//! - connection signals into [`ChangeEvent::FullSurfaceInit`] (once per
//!   lifetime) or [`ChangeEvent::SurfaceReconnect`]
//!
//! Nothing here mutates the dirty set and nothing here fails: bad input is
//! logged and classified as "no event".

mod category;
pub mod midi_input;
pub mod sysex;

pub use category::{CategorySet, ChangeCategory};
pub use midi_input::{Fader, HardwareInputEvent};
pub use sysex::SysExError;

use tracing::{debug, trace, warn};

use crate::midi::{format_hex, MidiMessage};

/// Connection-level events that repaint the whole surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// First connection since init: nothing may drain before this is marked
    FullSurfaceInit,
    /// Any later connection: the device may have lost its state
    SurfaceReconnect,
}

/// Classifier state for one surface unit
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    /// SysEx device id this unit answers to
    device_id: u8,
    /// Whether a connection has already been classified in this lifetime
    connected_once: bool,
}

impl ChangeClassifier {
    pub fn new(device_id: u8) -> Self {
        Self {
            device_id,
            connected_once: false,
        }
    }

    /// Decode a host refresh bitmask; unknown bits are ignored
    pub fn classify_flags(&self, flags: u32) -> CategorySet {
        let categories = CategorySet::from_flags(flags);
        let unknown = flags & !ChangeCategory::known_mask();
        if unknown != 0 {
            trace!("Ignoring unknown refresh bits {:#X}", unknown);
        }
        categories
    }

    /// Decode a plain MIDI message from the surface
    ///
    /// SysEx that arrives through this path is routed to [`Self::classify_sysex`].
    pub fn classify_midi(&self, raw: &[u8]) -> Option<HardwareInputEvent> {
        if raw.first() == Some(&0xF0) {
            return self.classify_sysex(raw);
        }

        let Some(message) = MidiMessage::parse(raw) else {
            debug!("Dropping unparseable MIDI: {}", format_hex(raw));
            return None;
        };

        let event = midi_input::decode(&message);
        if event.is_none() {
            trace!("Unrecognized MIDI from surface: {}", message);
        }
        event
    }

    /// Decode a SysEx message from the surface
    pub fn classify_sysex(&self, raw: &[u8]) -> Option<HardwareInputEvent> {
        match sysex::decode(raw, self.device_id) {
            Ok(Some(event)) => {
                debug!("SysEx from surface: {:?}", event);
                Some(event)
            }
            Ok(None) => {
                trace!("Ignoring foreign SysEx: {}", format_hex(raw));
                None
            }
            Err(e) => {
                warn!("Malformed SysEx dropped ({}): {}", e, format_hex(raw));
                None
            }
        }
    }

    /// Classify a connection signal
    pub fn classify_connect(&mut self) -> ChangeEvent {
        if self.connected_once {
            ChangeEvent::SurfaceReconnect
        } else {
            self.connected_once = true;
            ChangeEvent::FullSurfaceInit
        }
    }

    /// Forget connection history (called on init/deinit)
    pub fn reset(&mut self) {
        self.connected_once = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_connect_is_one_time() {
        let mut classifier = ChangeClassifier::new(0x14);

        assert_eq!(classifier.classify_connect(), ChangeEvent::FullSurfaceInit);
        assert_eq!(classifier.classify_connect(), ChangeEvent::SurfaceReconnect);
        assert_eq!(classifier.classify_connect(), ChangeEvent::SurfaceReconnect);

        classifier.reset();
        assert_eq!(classifier.classify_connect(), ChangeEvent::FullSurfaceInit);
    }

    #[test]
    fn test_flags_with_unknown_bits() {
        let classifier = ChangeClassifier::new(0x14);
        let set = classifier.classify_flags(4 | 8 | (1 << 24));

        assert_eq!(set.iter().collect::<Vec<_>>(), vec![ChangeCategory::MixerControls]);
    }

    #[test]
    fn test_sysex_through_midi_path() {
        let classifier = ChangeClassifier::new(0x14);
        let raw = [0xF0, 0x00, 0x00, 0x66, 0x14, 0x03, 1, 2, 3, 4, 5, 6, 7, 0xF7];

        assert_eq!(
            classifier.classify_midi(&raw),
            Some(HardwareInputEvent::ConnectionConfirmed {
                serial: [1, 2, 3, 4, 5, 6, 7]
            })
        );
    }

    #[test]
    fn test_bad_input_is_no_event() {
        let classifier = ChangeClassifier::new(0x14);

        assert_eq!(classifier.classify_midi(&[]), None);
        assert_eq!(classifier.classify_midi(&[0x90]), None);
        assert_eq!(classifier.classify_sysex(&[0xF0, 0x00, 0x00]), None);
        assert_eq!(classifier.classify_sysex(&[0xF0, 0xFF, 0xF7]), None);
    }
}
