//! Values pushed to the surface
//!
//! These are read from the host at drain time and handed to the hardware
//! sink. Wire encoding is the sink's business.

use serde::{Deserialize, Serialize};

use super::element::UpdateIntent;

/// Button LED state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedState {
    #[default]
    Off,
    On,
    Blink,
}

impl LedState {
    pub fn from_bool(on: bool) -> Self {
        if on {
            LedState::On
        } else {
            LedState::Off
        }
    }
}

/// Host beat indicator value (`0` off, `1` bar, `2` beat)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BeatIndicator {
    #[default]
    Off,
    Bar,
    Beat,
}

impl BeatIndicator {
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(BeatIndicator::Off),
            1 => Some(BeatIndicator::Bar),
            2 => Some(BeatIndicator::Beat),
            _ => None,
        }
    }

    pub fn led_state(self) -> LedState {
        match self {
            BeatIndicator::Off => LedState::Off,
            BeatIndicator::Bar | BeatIndicator::Beat => LedState::On,
        }
    }
}

/// Everything shown on one channel strip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StripValue {
    /// 14-bit motor fader position
    pub fader: u16,
    /// V-Pot LED ring position (0 = off, 1-11)
    pub ring: u8,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    pub selected: bool,
    /// Scribble strip text; only carried by a full repaint
    pub name: Option<String>,
}

/// A value for one surface element
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceValue {
    /// Channel strip state
    Strip(StripValue),
    /// A single LED
    Led(LedState),
    /// A group of LEDs by note number
    Leds(Vec<(u8, LedState)>),
    /// One display line
    Text(String),
    /// Meter level, 0.0-1.0
    Meter(f32),
    /// Everything off / cleared (used on shutdown)
    Blank,
}

impl SurfaceValue {
    /// Restrict a value to what `intent` asks to rewrite
    ///
    /// A value-only strip update leaves the scribble strip alone.
    pub fn for_intent(self, intent: UpdateIntent) -> Self {
        match (self, intent) {
            (SurfaceValue::Strip(strip), UpdateIntent::ValueOnly) => {
                SurfaceValue::Strip(StripValue { name: None, ..strip })
            }
            (value, _) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_only_drops_strip_name() {
        let strip = SurfaceValue::Strip(StripValue {
            fader: 100,
            name: Some("Kick".to_string()),
            ..Default::default()
        });

        match strip.clone().for_intent(UpdateIntent::ValueOnly) {
            SurfaceValue::Strip(s) => {
                assert_eq!(s.name, None);
                assert_eq!(s.fader, 100);
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert_eq!(strip.clone().for_intent(UpdateIntent::FullRepaint), strip);
    }

    #[test]
    fn test_beat_indicator() {
        assert_eq!(BeatIndicator::from_raw(0), Some(BeatIndicator::Off));
        assert_eq!(BeatIndicator::from_raw(2), Some(BeatIndicator::Beat));
        assert_eq!(BeatIndicator::from_raw(3), None);
        assert_eq!(BeatIndicator::Bar.led_state(), LedState::On);
        assert_eq!(BeatIndicator::Off.led_state(), LedState::Off);
    }
}
