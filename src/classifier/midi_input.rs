//! Hardware input events and the plain-MIDI decode path
//!
//! MCU-class surfaces send everything on MIDI channel 1: touch sensors and
//! buttons as notes, faders as pitch bend, rotary encoders as relative CCs.

use crate::midi::MidiMessage;

/// First fader touch-sensor note (strip 1)
pub const FADER_TOUCH_FIRST: u8 = 104;
/// Master fader touch-sensor note
pub const MASTER_FADER_TOUCH: u8 = 112;
/// Pitch bend channel of the master fader
pub const MASTER_FADER_CHANNEL: u8 = 8;
/// First V-Pot rotation CC (strip 1)
pub const VPOT_CC_FIRST: u8 = 16;
/// Jog wheel CC
pub const JOG_CC: u8 = 60;

/// A motorized fader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fader {
    /// Channel strip fader, 0-based physical strip
    Strip(u8),
    Master,
}

/// Decoded input from the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareInputEvent {
    /// Capacitive touch sensor on a fader cap
    FaderTouch { fader: Fader, touched: bool },
    /// Fader moved by hand (14-bit)
    FaderMove { fader: Fader, value: u16 },
    /// V-Pot rotated; positive is clockwise
    VPot { strip: u8, delta: i8 },
    /// Jog wheel rotated; positive is clockwise
    Jog { delta: i8 },
    /// Any other button
    Button { note: u8, pressed: bool },
    /// Device asks the host to identify itself
    HostConnectionQuery { serial: [u8; 7] },
    /// Device reports the connection as established
    ConnectionConfirmed { serial: [u8; 7] },
    /// Device rejected the connection
    ConnectionError { serial: [u8; 7] },
    /// Firmware version reply
    VersionReply { version: String },
}

/// Decode an MCU relative encoder value (bit 6 = counter-clockwise)
pub fn relative_delta(value: u8) -> i8 {
    let magnitude = (value & 0x3F) as i8;
    if value & 0x40 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a parsed channel message; None for anything not part of the protocol
pub fn decode(message: &MidiMessage) -> Option<HardwareInputEvent> {
    if message.channel() != Some(0) {
        // Pitch bend is the one message that uses channels 1-9
        if let MidiMessage::PitchBend { channel, value } = *message {
            return decode_fader_move(channel, value);
        }
        return None;
    }

    match *message {
        MidiMessage::NoteOn { note, .. } => Some(decode_note(note, true)),
        MidiMessage::NoteOff { note, .. } => Some(decode_note(note, false)),
        MidiMessage::ControlChange { cc, value, .. } => decode_cc(cc, value),
        MidiMessage::PitchBend { channel, value } => decode_fader_move(channel, value),
        MidiMessage::ChannelPressure { .. } | MidiMessage::SysEx { .. } => None,
    }
}

fn decode_note(note: u8, on: bool) -> HardwareInputEvent {
    match note {
        FADER_TOUCH_FIRST..=111 => HardwareInputEvent::FaderTouch {
            fader: Fader::Strip(note - FADER_TOUCH_FIRST),
            touched: on,
        },
        MASTER_FADER_TOUCH => HardwareInputEvent::FaderTouch {
            fader: Fader::Master,
            touched: on,
        },
        _ => HardwareInputEvent::Button { note, pressed: on },
    }
}

fn decode_cc(cc: u8, value: u8) -> Option<HardwareInputEvent> {
    match cc {
        VPOT_CC_FIRST..=23 => Some(HardwareInputEvent::VPot {
            strip: cc - VPOT_CC_FIRST,
            delta: relative_delta(value),
        }),
        JOG_CC => Some(HardwareInputEvent::Jog {
            delta: relative_delta(value),
        }),
        _ => None,
    }
}

fn decode_fader_move(channel: u8, value: u16) -> Option<HardwareInputEvent> {
    let fader = match channel {
        0..=7 => Fader::Strip(channel),
        MASTER_FADER_CHANNEL => Fader::Master,
        _ => return None,
    };
    Some(HardwareInputEvent::FaderMove { fader, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_raw(raw: &[u8]) -> Option<HardwareInputEvent> {
        MidiMessage::parse(raw).and_then(|m| decode(&m))
    }

    #[test]
    fn test_fader_touch() {
        assert_eq!(
            decode_raw(&[0x90, 106, 127]),
            Some(HardwareInputEvent::FaderTouch {
                fader: Fader::Strip(2),
                touched: true
            })
        );
        assert_eq!(
            decode_raw(&[0x90, 106, 0]),
            Some(HardwareInputEvent::FaderTouch {
                fader: Fader::Strip(2),
                touched: false
            })
        );
        assert_eq!(
            decode_raw(&[0x90, 112, 127]),
            Some(HardwareInputEvent::FaderTouch {
                fader: Fader::Master,
                touched: true
            })
        );
    }

    #[test]
    fn test_fader_move() {
        assert_eq!(
            decode_raw(&[0xE5, 0x00, 0x40]),
            Some(HardwareInputEvent::FaderMove {
                fader: Fader::Strip(5),
                value: 8192
            })
        );
        assert_eq!(
            decode_raw(&[0xE8, 0x7F, 0x7F]),
            Some(HardwareInputEvent::FaderMove {
                fader: Fader::Master,
                value: 16383
            })
        );
        assert_eq!(decode_raw(&[0xE9, 0x00, 0x40]), None);
    }

    #[test]
    fn test_encoders() {
        assert_eq!(
            decode_raw(&[0xB0, 17, 0x03]),
            Some(HardwareInputEvent::VPot { strip: 1, delta: 3 })
        );
        assert_eq!(
            decode_raw(&[0xB0, 17, 0x41]),
            Some(HardwareInputEvent::VPot { strip: 1, delta: -1 })
        );
        assert_eq!(decode_raw(&[0xB0, 60, 0x42]), Some(HardwareInputEvent::Jog { delta: -2 }));
        assert_eq!(decode_raw(&[0xB0, 7, 0x42]), None);
    }

    #[test]
    fn test_buttons() {
        assert_eq!(
            decode_raw(&[0x90, 0x5E, 127]),
            Some(HardwareInputEvent::Button {
                note: 0x5E,
                pressed: true
            })
        );
    }

    #[test]
    fn test_other_channels_are_dropped() {
        assert_eq!(decode_raw(&[0x91, 0x5E, 127]), None);
        assert_eq!(decode_raw(&[0xB3, 17, 1]), None);
    }
}
