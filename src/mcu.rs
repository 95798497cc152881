//! MCU-class hardware over MIDI
//!
//! [`encode_update`] turns one element update into Mackie Control messages.
//! [`McuOutput`] sends them through a `midir` output port and is the
//! [`HardwareSink`] used by the runner. [`McuInput`] forwards raw surface
//! bytes into a channel for the engine's `on_midi_msg` / `on_sysex`.

use anyhow::{anyhow, Context, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::classifier::sysex::MACKIE_HEADER;
use crate::midi::{convert, format_hex, MidiMessage};
use crate::sink::{HardwareSink, PushError};
use crate::surface::{
    buttons, LedState, StripValue, SurfaceElement, SurfaceLayout, SurfaceValue,
};

/// LCD write command
const CMD_LCD: u8 = 0x12;
/// Device query sent after opening the output
const CMD_DEVICE_QUERY: u8 = 0x00;
/// Characters per LCD row
pub const LCD_WIDTH: usize = 56;
/// Characters per strip cell
pub const LCD_CELL: usize = 7;
/// LCD offset of the lower row
const LCD_LOWER_ROW: u8 = 0x38;
/// V-Pot LED ring CC (strip 1)
const RING_CC_FIRST: u8 = 0x30;

fn led_message(note: u8, state: LedState) -> MidiMessage {
    match state {
        LedState::On => MidiMessage::NoteOn { channel: 0, note, velocity: 127 },
        LedState::Blink => MidiMessage::NoteOn { channel: 0, note, velocity: 1 },
        LedState::Off => MidiMessage::NoteOff { channel: 0, note, velocity: 0 },
    }
}

/// LCD SysEx writing `text` at `offset`, padded or cut to `width`
fn lcd_message(device_id: u8, offset: u8, text: &str, width: usize) -> MidiMessage {
    let mut data = Vec::with_capacity(MACKIE_HEADER.len() + 3 + width);
    data.extend_from_slice(&MACKIE_HEADER);
    data.extend_from_slice(&[device_id, CMD_LCD, offset]);

    let chars = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .chain(std::iter::repeat(b' '))
        .take(width);
    data.extend(chars);

    MidiMessage::SysEx { data }
}

fn strip_messages(device_id: u8, strip: u8, value: &StripValue) -> Vec<MidiMessage> {
    let mut messages = vec![
        MidiMessage::PitchBend { channel: strip, value: value.fader },
        MidiMessage::ControlChange {
            channel: 0,
            cc: RING_CC_FIRST + strip,
            value: value.ring.min(11),
        },
        led_message(buttons::REC_ARM_FIRST + strip, LedState::from_bool(value.armed)),
        led_message(buttons::SOLO_FIRST + strip, LedState::from_bool(value.solo)),
        led_message(buttons::MUTE_FIRST + strip, LedState::from_bool(value.mute)),
        led_message(buttons::SELECT_FIRST + strip, LedState::from_bool(value.selected)),
    ];

    // Names go into the strip's cell on the lower row
    if let Some(name) = &value.name {
        let offset = LCD_LOWER_ROW + strip * LCD_CELL as u8;
        messages.push(lcd_message(device_id, offset, name, LCD_CELL - 1));
    }
    messages
}

/// Encode one element update for this unit
pub fn encode_update(
    layout: &SurfaceLayout,
    element: SurfaceElement,
    value: &SurfaceValue,
) -> Result<Vec<MidiMessage>, PushError> {
    let device_id = layout.role().device_id();
    let unsupported = || PushError::Unsupported { element };

    if !layout.contains(element) {
        return Err(unsupported());
    }

    let messages = match (element, value) {
        (SurfaceElement::Global, SurfaceValue::Leds(leds)) => leds
            .iter()
            .map(|&(note, state)| led_message(note, state))
            .collect(),
        (SurfaceElement::Global, SurfaceValue::Blank) => buttons::GLOBAL_VIEW
            .iter()
            .map(|&note| led_message(note, LedState::Off))
            .collect(),

        (SurfaceElement::TransportLed(note), SurfaceValue::Led(state)) => vec![led_message(note, *state)],
        (SurfaceElement::TransportLed(note), SurfaceValue::Blank) => vec![led_message(note, LedState::Off)],

        (SurfaceElement::DisplayLine(line), SurfaceValue::Text(text)) => {
            vec![lcd_message(device_id, line * LCD_LOWER_ROW, text, LCD_WIDTH)]
        }
        (SurfaceElement::DisplayLine(line), SurfaceValue::Blank) => {
            vec![lcd_message(device_id, line * LCD_LOWER_ROW, "", LCD_WIDTH)]
        }

        (SurfaceElement::TrackStrip(track), SurfaceValue::Strip(strip_value)) => {
            let strip = layout.strip_for_track(track).ok_or_else(unsupported)?;
            strip_messages(device_id, strip, strip_value)
        }
        (SurfaceElement::TrackStrip(track), SurfaceValue::Blank) => {
            let strip = layout.strip_for_track(track).ok_or_else(unsupported)?;
            let blank = StripValue {
                name: Some(String::new()),
                ..Default::default()
            };
            strip_messages(device_id, strip, &blank)
        }

        (SurfaceElement::MeterBank(track), SurfaceValue::Meter(level)) => {
            let strip = layout.strip_for_track(track).ok_or_else(unsupported)?;
            vec![MidiMessage::ChannelPressure {
                channel: 0,
                pressure: (strip << 4) | convert::unit_to_meter(*level),
            }]
        }
        (SurfaceElement::MeterBank(track), SurfaceValue::Blank) => {
            let strip = layout.strip_for_track(track).ok_or_else(unsupported)?;
            vec![MidiMessage::ChannelPressure {
                channel: 0,
                pressure: strip << 4,
            }]
        }

        _ => return Err(unsupported()),
    };

    Ok(messages)
}

/// Find a port whose name contains `pattern`, case-insensitive
fn matches_pattern(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// MIDI output to one MCU unit
pub struct McuOutput {
    layout: SurfaceLayout,
    conn: Option<MidiOutputConnection>,
    port_name: String,
}

impl McuOutput {
    /// Open the first output port matching `pattern`
    pub fn connect(pattern: &str, layout: SurfaceLayout) -> Result<Self> {
        let midi_out = MidiOutput::new("MCU-Sync-Output").context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, port_name) = midi_out
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_out.port_name(&port).ok()?;
                matches_pattern(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to output port: {}", port_name);
        let conn = midi_out
            .connect(&port, "MCU-Sync")
            .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", port_name, e))?;

        let mut output = Self {
            layout,
            conn: Some(conn),
            port_name,
        };
        output.query_device()?;
        Ok(output)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
            info!("Output port '{}' closed", self.port_name);
        }
    }

    /// Ask the surface to identify itself; it answers with SysEx
    fn query_device(&mut self) -> Result<()> {
        let mut data = MACKIE_HEADER.to_vec();
        data.extend_from_slice(&[self.layout.role().device_id(), CMD_DEVICE_QUERY]);
        self.send(&MidiMessage::SysEx { data })
            .context("Failed to send device query")
    }

    fn send(&mut self, message: &MidiMessage) -> Result<(), PushError> {
        let conn = self.conn.as_mut().ok_or(PushError::NotConnected)?;
        let bytes = message.encode();
        conn.send(&bytes).map_err(|e| PushError::Send(e.to_string()))?;
        trace!("Sent: {} | {}", format_hex(&bytes), message);
        Ok(())
    }
}

impl HardwareSink for McuOutput {
    fn push(&mut self, element: SurfaceElement, value: &SurfaceValue) -> Result<(), PushError> {
        for message in encode_update(&self.layout, element, value)? {
            self.send(&message)?;
        }
        Ok(())
    }
}

impl Drop for McuOutput {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// MIDI input from one MCU unit; raw messages go to the channel
pub struct McuInput {
    _conn: MidiInputConnection<()>,
}

impl McuInput {
    /// Open the first input port matching `pattern`
    pub fn connect(pattern: &str, tx: mpsc::Sender<Vec<u8>>) -> Result<Self> {
        let mut midi_in = MidiInput::new("MCU-Sync-Input").context("Failed to create MIDI input")?;
        // SysEx carries the connection handshake
        midi_in.ignore(Ignore::None);
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (port, port_name) = midi_in
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_in.port_name(&port).ok()?;
                matches_pattern(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| anyhow!("Input port '{}' not found", pattern))?;

        info!("Connecting to input port: {}", port_name);
        let conn = midi_in
            .connect(
                &port,
                "MCU-Sync",
                move |_timestamp, data, _| {
                    // Never block the MIDI thread
                    if tx.try_send(data.to_vec()).is_err() {
                        trace!("Input channel full, dropped {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", port_name, e))?;

        Ok(Self { _conn: conn })
    }
}

/// Names of all MIDI input and output ports
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let midi_in = MidiInput::new("MCU-Sync-Scanner")?;
    let inputs = midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect();

    let midi_out = MidiOutput::new("MCU-Sync-Scanner")?;
    let outputs = midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect();

    Ok((inputs, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::DeviceRole;

    fn encode(element: SurfaceElement, value: SurfaceValue) -> Vec<Vec<u8>> {
        encode_update(&SurfaceLayout::default(), element, &value)
            .unwrap()
            .iter()
            .map(MidiMessage::encode)
            .collect()
    }

    #[test]
    fn test_transport_led() {
        assert_eq!(
            encode(SurfaceElement::TransportLed(buttons::PLAY), SurfaceValue::Led(LedState::On)),
            vec![vec![0x90, 0x5E, 127]]
        );
        assert_eq!(
            encode(SurfaceElement::TransportLed(buttons::PLAY), SurfaceValue::Blank),
            vec![vec![0x80, 0x5E, 0]]
        );
    }

    #[test]
    fn test_display_line_is_padded() {
        let bytes = encode(SurfaceElement::DisplayLine(1), SurfaceValue::Text("Hi".to_string()));

        assert_eq!(bytes.len(), 1);
        let sysex = &bytes[0];
        assert_eq!(&sysex[..7], &[0xF0, 0x00, 0x00, 0x66, 0x14, 0x12, 0x38]);
        assert_eq!(&sysex[7..9], b"Hi");
        assert_eq!(sysex.len(), 7 + LCD_WIDTH + 1);
        assert_eq!(sysex.last(), Some(&0xF7));
    }

    #[test]
    fn test_strip_on_offset_layout() {
        let layout = SurfaceLayout::new(DeviceRole::Extender, 8, 8);
        let value = SurfaceValue::Strip(StripValue {
            fader: 8192,
            ring: 6,
            mute: true,
            ..Default::default()
        });

        let messages = encode_update(&layout, SurfaceElement::TrackStrip(10), &value).unwrap();

        assert_eq!(messages[0], MidiMessage::PitchBend { channel: 2, value: 8192 });
        assert_eq!(
            messages[1],
            MidiMessage::ControlChange { channel: 0, cc: 0x32, value: 6 }
        );
        assert!(messages.contains(&MidiMessage::NoteOn {
            channel: 0,
            note: buttons::MUTE_FIRST + 2,
            velocity: 127
        }));
        // Value-only: no LCD write
        assert_eq!(messages.len(), 6);
    }

    #[test]
    fn test_strip_name_goes_to_lower_row_cell() {
        let value = SurfaceValue::Strip(StripValue {
            name: Some("Vocals long".to_string()),
            ..Default::default()
        });
        let messages = encode_update(&SurfaceLayout::default(), SurfaceElement::TrackStrip(3), &value).unwrap();

        match messages.last() {
            Some(MidiMessage::SysEx { data }) => {
                assert_eq!(data[5], 0x38 + 3 * 7);
                assert_eq!(&data[6..], b"Vocals");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_meter() {
        assert_eq!(
            encode(SurfaceElement::MeterBank(5), SurfaceValue::Meter(1.0)),
            vec![vec![0xD0, 0x5C]]
        );
    }

    #[test]
    fn test_extender_uses_its_device_id() {
        let layout = SurfaceLayout::new(DeviceRole::Extender, 8, 0);
        let messages = encode_update(
            &layout,
            SurfaceElement::DisplayLine(0),
            &SurfaceValue::Text(String::new()),
        )
        .unwrap();

        match &messages[0] {
            MidiMessage::SysEx { data } => assert_eq!(data[3], 0x15),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_value_is_unsupported() {
        let layout = SurfaceLayout::default();

        let err = encode_update(&layout, SurfaceElement::MeterBank(0), &SurfaceValue::Led(LedState::On));
        assert!(matches!(err, Err(PushError::Unsupported { .. })));

        // Extenders have no transport
        let extender = SurfaceLayout::new(DeviceRole::Extender, 8, 8);
        let err = encode_update(&extender, SurfaceElement::Global, &SurfaceValue::Blank);
        assert!(matches!(err, Err(PushError::Unsupported { .. })));
    }

    #[test]
    fn test_port_listing_does_not_panic() {
        let _ = list_ports();
    }
}
