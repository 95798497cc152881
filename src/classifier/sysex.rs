//! SysEx decode path
//!
//! Mackie Control SysEx: `F0 00 00 66 <device> <command> <payload..> F7`.
//! Framing is validated before anything is interpreted; a malformed message
//! is an error for the caller to log, an unknown but well-formed one is
//! simply not ours.

use thiserror::Error;

use super::midi_input::HardwareInputEvent;

/// Mackie manufacturer id
pub const MACKIE_HEADER: [u8; 3] = [0x00, 0x00, 0x66];

pub const CMD_HOST_CONNECTION_QUERY: u8 = 0x01;
pub const CMD_CONNECTION_CONFIRMED: u8 = 0x03;
pub const CMD_CONNECTION_ERROR: u8 = 0x04;
pub const CMD_VERSION_REPLY: u8 = 0x14;

const SERIAL_LEN: usize = 7;

/// Framing or length violation in a SysEx message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SysExError {
    #[error("SysEx does not start with F0")]
    MissingStart,
    #[error("SysEx is not terminated by F7")]
    Unterminated,
    #[error("SysEx data byte {byte:#04X} at offset {offset} has the high bit set")]
    DataByteOutOfRange { offset: usize, byte: u8 },
    #[error("SysEx command {command:#04X} needs {expected} payload bytes, got {actual}")]
    TooShort {
        command: u8,
        expected: usize,
        actual: usize,
    },
}

/// Validate framing and return the body between F0 and F7
pub fn frame(raw: &[u8]) -> Result<&[u8], SysExError> {
    let rest = match raw.split_first() {
        Some((&0xF0, rest)) => rest,
        _ => return Err(SysExError::MissingStart),
    };
    let body = match rest.split_last() {
        Some((&0xF7, body)) => body,
        _ => return Err(SysExError::Unterminated),
    };
    if let Some((i, &byte)) = body.iter().enumerate().find(|(_, b)| **b >= 0x80) {
        return Err(SysExError::DataByteOutOfRange { offset: i + 1, byte });
    }
    Ok(body)
}

/// Decode a SysEx message addressed to `device_id`
///
/// `Ok(None)` means well-formed but not a message this surface understands
/// (other manufacturer, other device, unknown command).
pub fn decode(raw: &[u8], device_id: u8) -> Result<Option<HardwareInputEvent>, SysExError> {
    let body = frame(raw)?;

    let Some(rest) = body.strip_prefix(&MACKIE_HEADER[..]) else {
        return Ok(None);
    };
    let (device, command, payload) = match rest {
        [device, command, payload @ ..] => (*device, *command, payload),
        _ => return Ok(None),
    };
    if device != device_id {
        return Ok(None);
    }

    let event = match command {
        CMD_HOST_CONNECTION_QUERY => HardwareInputEvent::HostConnectionQuery {
            serial: serial(command, payload)?,
        },
        CMD_CONNECTION_CONFIRMED => HardwareInputEvent::ConnectionConfirmed {
            serial: serial(command, payload)?,
        },
        CMD_CONNECTION_ERROR => HardwareInputEvent::ConnectionError {
            serial: serial(command, payload)?,
        },
        CMD_VERSION_REPLY => HardwareInputEvent::VersionReply {
            version: payload.iter().map(|&b| b as char).collect(),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn serial(command: u8, payload: &[u8]) -> Result<[u8; SERIAL_LEN], SysExError> {
    payload
        .get(..SERIAL_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(SysExError::TooShort {
            command,
            expected: SERIAL_LEN,
            actual: payload.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIAL: [u8; 7] = [0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47];

    fn mackie(device: u8, command: u8, payload: &[u8]) -> Vec<u8> {
        let mut raw = vec![0xF0, 0x00, 0x00, 0x66, device, command];
        raw.extend_from_slice(payload);
        raw.push(0xF7);
        raw
    }

    #[test]
    fn test_connection_confirmed() {
        let raw = mackie(0x14, CMD_CONNECTION_CONFIRMED, &SERIAL);
        assert_eq!(
            decode(&raw, 0x14),
            Ok(Some(HardwareInputEvent::ConnectionConfirmed { serial: SERIAL }))
        );
    }

    #[test]
    fn test_host_query_with_challenge() {
        let mut payload = SERIAL.to_vec();
        payload.extend_from_slice(&[1, 2, 3, 4]);
        let raw = mackie(0x15, CMD_HOST_CONNECTION_QUERY, &payload);
        assert_eq!(
            decode(&raw, 0x15),
            Ok(Some(HardwareInputEvent::HostConnectionQuery { serial: SERIAL }))
        );
    }

    #[test]
    fn test_version_reply() {
        let raw = mackie(0x14, CMD_VERSION_REPLY, b"1.22");
        assert_eq!(
            decode(&raw, 0x14),
            Ok(Some(HardwareInputEvent::VersionReply {
                version: "1.22".to_string()
            }))
        );
    }

    #[test]
    fn test_other_device_or_manufacturer_is_not_ours() {
        let raw = mackie(0x15, CMD_CONNECTION_CONFIRMED, &SERIAL);
        assert_eq!(decode(&raw, 0x14), Ok(None));

        let raw = [0xF0, 0x43, 0x10, 0x4C, 0xF7];
        assert_eq!(decode(&raw, 0x14), Ok(None));

        let raw = mackie(0x14, 0x7E, &[]);
        assert_eq!(decode(&raw, 0x14), Ok(None));
    }

    #[test]
    fn test_malformed_framing() {
        assert_eq!(decode(&[], 0x14), Err(SysExError::MissingStart));
        assert_eq!(decode(&[0x90, 0x00, 0xF7], 0x14), Err(SysExError::MissingStart));
        assert_eq!(decode(&[0xF0, 0x00, 0x00, 0x66], 0x14), Err(SysExError::Unterminated));
        assert_eq!(
            decode(&[0xF0, 0x00, 0x80, 0x66, 0xF7], 0x14),
            Err(SysExError::DataByteOutOfRange { offset: 2, byte: 0x80 })
        );
    }

    #[test]
    fn test_truncated_serial() {
        let raw = mackie(0x14, CMD_CONNECTION_CONFIRMED, &SERIAL[..3]);
        assert_eq!(
            decode(&raw, 0x14),
            Err(SysExError::TooShort {
                command: CMD_CONNECTION_CONFIRMED,
                expected: 7,
                actual: 3
            })
        );
    }
}
