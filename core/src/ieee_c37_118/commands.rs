//! # IEEE C37.118 Command Frames
//!
//! Command frames carry control instructions from a PDC to the PMU. This module defines
//! the command code table, an encoder used by clients and tests, and the validating
//! parser used by the PMU session.
//!
//! ## Command frame layout
//!
//! ```text
//! SYNC(1)=0xAA TYPE(1)=0x41 FRAMESIZE(2) IDCODE(2) CMD(2) [extended data] CHK(2)
//! ```
//!
//! The shortest valid frame is 10 bytes.

use std::fmt;

use bytes::{Buf, BytesMut};
use log::warn;

use super::codec::{read_u16, FrameBuilder};
use super::common::{FrameType, ParseError, BROADCAST_IDCODE, CHK_SIZE, SYNC_BYTE};
use super::data_frame::FrameError;
use super::utils::calculate_crc;

/// Minimum command frame length: header, IDCODE, CMD and CHK.
pub const MIN_COMMAND_FRAME_SIZE: usize = 10;

/// Longest extended data block that still fits FRAMESIZE.
pub const MAX_EXTENDED_DATA: usize = u16::MAX as usize - MIN_COMMAND_FRAME_SIZE;

/// Longest inbound frame the framer waits for. Larger declared sizes are treated as
/// line noise.
pub const MAX_INBOUND_FRAME_SIZE: usize = 1024;

/// Enumerates the command codes this PMU recognizes.
///
/// # Variants
///
/// * `TurnOffTransmission` (`0x0001`): Stops real-time data transmission.
/// * `TurnOnTransmission` (`0x0002`): Starts real-time data transmission.
/// * `SendHeaderFrame` (`0x0003`): Requests a header frame.
/// * `SendConfigFrame1` (`0x0004`): Requests configuration frame 1.
/// * `SendConfigFrame2` (`0x0005`): Requests configuration frame 2.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandType {
    TurnOffTransmission = 1,
    TurnOnTransmission = 2,
    SendHeaderFrame = 3,
    SendConfigFrame1 = 4,
    SendConfigFrame2 = 5,
}

impl CommandType {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Returns `None` for unassigned and reserved codes.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(CommandType::TurnOffTransmission),
            2 => Some(CommandType::TurnOnTransmission),
            3 => Some(CommandType::SendHeaderFrame),
            4 => Some(CommandType::SendConfigFrame1),
            5 => Some(CommandType::SendConfigFrame2),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::TurnOffTransmission => write!(f, "Turn OFF real-time data transmission"),
            CommandType::TurnOnTransmission => write!(f, "Turn ON real-time data transmission"),
            CommandType::SendHeaderFrame => write!(f, "Send Header frame"),
            CommandType::SendConfigFrame1 => write!(f, "Send Configuration frame 1"),
            CommandType::SendConfigFrame2 => write!(f, "Send Configuration frame 2"),
        }
    }
}

/// An outbound command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub idcode: u16,
    pub command: u16,
    extended_data: Option<Vec<u8>>,
}

impl CommandFrame {
    pub fn new(idcode: u16, command: CommandType) -> Self {
        Self::with_code(idcode, command.code())
    }

    /// A command carrying an arbitrary, possibly unassigned, code.
    pub fn with_code(idcode: u16, command: u16) -> Self {
        CommandFrame {
            idcode,
            command,
            extended_data: None,
        }
    }

    /// Attaches an extended data block.
    pub fn with_extended_data(mut self, data: Vec<u8>) -> Result<Self, FrameError> {
        if data.len() > MAX_EXTENDED_DATA {
            return Err(FrameError::TooLarge {
                size: MIN_COMMAND_FRAME_SIZE + data.len(),
            });
        }
        self.extended_data = Some(data);
        Ok(self)
    }

    pub fn extended_data(&self) -> Option<&[u8]> {
        self.extended_data.as_deref()
    }

    pub fn turn_on_transmission(idcode: u16) -> Self {
        Self::new(idcode, CommandType::TurnOnTransmission)
    }

    pub fn turn_off_transmission(idcode: u16) -> Self {
        Self::new(idcode, CommandType::TurnOffTransmission)
    }

    pub fn send_config_frame2(idcode: u16) -> Self {
        Self::new(idcode, CommandType::SendConfigFrame2)
    }

    /// Encodes the frame with FRAMESIZE and CHK filled in.
    pub fn to_hex(&self) -> Vec<u8> {
        let ext_len = self.extended_data.as_ref().map_or(0, Vec::len);
        let mut frame = FrameBuilder::new(
            FrameType::Command,
            self.idcode,
            MIN_COMMAND_FRAME_SIZE + ext_len,
        );
        frame.put_u16(self.command);
        if let Some(data) = &self.extended_data {
            frame.put_slice(data);
        }
        frame.finish()
    }
}

/// Parser strictness.
///
/// # Fields
///
/// * `enforce_crc`: Reject frames whose CHK does not match. When `false`, a mismatch is
///   logged and the frame is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    pub enforce_crc: bool,
}

impl CommandOptions {
    pub fn permissive() -> Self {
        CommandOptions { enforce_crc: false }
    }
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions { enforce_crc: true }
    }
}

/// Validates an inbound command frame and returns its command code.
///
/// Checks run in this order and stop at the first failure:
///
/// 1. At least 10 bytes (`TooShort`).
/// 2. SYNC `0xAA` and TYPE `0x41` (`BadHeader`).
/// 3. Declared FRAMESIZE between 10 and the received length (`BadLength`).
/// 4. CRC over `[0, FRAMESIZE - 2)` equals CHK (`CrcMismatch`, only when enforced).
/// 5. IDCODE equals `local_idcode` or `0xFFFF` (`IdMismatch`).
///
/// Bytes past the declared FRAMESIZE are ignored. Unassigned codes are returned as-is;
/// what to do with them is the session's decision.
pub fn parse_command_frame(
    bytes: &[u8],
    local_idcode: u16,
    options: CommandOptions,
) -> Result<u16, ParseError> {
    if bytes.len() < MIN_COMMAND_FRAME_SIZE {
        return Err(ParseError::TooShort {
            length: bytes.len(),
            minimum: MIN_COMMAND_FRAME_SIZE,
        });
    }

    if bytes[0] != SYNC_BYTE || bytes[1] != FrameType::Command.type_byte() {
        return Err(ParseError::BadHeader {
            sync: bytes[0],
            frame_type: bytes[1],
        });
    }

    let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    if declared > bytes.len() || declared < MIN_COMMAND_FRAME_SIZE {
        return Err(ParseError::BadLength {
            declared,
            received: bytes.len(),
        });
    }

    let frame = &bytes[..declared];
    let calculated = calculate_crc(&frame[..declared - CHK_SIZE]);
    let received = u16::from_be_bytes([frame[declared - 2], frame[declared - 1]]);
    if calculated != received {
        let err = ParseError::CrcMismatch {
            received,
            calculated,
        };
        if options.enforce_crc {
            return Err(err);
        }
        warn!("Accepting command frame despite {}", err);
    }

    let idcode = u16::from_be_bytes([frame[4], frame[5]]);
    if idcode != local_idcode && idcode != BROADCAST_IDCODE {
        return Err(ParseError::IdMismatch {
            received: idcode,
            local: local_idcode,
        });
    }

    Ok(u16::from_be_bytes([frame[6], frame[7]]))
}

/// Splits an inbound byte stream into frame candidates.
///
/// Bytes before a SYNC byte are skipped, and so is a SYNC byte whose FRAMESIZE is below
/// 10 or above `MAX_INBOUND_FRAME_SIZE`. Everything else is cut at its declared
/// FRAMESIZE and handed on whole, so `parse_command_frame` still decides whether the
/// frame is acceptable.
#[derive(Debug, Default)]
pub struct CommandFramer {
    buf: BytesMut,
}

impl CommandFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.buf.iter().position(|&b| b == SYNC_BYTE) {
                Some(0) => {}
                Some(skip) => {
                    warn!("Skipping {} bytes before SYNC", skip);
                    self.buf.advance(skip);
                }
                None => {
                    if !self.buf.is_empty() {
                        warn!("Skipping {} bytes without SYNC", self.buf.len());
                        self.buf.clear();
                    }
                    return None;
                }
            }

            let declared = read_u16(&self.buf, 2)? as usize;
            if !(MIN_COMMAND_FRAME_SIZE..=MAX_INBOUND_FRAME_SIZE).contains(&declared) {
                warn!("Ignoring SYNC with FRAMESIZE {}", declared);
                self.buf.advance(1);
                continue;
            }
            if self.buf.len() < declared {
                return None;
            }
            return Some(self.buf.split_to(declared).to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::utils::validate_checksum;

    #[test]
    fn test_command_frame_encoding() {
        let bytes = CommandFrame::turn_on_transmission(1).to_hex();
        assert_eq!(
            bytes,
            vec![0xAA, 0x41, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x02, 0x12, 0xFA]
        );

        let bytes = CommandFrame::new(1, CommandType::SendConfigFrame2).to_hex();
        assert_eq!(&bytes[8..], &[0x62, 0x1D]);

        let ext = CommandFrame::with_code(7734, 8)
            .with_extended_data(vec![1, 2, 3, 4])
            .unwrap();
        assert_eq!(ext.extended_data(), Some(&[1u8, 2, 3, 4][..]));
        let bytes = ext.to_hex();
        assert_eq!(bytes.len(), 14);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
        validate_checksum(&bytes).unwrap();
    }

    #[test]
    fn test_extended_data_limited_to_framesize() {
        let largest = CommandFrame::with_code(1, 8)
            .with_extended_data(vec![0; MAX_EXTENDED_DATA])
            .unwrap();
        let bytes = largest.to_hex();
        assert_eq!(bytes.len(), u16::MAX as usize);
        assert_eq!(read_u16(&bytes, 2), Some(u16::MAX));
        validate_checksum(&bytes).unwrap();

        assert_eq!(
            CommandFrame::with_code(1, 8).with_extended_data(vec![0; MAX_EXTENDED_DATA + 1]),
            Err(FrameError::TooLarge {
                size: u16::MAX as usize + 1
            })
        );
    }

    #[test]
    fn test_framer_splits_coalesced_frames() {
        let mut stream = CommandFrame::turn_on_transmission(1).to_hex();
        stream.extend(CommandFrame::send_config_frame2(1).to_hex());
        stream.extend(
            CommandFrame::with_code(1, 8)
                .with_extended_data(vec![9, 9])
                .unwrap()
                .to_hex(),
        );

        let mut framer = CommandFramer::new();
        framer.push(&stream);
        let codes: Vec<u16> = std::iter::from_fn(|| framer.next_frame())
            .map(|frame| parse_command_frame(&frame, 1, CommandOptions::default()).unwrap())
            .collect();
        assert_eq!(codes, vec![2, 5, 8]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_framer_joins_split_frames() {
        let bytes = CommandFrame::turn_off_transmission(1).to_hex();
        let mut framer = CommandFramer::new();

        framer.push(&bytes[..3]);
        assert_eq!(framer.next_frame(), None);
        framer.push(&bytes[3..7]);
        assert_eq!(framer.next_frame(), None);
        assert_eq!(framer.pending(), 7);
        framer.push(&bytes[7..]);
        assert_eq!(framer.next_frame(), Some(bytes));
        assert_eq!(framer.next_frame(), None);
    }

    #[test]
    fn test_framer_resynchronizes() {
        let command = CommandFrame::turn_on_transmission(1).to_hex();
        let mut framer = CommandFramer::new();

        // Noise, then a SYNC byte with an impossible size, then a real frame.
        framer.push(b"noise");
        framer.push(&[0xAA, 0x41, 0x00, 0x02]);
        framer.push(&command);
        assert_eq!(framer.next_frame(), Some(command.clone()));

        framer.push(b"no sync here");
        assert_eq!(framer.next_frame(), None);
        assert_eq!(framer.pending(), 0);

        // Frames of other types are passed on for the parser to reject.
        let mut data_type = command.clone();
        data_type[1] = 0x01;
        framer.push(&data_type);
        let frame = framer.next_frame().unwrap();
        assert!(matches!(
            parse_command_frame(&frame, 1, CommandOptions::default()),
            Err(ParseError::BadHeader { .. })
        ));
    }

    #[test]
    fn test_parse_known_commands() {
        for command in [
            CommandType::TurnOffTransmission,
            CommandType::TurnOnTransmission,
            CommandType::SendHeaderFrame,
            CommandType::SendConfigFrame1,
            CommandType::SendConfigFrame2,
        ] {
            let bytes = CommandFrame::new(1, command).to_hex();
            let code = parse_command_frame(&bytes, 1, CommandOptions::default()).unwrap();
            assert_eq!(CommandType::from_code(code), Some(command));
        }
    }

    #[test]
    fn test_parse_unassigned_code_passes_through() {
        let bytes = CommandFrame::with_code(1, 0x67F2).to_hex();
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Ok(0x67F2)
        );
        assert_eq!(CommandType::from_code(0x67F2), None);
    }

    #[test]
    fn test_parse_too_short() {
        let bytes = CommandFrame::turn_on_transmission(1).to_hex();
        for len in 0..MIN_COMMAND_FRAME_SIZE {
            assert_eq!(
                parse_command_frame(&bytes[..len], 1, CommandOptions::default()),
                Err(ParseError::TooShort {
                    length: len,
                    minimum: 10
                })
            );
        }
    }

    #[test]
    fn test_parse_bad_header() {
        let mut bytes = CommandFrame::turn_on_transmission(1).to_hex();
        bytes[0] = 0xAB;
        assert!(matches!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::BadHeader { sync: 0xAB, .. })
        ));

        // A data frame type is not a command, even with a valid CRC.
        let mut frame = FrameBuilder::new(FrameType::Data, 1, 10);
        frame.put_u16(2);
        let bytes = frame.finish();
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::BadHeader {
                sync: 0xAA,
                frame_type: 0x01
            })
        );
    }

    #[test]
    fn test_parse_bad_length() {
        let mut bytes = CommandFrame::turn_on_transmission(1).to_hex();
        bytes[3] = 0x0B;
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::BadLength {
                declared: 11,
                received: 10
            })
        );

        bytes[3] = 0x09;
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::BadLength {
                declared: 9,
                received: 10
            })
        );
    }

    #[test]
    fn test_parse_trailing_bytes_ignored() {
        let mut bytes = CommandFrame::turn_off_transmission(1).to_hex();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Ok(1)
        );
    }

    #[test]
    fn test_parse_crc_mismatch_strict_and_permissive() {
        let mut bytes = CommandFrame::turn_on_transmission(1).to_hex();
        bytes[9] ^= 0xFF;
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::CrcMismatch {
                received: 0x1205,
                calculated: 0x12FA
            })
        );
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::permissive()),
            Ok(2)
        );
    }

    #[test]
    fn test_parse_id_mismatch_and_broadcast() {
        let bytes = CommandFrame::turn_on_transmission(2).to_hex();
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::IdMismatch {
                received: 2,
                local: 1
            })
        );

        let bytes = CommandFrame::turn_on_transmission(BROADCAST_IDCODE).to_hex();
        assert_eq!(&bytes[8..], &[0xA1, 0x0A]);
        assert_eq!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Ok(2)
        );
    }

    #[test]
    fn test_parse_checks_run_in_order() {
        // Wrong sync and too short: length is reported first.
        assert!(matches!(
            parse_command_frame(&[0x00; 4], 1, CommandOptions::default()),
            Err(ParseError::TooShort { .. })
        ));
        // Bad CRC and wrong ID: CRC is reported first when enforced.
        let mut bytes = CommandFrame::turn_on_transmission(9).to_hex();
        bytes[8] ^= 0x01;
        assert!(matches!(
            parse_command_frame(&bytes, 1, CommandOptions::default()),
            Err(ParseError::CrcMismatch { .. })
        ));
        assert!(matches!(
            parse_command_frame(&bytes, 1, CommandOptions::permissive()),
            Err(ParseError::IdMismatch { received: 9, .. })
        ));
    }
}
