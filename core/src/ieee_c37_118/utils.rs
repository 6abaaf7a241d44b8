//! # IEEE C37.118 Checksum and Time Utilities
//!
//! This module provides the CRC-CCITT checksum used by every IEEE C37.118 frame, as
//! specified in IEEE C37.118.2-2011 Appendix B, and helpers for stamping frames with
//! the current second-of-century and fractional second.

use chrono::{DateTime, Utc};

use super::common::ParseError;

/// Calculates the CRC-CCITT checksum for a given buffer.
///
/// Polynomial `0x1021`, initial value `0xFFFF`, no final XOR. Each byte is XORed into
/// the high byte of the register and then shifted out MSB-first.
///
/// # Parameters
///
/// * `buffer`: The bytes to checksum. Never includes the 2-byte CHK field itself.
///
/// # Returns
///
/// The calculated 16-bit CRC checksum.
pub fn calculate_crc(buffer: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in buffer {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Validates the trailing checksum of a complete frame.
///
/// The last two bytes are read as a big-endian CRC and compared with the CRC of all
/// preceding bytes.
///
/// # Returns
///
/// * `Ok(())` if the checksum is valid.
/// * `Err(ParseError::TooShort)` if the buffer cannot hold a checksum.
/// * `Err(ParseError::CrcMismatch)` if the checksum does not match.
pub fn validate_checksum(buffer: &[u8]) -> Result<(), ParseError> {
    if buffer.len() < 2 {
        return Err(ParseError::TooShort {
            length: buffer.len(),
            minimum: 2,
        });
    }

    let calculated = calculate_crc(&buffer[..buffer.len() - 2]);
    let received = u16::from_be_bytes([buffer[buffer.len() - 2], buffer[buffer.len() - 1]]);

    if calculated != received {
        return Err(ParseError::CrcMismatch {
            received,
            calculated,
        });
    }
    Ok(())
}

/// Second-of-century and fractional second of a frame.
///
/// `fracsec` is a count of microseconds within the second. It is not rescaled to the
/// station time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    pub soc: u32,
    pub fracsec: u32,
}

impl FrameTime {
    /// Captures the current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Splits a UTC timestamp into SOC and microsecond FRACSEC.
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        FrameTime {
            soc: time.timestamp() as u32,
            // Leap-second representation can push subsec micros past 999_999.
            fracsec: time.timestamp_subsec_micros().min(999_999),
        }
    }

    /// Whole seconds only, FRACSEC zero. Configuration frames are stamped this way.
    pub fn now_whole_seconds() -> Self {
        FrameTime {
            soc: Utc::now().timestamp() as u32,
            fracsec: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_crc_check_value() {
        // CRC-16/CCITT-FALSE catalogue check value.
        assert_eq!(calculate_crc(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc_empty_buffer_is_initial_value() {
        assert_eq!(calculate_crc(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc_send_header_command_frame() {
        // IEEE-layout command frame with SOC/FRACSEC: send header (CMD 0x0003), ID 7.
        let frame: [u8; 18] = [
            0xAA, 0x41, 0x00, 0x12, 0x00, 0x07, 0x66, 0xF3, 0x2C, 0x30, 0x00, 0x00, 0xA0, 0xA5,
            0x00, 0x03, 0xFA, 0x17,
        ];
        assert_eq!(calculate_crc(&frame[..16]), 0xFA17);
        validate_checksum(&frame).unwrap();
    }

    #[test]
    fn test_validate_checksum_mismatch() {
        let frame = [0xAA, 0x41, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00];
        match validate_checksum(&frame) {
            Err(ParseError::CrcMismatch {
                received,
                calculated,
            }) => {
                assert_eq!(received, 0x0000);
                assert_eq!(calculated, 0x12FA);
            }
            other => panic!("expected CrcMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_checksum_too_short() {
        assert!(matches!(
            validate_checksum(&[0xAA]),
            Err(ParseError::TooShort { length: 1, .. })
        ));
    }

    #[test]
    fn test_frame_time_from_datetime() {
        let time = Utc.timestamp_opt(1_149_580_800, 16_817_000).unwrap();
        let frame_time = FrameTime::from_datetime(time);
        assert_eq!(frame_time.soc, 1_149_580_800);
        assert_eq!(frame_time.fracsec, 16_817);
    }

    #[test]
    fn test_frame_time_now_is_sub_second() {
        let frame_time = FrameTime::now();
        assert!(frame_time.fracsec < 1_000_000);
        assert_eq!(FrameTime::now_whole_seconds().fracsec, 0);
    }
}
