//! # IEEE C37.118 Common Types
//!
//! Shared definitions for every frame the simulated PMU reads or writes: the SYNC/TYPE
//! byte pair, the common frame header, the STAT word and the command parse errors.
//!
//! ## Key Components
//!
//! - `FrameType`: Frame types encoded in bits 6-4 of the second SYNC byte.
//! - `FrameHeader`: SYNC, TYPE, FRAMESIZE and IDCODE, the prefix shared by all frames.
//! - `StatField`: The data-valid and PMU-sync flags of the data frame STAT word.
//! - `ParseError`: Why an inbound command frame was rejected.

use std::fmt;

use thiserror::Error;

/// Leading SYNC byte of every IEEE C37.118 frame.
pub const SYNC_BYTE: u8 = 0xAA;

/// Version bits (3-0) of the second SYNC byte. Frames are emitted as IEEE C37.118-2005.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// IDCODE value addressing every PMU on the link.
pub const BROADCAST_IDCODE: u16 = 0xFFFF;

/// Length of SYNC + TYPE + FRAMESIZE + IDCODE.
pub const HEADER_SIZE: usize = 6;

/// Length of the trailing CHK field.
pub const CHK_SIZE: usize = 2;

/// Reasons an inbound command frame is rejected.
///
/// All variants are non-fatal: the offending bytes are discarded and the session keeps
/// its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("frame too short: got {length} bytes, need at least {minimum}")]
    TooShort { length: usize, minimum: usize },
    #[error("bad header: sync 0x{sync:02X}, type 0x{frame_type:02X}")]
    BadHeader { sync: u8, frame_type: u8 },
    #[error("bad frame size: declared {declared} bytes, received {received}")]
    BadLength { declared: usize, received: usize },
    #[error("CRC mismatch: frame carries 0x{received:04X}, calculated 0x{calculated:04X}")]
    CrcMismatch { received: u16, calculated: u16 },
    #[error("IDCODE mismatch: frame addressed to {received}, local PMU is {local}")]
    IdMismatch { received: u16, local: u16 },
}

/// Represents the type of an IEEE C37.118 frame.
///
/// Configuration frame 3 is not part of the 2005 standard this PMU speaks and is not
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Header,
    Config1,
    Config2,
    Command,
}

impl FrameType {
    /// Bits 6-4 of the second SYNC byte.
    fn type_bits(self) -> u8 {
        match self {
            FrameType::Data => 0,
            FrameType::Header => 1,
            FrameType::Config1 => 2,
            FrameType::Config2 => 3,
            FrameType::Command => 4,
        }
    }

    /// The second SYNC byte: frame type in bits 6-4, version in bits 3-0.
    ///
    /// Data is `0x01`, configuration frame 2 is `0x31`, command is `0x41`.
    pub fn type_byte(self) -> u8 {
        (self.type_bits() << 4) | PROTOCOL_VERSION
    }

    /// Extracts the frame type from a SYNC/TYPE byte pair.
    ///
    /// # Returns
    ///
    /// * `Ok(FrameType)`: The frame type encoded in bits 6-4.
    /// * `Err(ParseError::BadHeader)`: If the leading byte is not `0xAA` or the type
    ///   bits are not assigned.
    pub fn from_sync(sync: u8, frame_type: u8) -> Result<Self, ParseError> {
        if sync != SYNC_BYTE {
            return Err(ParseError::BadHeader { sync, frame_type });
        }
        match (frame_type >> 4) & 0x07 {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::Header),
            2 => Ok(FrameType::Config1),
            3 => Ok(FrameType::Config2),
            4 => Ok(FrameType::Command),
            _ => Err(ParseError::BadHeader { sync, frame_type }),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Data => write!(f, "IEEE Std C37.118 Data Frame"),
            FrameType::Header => write!(f, "IEEE Std C37.118 Header Frame"),
            FrameType::Config1 => write!(f, "IEEE Std C37.118 Configuration Frame 1"),
            FrameType::Config2 => write!(f, "IEEE Std C37.118 Configuration Frame 2"),
            FrameType::Command => write!(f, "IEEE Std C37.118 Command Frame"),
        }
    }
}

/// The prefix shared by every frame: SYNC, TYPE, FRAMESIZE and IDCODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub framesize: u16,
    pub idcode: u16,
}

impl FrameHeader {
    /// Decodes the 6-byte frame prefix.
    ///
    /// Only the prefix is inspected; FRAMESIZE is returned as declared and not checked
    /// against the buffer length.
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ParseError::TooShort {
                length: bytes.len(),
                minimum: HEADER_SIZE,
            });
        }
        Ok(FrameHeader {
            frame_type: FrameType::from_sync(bytes[0], bytes[1])?,
            framesize: u16::from_be_bytes([bytes[2], bytes[3]]),
            idcode: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }
}

/// STAT word of a data frame.
///
/// Bit 15 flags valid data and bit 14 flags a time-synchronized PMU. All other bits are
/// reserved and transmitted as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatField {
    pub data_valid: bool,
    pub pmu_sync: bool,
}

impl StatField {
    const DATA_VALID: u16 = 1 << 15;
    const PMU_SYNC: u16 = 1 << 14;

    /// Valid, synchronized data. The simulator always reports this.
    pub fn valid_and_synced() -> Self {
        StatField {
            data_valid: true,
            pmu_sync: true,
        }
    }

    pub fn to_raw(&self) -> u16 {
        let mut raw = 0;
        if self.data_valid {
            raw |= Self::DATA_VALID;
        }
        if self.pmu_sync {
            raw |= Self::PMU_SYNC;
        }
        raw
    }
}
