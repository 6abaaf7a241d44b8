//! # Big-Endian Frame Codec
//!
//! Append and read helpers for IEEE C37.118 fields. All multi-byte values are big-endian
//! and floats are written as their IEEE-754 single-precision bit pattern.
//!
//! `FrameBuilder` wraps these helpers with the two-pass frame layout used by every
//! outbound frame: FRAMESIZE is written as a placeholder, the payload is appended, then
//! the real size is patched in and the CRC over everything before it is appended.

use bytes::{BufMut, BytesMut};

use super::common::{FrameType, CHK_SIZE, SYNC_BYTE};
use super::utils::calculate_crc;

/// Width of station and channel name fields.
pub const NAME_SIZE: usize = 16;

/// Appends a fixed-width ASCII field, truncating or right-padding with spaces.
pub fn put_name<B: BufMut>(buf: &mut B, name: &str, width: usize) {
    let bytes = name.as_bytes();
    let used = bytes.len().min(width);
    buf.put_slice(&bytes[..used]);
    buf.put_bytes(b' ', width - used);
}

pub fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let field = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([field[0], field[1]]))
}

pub fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

pub fn read_f32(bytes: &[u8], offset: usize) -> Option<f32> {
    read_u32(bytes, offset).map(f32::from_bits)
}

/// Builds one outbound frame.
#[derive(Debug)]
pub struct FrameBuilder {
    buf: BytesMut,
}

impl FrameBuilder {
    /// Starts a frame with SYNC, TYPE, a zero FRAMESIZE placeholder and IDCODE.
    pub fn new(frame_type: FrameType, idcode: u16, capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(capacity);
        buf.put_u8(SYNC_BYTE);
        buf.put_u8(frame_type.type_byte());
        buf.put_u16(0);
        buf.put_u16(idcode);
        FrameBuilder { buf }
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn put_i16(&mut self, value: i16) -> &mut Self {
        self.buf.put_i16(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// Appends the exact bit pattern of `value`.
    pub fn put_f32(&mut self, value: f32) -> &mut Self {
        self.buf.put_u32(value.to_bits());
        self
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn put_name(&mut self, name: &str) -> &mut Self {
        put_name(&mut self.buf, name, NAME_SIZE);
        self
    }

    /// Bytes written so far, excluding the CHK field.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Patches FRAMESIZE to the final length including CHK, then appends the CRC.
    ///
    /// Callers keep frames within `u16::MAX` bytes: station frames through
    /// `StationConfig::validate`, command frames through `CommandFrame::with_extended_data`.
    pub fn finish(mut self) -> Vec<u8> {
        debug_assert!(self.buf.len() + CHK_SIZE <= u16::MAX as usize);
        let framesize = (self.buf.len() + CHK_SIZE) as u16;
        self.buf[2..4].copy_from_slice(&framesize.to_be_bytes());
        let crc = calculate_crc(&self.buf);
        self.buf.put_u16(crc);
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::utils::validate_checksum;

    #[test]
    fn test_put_name_pads_and_truncates() {
        let mut buf = Vec::new();
        put_name(&mut buf, "SIM_PMU_1", NAME_SIZE);
        assert_eq!(&buf, b"SIM_PMU_1       ");

        let mut buf = Vec::new();
        put_name(&mut buf, "A_STATION_NAME_LONGER_THAN_16", NAME_SIZE);
        assert_eq!(&buf, b"A_STATION_NAME_L");

        let mut buf = Vec::new();
        put_name(&mut buf, "", NAME_SIZE);
        assert_eq!(&buf, &[b' '; NAME_SIZE]);

        let mut buf = Vec::new();
        put_name(&mut buf, "EXACTLY_16_CHARS", NAME_SIZE);
        assert_eq!(&buf, b"EXACTLY_16_CHARS");
    }

    #[test]
    fn test_big_endian_fields() {
        let mut builder = FrameBuilder::new(FrameType::Data, 0x0102, 32);
        builder
            .put_u16(0xA1B2)
            .put_i16(-2)
            .put_u32(0x0A0B0C0D)
            .put_f32(1.0);
        let frame = builder.finish();

        assert_eq!(&frame[..6], &[0xAA, 0x01, 0x00, 0x14, 0x01, 0x02]);
        assert_eq!(&frame[6..8], &[0xA1, 0xB2]);
        assert_eq!(&frame[8..10], &[0xFF, 0xFE]);
        assert_eq!(&frame[10..14], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&frame[14..18], &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_f32_bit_pattern_preserved() {
        let values = [f32::MIN_POSITIVE, -0.0, 230.0 + 1.0e-5, std::f32::consts::PI];
        let mut builder = FrameBuilder::new(FrameType::Data, 1, 32);
        for value in values {
            builder.put_f32(value);
        }
        let frame = builder.finish();
        for (i, value) in values.iter().enumerate() {
            let read = read_f32(&frame, 6 + 4 * i).unwrap();
            assert_eq!(read.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_finish_sets_size_and_crc() {
        let mut builder = FrameBuilder::new(FrameType::Config2, 7, 32);
        builder.put_name("STN");
        assert_eq!(builder.len(), 22);
        let frame = builder.finish();

        assert_eq!(frame.len(), 24);
        assert_eq!(read_u16(&frame, 2), Some(24));
        validate_checksum(&frame).unwrap();
    }

    #[test]
    fn test_reads_out_of_range() {
        assert_eq!(read_u16(&[0x01], 0), None);
        assert_eq!(read_u32(&[0, 0, 0, 1], 1), None);
        assert_eq!(read_u32(&[0, 0, 0, 1], 0), Some(1));
    }
}
