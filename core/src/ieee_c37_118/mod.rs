//! # IEEE C37.118.2 Frame Encoding
//!
//! Everything a simulated PMU needs to speak IEEE C37.118.2-2011 on the wire: building
//! configuration (CFG-2) and data frames, and parsing the command frames a PDC sends.
//!
//! ## Submodules
//!
//! - `codec`: Big-endian field writers, fixed-width station names and `FrameBuilder`,
//!   which fills in FRAMESIZE and the trailing CRC.
//! - `commands`: Command codes, command frame encoding and the inbound command parser.
//! - `common`: Frame constants, `FrameType`, `FrameHeader`, the STAT word and `ParseError`.
//! - `config`: `StationConfig`, validation into a `Station` and the CFG-2 builder.
//! - `data_frame`: `MeasurementSource`, `Measurement` and the data frame builder.
//! - `random`: Random and constant measurement sources.
//! - `units`: PHUNIT/ANUNIT words, nominal frequency and the FORMAT word.
//! - `utils`: CRC-CCITT checksums and SOC/FRACSEC timestamps.
//!
//! Only floating-point, polar data is produced.

pub mod codec;
pub mod commands;
pub mod common;
pub mod config;
pub mod data_frame;
pub mod random;
pub mod units;
pub mod utils;
