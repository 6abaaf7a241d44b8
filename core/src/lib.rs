//! # Synchrophasor PMU Simulator Core
//!
//! Library side of a simulated Phasor Measurement Unit speaking IEEE C37.118.2. It builds
//! configuration and data frames, parses command frames from a PDC and drives the
//! per-connection streaming state machine. No sockets live here; the `pmusim-cli` crate
//! wires a `Session` to TCP.
//!
//! ## Submodules
//!
//! - `ieee_c37_118`: Frame encoding, command parsing, station configuration and
//!   measurement sources.
//! - `scheduler`: Data frame pacing at the configured rate.
//! - `session`: The Idle/Streaming state machine for one PDC connection.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! use pmusim_core::ieee_c37_118::commands::{CommandFrame, CommandOptions};
//! use pmusim_core::ieee_c37_118::config::StationConfig;
//! use pmusim_core::ieee_c37_118::random::RandomSource;
//! use pmusim_core::session::{Session, SessionState};
//!
//! let station = Arc::new(StationConfig::default().validate().unwrap());
//! let mut session = Session::new(station, RandomSource::new(), CommandOptions::default());
//!
//! let start = Instant::now();
//! let request = CommandFrame::send_config_frame2(1).to_hex();
//! let cfg2 = session.handle_frame(&request, start).unwrap().unwrap();
//! assert_eq!(cfg2.len(), 194);
//! assert_eq!(session.state(), SessionState::Streaming);
//!
//! let data = session.poll(start + Duration::from_millis(20)).unwrap().unwrap();
//! assert_eq!(data.len(), 66);
//! ```

pub mod ieee_c37_118;
pub mod scheduler;
pub mod session;
