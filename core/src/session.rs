//! # PMU Session State Machine
//!
//! One `Session` per connected PDC. It consumes inbound command frames, decides which
//! frames to send and paces data frames while streaming. The session does no I/O and
//! reads no clock: callers pass the current `Instant` and write whatever frames are
//! returned, in the order they are returned.
//!
//! ## Command handling
//!
//! | Command                          | Reply              | Next state  |
//! |----------------------------------|--------------------|-------------|
//! | turn off transmission            | none               | `Idle`      |
//! | turn on transmission             | none               | `Streaming` |
//! | header / CFG-1 / CFG-2 request   | CFG-2              | `Streaming` |
//! | any unassigned or reserved code  | CFG-2              | `Streaming` |
//!
//! Header and CFG-1 requests are answered with CFG-2. Unrecognized codes are treated as
//! a configuration request instead of being rejected. Most PMUs reject them; this one
//! answers so that a PDC sending any command gets a configuration frame. A frame that
//! fails to parse changes nothing and gets no reply.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::ieee_c37_118::commands::{parse_command_frame, CommandOptions, CommandType};
use crate::ieee_c37_118::common::{FrameType, ParseError};
use crate::ieee_c37_118::config::{build_configuration_frame, Station};
use crate::ieee_c37_118::data_frame::{build_data_frame, FrameError, MeasurementSource};
use crate::scheduler::StreamScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

/// The request that caused a configuration frame to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRequest {
    Header,
    Config1,
    Config2,
    /// A code outside the command table.
    Unrecognized(u16),
}

/// What the session does for a command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    DisableStreaming,
    EnableStreaming,
    SendConfiguration(ConfigRequest),
}

impl CommandAction {
    pub fn from_code(code: u16) -> Self {
        match CommandType::from_code(code) {
            Some(CommandType::TurnOffTransmission) => CommandAction::DisableStreaming,
            Some(CommandType::TurnOnTransmission) => CommandAction::EnableStreaming,
            Some(CommandType::SendHeaderFrame) => {
                CommandAction::SendConfiguration(ConfigRequest::Header)
            }
            Some(CommandType::SendConfigFrame1) => {
                CommandAction::SendConfiguration(ConfigRequest::Config1)
            }
            Some(CommandType::SendConfigFrame2) => {
                CommandAction::SendConfiguration(ConfigRequest::Config2)
            }
            // Permissive policy: unknown codes are configuration requests.
            None => CommandAction::SendConfiguration(ConfigRequest::Unrecognized(code)),
        }
    }
}

pub struct Session<S> {
    station: Arc<Station>,
    source: S,
    options: CommandOptions,
    state: SessionState,
    scheduler: StreamScheduler,
}

impl<S: MeasurementSource> Session<S> {
    pub fn new(station: Arc<Station>, source: S, options: CommandOptions) -> Self {
        let scheduler = StreamScheduler::new(station.data_rate);
        Session {
            station,
            source,
            options,
            state: SessionState::Idle,
            scheduler,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Parses an inbound command frame and applies it.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(frame))`: A configuration frame to send before anything else.
    /// * `Ok(None)`: The command was applied and needs no reply.
    /// * `Err(ParseError)`: The frame was rejected; the session state is unchanged.
    pub fn handle_frame(
        &mut self,
        bytes: &[u8],
        now: Instant,
    ) -> Result<Option<Vec<u8>>, ParseError> {
        debug!("Received {} bytes: {:02x?}", bytes.len(), bytes);
        match parse_command_frame(bytes, self.station.idcode, self.options) {
            Ok(code) => Ok(self.apply(code, now)),
            Err(e) => {
                warn!("Discarding command frame: {}", e);
                Err(e)
            }
        }
    }

    /// Applies a parsed command code.
    ///
    /// Returns the configuration frame to send, if the command asks for one.
    pub fn apply(&mut self, code: u16, now: Instant) -> Option<Vec<u8>> {
        if let Some(command) = CommandType::from_code(code) {
            info!("Command: {}", command);
        }
        match CommandAction::from_code(code) {
            CommandAction::DisableStreaming => {
                info!("Data transmission disabled");
                self.state = SessionState::Idle;
                None
            }
            CommandAction::EnableStreaming => {
                info!("Data transmission enabled");
                self.start_streaming(now);
                None
            }
            CommandAction::SendConfiguration(request) => {
                match request {
                    ConfigRequest::Unrecognized(code) => warn!(
                        "Unrecognized command 0x{:04X}, answering with configuration frame 2",
                        code
                    ),
                    ConfigRequest::Config2 => info!("Configuration frame 2 requested"),
                    other => info!("{:?} requested, answering with configuration frame 2", other),
                }
                let frame = build_configuration_frame(&self.station);
                debug!("{} ({} bytes): {:02x?}", FrameType::Config2, frame.len(), frame);
                self.start_streaming(now);
                Some(frame)
            }
        }
    }

    /// Returns a data frame if streaming and one is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Vec<u8>>, FrameError> {
        if self.state != SessionState::Streaming || !self.scheduler.is_due(now) {
            return Ok(None);
        }
        let frame = build_data_frame(&self.station, &mut self.source)?;
        debug!("{} ({} bytes): {:02x?}", FrameType::Data, frame.len(), frame);
        Ok(Some(frame))
    }

    /// When the next data frame is due, or `None` while idle.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SessionState::Streaming => self.scheduler.next_deadline(),
            SessionState::Idle => None,
        }
    }

    fn start_streaming(&mut self, now: Instant) {
        self.state = SessionState::Streaming;
        self.scheduler.reset(now);
    }
}
