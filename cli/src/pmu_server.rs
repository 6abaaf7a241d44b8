use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use pmusim_core::ieee_c37_118::commands::{CommandFramer, CommandOptions};
use pmusim_core::ieee_c37_118::config::Station;
use pmusim_core::ieee_c37_118::data_frame::{FrameError, MeasurementSource};
use pmusim_core::ieee_c37_118::random::RandomSource;
use pmusim_core::session::Session;

use crate::settings::{Settings, SettingsError};

const READ_BUFFER_SIZE: usize = 1024;

/// Errors that end a session. The listener keeps accepting afterwards.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("cannot build data frame: {0}")]
    Frame(#[from] FrameError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub station: Arc<Station>,
    pub options: CommandOptions,
}

impl ServerConfig {
    pub fn new(address: String, station: Station, options: CommandOptions) -> Self {
        ServerConfig {
            address,
            station: Arc::new(station),
            options,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(ServerConfig::new(
            settings.address(),
            settings.station()?,
            settings.command_options(),
        ))
    }
}

/// Drives one session over a connected socket until the peer disconnects or the
/// transport fails.
///
/// Inbound bytes are reassembled into frames, so commands may arrive split across reads
/// or several to a read. Commands and data frames share the socket; a configuration
/// reply is always written before the next data frame.
pub async fn handle_client<S: MeasurementSource>(
    mut socket: TcpStream,
    mut session: Session<S>,
) -> Result<(), SessionError> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut framer = CommandFramer::new();

    loop {
        let deadline = session.next_deadline().map(time::Instant::from_std);

        tokio::select! {
            read_result = socket.read(&mut buf) => {
                let n = read_result?;
                if n == 0 {
                    return Ok(());
                }
                framer.push(&buf[..n]);
                while let Some(frame) = framer.next_frame() {
                    // Rejected frames are logged by the session and otherwise ignored.
                    if let Ok(Some(reply)) = session.handle_frame(&frame, Instant::now()) {
                        socket.write_all(&reply).await?;
                    }
                }
            }
            _ = time::sleep_until(deadline.unwrap_or_else(time::Instant::now)), if deadline.is_some() => {
                if let Some(frame) = session.poll(Instant::now())? {
                    socket.write_all(&frame).await?;
                }
            }
        }
    }
}

/// Accepts clients one at a time, each with a fresh session and measurement source.
pub async fn serve<F, S>(
    listener: TcpListener,
    station: Arc<Station>,
    options: CommandOptions,
    mut make_source: F,
) -> io::Result<()>
where
    F: FnMut() -> S,
    S: MeasurementSource,
{
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("PMU: client connected: {}", addr);
        let session = Session::new(station.clone(), make_source(), options);
        match handle_client(socket, session).await {
            Ok(()) => info!("PMU: client disconnected: {}", addr),
            Err(e) => error!("PMU: session with {} ended: {}", addr, e),
        }
    }
}

pub async fn bind(config: &ServerConfig) -> io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(&config.address).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

/// Binds the configured address and serves random measurements forever.
pub async fn run_pmu_server(config: ServerConfig) -> io::Result<()> {
    let (listener, local) = bind(&config).await?;
    let station = &config.station;
    info!("PMU server listening on {}", local);
    info!(
        "Station {} (ID {}): {} phasors, {} analogs, {} frames/s, {}, nominal {}",
        station.station_name,
        station.idcode,
        station.phasor_count(),
        station.analog_count(),
        station.data_rate,
        station.format,
        station.nominal_frequency
    );
    if !config.options.enforce_crc {
        info!("Command frame CRC errors will be logged, not rejected");
    }

    serve(listener, config.station.clone(), config.options, RandomSource::new).await
}
