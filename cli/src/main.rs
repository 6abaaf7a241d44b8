use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::info;

use pmusim_cli::pmu_server::{run_pmu_server, ServerConfig};
use pmusim_cli::settings::{load_station_file, Settings};
use pmusim_core::ieee_c37_118::config::build_configuration_frame;

#[derive(Debug, Parser)]
#[command(name = "pmusim")]
#[command(about = "Simulated IEEE C37.118.2 PMU", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Listen for a PDC and stream simulated measurements.
    Serve(StationArgs),
    /// Print the effective station configuration as JSON.
    Station {
        #[command(flatten)]
        station: StationArgs,
        /// Print the CFG-2 frame as hex instead.
        #[arg(long)]
        cfg2: bool,
    },
}

/// Flags override the `PMU_*` environment variables.
#[derive(Debug, Args)]
struct StationArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    idcode: Option<u16>,
    #[arg(long)]
    station_name: Option<String>,
    #[arg(long)]
    data_rate: Option<u16>,
    #[arg(long)]
    phasors: Option<usize>,
    #[arg(long)]
    analogs: Option<usize>,
    /// JSON station description.
    #[arg(long)]
    station_file: Option<PathBuf>,
    /// Accept command frames with a bad CRC.
    #[arg(long)]
    permissive_crc: bool,
}

impl StationArgs {
    fn apply(self, settings: &mut Settings) -> Result<(), Box<dyn Error>> {
        if let Some(path) = self.station_file {
            settings.station = load_station_file(&path)?;
        }
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(idcode) = self.idcode {
            settings.station.idcode = idcode;
        }
        if let Some(name) = self.station_name {
            settings.station.station_name = name;
        }
        if let Some(rate) = self.data_rate {
            settings.station.data_rate = rate;
        }
        if self.permissive_crc {
            settings.enforce_crc = false;
        }
        settings.resize_channels(self.phasors, self.analogs);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let mut settings = Settings::from_env()?;

    match args.command {
        Commands::Serve(station) => {
            station.apply(&mut settings)?;
            let config = ServerConfig::from_settings(&settings)?;
            info!("Starting PMU simulator on {}", config.address);
            run_pmu_server(config).await?;
        }
        Commands::Station { station, cfg2 } => {
            station.apply(&mut settings)?;
            let validated = settings.station()?;
            if cfg2 {
                let frame = build_configuration_frame(&validated);
                let hex: Vec<String> = frame.iter().map(|b| format!("{:02X}", b)).collect();
                println!("{}", hex.join(" "));
            } else {
                println!("{}", serde_json::to_string_pretty(&validated.into_inner())?);
            }
        }
    }
    Ok(())
}
