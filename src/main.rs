use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use device_qc::config::QcConfig;
use device_qc::hal::mock::{SimulatedControlBoard, SimulatedDeviceInfo};
use device_qc::hal::Hub;
use device_qc::scan::{ChannelImpedanceScan, FixedOutput};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Run a channel impedance scan against simulated peers
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Measure one channel per call instead of a single batched sweep
    #[arg(long)]
    slow: bool,

    /// Output container (DQCC format); defaults to the configured filename
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => QcConfig::load(path).context("Failed to load configuration")?,
        None => QcConfig::default(),
    };
    config.validate()?;

    // Simulated 8x10 device; channel 3 never reaches full actuation
    let geometry = SimulatedDeviceInfo::grid(8, 10, 2.0);
    let mut hub = Hub::new().with_poll_interval(config.remote.poll_interval());
    hub.register_as(
        &config.remote.control_board_peer,
        SimulatedControlBoard::new(120).with_sagging_channels([3]),
    );
    hub.register_as(
        &config.remote.device_info_peer,
        SimulatedDeviceInfo::new(geometry),
    );
    info!("Peers on hub: {:?}", hub.list_peers());

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.persist.default_filename));
    let scan = ChannelImpedanceScan::from_client(Arc::new(hub), config, None);

    match scan.run(&FixedOutput(output), None, args.slow).await? {
        Some(outcome) => {
            println!(
                "{} readings saved to {}",
                outcome.rows,
                outcome.output_path.display()
            );
            for path in &outcome.report.written {
                println!("  {}", path);
            }
            if let Some(plot) = &outcome.report.plot_path {
                println!("summary plot: {}", plot.display());
            }
            println!("{}", serde_json::to_string_pretty(&outcome.metrics)?);
        }
        None => println!("scan cancelled"),
    }

    Ok(())
}
