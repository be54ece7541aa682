use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sunnybeam_lib::{DeviceConfig, MeasurementRecord, SBError, SeriesKind, SessionConfig, SunnyBeam};

/// Read live power and energy history from an SMA Sunny Beam over USB.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Request,
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// Repeat the request every N seconds until interrupted.
    #[arg(short, long, global = true, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
    /// Reject frames with a bad checksum instead of only logging them.
    #[arg(long, global = true)]
    strict_crc: bool,
    /// Read attempts for the live-data response.
    #[arg(long, global = true, default_value_t = 50)]
    live_attempts: u32,
    /// Read attempts for each chunk of a series.
    #[arg(long, global = true, default_value_t = 50)]
    chunk_attempts: u32,
    /// Do not reset the USB device before claiming it.
    #[arg(long, global = true)]
    no_reset: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Request {
    /// Current power, today's energy and total energy.
    Live,
    /// Today's power series.
    Today,
    /// Last month's daily energy series.
    LastMonth,
    /// Connect and print the device identity.
    Info,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // stdout carries the results
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, -v for DEBUG, -vv for TRACE; RUST_LOG wins
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            live_data_attempts: self.live_attempts,
            chunk_attempts: self.chunk_attempts,
            ..SessionConfig::default()
        }
        .with_strict_crc(self.strict_crc)
    }

    fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            reset_before_claim: !self.no_reset,
            ..DeviceConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(&cli).await {
        error!("{:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let mut beam = SunnyBeam::open(cli.device_config(), cli.session_config())
        .await
        .context("Failed to open Sunny Beam")?;
    let device_id = beam.connect().await.context("Handshake with Sunny Beam failed")?;
    info!(serial = beam.serial_number(), %device_id, "Connected");

    let result = match cli.interval {
        None => request(&mut beam, cli).await,
        Some(secs) => poll(&mut beam, cli, Duration::from_secs(secs)).await,
    };

    beam.close();
    result
}

async fn poll(beam: &mut SunnyBeam, cli: &Cli, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }

        if let Err(e) = request(beam, cli).await {
            match e.downcast_ref::<SBError>() {
                Some(sb) if sb.is_transient() => warn!("Request failed, retrying next interval: {}", sb),
                _ => return Err(e),
            }
        }
    }
}

async fn request(beam: &mut SunnyBeam, cli: &Cli) -> Result<()> {
    match cli.command {
        Request::Live => {
            let measurement = beam.get_measurements().await?;
            if cli.json {
                println!("{}", serde_json::to_string(&measurement)?);
            } else {
                println!("{}", measurement);
            }
        }
        Request::Today => print_series(beam.get_series(SeriesKind::Today).await?, SeriesKind::Today, cli.json)?,
        Request::LastMonth => print_series(
            beam.get_series(SeriesKind::LastMonth).await?,
            SeriesKind::LastMonth,
            cli.json,
        )?,
        Request::Info => {
            let device_id = beam.device_id().map(|id| id.to_string()).unwrap_or_default();
            if cli.json {
                let info = serde_json::json!({
                    "serial": beam.serial_number(),
                    "device_id": device_id,
                    "state": beam.state().to_string(),
                });
                println!("{}", info);
            } else {
                println!("Serial:    {}", beam.serial_number());
                println!("Device ID: {}", device_id);
                println!("State:     {}", beam.state());
            }
        }
    }
    Ok(())
}

fn print_series(records: Vec<MeasurementRecord>, kind: SeriesKind, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&records)?);
        return Ok(());
    }

    println!("{} ({} records)", kind, records.len());
    for record in &records {
        println!("  {}", record);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["sunnybeam", "live", "--interval", "0"]).is_err());

        let cli = Cli::try_parse_from(["sunnybeam", "live", "--interval", "5"]).unwrap();
        assert_eq!(cli.interval, Some(5));
        assert!(matches!(cli.command, Request::Live));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
