//! Pod emulator binary.
//!
//! Listens for one controller connection over TCP, runs the session
//! lifecycle on it and exits: status 0 after a deactivation, 1 on any error.
//!
//! Environment variables mirror the flags (`POD_STATE`, `POD_LISTEN`, ...).
//! Log filtering follows `RUST_LOG`, or `-v` repetitions when unset.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pod_emulator::prelude::*;

/// Device-side emulator for the pod control protocol.
#[derive(Debug, Parser)]
#[command(name = "pod-emulator", version, about)]
struct Cli {
    /// TOML configuration file; flags override its values.
    #[arg(long, env = "POD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Session state file.
    #[arg(long, env = "POD_STATE", value_name = "FILE")]
    state: Option<PathBuf>,

    /// Ignore stored state and pair from scratch.
    #[arg(long, env = "POD_FRESH")]
    fresh: bool,

    /// Address to accept the controller connection on.
    #[arg(long, env = "POD_LISTEN", value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Device address, in hex.
    #[arg(long, env = "POD_ADDRESS", value_name = "HEX", value_parser = parse_hex_u32)]
    address: Option<u32>,

    /// Pause after the final acknowledgment of a deactivation, in milliseconds.
    #[arg(long, env = "POD_GRACE_MS", value_name = "MS")]
    grace_ms: Option<u64>,

    /// More output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn device_config(&self) -> Result<DeviceConfig> {
        let base = match &self.config {
            Some(path) => DeviceConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => DeviceConfig::default(),
        };

        let mut builder = DeviceConfigBuilder::from_config(base);
        if let Some(state) = &self.state {
            builder = builder.state_file(state);
        }
        if self.fresh {
            builder = builder.fresh(true);
        }
        if let Some(listen) = self.listen {
            builder = builder.listen(listen);
        }
        if let Some(address) = self.address {
            builder = builder.address(address);
        }
        if let Some(ms) = self.grace_ms {
            builder = builder.deactivation_grace(Duration::from_millis(ms));
        }
        Ok(builder.build())
    }
}

fn parse_hex_u32(value: &str) -> Result<u32, std::num::ParseIntError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve(cli: &Cli) -> Result<()> {
    let config = cli.device_config()?;
    let store = FileStateStore::new(&config.state_file);
    let state = if config.fresh {
        info!("fresh start requested, ignoring stored state");
        SessionState::default()
    } else {
        store
            .load()
            .with_context(|| format!("loading state from {}", store.path().display()))?
            .unwrap_or_default()
    };

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(listen = %config.listen, address = %format!("{:#010x}", config.address), "waiting for controller");

    let (stream, peer) = listener.accept().await.context("accepting controller")?;
    stream.set_nodelay(true)?;
    info!(%peer, "controller connected");

    let mut device = Device::new(StreamTransport::new(stream), MessageCipher::new(), store, &config);
    let final_state = device.run(state).await?;
    info!(
        nonce_counter = final_state.nonce_counter,
        "session ended; use --fresh to pair a new pod"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match serve(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_address() {
        assert_eq!(parse_hex_u32("1f000001").unwrap(), 0x1F00_0001);
        assert_eq!(parse_hex_u32("0xFFFFFFFE").unwrap(), 0xFFFF_FFFE);
        assert!(parse_hex_u32("xyz").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from(["pod-emulator", "--fresh", "--address", "0x10", "--grace-ms", "5"]);
        let config = cli.device_config().unwrap();
        assert!(config.fresh);
        assert_eq!(config.address, 0x10);
        assert_eq!(config.deactivation_grace, Duration::from_millis(5));
    }
}
