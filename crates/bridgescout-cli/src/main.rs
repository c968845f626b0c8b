//! Bridgescout - Main entry point
//!
//! Finds bridges on the local network and inspects a known one.

mod config;

use anyhow::{bail, Context, Result};
use bridgescout_core::{
    Bridge, BridgeClient, Candidate, DiscoveryMethod, DiscoveryMode, HostAddr,
};
use bridgescout_discovery::{BridgeDiscovery, Confirmation, Confirmer, DiscoveryError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bridgescout")]
#[command(about = "Find lighting bridges on the local network")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridgescout.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for bridges
    Discover {
        /// Keep collecting instead of stopping at the first bridge
        #[arg(long)]
        all: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Confirm a bridge at a known address and print its configuration
    Describe {
        /// Bridge address, e.g. 192.168.1.2 or 192.168.1.2:8080
        address: HostAddr,

        /// Use HTTPS for the REST API
        #[arg(long)]
        https: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Bridgescout v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;

    match args.command {
        Command::Discover { all, json } => {
            let mode = if all {
                DiscoveryMode::Exhaustive
            } else {
                DiscoveryMode::FirstMatch
            };
            discover(&config, mode, json).await
        }
        Command::Describe { address, https } => describe(&config, address, https).await,
    }
}

async fn discover(config: &config::Config, mode: DiscoveryMode, json: bool) -> Result<()> {
    let discovery = BridgeDiscovery::new(config.to_discovery_config())
        .context("Failed to set up discovery")?;

    let bridges = tokio::select! {
        result = discovery.discover(mode) => match result {
            Ok(bridges) => bridges,
            Err(DiscoveryError::NoBridgesFound) => {
                warn!("No bridges found");
                Vec::new()
            }
            Err(e) => return Err(e).context("Discovery failed"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping discovery");
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&bridges)?);
        return Ok(());
    }

    println!("Discovered {} bridges:", bridges.len());
    for bridge in &bridges {
        print_bridge(bridge);
    }
    Ok(())
}

async fn describe(config: &config::Config, address: HostAddr, https: bool) -> Result<()> {
    let confirmer = Confirmer::new(&config.http).context("Failed to build HTTP client")?;
    let candidate = Candidate::new(address, DiscoveryMethod::Manual);

    let bridge = match confirmer
        .confirm(candidate)
        .await
        .with_context(|| format!("Could not reach {}", address))?
    {
        Confirmation::Confirmed(bridge) => bridge,
        Confirmation::Rejected(reason) => bail!("{} is not a bridge: {}", address, reason),
    };
    print_bridge(&bridge);

    let client = BridgeClient::new(bridge, &config.http)?.with_https(https);
    let configuration = client
        .configuration()
        .await
        .context("Failed to read bridge configuration")?;

    if let Some(id) = &configuration.bridge_id {
        println!("    Bridge ID: {}", id);
    }
    if let Some(version) = &configuration.api_version {
        println!("    API version: {}", version);
    }
    if let Some(version) = &configuration.software_version {
        println!("    Firmware: {}", version);
    }
    if let Some(mac) = &configuration.mac {
        println!("    MAC: {}", mac);
    }
    Ok(())
}

fn print_bridge(bridge: &Bridge) {
    println!("  - {} (via {})", bridge.address(), bridge.method());
    if let Some(description) = bridge.description() {
        if let Some(name) = &description.friendly_name {
            println!("    Name: {}", name);
        }
        if let Some(model) = &description.model_name {
            println!("    Model: {}", model);
        }
        if let Some(serial) = &description.serial_number {
            println!("    Serial: {}", serial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_discover() {
        let args = Args::try_parse_from(["bridgescout", "discover", "--all", "--json"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Discover {
                all: true,
                json: true
            }
        ));
        assert_eq!(args.config, PathBuf::from("bridgescout.toml"));
    }

    #[test]
    fn test_parse_describe_address() {
        let args =
            Args::try_parse_from(["bridgescout", "describe", "192.168.1.2:8080", "--https"]).unwrap();
        match args.command {
            Command::Describe { address, https } => {
                assert_eq!(address.to_string(), "192.168.1.2:8080");
                assert!(https);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Args::try_parse_from(["bridgescout", "describe", "bridge.local"]).is_err());
    }
}
