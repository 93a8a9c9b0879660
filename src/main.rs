//! fczm - Fabric Zone Manager CLI
//!
//! Operator front end for the zone driver: grant or withdraw
//! initiator-target connectivity on a fabric, look up where ports are
//! logged in, dump a fabric's zoning state and check a configuration file.
//! Results are printed to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fabric_zone_manager::{
    ConnectivityRequest, Error, FabricLockRegistry, PortIdentifier, Result, SessionPool,
    SshConnector, ZoneDriver, ZoningConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Fabric Zone Manager - FC zoning for block storage attachments
#[derive(Parser, Debug)]
#[command(name = "fczm", author, version, about, long_about = None)]
struct Args {
    /// Fabric configuration file (YAML)
    #[arg(long, env = "FCZM_CONFIG", default_value = "/etc/fczm/fabrics.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Zone initiators to their targets
    Add(ConnectionArgs),
    /// Remove zoning between initiators and targets
    Delete(ConnectionArgs),
    /// Fabrics on which the given targets are logged in
    SanContext {
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
    },
    /// Initiators and targets logged into each fabric
    DeviceMapping {
        #[arg(long = "initiator")]
        initiators: Vec<String>,
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Name server, active zone set and session status of a fabric
    Show {
        #[arg(long)]
        fabric: String,
    },
    /// Validate the configuration file and exit
    CheckConfig,
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    /// Fabric name from the configuration file
    #[arg(long)]
    fabric: String,

    /// INITIATOR=TARGET[,TARGET...], repeatable
    #[arg(long = "connection", required = true, value_parser = parse_connection)]
    connections: Vec<Connection>,

    /// Host display name for friendly zone names
    #[arg(long)]
    host: Option<String>,

    /// Storage system display name for friendly zone names
    #[arg(long)]
    storage_system: Option<String>,
}

#[derive(Debug, Clone)]
struct Connection {
    initiator: String,
    targets: Vec<String>,
}

fn parse_connection(raw: &str) -> std::result::Result<Connection, String> {
    let (initiator, targets) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected INITIATOR=TARGET[,TARGET...], got {}", raw))?;
    let targets: Vec<String> = targets
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    if initiator.trim().is_empty() || targets.is_empty() {
        return Err(format!("connection {} needs an initiator and a target", raw));
    }
    Ok(Connection {
        initiator: initiator.trim().to_string(),
        targets,
    })
}

impl ConnectionArgs {
    fn request(&self) -> Result<ConnectivityRequest> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for connection in &self.connections {
            map.entry(connection.initiator.clone())
                .or_default()
                .extend(connection.targets.iter().cloned());
        }
        let mut request = ConnectivityRequest::from_wwn_map(&map)?;
        request.host_name = self.host.clone();
        request.storage_system = self.storage_system.clone();
        Ok(request)
    }
}

fn parse_wwns(raw: &[String]) -> Result<Vec<PortIdentifier>> {
    raw.iter().map(|w| PortIdentifier::parse(w)).collect()
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Fabric Zone Manager {}", fabric_zone_manager::VERSION);
    info!("  Config: {}", args.config.display());

    let config = ZoningConfig::load(&args.config)?;

    if let Command::CheckConfig = args.command {
        config.validate()?;
        let summary: BTreeMap<&str, FabricSummary> = config
            .fabrics
            .iter()
            .map(|(name, endpoint)| {
                (
                    name.as_str(),
                    FabricSummary {
                        address: &endpoint.address,
                        vsan: endpoint.vsan,
                        vendor: endpoint.vendor.to_string(),
                        zoning_policy: &endpoint.zoning_policy,
                    },
                )
            })
            .collect();
        return print_json(&summary);
    }

    let pool = SessionPool::new(Arc::new(SshConnector::default()), config.pool.clone());
    let driver = ZoneDriver::new(Arc::new(config), pool, FabricLockRegistry::new());

    match args.command {
        Command::Add(connection) => {
            let outcome = driver
                .add_connection(&connection.fabric, &connection.request()?)
                .await?;
            print_json(&outcome)
        }
        Command::Delete(connection) => {
            let outcome = driver
                .delete_connection(&connection.fabric, &connection.request()?)
                .await?;
            print_json(&outcome)
        }
        Command::SanContext { targets } => {
            let context = driver.get_san_context(&parse_wwns(&targets)?).await?;
            print_json(&context)
        }
        Command::DeviceMapping {
            initiators,
            targets,
        } => {
            if initiators.is_empty() && targets.is_empty() {
                return Err(Error::Configuration(
                    "device-mapping needs at least one --initiator or --target".into(),
                ));
            }
            let mapping = driver
                .get_device_mapping_from_network(&parse_wwns(&initiators)?, &parse_wwns(&targets)?)
                .await?;
            print_json(&mapping)
        }
        Command::Show { fabric } => print_json(&driver.fabric_state(&fabric).await?),
        Command::CheckConfig => Ok(()),
    }
}

#[derive(Serialize)]
struct FabricSummary<'a> {
    address: &'a str,
    vsan: u16,
    vendor: String,
    zoning_policy: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("russh=warn".parse().unwrap())
        .add_directive("russh_keys=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection() {
        let connection = parse_connection("10:00:00:00:00:00:00:01=2000000000000002, 2000000000000003").unwrap();
        assert_eq!(connection.initiator, "10:00:00:00:00:00:00:01");
        assert_eq!(connection.targets, vec!["2000000000000002", "2000000000000003"]);

        assert!(parse_connection("1000000000000001").is_err());
        assert!(parse_connection("1000000000000001=").is_err());
    }

    #[test]
    fn test_connection_args_merge_initiators() {
        let args = Args::try_parse_from([
            "fczm",
            "add",
            "--fabric",
            "fabA",
            "--connection",
            "1000000000000001=2000000000000002",
            "--connection",
            "10:00:00:00:00:00:00:01=2000000000000003",
            "--host",
            "compute-0",
        ])
        .unwrap();
        let Command::Add(connection) = args.command else {
            panic!("expected add");
        };
        let request = connection.request().unwrap();
        assert_eq!(request.targets.len(), 1);
        assert_eq!(request.targets.values().next().map(|t| t.len()), Some(2));
        assert_eq!(request.host_name.as_deref(), Some("compute-0"));
    }
}
