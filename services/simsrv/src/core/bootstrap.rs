//! Service Bootstrap and Initialization
//!
//! Command-line surface, logging setup, and assembly of the configured
//! client. Effective settings resolve command line over environment over
//! config file over defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::core::client::SimulatorClient;
use crate::core::config::SimSrvConfig;
use crate::core::protocol::CommandChannel;
use crate::core::transport::TcpTransport;
use crate::utils::error::{Result, SimSrvError};

/// Command-line arguments for simsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "simsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Simulator variable access service",
    long_about = None
)]
pub struct Args {
    /// Configuration file (yaml, toml, or json)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Simulator host (overrides configuration)
    #[arg(long)]
    pub host: Option<String>,

    /// Simulator port (overrides configuration)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Directory for daily-rolling log files (stdout when unset)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - check configuration without connecting
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Service subcommands; `monitor` is the default.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Continuously poll declared variables and display them
    Monitor {
        /// Declaration file to load at startup
        #[arg(short = 'd', long)]
        declarations: Option<PathBuf>,

        /// Delay between polling passes in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Read one variable and print its value
    Read {
        /// Variable name
        name: String,

        /// Decode as this type tag instead of the declared one
        #[arg(short = 't', long = "type")]
        type_tag: Option<String>,
    },
    /// Write a value to one variable
    Write {
        /// Variable name
        name: String,

        /// Value text, parsed per the variable's type
        value: String,

        /// Encode as this type tag instead of the declared one
        #[arg(short = 't', long = "type")]
        type_tag: Option<String>,
    },
    /// Resolve a variable's address and size
    Resolve {
        /// Variable name
        name: String,
    },
}

impl Args {
    /// The selected subcommand, defaulting to `monitor`.
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Monitor {
            declarations: None,
            interval_ms: None,
        })
    }
}

/// Load configuration and apply command-line overrides.
pub fn effective_config(args: &Args) -> Result<SimSrvConfig> {
    let mut config = SimSrvConfig::load(args.config.as_deref())?;

    if let Some(host) = &args.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = Some(level.clone());
    }
    if let Some(dir) = &args.log_dir {
        config.logging.dir = Some(dir.clone());
    }

    if let Some(Command::Monitor {
        declarations,
        interval_ms,
    }) = &args.command
    {
        if let Some(path) = declarations {
            config.declarations = Some(path.clone());
        }
        if let Some(ms) = interval_ms {
            config.polling.interval_ms = *ms;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns the appender guard
/// when logging to a file; hold it for the process lifetime so buffered
/// lines flush on shutdown.
pub fn init_logging(config: &SimSrvConfig, no_color: bool) -> Result<Option<WorkerGuard>> {
    let level = config.logging.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| SimSrvError::ConfigError(format!("Invalid log level '{level}': {e}")))?;

    match &config.logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "simsrv.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| SimSrvError::ConfigError(format!("Failed to init logging: {e}")))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(!no_color)
                .try_init()
                .map_err(|e| SimSrvError::ConfigError(format!("Failed to init logging: {e}")))?;
            Ok(None)
        }
    }
}

/// Log the effective settings, for startup and `--validate`.
pub fn report_configuration(config: &SimSrvConfig) {
    info!("Endpoint: {}", config.endpoint());
    info!(
        "Response timeout: {} ms",
        config.connection.response_timeout_ms
    );
    info!("Receive buffer: {} bytes", config.connection.buffer_size);
    info!("Poll interval: {} ms", config.polling.interval_ms);
    match &config.declarations {
        Some(path) => info!("Declarations: {}", path.display()),
        None => info!("Declarations: none"),
    }
}

/// Build a client over the bundled TCP transport.
pub fn build_client(config: &SimSrvConfig) -> Result<SimulatorClient> {
    let transport = TcpTransport::new(config.transport_config())?;
    let channel = CommandChannel::new(
        Box::new(transport),
        config.connection.buffer_size,
        config.response_timeout(),
    );
    Ok(SimulatorClient::new(channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_subcommand_is_monitor() {
        let args = Args::try_parse_from(["simsrv"]).unwrap();
        assert!(matches!(
            args.subcommand(),
            Command::Monitor {
                declarations: None,
                interval_ms: None
            }
        ));
    }

    #[test]
    fn test_one_shot_subcommands_parse() {
        let args = Args::try_parse_from(["simsrv", "read", "Motor.Speed", "--type", "INT"]).unwrap();
        match args.subcommand() {
            Command::Read { name, type_tag } => {
                assert_eq!(name, "Motor.Speed");
                assert_eq!(type_tag.as_deref(), Some("INT"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = Args::try_parse_from(["simsrv", "write", "Run", "true"]).unwrap();
        assert!(matches!(args.subcommand(), Command::Write { .. }));

        let args = Args::try_parse_from(["simsrv", "resolve", "Run"]).unwrap();
        assert!(matches!(args.subcommand(), Command::Resolve { .. }));
    }

    #[test]
    fn test_cli_overrides_apply() {
        let args = Args::try_parse_from([
            "simsrv",
            "--host",
            "10.0.0.9",
            "--port",
            "7300",
            "--log-level",
            "debug",
            "monitor",
            "--interval-ms",
            "50",
        ])
        .unwrap();

        let config = effective_config(&args).unwrap();
        assert_eq!(config.connection.host, "10.0.0.9");
        assert_eq!(config.connection.port, 7300);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.polling.interval_ms, 50);
    }

    #[test]
    fn test_cli_beats_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simsrv.yaml");
        std::fs::write(&path, "connection:\n  port: 7100\n").unwrap();

        let args = Args::try_parse_from([
            "simsrv",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "7999",
        ])
        .unwrap();

        let config = effective_config(&args).unwrap();
        assert_eq!(config.connection.port, 7999);
    }
}
