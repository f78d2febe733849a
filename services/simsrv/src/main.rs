//! Simulator Variable Access Service (`simsrv`)
//!
//! Connects to a Sysmac-style PLC simulator endpoint and monitors, reads,
//! writes, and resolves named variables.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use simsrv::core::bootstrap::{self, Args, Command};
use simsrv::core::declarations::load_declaration_file;
use simsrv::core::resolver::trimmed_text;
use simsrv::{PlcType, SimSrvConfig, SimulatorClient, VariablePoller};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = bootstrap::effective_config(&args)?;
    let _log_guard = bootstrap::init_logging(&config, args.no_color)?;

    info!("simsrv {} starting", env!("CARGO_PKG_VERSION"));
    bootstrap::report_configuration(&config);

    if args.validate {
        info!("Validation completed successfully");
        return Ok(());
    }

    let result = match args.subcommand() {
        Command::Monitor { .. } => run_monitor(&config).await,
        Command::Read { name, type_tag } => run_read(&config, &name, type_tag.as_deref()).await,
        Command::Write {
            name,
            value,
            type_tag,
        } => run_write(&config, &name, &value, type_tag.as_deref()).await,
        Command::Resolve { name } => run_resolve(&config, &name).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        },
    }
}

/// Connect, load declarations, and redraw the value table until Ctrl-C.
async fn run_monitor(config: &SimSrvConfig) -> Result<()> {
    let client = Arc::new(bootstrap::build_client(config)?);
    client.connect().await?;
    info!("Connected to {}", config.endpoint());

    if let Some(path) = &config.declarations {
        let report = client.load_declarations(path).await?;
        info!(
            "Loaded {} of {} declared variables from {}",
            report.loaded,
            report.total(),
            path.display()
        );
        for (name, cause) in &report.failures {
            warn!(variable = %name, error = %cause, "Declaration failed to resolve");
        }
    }

    let mut poller = VariablePoller::new(Arc::clone(&client), config.poll_interval());
    poller.start();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
        }
        signal_token.cancel();
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval()) => {
                render_table(&client).await;
            }
        }
    }

    info!("Shutting down");
    poller.stop().await;
    let stats = poller.stats().await;
    info!(
        passes = stats.passes,
        reads_ok = stats.reads_ok,
        reads_failed = stats.reads_failed,
        "Polling summary"
    );
    let transport = client.transport_stats().await;
    info!(
        bytes_sent = transport.bytes_sent,
        bytes_received = transport.bytes_received,
        frames_received = transport.frames_received,
        errors = transport.errors,
        "Transport summary"
    );
    client.disconnect().await?;
    Ok(())
}

/// Redraw the monitor table from the current registry snapshot.
async fn render_table(client: &SimulatorClient) {
    let snapshots = client.snapshot().await;
    let now = Utc::now();

    print!("\x1B[2J\x1B[1;1H"); // Clear screen
    println!("{}", "=== Simulator Variables ===".bold());
    println!(
        "{:<32} {:<12} {:<24} {:>8}",
        "Name", "Type", "Value", "Age"
    );
    println!("{}", "─".repeat(79));

    for snap in &snapshots {
        let type_text = snap.type_text.as_deref().unwrap_or("-");
        let age = match snap.updated_at {
            Some(at) => format!("{:.1}s", (now - at).num_milliseconds() as f64 / 1000.0),
            None => "-".to_string(),
        };

        // Pad before coloring; escape codes would otherwise count
        // against the column width.
        match (&snap.value, &snap.last_error) {
            (_, Some(cause)) => {
                let cell = format!("{:<24}", truncate(cause, 24));
                println!("{:<32} {:<12} {} {:>8}", snap.name, type_text, cell.red(), age);
            },
            (Some(value), None) => {
                let cell = format!("{:<24}", truncate(&value.to_string(), 24));
                println!(
                    "{:<32} {:<12} {} {:>8}",
                    snap.name,
                    type_text,
                    cell.green(),
                    age
                );
            },
            (None, None) => {
                println!("{:<32} {:<12} {:<24} {:>8}", snap.name, type_text, "-", age);
            },
        }
    }

    if snapshots.is_empty() {
        println!("{}", "(no variables registered)".dimmed());
    }
    println!();
    println!(
        "{}",
        format!("{} variables - press Ctrl-C to exit", snapshots.len()).dimmed()
    );
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Register the variable's declaration, when one is configured and present.
async fn register_declared(
    config: &SimSrvConfig,
    client: &SimulatorClient,
    name: &str,
) -> Result<()> {
    if let Some(path) = &config.declarations {
        let declared = load_declaration_file(path).await?;
        if let Some(variable) = declared.into_iter().find(|v| v.name == name) {
            client.register(variable).await;
        }
    }
    Ok(())
}

/// One-shot read against a fresh connection.
async fn run_read(config: &SimSrvConfig, name: &str, type_tag: Option<&str>) -> Result<()> {
    let client = bootstrap::build_client(config)?;
    client.connect().await?;

    let value = match type_tag {
        Some(tag) => client.read_as(name, PlcType::from_tag(tag)?).await?,
        None => {
            register_declared(config, &client, name).await?;
            client.read(name).await?
        },
    };

    println!("{} = {}", name.cyan(), value.to_string().green());
    client.disconnect().await?;
    Ok(())
}

/// One-shot write against a fresh connection.
async fn run_write(
    config: &SimSrvConfig,
    name: &str,
    value_text: &str,
    type_tag: Option<&str>,
) -> Result<()> {
    let client = bootstrap::build_client(config)?;
    client.connect().await?;

    match type_tag {
        Some(tag) => client.write_as(name, PlcType::from_tag(tag)?, value_text).await?,
        None => {
            register_declared(config, &client, name).await?;
            client.write(name, value_text).await?;
        },
    }

    println!(
        "{} {} = {}",
        "Wrote".green(),
        name.cyan(),
        value_text
    );
    client.disconnect().await?;
    Ok(())
}

/// One-shot resolve against a fresh connection.
async fn run_resolve(config: &SimSrvConfig, name: &str) -> Result<()> {
    let client = bootstrap::build_client(config)?;
    client.connect().await?;

    let resolution = client.resolve(name).await?;
    println!("{}: {}", "Variable".bold(), name.cyan());
    println!("  Revision: {}", trimmed_text(&resolution.revision));
    println!("  Address:  {}", trimmed_text(&resolution.address));
    println!("  Size:     {} bytes", resolution.size);

    client.disconnect().await?;
    Ok(())
}
