//! Command-line client for the simulated heater.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use thermal_modbus::client::{connect, control_loop, interact};
use thermal_modbus::config::{self, ClientConfig};

#[derive(Parser)]
#[command(name = "heater-client")]
#[command(about = "Reads the temperature and drives the heater of a Modbus TCP device")]
struct Cli {
    #[arg(short = 'c', long, help = "Optional TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Device host name or IP address [default: localhost]")]
    host: Option<String>,

    #[arg(short = 'p', long, help = "Device TCP port [default: 5502]")]
    port: Option<u16>,

    #[arg(short = 'i', long, help = "Modbus unit id [default: 255]")]
    unit_id: Option<u8>,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "read the temperature, switch the heater on and read its state")]
    Once,

    #[command(about = "keep the temperature between the control thresholds")]
    Control,
}

impl Cli {
    fn client_config(&self) -> thermal_modbus::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => config::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(unit_id) = self.unit_id {
            config.unit_id = unit_id;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let config = cli.client_config()?;

    match cli.command {
        Command::Once => {
            interact(&config, |reading| println!("{reading}")).await?;
        }
        Command::Control => {
            let mut ctx = connect(&config).await?;
            control_loop(&mut ctx, &config).await?;
        }
    }

    Ok(())
}
