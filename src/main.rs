use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use thermal_modbus::bank::RegisterBank;
use thermal_modbus::config::{self, ServerConfig};
use thermal_modbus::registers::Kelvin;
use thermal_modbus::server::{seed_registers, serve};
use thermal_modbus::simulation::{simulation_loop, SimpleThermalComponent};

#[derive(Parser)]
#[command(name = "modbus-server")]
#[command(about = "Modbus TCP server exposing a simulated heated thermal mass")]
struct Cli {
    #[arg(short = 'c', long, default_value = "modbus_config.toml", help = "TOML configuration file")]
    config: PathBuf,

    #[arg(short = 'v', long, help = "Log every request")]
    verbose: bool,
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

    let config: ServerConfig = config::load(&cli.config)?;
    tracing::info!("port: {}", config.port);
    tracing::info!("update interval: {} ms", config.update_interval_ms);
    tracing::info!(
        "register {}: temperature (K x 100)",
        config.registers.temperature_address
    );
    tracing::info!(
        "register {}: heater state (0=OFF, 100=ON)",
        config.registers.heater_state_address
    );
    tracing::info!(
        "coil {}: heater control (TRUE=ON, FALSE=OFF)",
        config.registers.heater_coil_address
    );

    let bank = RegisterBank::new();
    seed_registers(&bank, &config.registers, Kelvin(config.thermal.initial_kelvin));

    let component = SimpleThermalComponent::new(config.thermal.clone());
    let simulation = tokio::spawn(simulation_loop(
        component,
        bank.clone(),
        config.registers.clone(),
        config.update_interval(),
    ));

    let socket_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(socket_addr).await?;
    tracing::info!("listening on {socket_addr}, press Ctrl+C to stop");

    let result = tokio::select! {
        res = serve(listener, bank) => res,
        res = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            res
        }
    };

    simulation.abort();
    result?;
    Ok(())
}
