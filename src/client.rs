use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tokio_modbus::client::{tcp, Context, Reader, Writer};
use tokio_modbus::Slave;

use crate::config::{ClientConfig, ControlConfig, RegisterMapping};
use crate::error::{Error, Result};
use crate::registers::{HeaterState, Kelvin};

/// The three device operations the heater client needs.
#[async_trait]
pub trait HeaterLink: Send {
    async fn read_holding_register(&mut self, addr: u16) -> Result<u16>;

    async fn write_coil(&mut self, addr: u16, value: bool) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl HeaterLink for Context {
    async fn read_holding_register(&mut self, addr: u16) -> Result<u16> {
        let values = self.read_holding_registers(addr, 1).await??;
        values.first().copied().ok_or(Error::EmptyResponse)
    }

    async fn write_coil(&mut self, addr: u16, value: bool) -> Result<()> {
        self.write_single_coil(addr, value).await??;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.disconnect().await??;
        Ok(())
    }
}

/// Resolves the configured host and opens a Modbus TCP connection to the
/// first address that accepts it.
pub async fn connect(config: &ClientConfig) -> Result<Context> {
    let addrs: Vec<SocketAddr> = lookup_host((config.host.as_str(), config.port)).await?.collect();
    connect_any(&config.host, addrs, Slave(config.unit_id)).await
}

/// Tries each address in order. Fails with the last connect error, or with
/// [`Error::Resolve`] when there was nothing to try.
pub async fn connect_any<I>(host: &str, addrs: I, slave: Slave) -> Result<Context>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let mut last_err = None;
    for addr in addrs {
        tracing::debug!("connecting to {addr}");
        match tcp::connect_slave(addr, slave).await {
            Ok(ctx) => {
                tracing::info!("connected to {addr}");
                return Ok(ctx);
            }
            Err(source) => {
                tracing::debug!("connect to {addr} failed: {source}");
                last_err = Some(Error::Connect { addr, source });
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Resolve(host.to_string())))
}

/// A value observed by the interaction sequence, handed out as soon as it is
/// read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Temperature(Kelvin),
    Heater(HeaterState),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Temperature(temperature) => write!(f, "Temperature: {temperature}"),
            Reading::Heater(heater) => write!(f, "Heater: {heater}"),
        }
    }
}

/// What one pass of the interaction sequence observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub temperature: Kelvin,
    pub heater: HeaterState,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Reading::Temperature(self.temperature))?;
        write!(f, "{}", Reading::Heater(self.heater))
    }
}

/// Reads the temperature, commands the heater on and reads back the heater
/// state. Each value goes to `on_reading` right after it is read, so a later
/// failure doesn't swallow what was already observed.
///
/// The read-back is reported as observed. A device may apply the command on
/// its next update, so a mismatch is not an error.
pub async fn run_sequence<L, F>(link: &mut L, registers: &RegisterMapping, mut on_reading: F) -> Result<Report>
where
    L: HeaterLink + ?Sized,
    F: FnMut(Reading),
{
    let raw = link.read_holding_register(registers.temperature_address).await?;
    let temperature = Kelvin::from_register(raw);
    tracing::debug!("temperature register {} = {raw}", registers.temperature_address);
    on_reading(Reading::Temperature(temperature));

    link.write_coil(registers.heater_coil_address, true).await?;
    tracing::debug!("heater coil {} set", registers.heater_coil_address);

    let raw = link.read_holding_register(registers.heater_state_address).await?;
    let heater = HeaterState::from_register(raw);
    if !heater.is_on() {
        tracing::debug!("heater state register reads {raw} after switching on");
    }
    on_reading(Reading::Heater(heater));

    Ok(Report { temperature, heater })
}

/// Runs the sequence and then closes the link, whether or not the sequence
/// succeeded. A sequence error wins over a close error, and a close error
/// after a complete sequence is only logged.
pub async fn run_and_close<L, F>(link: &mut L, registers: &RegisterMapping, on_reading: F) -> Result<Report>
where
    L: HeaterLink + ?Sized,
    F: FnMut(Reading),
{
    let result = run_sequence(link, registers, on_reading).await;
    if let Err(err) = link.close().await {
        tracing::warn!("failed to close connection: {err}");
    }
    result
}

/// Connects, performs the interaction sequence and releases the connection.
pub async fn interact<F>(config: &ClientConfig, on_reading: F) -> Result<Report>
where
    F: FnMut(Reading),
{
    let mut ctx = connect(config).await?;
    run_and_close(&mut ctx, &config.registers, on_reading).await
}

/// Two-point controller switching the heater with hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct Thermostat {
    low: Kelvin,
    high: Kelvin,
}

impl Thermostat {
    pub fn new(control: &ControlConfig) -> Self {
        Self {
            low: Kelvin::from_celsius(control.low_celsius),
            high: Kelvin::from_celsius(control.high_celsius),
        }
    }

    /// Returns the coil value to write, or `None` to leave the heater alone.
    pub fn decide(&self, temperature: Kelvin, heater: HeaterState) -> Option<bool> {
        match heater {
            HeaterState::Off if temperature < self.low => Some(true),
            HeaterState::On if temperature > self.high => Some(false),
            _ => None,
        }
    }

    /// One control cycle: observe, print the status line, switch if needed.
    pub async fn poll<L>(&self, link: &mut L, registers: &RegisterMapping) -> Result<Report>
    where
        L: HeaterLink + ?Sized,
    {
        let temperature = Kelvin::from_register(link.read_holding_register(registers.temperature_address).await?);
        let heater = HeaterState::from_register(link.read_holding_register(registers.heater_state_address).await?);

        println!(
            "Temperature: {} ({:.2}°C) | Heater: {heater}",
            temperature,
            temperature.celsius()
        );

        if let Some(on) = self.decide(temperature, heater) {
            tracing::info!("turning heater {}", HeaterState::from(on));
            link.write_coil(registers.heater_coil_address, on).await?;
        }

        Ok(Report { temperature, heater })
    }
}

/// Polls the device every control period until Ctrl+C, then closes the link.
pub async fn control_loop<L>(link: &mut L, config: &ClientConfig) -> Result<()>
where
    L: HeaterLink + ?Sized,
{
    let thermostat = Thermostat::new(&config.control);
    let mut ticker = tokio::time::interval(config.control.poll_interval());

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping thermostat");
                break Ok(());
            }
            _ = ticker.tick() => {
                if let Err(err) = thermostat.poll(link, &config.registers).await {
                    break Err(err);
                }
            }
        }
    };

    let closed = link.close().await;
    result.and(closed)
}
