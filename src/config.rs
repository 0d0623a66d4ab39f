use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Register and coil addresses agreed with the device.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RegisterMapping {
    pub temperature_address: u16,
    pub heater_state_address: u16,
    pub heater_coil_address: u16,
}

impl Default for RegisterMapping {
    fn default() -> Self {
        Self {
            temperature_address: 40001,
            heater_state_address: 40002,
            heater_coil_address: 0,
        }
    }
}

/// Parameters of the lumped thermal model.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ThermalParameters {
    pub ambient_kelvin: f64,
    pub initial_kelvin: f64,
    /// J/K
    pub heat_capacity: f64,
    /// W
    pub heater_power: f64,
    /// W/K
    pub loss_coefficient: f64,
}

impl Default for ThermalParameters {
    fn default() -> Self {
        Self {
            ambient_kelvin: 288.15,
            initial_kelvin: 288.15,
            heat_capacity: 1000.0,
            heater_power: 2000.0,
            loss_coefficient: 20.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub update_interval_ms: u64,
    pub registers: RegisterMapping,
    pub thermal: ThermalParameters,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5502,
            update_interval_ms: 100,
            registers: RegisterMapping::default(),
            thermal: ThermalParameters::default(),
        }
    }
}

impl ServerConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }
}

/// Thermostat thresholds, in degrees Celsius.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub low_celsius: f64,
    pub high_celsius: f64,
    pub poll_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            low_celsius: 20.0,
            high_celsius: 25.0,
            poll_interval_ms: 1000,
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// 255 addresses the TCP device itself rather than a unit behind a gateway.
    pub unit_id: u8,
    pub registers: RegisterMapping,
    pub control: ControlConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5502,
            unit_id: 255,
            registers: RegisterMapping::default(),
            control: ControlConfig::default(),
        }
    }
}

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults. A file that exists but can't be read
/// or parsed is an error.
pub fn load<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("config file {} not found, using defaults", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse<T: DeserializeOwned>(contents: &str) -> std::result::Result<T, toml::de::Error> {
    toml::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let server: ServerConfig = parse("").unwrap();
        assert_eq!(server, ServerConfig::default());
        let client: ClientConfig = parse("").unwrap();
        assert_eq!(client, ClientConfig::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let server: ServerConfig = parse(
            r#"
            port = 1502
            [registers]
            temperature_address = 100
            heater_state_address = 101
            "#,
        )
        .unwrap();

        assert_eq!(server.port, 1502);
        assert_eq!(server.update_interval_ms, 100);
        assert_eq!(server.registers.temperature_address, 100);
        assert_eq!(server.registers.heater_state_address, 101);
        assert_eq!(server.registers.heater_coil_address, 0);
        assert_eq!(server.thermal, ThermalParameters::default());
    }

    #[test]
    fn client_config_reads_control_table() {
        let client: ClientConfig = parse(
            r#"
            host = "10.0.0.7"
            [control]
            low_celsius = 18.5
            "#,
        )
        .unwrap();

        assert_eq!(client.host, "10.0.0.7");
        assert_eq!(client.port, 5502);
        assert_eq!(client.control.low_celsius, 18.5);
        assert_eq!(client.control.high_celsius, 25.0);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(parse::<ServerConfig>("port = \"not a number\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config: ServerConfig = load(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("thermal-modbus-{}.toml", std::process::id()));
        std::fs::write(&path, "port = [").unwrap();
        let result = load::<ServerConfig>(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }
}
