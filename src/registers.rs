//! Conversions between raw register words and the values they carry.

use std::fmt;

/// Temperatures travel as kelvin multiplied by this factor.
pub const TEMPERATURE_SCALE: f64 = 100.0;

/// Heater state register value meaning "on".
pub const HEATER_ON_VALUE: u16 = 100;

const ZERO_CELSIUS: f64 = 273.15;

/// Temperature in kelvin.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Kelvin(pub f64);

impl Kelvin {
    pub fn from_register(raw: u16) -> Self {
        Kelvin(f64::from(raw) / TEMPERATURE_SCALE)
    }

    /// Scales back into a register word, saturating at the ends of the `u16` range.
    pub fn to_register(self) -> u16 {
        // float-to-int `as` saturates and maps NaN to 0
        (self.0 * TEMPERATURE_SCALE).round() as u16
    }

    pub fn from_celsius(celsius: f64) -> Self {
        Kelvin(celsius + ZERO_CELSIUS)
    }

    pub fn celsius(self) -> f64 {
        self.0 - ZERO_CELSIUS
    }
}

/// Always two decimals, the resolution of the register encoding:
/// `293.1` prints as `293.10 K`.
impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} K", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterState {
    On,
    Off,
}

impl HeaterState {
    /// Only the exact value 100 means on.
    pub fn from_register(raw: u16) -> Self {
        if raw == HEATER_ON_VALUE {
            HeaterState::On
        } else {
            HeaterState::Off
        }
    }

    pub fn to_register(self) -> u16 {
        match self {
            HeaterState::On => HEATER_ON_VALUE,
            HeaterState::Off => 0,
        }
    }

    pub fn is_on(self) -> bool {
        self == HeaterState::On
    }
}

impl From<bool> for HeaterState {
    fn from(on: bool) -> Self {
        if on {
            HeaterState::On
        } else {
            HeaterState::Off
        }
    }
}

impl fmt::Display for HeaterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaterState::On => f.write_str("ON"),
            HeaterState::Off => f.write_str("OFF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_is_register_divided_by_100() {
        for raw in [0u16, 1, 99, 100, 25000, 29315, u16::MAX] {
            assert_eq!(Kelvin::from_register(raw).0, raw as f64 / 100.0);
        }
    }

    #[test]
    fn formats_temperature_with_unit() {
        assert_eq!(Kelvin::from_register(29315).to_string(), "293.15 K");
        assert_eq!(Kelvin::from_register(25000).to_string(), "250.00 K");
        assert_eq!(Kelvin::from_register(29310).to_string(), "293.10 K");
    }

    #[test]
    fn only_exactly_100_is_on() {
        assert_eq!(HeaterState::from_register(100), HeaterState::On);
        for raw in [0u16, 1, 99, 101, 1000, u16::MAX] {
            assert_eq!(HeaterState::from_register(raw), HeaterState::Off);
        }
        assert_eq!(HeaterState::On.to_string(), "ON");
        assert_eq!(HeaterState::Off.to_string(), "OFF");
    }

    #[test]
    fn encodes_temperature_with_rounding() {
        assert_eq!(Kelvin(293.15).to_register(), 29315);
        assert_eq!(Kelvin(288.15).to_register(), 28815);
        assert_eq!(Kelvin(-5.0).to_register(), 0);
        assert_eq!(Kelvin(1000.0).to_register(), u16::MAX);
    }

    #[test]
    fn converts_celsius() {
        assert!((Kelvin::from_celsius(20.0).0 - 293.15).abs() < 1e-9);
        assert!((Kelvin(298.15).celsius() - 25.0).abs() < 1e-9);
    }
}
