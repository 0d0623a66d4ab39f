//! Modbus TCP heater client and the simulated thermal device it talks to.
//!
//! The device exposes two holding registers and one coil:
//!
//! * temperature in kelvin, scaled by 100 (`29315` is `293.15 K`)
//! * heater state, `100` when the heater is on and `0` otherwise
//! * the heater command coil, `true` to switch the heater on
//!
//! Addresses come from [`config::RegisterMapping`].

pub mod bank;
pub mod client;
pub mod config;
pub mod error;
pub mod registers;
pub mod server;
pub mod simulation;

pub use error::{Error, Result};
