//! Thermal simulation that drives the published registers.

use std::time::Duration;

use tokio::time::interval;

use crate::bank::RegisterBank;
use crate::config::{RegisterMapping, ThermalParameters};
use crate::registers::{HeaterState, Kelvin};

/// A model stepped in fixed increments by the simulation loop.
pub trait SimulationComponent {
    fn set_heater(&mut self, on: bool);

    /// Advances the model by `dt` seconds.
    fn step(&mut self, dt: f64);

    fn temperature(&self) -> Kelvin;

    fn heater_status(&self) -> HeaterState;
}

/// Single thermal mass with a heater, losing heat to a constant ambient.
#[derive(Debug, Clone)]
pub struct SimpleThermalComponent {
    params: ThermalParameters,
    temperature: f64,
    heater_on: bool,
}

impl SimpleThermalComponent {
    pub fn new(params: ThermalParameters) -> Self {
        Self {
            temperature: params.initial_kelvin,
            params,
            heater_on: false,
        }
    }
}

impl SimulationComponent for SimpleThermalComponent {
    fn set_heater(&mut self, on: bool) {
        self.heater_on = on;
    }

    fn step(&mut self, dt: f64) {
        let power = if self.heater_on { self.params.heater_power } else { 0.0 };
        let loss = self.params.loss_coefficient * (self.temperature - self.params.ambient_kelvin);
        self.temperature += (power - loss) / self.params.heat_capacity * dt;
    }

    fn temperature(&self) -> Kelvin {
        Kelvin(self.temperature)
    }

    fn heater_status(&self) -> HeaterState {
        HeaterState::from(self.heater_on)
    }
}

/// One simulation tick: take the heater command from the coil, step the
/// model and publish its outputs.
pub fn tick<C: SimulationComponent>(component: &mut C, bank: &RegisterBank, registers: &RegisterMapping, dt: f64) {
    bank.update(|view| {
        component.set_heater(view.coil(registers.heater_coil_address));
        component.step(dt);
        view.set_holding_register(registers.temperature_address, component.temperature().to_register());
        view.set_holding_register(registers.heater_state_address, component.heater_status().to_register());
    });
}

const STATUS_PERIOD: Duration = Duration::from_secs(10);

/// Runs the simulation forever, one tick per `period`.
pub async fn simulation_loop<C: SimulationComponent>(
    mut component: C,
    bank: RegisterBank,
    registers: RegisterMapping,
    period: Duration,
) {
    tracing::info!("starting simulation loop, period {period:?}");

    let mut ticker = interval(period);
    let dt = period.as_secs_f64();
    let status_every = (STATUS_PERIOD.as_millis() / period.as_millis().max(1)).max(1);
    let mut ticks: u128 = 0;

    loop {
        ticker.tick().await;
        tick(&mut component, &bank, &registers, dt);

        ticks += 1;
        if ticks % status_every == 0 {
            tracing::info!(
                "Temp: {}, Heater: {}",
                component.temperature(),
                component.heater_status()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(component: &mut SimpleThermalComponent, seconds: u32) {
        for _ in 0..seconds * 10 {
            component.step(0.1);
        }
    }

    #[test]
    fn heats_with_heater_on() {
        let mut component = SimpleThermalComponent::new(ThermalParameters::default());
        let start = component.temperature();
        component.set_heater(true);
        run(&mut component, 2);

        assert!(component.temperature() > start);
        assert_eq!(component.heater_status(), HeaterState::On);
    }

    #[test]
    fn relaxes_toward_ambient_with_heater_off() {
        let params = ThermalParameters {
            initial_kelvin: 320.0,
            ..ThermalParameters::default()
        };
        let ambient = params.ambient_kelvin;
        let mut component = SimpleThermalComponent::new(params);
        run(&mut component, 30);

        let t = component.temperature().0;
        assert!(t < 320.0);
        assert!(t > ambient);
        assert_eq!(component.heater_status(), HeaterState::Off);
    }

    #[test]
    fn stays_at_ambient_when_idle() {
        let mut component = SimpleThermalComponent::new(ThermalParameters::default());
        run(&mut component, 5);
        assert!((component.temperature().0 - 288.15).abs() < 1e-9);
    }

    #[test]
    fn tick_follows_coil_and_publishes() {
        let bank = RegisterBank::new();
        let registers = RegisterMapping::default();
        let mut component = SimpleThermalComponent::new(ThermalParameters::default());

        tick(&mut component, &bank, &registers, 0.1);
        assert_eq!(bank.holding_register(registers.temperature_address), 28815);
        assert_eq!(bank.holding_register(registers.heater_state_address), 0);

        bank.write_coil(registers.heater_coil_address, true);
        tick(&mut component, &bank, &registers, 1.0);
        assert_eq!(bank.holding_register(registers.heater_state_address), 100);
        // 2000 W into 1000 J/K for one second
        assert_eq!(bank.holding_register(registers.temperature_address), 29015);
    }
}
