use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_modbus::Exception;

/// Sparse register storage. Cells that were never written read as zero/false.
#[derive(Debug, Default)]
struct Cells {
    holding_registers: HashMap<u16, u16>,
    input_registers: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
}

/// Register space shared between the Modbus service and the simulation.
///
/// Cloning is cheap and every clone sees the same cells.
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    cells: Arc<Mutex<Cells>>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Cells> {
        // cells hold plain values, a panic mid-update can't leave them torn
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read_holding_registers(&self, addr: u16, count: u16) -> Result<Vec<u16>, Exception> {
        let cells = self.lock();
        read_range(&cells.holding_registers, addr, count, 0)
    }

    pub fn read_input_registers(&self, addr: u16, count: u16) -> Result<Vec<u16>, Exception> {
        let cells = self.lock();
        read_range(&cells.input_registers, addr, count, 0)
    }

    pub fn read_coils(&self, addr: u16, count: u16) -> Result<Vec<bool>, Exception> {
        let cells = self.lock();
        read_range(&cells.coils, addr, count, false)
    }

    pub fn holding_register(&self, addr: u16) -> u16 {
        self.lock().holding_registers.get(&addr).copied().unwrap_or(0)
    }

    pub fn coil(&self, addr: u16) -> bool {
        self.lock().coils.get(&addr).copied().unwrap_or(false)
    }

    pub fn write_holding_register(&self, addr: u16, value: u16) {
        self.lock().holding_registers.insert(addr, value);
    }

    pub fn write_holding_registers(&self, addr: u16, values: &[u16]) -> Result<(), Exception> {
        let mut cells = self.lock();
        write_range(&mut cells.holding_registers, addr, values)
    }

    #[cfg(test)]
    pub fn write_input_register(&self, addr: u16, value: u16) {
        self.lock().input_registers.insert(addr, value);
    }

    pub fn write_coil(&self, addr: u16, value: bool) {
        self.lock().coils.insert(addr, value);
    }

    pub fn write_coils(&self, addr: u16, values: &[bool]) -> Result<(), Exception> {
        let mut cells = self.lock();
        write_range(&mut cells.coils, addr, values)
    }

    /// Runs `f` with the holding registers and coils locked together, so a
    /// simulation tick publishes a consistent snapshot.
    pub fn update<R>(&self, f: impl FnOnce(&mut BankView<'_>) -> R) -> R {
        let mut cells = self.lock();
        f(&mut BankView { cells: &mut cells })
    }
}

/// Locked access handed out by [`RegisterBank::update`].
pub struct BankView<'a> {
    cells: &'a mut Cells,
}

impl BankView<'_> {
    pub fn coil(&self, addr: u16) -> bool {
        self.cells.coils.get(&addr).copied().unwrap_or(false)
    }

    pub fn set_holding_register(&mut self, addr: u16, value: u16) {
        self.cells.holding_registers.insert(addr, value);
    }
}

/// The last address of a range must still fit in 16 bits.
fn check_range(addr: u16, count: usize) -> Result<(), Exception> {
    if count == 0 {
        return Ok(());
    }
    let last = usize::from(addr) + count - 1;
    if last > usize::from(u16::MAX) {
        return Err(Exception::IllegalDataAddress);
    }
    Ok(())
}

fn read_range<T: Copy>(
    cells: &HashMap<u16, T>,
    addr: u16,
    count: u16,
    unset: T,
) -> Result<Vec<T>, Exception> {
    check_range(addr, usize::from(count))?;
    Ok((0..count)
        .map(|i| cells.get(&(addr + i)).copied().unwrap_or(unset))
        .collect())
}

fn write_range<T: Copy>(cells: &mut HashMap<u16, T>, addr: u16, values: &[T]) -> Result<(), Exception> {
    check_range(addr, values.len())?;
    for (offset, value) in values.iter().enumerate() {
        cells.insert(addr + offset as u16, *value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_cells_read_as_zero() {
        let bank = RegisterBank::new();
        bank.write_holding_register(11, 7);

        assert_eq!(bank.read_holding_registers(10, 3), Ok(vec![0, 7, 0]));
        assert_eq!(bank.read_input_registers(0, 2), Ok(vec![0, 0]));
        assert_eq!(bank.read_coils(5, 1), Ok(vec![false]));
    }

    #[test]
    fn clones_share_cells() {
        let bank = RegisterBank::new();
        let other = bank.clone();
        other.write_coil(0, true);
        assert!(bank.coil(0));
    }

    #[test]
    fn multi_writes_land_in_order() {
        let bank = RegisterBank::new();
        bank.write_holding_registers(100, &[1, 2, 3]).unwrap();
        bank.write_coils(0, &[true, false, true]).unwrap();

        assert_eq!(bank.read_holding_registers(100, 3), Ok(vec![1, 2, 3]));
        assert_eq!(bank.read_coils(0, 3), Ok(vec![true, false, true]));
    }

    #[test]
    fn ranges_past_the_address_space_are_rejected() {
        let bank = RegisterBank::new();
        assert_eq!(
            bank.read_holding_registers(u16::MAX, 2),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(bank.read_holding_registers(u16::MAX, 1), Ok(vec![0]));
        assert_eq!(
            bank.write_coils(u16::MAX - 1, &[true, true, true]),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(bank.read_coils(u16::MAX, 0), Ok(vec![]));
    }

    #[test]
    fn update_sees_and_publishes_under_one_lock() {
        let bank = RegisterBank::new();
        bank.write_coil(3, true);

        let on = bank.update(|view| {
            let on = view.coil(3);
            view.set_holding_register(40002, if on { 100 } else { 0 });
            on
        });

        assert!(on);
        assert_eq!(bank.holding_register(40002), 100);
    }
}
