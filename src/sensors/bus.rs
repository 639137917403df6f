//! Register access over an `embedded_hal` I²C bus.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::error::{Error, Result};

fn map_bus_error<E: embedded_hal::i2c::Error>(e: E) -> Error {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => Error::NotFound,
        kind => {
            log::debug!("i2c: {:?}", kind);
            Error::Internal
        }
    }
}

/// One device on an I²C bus.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> RegisterBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8> {
        let mut value = [0u8];
        self.read_regs(reg, &mut value)?;
        Ok(value[0])
    }

    /// Burst read starting at `reg`.  The caller sets any auto-increment
    /// bit the chip needs.
    pub fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c
            .write_read(self.address, &[reg], buf)
            .map_err(map_bus_error)
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(map_bus_error)
    }

    /// Read-modify-write of the bits in `mask`.
    pub fn modify_reg(&mut self, reg: u8, mask: u8, value: u8) -> Result<()> {
        let current = self.read_reg(reg)?;
        self.write_reg(reg, (current & !mask) | (value & mask))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockI2c;
    use super::*;

    #[test]
    fn modify_touches_only_masked_bits() {
        let mut i2c = MockI2c::new(0x19);
        i2c.regs[0x20] = 0b1010_0111;
        let mut bus = RegisterBus::new(i2c, 0x19);
        bus.modify_reg(0x20, 0xF0, 0x50).unwrap();
        assert_eq!(bus.read_reg(0x20), Ok(0b0101_0111));
    }

    #[test]
    fn nack_maps_to_not_found() {
        let bus_dev = MockI2c::new(0x19);
        let mut bus = RegisterBus::new(bus_dev, 0x18);
        assert_eq!(bus.read_reg(0x0F), Err(Error::NotFound));
    }

    #[test]
    fn other_bus_errors_are_internal() {
        let mut dev = MockI2c::new(0x19);
        dev.fail = Some(ErrorKind::Bus);
        let mut bus = RegisterBus::new(dev, 0x19);
        assert_eq!(bus.write_reg(0x20, 0), Err(Error::Internal));
    }
}
