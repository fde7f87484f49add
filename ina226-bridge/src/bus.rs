//! Register bus access to the peripheral.
//!
//! [`RegisterBus`] is the seam the protocol engine talks through: one 16-bit
//! value at an 8-bit register pointer on an addressed device. With the `i2c`
//! feature, [`I2cRegisterBus`] implements it over any
//! [`embedded_hal::i2c::I2c`].

use crate::registers as reg;

/// Synchronous 16-bit register access on an addressed peripheral.
pub trait RegisterBus {
    /// Error type for a failed transaction.
    type Error;

    /// Read the register at `register` on the device at `address`.
    fn read_register(&mut self, address: u8, register: u8) -> Result<u16, Self::Error>;

    /// Write `value` to the register at `register` on the device at `address`.
    fn write_register(&mut self, address: u8, register: u8, value: u16) -> Result<(), Self::Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    type Error = B::Error;

    fn read_register(&mut self, address: u8, register: u8) -> Result<u16, Self::Error> {
        (**self).read_register(address, register)
    }

    fn write_register(&mut self, address: u8, register: u8, value: u16) -> Result<(), Self::Error> {
        (**self).write_register(address, register, value)
    }
}

/// Outcome of [`verify_identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Identity {
    /// Manufacturer and die ID match an INA226.
    Ina226,
    /// Something else answered at the address.
    Unknown { manufacturer: u16, die: u16 },
}

/// Read the manufacturer and die ID registers and check them against the
/// INA226 values.
pub fn verify_identity<B: RegisterBus>(bus: &mut B, address: u8) -> Result<Identity, B::Error> {
    let manufacturer = bus.read_register(address, reg::MANUFACTURER_ID)?;
    let die = bus.read_register(address, reg::DIE_ID)?;

    if manufacturer == reg::MANUFACTURER_ID_TI && die == reg::DIE_ID_INA226 {
        Ok(Identity::Ina226)
    } else {
        log::warn!(
            "unexpected device at {:#04x}: manufacturer {:#06x}, die {:#06x}",
            address,
            manufacturer,
            die
        );
        Ok(Identity::Unknown { manufacturer, die })
    }
}

#[cfg(feature = "i2c")]
pub use self::i2c::I2cRegisterBus;

#[cfg(feature = "i2c")]
mod i2c {
    use embedded_hal::i2c::I2c;

    use super::RegisterBus;

    /// [`RegisterBus`] over an `embedded-hal` I2C master.
    ///
    /// Reads write the register pointer and read two bytes in one
    /// repeated-start transaction; writes send pointer, MSB, LSB.
    pub struct I2cRegisterBus<I2C> {
        i2c: I2C,
    }

    impl<I2C: I2c> I2cRegisterBus<I2C> {
        pub fn new(i2c: I2C) -> Self {
            Self { i2c }
        }

        /// Release the underlying I2C peripheral.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    impl<I2C: I2c> RegisterBus for I2cRegisterBus<I2C> {
        type Error = I2C::Error;

        fn read_register(&mut self, address: u8, register: u8) -> Result<u16, Self::Error> {
            let mut val_buf = [0u8; 2];
            self.i2c.write_read(address, &[register], &mut val_buf)?;
            Ok(u16::from_be_bytes(val_buf))
        }

        fn write_register(&mut self, address: u8, register: u8, value: u16) -> Result<(), Self::Error> {
            let [msb, lsb] = value.to_be_bytes();
            self.i2c.write(address, &[register, msb, lsb])
        }
    }
}
