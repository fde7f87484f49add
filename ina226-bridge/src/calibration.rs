//! Current calibration and raw-to-engineering conversions.
//!
//! The INA226 reports current as `shunt_voltage × CAL / 2048`. Choosing the
//! current LSB as `max_current / 2^15` uses the full signed range:
//!
//! ```text
//! current_lsb = max_current / 32768
//! CAL         = 0.00512 / (current_lsb × R_shunt)
//! ```

/// Bus voltage LSB in volts (1.25 mV).
pub const BUS_VOLTAGE_LSB: f32 = 1.25e-3;

/// Shunt voltage LSB in volts (2.5 µV).
pub const SHUNT_VOLTAGE_LSB: f32 = 2.5e-6;

/// Fixed scaling constant from the datasheet's calibration equation.
const CAL_SCALE: f32 = 0.00512;

/// Calibration for one shunt resistor and full-scale current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    current_lsb: f32,
    register: u16,
}

impl Calibration {
    /// Compute the calibration for a shunt of `shunt_ohms` measuring up to
    /// `max_current` amps.
    ///
    /// The CALIBRATION register value is truncated toward zero and saturates
    /// at `u16::MAX` (bit 15 is ignored by the device).
    pub fn new(max_current: f32, shunt_ohms: f32) -> Self {
        let current_lsb = max_current / 32768.0;
        let cal = libm::truncf(CAL_SCALE / (current_lsb * shunt_ohms));
        let register = if cal >= u16::MAX as f32 {
            u16::MAX
        } else if cal > 0.0 {
            cal as u16
        } else {
            0
        };
        Self {
            current_lsb,
            register,
        }
    }

    /// Value to write to the CALIBRATION register.
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Amps per CURRENT LSB.
    pub fn current_lsb(&self) -> f32 {
        self.current_lsb
    }

    /// Watts per POWER LSB (25 × current LSB).
    pub fn power_lsb(&self) -> f32 {
        self.current_lsb * 25.0
    }

    /// Convert a raw CURRENT register value to amps.
    pub fn current(&self, raw: u16) -> f32 {
        raw as i16 as f32 * self.current_lsb
    }

    /// Convert a raw POWER register value to watts.
    pub fn power(&self, raw: u16) -> f32 {
        raw as f32 * self.power_lsb()
    }
}

/// Convert a raw BUS_VOLTAGE register value to volts.
pub fn bus_voltage(raw: u16) -> f32 {
    raw as f32 * BUS_VOLTAGE_LSB
}

/// Convert a raw SHUNT_VOLTAGE register value to volts.
pub fn shunt_voltage(raw: u16) -> f32 {
    raw as i16 as f32 * SHUNT_VOLTAGE_LSB
}
