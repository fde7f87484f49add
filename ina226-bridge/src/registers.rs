//! INA226 register addresses and bitfield definitions.
//!
//! Register pointers are 8-bit; all registers hold 16-bit values sent
//! big-endian on the I2C bus. Field layouts follow the TI INA226 datasheet.

// ── Register map ───────────────────────────────────────────────────────────

/// Configuration register.
/// - Bit  15  : RST (write 1 to reset)
/// - Bits 11:9: AVG (averaging count)
/// - Bits 8:6 : VBUSCT (bus voltage conversion time)
/// - Bits 5:3 : VSHCT (shunt voltage conversion time)
/// - Bits 2:0 : MODE
pub const CONFIG: u8 = 0x00;

/// Shunt voltage (signed, 2.5 µV/LSB).
pub const SHUNT_VOLTAGE: u8 = 0x01;

/// Bus voltage (unsigned, 1.25 mV/LSB).
pub const BUS_VOLTAGE: u8 = 0x02;

/// Power (25 × current LSB per LSB).
pub const POWER: u8 = 0x03;

/// Current (signed, current LSB per LSB; requires calibration).
pub const CURRENT: u8 = 0x04;

/// Calibration value used to scale current and power.
pub const CALIBRATION: u8 = 0x05;

/// Mask/Enable register: alert configuration and status flags.
/// - Bit 3: CVRF (conversion ready)
pub const MASK_ENABLE: u8 = 0x06;

/// Alert limit compared against the selected alert function.
pub const ALERT_LIMIT: u8 = 0x07;

/// Manufacturer ID (reads [`MANUFACTURER_ID_TI`]).
pub const MANUFACTURER_ID: u8 = 0xFE;

/// Die ID (reads [`DIE_ID_INA226`]).
pub const DIE_ID: u8 = 0xFF;

// ── Identity ───────────────────────────────────────────────────────────────

/// "TI" in ASCII.
pub const MANUFACTURER_ID_TI: u16 = 0x5449;

/// Device ID 0x226, die revision 0.
pub const DIE_ID_INA226: u16 = 0x2260;

// ── Bitfields ──────────────────────────────────────────────────────────────

/// Conversion ready flag in [`MASK_ENABLE`].
pub const CVRF: u16 = 1 << 3;

/// Reset bit in [`CONFIG`].
pub const CONFIG_RST: u16 = 1 << 15;

/// Power-on value of [`CONFIG`]: 1 average, 1.1 ms conversions, shunt and
/// bus continuous.
pub const CONFIG_DEFAULT: u16 = 0x4127;

const MODE_MASK: u16 = 0b111;
const VSHCT_SHIFT: u16 = 3;
const VBUSCT_SHIFT: u16 = 6;
const AVG_SHIFT: u16 = 9;
const FIELD_MASK: u16 = 0b111;

// ── Typed fields ───────────────────────────────────────────────────────────

/// Operating mode (CONFIG bits 2:0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    PowerDown = 0b000,
    ShuntTriggered = 0b001,
    BusTriggered = 0b010,
    ShuntAndBusTriggered = 0b011,
    Shutdown = 0b100,
    ShuntContinuous = 0b101,
    BusContinuous = 0b110,
    ShuntAndBusContinuous = 0b111,
}

impl Mode {
    /// Decode the low three bits of `bits`.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Mode::PowerDown,
            0b001 => Mode::ShuntTriggered,
            0b010 => Mode::BusTriggered,
            0b011 => Mode::ShuntAndBusTriggered,
            0b100 => Mode::Shutdown,
            0b101 => Mode::ShuntContinuous,
            0b110 => Mode::BusContinuous,
            _ => Mode::ShuntAndBusContinuous,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// One-shot mode: each sample needs a CONFIG write to start a
    /// conversion and a CVRF poll before the result is valid.
    ///
    /// Power-down and every continuous mode report `false`.
    pub const fn is_triggered(self) -> bool {
        let bits = self as u8;
        bits & 0b100 == 0 && bits != 0
    }
}

/// Samples averaged per result (CONFIG bits 11:9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    X1 = 0b000,
    X4 = 0b001,
    X16 = 0b010,
    X64 = 0b011,
    X128 = 0b100,
    X256 = 0b101,
    X512 = 0b110,
    X1024 = 0b111,
}

impl Averaging {
    pub const ALL: [Averaging; 8] = [
        Averaging::X1,
        Averaging::X4,
        Averaging::X16,
        Averaging::X64,
        Averaging::X128,
        Averaging::X256,
        Averaging::X512,
        Averaging::X1024,
    ];

    pub const fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & FIELD_MASK) as usize]
    }

    /// Number of samples averaged.
    pub const fn count(self) -> u16 {
        match self {
            Averaging::X1 => 1,
            Averaging::X4 => 4,
            Averaging::X16 => 16,
            Averaging::X64 => 64,
            Averaging::X128 => 128,
            Averaging::X256 => 256,
            Averaging::X512 => 512,
            Averaging::X1024 => 1024,
        }
    }
}

/// Per-channel ADC conversion time (VBUSCT / VSHCT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionTime {
    Us140 = 0b000,
    Us204 = 0b001,
    Us332 = 0b010,
    Us588 = 0b011,
    Us1100 = 0b100,
    Us2116 = 0b101,
    Us4156 = 0b110,
    Us8244 = 0b111,
}

impl ConversionTime {
    pub const ALL: [ConversionTime; 8] = [
        ConversionTime::Us140,
        ConversionTime::Us204,
        ConversionTime::Us332,
        ConversionTime::Us588,
        ConversionTime::Us1100,
        ConversionTime::Us2116,
        ConversionTime::Us4156,
        ConversionTime::Us8244,
    ];

    pub const fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & FIELD_MASK) as usize]
    }

    /// Conversion time in microseconds.
    pub const fn micros(self) -> u32 {
        match self {
            ConversionTime::Us140 => 140,
            ConversionTime::Us204 => 204,
            ConversionTime::Us332 => 332,
            ConversionTime::Us588 => 588,
            ConversionTime::Us1100 => 1100,
            ConversionTime::Us2116 => 2116,
            ConversionTime::Us4156 => 4156,
            ConversionTime::Us8244 => 8244,
        }
    }
}

/// Decoded CONFIG register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigRegister {
    pub averaging: Averaging,
    pub bus_conversion: ConversionTime,
    pub shunt_conversion: ConversionTime,
    pub mode: Mode,
}

impl ConfigRegister {
    /// Pack into the 16-bit register value. The reset bit is left clear.
    pub const fn bits(&self) -> u16 {
        (self.mode as u16)
            | ((self.shunt_conversion as u16) << VSHCT_SHIFT)
            | ((self.bus_conversion as u16) << VBUSCT_SHIFT)
            | ((self.averaging as u16) << AVG_SHIFT)
    }

    /// Unpack a register value. Reserved bits and RST are ignored.
    pub const fn from_bits(bits: u16) -> Self {
        ConfigRegister {
            averaging: Averaging::from_bits(bits >> AVG_SHIFT),
            bus_conversion: ConversionTime::from_bits(bits >> VBUSCT_SHIFT),
            shunt_conversion: ConversionTime::from_bits(bits >> VSHCT_SHIFT),
            mode: Mode::from_bits((bits & MODE_MASK) as u8),
        }
    }

    /// Pick the conversion time and averaging whose product best matches
    /// `interval_ms`, with both channels using the same conversion time.
    ///
    /// Used to pace the peripheral so a new result is ready roughly once per
    /// host read.
    pub fn for_sample_interval(interval_ms: f32, mode: Mode) -> Self {
        let mut best = (ConversionTime::Us140, Averaging::X1);
        let mut best_diff = f32::INFINITY;

        for conversion in ConversionTime::ALL {
            for averaging in Averaging::ALL {
                let product = conversion.micros() as f32 / 1000.0 * averaging.count() as f32;
                let diff = libm::fabsf(interval_ms - product);
                if diff < best_diff {
                    best_diff = diff;
                    best = (conversion, averaging);
                }
            }
        }

        ConfigRegister {
            averaging: best.1,
            bus_conversion: best.0,
            shunt_conversion: best.0,
            mode,
        }
    }
}

impl Default for ConfigRegister {
    fn default() -> Self {
        Self::from_bits(CONFIG_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggered_modes() {
        let triggered: [bool; 8] = core::array::from_fn(|b| Mode::from_bits(b as u8).is_triggered());
        assert_eq!(
            triggered,
            [false, true, true, true, false, false, false, false]
        );
    }

    #[test]
    fn mode_ignores_high_bits() {
        assert_eq!(Mode::from_bits(0xFB), Mode::ShuntAndBusTriggered);
        assert_eq!(Mode::ShuntAndBusTriggered.bits(), 0b011);
    }

    #[test]
    fn default_config_decodes() {
        let cfg = ConfigRegister::default();
        assert_eq!(cfg.averaging, Averaging::X1);
        assert_eq!(cfg.bus_conversion, ConversionTime::Us1100);
        assert_eq!(cfg.shunt_conversion, ConversionTime::Us1100);
        assert_eq!(cfg.mode, Mode::ShuntAndBusContinuous);
        // Bit 14 is a read-only reserved bit, not part of the packed fields
        assert_eq!(cfg.bits(), CONFIG_DEFAULT & !(1 << 14));
    }

    #[test]
    fn pack_places_fields() {
        let cfg = ConfigRegister {
            averaging: Averaging::X16,
            bus_conversion: ConversionTime::Us588,
            shunt_conversion: ConversionTime::Us204,
            mode: Mode::ShuntAndBusTriggered,
        };
        assert_eq!(cfg.bits(), 0b011 | (0b001 << 3) | (0b011 << 6) | (0b010 << 9));
        assert_eq!(ConfigRegister::from_bits(cfg.bits() | CONFIG_RST), cfg);
    }

    #[test]
    fn interval_selection_picks_closest_product() {
        // 1.1 ms × 4 = 4.4 ms is the closest match to 4.4 ms
        let cfg = ConfigRegister::for_sample_interval(4.4, Mode::ShuntAndBusContinuous);
        assert_eq!(cfg.bus_conversion, ConversionTime::Us1100);
        assert_eq!(cfg.averaging, Averaging::X4);
        assert_eq!(cfg.shunt_conversion, cfg.bus_conversion);

        // Anything faster than the shortest conversion clamps to it
        let cfg = ConfigRegister::for_sample_interval(0.01, Mode::ShuntAndBusContinuous);
        assert_eq!(cfg.bus_conversion, ConversionTime::Us140);
        assert_eq!(cfg.averaging, Averaging::X1);
    }
}
