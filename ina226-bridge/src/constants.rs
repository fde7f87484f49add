/// Acknowledgment byte sent before each host-paced protocol step.
pub const ACK: u8 = 0xFF;

/// Default 7-bit I2C address of the INA226 (A0 = A1 = GND).
pub const DEFAULT_PERIPHERAL_ADDRESS: u8 = 0x40;

/// Number of slots in the inbound byte ring (usable capacity is one less).
pub const RX_RING_SIZE: usize = 2048;

/// Number of 16-bit slots in each of the two sample buffers.
pub const SAMPLE_BUFFER_LEN: usize = 2048;
