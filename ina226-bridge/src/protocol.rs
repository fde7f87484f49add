//! Wire format shared by the bridge firmware and host clients.
//!
//! Every transaction starts with one little-endian 16-bit word. The four
//! values at the top of the range are opcodes; anything else is a stream
//! request whose value is the number of 16-bit sample slots to return.
//!
//! ```text
//! READ_REGISTER   host: F0 FF            bridge: FF
//!                 host: <index:2>        bridge: <value:2>
//! WRITE_REGISTER  host: F1 FF            bridge: FF
//!                 host: <index:2>        bridge: FF
//!                 host: <value:2>
//! SET_ADDRESS     host: F2 FF            bridge: FF
//!                 host: <address:1>
//! GET_BUFFER_LEN  host: F3 FF            bridge: FF <len:2>
//! stream          host: <len:2>          bridge: <current:2 voltage:2> × len/2
//! ```

pub use crate::constants::ACK;

pub const OP_READ_REGISTER: u16 = 0xFFF0;
pub const OP_WRITE_REGISTER: u16 = 0xFFF1;
pub const OP_SET_ADDRESS: u16 = 0xFFF2;
pub const OP_GET_BUFFER_LEN: u16 = 0xFFF3;

/// A decoded leading word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    ReadRegister,
    WriteRegister,
    SetAddress,
    GetBufferLen,
    /// Stream request for this many 16-bit slots (half as many sample pairs).
    Stream(u16),
}

impl Command {
    pub const fn decode(word: u16) -> Self {
        match word {
            OP_READ_REGISTER => Command::ReadRegister,
            OP_WRITE_REGISTER => Command::WriteRegister,
            OP_SET_ADDRESS => Command::SetAddress,
            OP_GET_BUFFER_LEN => Command::GetBufferLen,
            len => Command::Stream(len),
        }
    }

    /// The leading word that selects this command.
    pub const fn word(self) -> u16 {
        match self {
            Command::ReadRegister => OP_READ_REGISTER,
            Command::WriteRegister => OP_WRITE_REGISTER,
            Command::SetAddress => OP_SET_ADDRESS,
            Command::GetBufferLen => OP_GET_BUFFER_LEN,
            Command::Stream(len) => len,
        }
    }

    /// Whether the bridge answers this command with an ack byte first.
    pub const fn is_acked(self) -> bool {
        !matches!(self, Command::Stream(_))
    }
}

/// One (current, bus voltage) pair as read from the peripheral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Raw CURRENT register (two's complement).
    pub current: u16,
    /// Raw BUS_VOLTAGE register.
    pub bus_voltage: u16,
}

impl Sample {
    /// Wire size of one pair in bytes.
    pub const WIRE_LEN: usize = 4;

    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Sample {
            current: u16::from_le_bytes([bytes[0], bytes[1]]),
            bus_voltage: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Number of reply bytes for a stream request of `slots` 16-bit slots.
pub const fn stream_reply_len(slots: u16) -> usize {
    slots as usize * 2
}
