//! Host side of the bridge protocol.
//!
//! [`BridgeClient`] drives a bridge over any byte link (serial port, BLE
//! characteristic pair, test loopback) and checks every ack byte, so a
//! desynchronised link shows up as [`ClientError::BadAck`] instead of
//! garbage register values.
//!
//! ```ignore
//! let mut client = BridgeClient::connect(link, 0x40)?;
//! client.write_register(registers::CONFIG, cfg.bits())?;
//!
//! let mut samples = [Sample::default(); 256];
//! client.read_samples(&mut samples)?;
//! ```

use crate::protocol::{
    Sample, ACK, OP_GET_BUFFER_LEN, OP_READ_REGISTER, OP_SET_ADDRESS, OP_WRITE_REGISTER,
};

/// Blocking byte link to a bridge.
pub trait Link {
    /// Error type for link I/O.
    type Error;

    /// Write all of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<L: Link + ?Sized> Link for &mut L {
    type Error = L::Error;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(bytes)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_exact(buf)
    }
}

/// Host-side protocol failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError<E> {
    #[error("link I/O failed: {0:?}")]
    Link(E),
    #[error("expected ack byte 0xff, got {0:#04x}")]
    BadAck(u8),
    #[error("a stream request is already outstanding")]
    StreamPending,
    #[error("no stream request is outstanding")]
    NoStreamPending,
}

/// Protocol client for one bridge.
pub struct BridgeClient<L> {
    link: L,
    max_stream_len: u16,
    /// Slots requested by an outstanding stream command.
    pending: Option<u16>,
}

impl<L: Link> BridgeClient<L> {
    /// Select `address` on the bridge and fetch its stream buffer length.
    pub fn connect(link: L, address: u8) -> Result<Self, ClientError<L::Error>> {
        let mut client = Self {
            link,
            max_stream_len: 0,
            pending: None,
        };
        client.set_address(address)?;
        client.max_stream_len = client.buffer_len()?;
        log::debug!("bridge stream buffer holds {} slots", client.max_stream_len);
        Ok(client)
    }

    /// Largest stream request the bridge accepts, in 16-bit slots.
    pub fn max_stream_len(&self) -> u16 {
        self.max_stream_len
    }

    /// Release the underlying link.
    pub fn release(self) -> L {
        self.link
    }

    /// Change the peripheral address used for subsequent commands.
    pub fn set_address(&mut self, address: u8) -> Result<(), ClientError<L::Error>> {
        self.command(OP_SET_ADDRESS)?;
        self.write(&[address])
    }

    /// Ask the bridge for its stream buffer length.
    pub fn buffer_len(&mut self) -> Result<u16, ClientError<L::Error>> {
        self.command(OP_GET_BUFFER_LEN)?;
        self.read_word()
    }

    pub fn read_register(&mut self, register: u8) -> Result<u16, ClientError<L::Error>> {
        self.command(OP_READ_REGISTER)?;
        self.write(&(register as u16).to_le_bytes())?;
        self.read_word()
    }

    pub fn write_register(&mut self, register: u8, value: u16) -> Result<(), ClientError<L::Error>> {
        self.command(OP_WRITE_REGISTER)?;
        self.write(&(register as u16).to_le_bytes())?;
        self.expect_ack()?;
        self.write(&value.to_le_bytes())
    }

    /// Send a stream request for `pairs` samples without waiting for the
    /// reply.
    ///
    /// The count is clamped to what the bridge can buffer. Returns the number
    /// of pairs actually requested. The reply must be collected with
    /// [`read_stream()`](Self::read_stream) before any other command.
    pub fn request_stream(&mut self, pairs: usize) -> Result<usize, ClientError<L::Error>> {
        if self.pending.is_some() {
            return Err(ClientError::StreamPending);
        }
        let max_pairs = (self.max_stream_len / 2) as usize;
        let pairs = pairs.min(max_pairs);
        let slots = (pairs * 2) as u16;

        self.write(&slots.to_le_bytes())?;
        self.pending = Some(slots);
        Ok(pairs)
    }

    /// Collect the reply to the outstanding stream request into `out`.
    ///
    /// Returns the number of samples written. Pairs that do not fit in `out`
    /// are read from the link and dropped so the link stays in sync.
    pub fn read_stream(&mut self, out: &mut [Sample]) -> Result<usize, ClientError<L::Error>> {
        let slots = self.pending.take().ok_or(ClientError::NoStreamPending)?;
        let pairs = (slots / 2) as usize;

        let mut wire = [0u8; Sample::WIRE_LEN];
        for i in 0..pairs {
            self.link.read_exact(&mut wire).map_err(ClientError::Link)?;
            if let Some(slot) = out.get_mut(i) {
                *slot = Sample::from_le_bytes(wire);
            }
        }
        if pairs > out.len() {
            log::warn!("dropped {} samples that did not fit", pairs - out.len());
        }
        Ok(pairs.min(out.len()))
    }

    /// Request and read up to `out.len()` samples in one exchange.
    pub fn read_samples(&mut self, out: &mut [Sample]) -> Result<usize, ClientError<L::Error>> {
        self.request_stream(out.len())?;
        self.read_stream(out)
    }

    fn command(&mut self, opcode: u16) -> Result<(), ClientError<L::Error>> {
        if self.pending.is_some() {
            return Err(ClientError::StreamPending);
        }
        self.write(&opcode.to_le_bytes())?;
        self.expect_ack()
    }

    fn expect_ack(&mut self) -> Result<(), ClientError<L::Error>> {
        let mut ack = [0u8; 1];
        self.link.read_exact(&mut ack).map_err(ClientError::Link)?;
        if ack[0] == ACK {
            Ok(())
        } else {
            Err(ClientError::BadAck(ack[0]))
        }
    }

    fn read_word(&mut self) -> Result<u16, ClientError<L::Error>> {
        let mut word = [0u8; 2];
        self.link.read_exact(&mut word).map_err(ClientError::Link)?;
        Ok(u16::from_le_bytes(word))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ClientError<L::Error>> {
        self.link.write_all(bytes).map_err(ClientError::Link)
    }
}
