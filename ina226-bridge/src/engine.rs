//! Command loop bridging the byte ring to the register bus.
//!
//! [`ProtocolEngine`] owns the consumer side of the inbound [`ByteRing`],
//! the [`RegisterBus`] and the outbound [`Transport`]. Each call to
//! [`poll()`](ProtocolEngine::poll) decodes one command word and runs the
//! command to completion; nothing is pipelined or interleaved.
//!
//! ## Acquisition
//!
//! A stream request of `len` slots fills `len / 2` (current, bus voltage)
//! pairs into the active sample buffer, sends the whole region as one block,
//! then flips to the other buffer. When the cached CONFIG mode is a
//! triggered one, every pair is preceded by a CONFIG write (starting a
//! one-shot conversion) and a poll of the conversion-ready flag.
//!
//! ## Faults
//!
//! Bus faults never change what goes out on the wire: a failed register read
//! still produces a reply (zero), and a stream with failed reads still sends
//! the full block. A failed ack send does not cut a command short either;
//! its operands are still consumed. The first fault of a command is returned
//! after the reply.
//!
//! [`ByteRing`]: crate::ring::ByteRing

use core::fmt::Debug;

use crate::bus::RegisterBus;
use crate::constants::{ACK, DEFAULT_PERIPHERAL_ADDRESS, SAMPLE_BUFFER_LEN};
use crate::protocol::{Command, Sample};
use crate::registers::{self as reg, Mode};
use crate::ring::Consumer;
use crate::transport::Transport;

/// Command failure. Local to the command that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<B, T> {
    #[error("register bus transaction failed: {0:?}")]
    Bus(B),
    #[error("transport send failed: {0:?}")]
    Transport(T),
    #[error("stream of {requested} slots exceeds the {max}-slot sample buffer")]
    StreamTooLong { requested: u16, max: u16 },
    #[error("stream length {0} is not a whole number of sample pairs")]
    OddStreamLength(u16),
    #[error("conversion not ready after {polls} polls")]
    ConversionTimeout { polls: u32 },
}

/// [`Error`] specialised to an engine's collaborators.
pub type EngineError<B, T> = Error<<B as RegisterBus>::Error, <T as Transport>::Error>;

/// Runtime settings for a [`ProtocolEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Initial 7-bit peripheral address.
    pub address: u8,
    /// Largest stream request accepted, in 16-bit slots. Reported by
    /// GET_BUFFER_LEN and clamped to [`SAMPLE_BUFFER_LEN`].
    pub max_stream_len: u16,
    /// Give up on the conversion-ready flag after this many polls.
    /// `None` polls forever. `Some(0)` skips the poll and reads each pair
    /// straight after arming.
    pub ready_poll_limit: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_PERIPHERAL_ADDRESS,
            max_stream_len: SAMPLE_BUFFER_LEN as u16,
            ready_poll_limit: None,
        }
    }
}

/// Protocol bridge between an inbound byte ring, a register bus and an
/// outbound transport.
///
/// `N` is the size of the inbound ring.
pub struct ProtocolEngine<'a, B, T, const N: usize> {
    rx: Consumer<'a, N>,
    bus: B,
    transport: T,
    address: u8,
    /// Last value written to CONFIG through this engine.
    config_shadow: u16,
    mode: Mode,
    max_stream_len: u16,
    ready_poll_limit: Option<u32>,
    samples: [[u16; SAMPLE_BUFFER_LEN]; 2],
    active: usize,
}

impl<'a, B, T, const N: usize> ProtocolEngine<'a, B, T, N>
where
    B: RegisterBus,
    T: Transport,
{
    /// Create an engine with the default configuration.
    pub fn new(rx: Consumer<'a, N>, bus: B, transport: T) -> Self {
        Self::with_config(rx, bus, transport, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(rx: Consumer<'a, N>, bus: B, transport: T, config: EngineConfig) -> Self {
        Self {
            rx,
            bus,
            transport,
            address: config.address,
            config_shadow: 0,
            mode: Mode::PowerDown,
            max_stream_len: config.max_stream_len.min(SAMPLE_BUFFER_LEN as u16),
            ready_poll_limit: config.ready_poll_limit,
            samples: [[0; SAMPLE_BUFFER_LEN]; 2],
            active: 0,
        }
    }

    /// Current peripheral address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Last value written to CONFIG, `0` if none yet.
    pub fn config_shadow(&self) -> u16 {
        self.config_shadow
    }

    /// Acquisition mode taken from [`config_shadow()`](Self::config_shadow).
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Index (0 or 1) of the sample buffer the next stream will fill.
    pub fn active_buffer(&self) -> usize {
        self.active
    }

    pub fn max_stream_len(&self) -> u16 {
        self.max_stream_len
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the bus and transport.
    pub fn release(self) -> (B, T) {
        (self.bus, self.transport)
    }

    /// Process commands forever. Failed commands are logged and skipped.
    pub fn run(&mut self) -> !
    where
        B::Error: Debug,
        T::Error: Debug,
    {
        loop {
            if let Err(e) = self.poll() {
                log::warn!("command failed: {:?}", e);
            }
        }
    }

    /// Wait for the next command and execute it.
    ///
    /// Blocks on the ring until the command and all its operands have
    /// arrived.
    pub fn poll(&mut self) -> Result<Command, EngineError<B, T>> {
        self.poll_with(core::hint::spin_loop)
    }

    /// Like [`poll()`](Self::poll), calling `idle` whenever the ring runs
    /// dry so the caller can yield or sleep.
    ///
    /// Every operand of the command is consumed even when an ack or a bus
    /// transaction fails, so the next call starts on a command word.
    pub fn poll_with(&mut self, mut idle: impl FnMut()) -> Result<Command, EngineError<B, T>> {
        let command = Command::decode(self.pop_word(&mut idle));
        log::debug!("command {:?}", command);

        let mut fault = None;
        match command {
            Command::ReadRegister => self.read_register(&mut idle, &mut fault),
            Command::WriteRegister => self.write_register(&mut idle, &mut fault),
            Command::SetAddress => {
                self.ack(&mut fault);
                self.address = self.rx.pop_with(&mut idle);
                log::debug!("peripheral address {:#04x}", self.address);
            }
            Command::GetBufferLen => {
                self.ack(&mut fault);
                let len = self.max_stream_len.to_le_bytes();
                self.send(&len, &mut fault);
            }
            Command::Stream(len) => self.stream(len)?,
        }
        fault.map_or(Ok(command), Err)
    }

    fn read_register(&mut self, idle: &mut impl FnMut(), fault: &mut Option<EngineError<B, T>>) {
        self.ack(fault);
        let register = Self::pointer(self.pop_word(idle));

        let value = match self.bus.read_register(self.address, register) {
            Ok(value) => value,
            Err(e) => {
                fault.get_or_insert(Error::Bus(e));
                0
            }
        };
        log::trace!("read {:#04x}:{:#04x} = {:#06x}", self.address, register, value);

        // The host expects two bytes whether or not the bus answered
        self.send(&value.to_le_bytes(), fault);
    }

    fn write_register(&mut self, idle: &mut impl FnMut(), fault: &mut Option<EngineError<B, T>>) {
        self.ack(fault);
        let register = Self::pointer(self.pop_word(idle));
        self.ack(fault);
        let value = self.pop_word(idle);

        log::trace!("write {:#04x}:{:#04x} = {:#06x}", self.address, register, value);
        if let Err(e) = self.bus.write_register(self.address, register, value) {
            fault.get_or_insert(Error::Bus(e));
            return;
        }

        if register == reg::CONFIG {
            self.config_shadow = value;
            self.mode = Mode::from_bits(value as u8);
            log::debug!("acquisition mode {:?}", self.mode);
        }
    }

    fn stream(&mut self, len: u16) -> Result<(), EngineError<B, T>> {
        if len > self.max_stream_len {
            return Err(Error::StreamTooLong {
                requested: len,
                max: self.max_stream_len,
            });
        }
        if len % 2 != 0 {
            return Err(Error::OddStreamLength(len));
        }

        let triggered = self.mode.is_triggered();
        let mut fault = None;
        for i in (0..len as usize).step_by(2) {
            let sample = self.acquire(triggered, &mut fault);
            // Stored little-endian so the buffer is the wire image
            let buffer = &mut self.samples[self.active];
            buffer[i] = sample.current.to_le();
            buffer[i + 1] = sample.bus_voltage.to_le();
        }

        let slots = &self.samples[self.active][..len as usize];
        // SAFETY: `slots` is a live, initialised `[u16]`; viewing it as twice
        // as many `u8`s stays in bounds and `u8` has no alignment requirement.
        let bytes = unsafe { core::slice::from_raw_parts(slots.as_ptr().cast::<u8>(), slots.len() * 2) };
        let sent = self.transport.send(bytes);
        self.active ^= 1;

        sent.map_err(Error::Transport)?;
        fault.map_or(Ok(()), Err)
    }

    /// Read one (current, bus voltage) pair, arming and waiting for a
    /// conversion first in triggered mode. Failed reads yield zero and the
    /// first failure is kept in `fault`.
    fn acquire(&mut self, triggered: bool, fault: &mut Option<EngineError<B, T>>) -> Sample {
        if triggered {
            match self.bus.write_register(self.address, reg::CONFIG, self.config_shadow) {
                Ok(()) => {
                    if let Err(e) = self.wait_conversion_ready() {
                        log::warn!("conversion ready poll failed");
                        fault.get_or_insert(e);
                    }
                }
                Err(e) => {
                    log::warn!("failed to arm conversion");
                    fault.get_or_insert(Error::Bus(e));
                }
            }
        }

        Sample {
            current: self.read_or_zero(reg::CURRENT, fault),
            bus_voltage: self.read_or_zero(reg::BUS_VOLTAGE, fault),
        }
    }

    fn wait_conversion_ready(&mut self) -> Result<(), EngineError<B, T>> {
        if self.ready_poll_limit == Some(0) {
            return Ok(());
        }
        let mut polls: u32 = 0;
        loop {
            let flags = self
                .bus
                .read_register(self.address, reg::MASK_ENABLE)
                .map_err(Error::Bus)?;
            polls = polls.saturating_add(1);

            if flags & reg::CVRF != 0 {
                return Ok(());
            }
            if let Some(limit) = self.ready_poll_limit {
                if polls >= limit {
                    return Err(Error::ConversionTimeout { polls });
                }
            }
            core::hint::spin_loop();
        }
    }

    fn read_or_zero(&mut self, register: u8, fault: &mut Option<EngineError<B, T>>) -> u16 {
        match self.bus.read_register(self.address, register) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("sample read of {:#04x} failed", register);
                fault.get_or_insert(Error::Bus(e));
                0
            }
        }
    }

    fn ack(&mut self, fault: &mut Option<EngineError<B, T>>) {
        self.send(&[ACK], fault);
    }

    /// Send `bytes`, keeping the first failure in `fault`.
    fn send(&mut self, bytes: &[u8], fault: &mut Option<EngineError<B, T>>) {
        if let Err(e) = self.transport.send(bytes) {
            log::warn!("send of {} bytes failed", bytes.len());
            fault.get_or_insert(Error::Transport(e));
        }
    }

    /// Little-endian word, low byte first.
    fn pop_word(&mut self, idle: &mut impl FnMut()) -> u16 {
        let lo = self.rx.pop_with(&mut *idle);
        let hi = self.rx.pop_with(&mut *idle);
        u16::from_le_bytes([lo, hi])
    }

    /// Register pointers are 8 bits wide; the high byte of the index word is
    /// not sent to the peripheral.
    fn pointer(index: u16) -> u8 {
        if index > 0xFF {
            log::warn!("register index {:#06x} truncated to {:#04x}", index, index as u8);
        }
        index as u8
    }
}
