//! Host client talking to a bridge engine over a real ring on two threads.
//!
//! ```text
//! BridgeClient ──write_all──► Producer ═ ByteRing ═ Consumer ──► ProtocolEngine ──► SimIna226
//!      ▲                                                               │
//!      └──────────────read_exact────── mpsc channel ◄──────send────────┘
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvError, SendError, Sender};
use std::thread;

use ina226_bridge::bus::RegisterBus;
use ina226_bridge::client::{BridgeClient, Link};
use ina226_bridge::engine::{EngineError, ProtocolEngine};
use ina226_bridge::protocol::{Command, Sample};
use ina226_bridge::registers::{self as reg, Averaging, ConfigRegister, ConversionTime, Mode};
use ina226_bridge::ring::{ByteRing, Producer};
use ina226_bridge::transport::Transport;

const RING: usize = 256;

// ── Simulated INA226 ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nack;

/// Answers at 0x40 only. CURRENT counts up on every read, BUS_VOLTAGE is a
/// steady 12 V, and in triggered modes CVRF sets on the second MASK_ENABLE
/// poll after each CONFIG write.
struct SimIna226 {
    regs: [u16; 256],
    next_current: u16,
    polls_until_ready: u32,
    config_writes: usize,
    mask_reads: usize,
}

impl SimIna226 {
    const ADDRESS: u8 = 0x40;

    fn new() -> Self {
        let mut regs = [0; 256];
        regs[reg::CONFIG as usize] = reg::CONFIG_DEFAULT;
        regs[reg::BUS_VOLTAGE as usize] = 0x2580;
        regs[reg::MANUFACTURER_ID as usize] = reg::MANUFACTURER_ID_TI;
        regs[reg::DIE_ID as usize] = reg::DIE_ID_INA226;
        Self {
            regs,
            next_current: 1,
            polls_until_ready: 0,
            config_writes: 0,
            mask_reads: 0,
        }
    }
}

impl RegisterBus for SimIna226 {
    type Error = Nack;

    fn read_register(&mut self, address: u8, register: u8) -> Result<u16, Nack> {
        if address != Self::ADDRESS {
            return Err(Nack);
        }
        Ok(match register {
            reg::CURRENT => {
                self.next_current += 1;
                self.next_current - 1
            }
            reg::MASK_ENABLE => {
                self.mask_reads += 1;
                self.polls_until_ready = self.polls_until_ready.saturating_sub(1);
                if self.polls_until_ready == 0 {
                    reg::CVRF
                } else {
                    0
                }
            }
            r => self.regs[r as usize],
        })
    }

    fn write_register(&mut self, address: u8, register: u8, value: u16) -> Result<(), Nack> {
        if address != Self::ADDRESS {
            return Err(Nack);
        }
        self.regs[register as usize] = value;
        if register == reg::CONFIG {
            self.config_writes += 1;
            if Mode::from_bits(value as u8).is_triggered() {
                self.polls_until_ready = 2;
            }
        }
        Ok(())
    }
}

// ── Link plumbing ─────────────────────────────────────────────────────

struct ChannelTransport(Sender<Vec<u8>>);

impl Transport for ChannelTransport {
    type Error = SendError<Vec<u8>>;

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.send(bytes.to_vec())
    }
}

struct RingLink<'a> {
    tx: Producer<'a, RING>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl Link for RingLink<'_> {
    type Error = RecvError;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), RecvError> {
        for &byte in bytes {
            self.tx.push_blocking(byte);
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), RecvError> {
        for slot in buf.iter_mut() {
            while self.pending.is_empty() {
                self.pending.extend(self.rx.recv()?);
            }
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(())
    }
}

type Outcome = Result<Command, EngineError<SimIna226, ChannelTransport>>;

/// What the bridge thread saw once the host was done.
struct Report {
    outcomes: Vec<Outcome>,
    sim: SimIna226,
    active_buffer: usize,
}

/// Raises the flag when the host side returns or unwinds.
struct RaiseOnDrop<'a>(&'a AtomicBool);

impl Drop for RaiseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Run `commands` engine polls on a bridge thread while `host` drives the
/// client on this one.
///
/// If the host stops early (a failed assertion, or fewer commands than
/// expected) the bridge thread panics instead of waiting forever.
fn session(commands: usize, host: impl FnOnce(&mut BridgeClient<RingLink<'_>>)) -> Report {
    let mut ring = ByteRing::<RING>::new();
    let (producer, consumer) = ring.split();
    let (reply_tx, reply_rx) = mpsc::channel();
    let mut engine = ProtocolEngine::new(consumer, SimIna226::new(), ChannelTransport(reply_tx));
    let host_done = AtomicBool::new(false);

    thread::scope(|s| {
        let host_done = &host_done;
        let bridge = s.spawn(move || {
            let outcomes: Vec<Outcome> = (0..commands)
                .map(|n| {
                    // One more look at the ring after the flag goes up, for
                    // bytes pushed just before it
                    let mut last_look = false;
                    engine.poll_with(|| {
                        if host_done.load(Ordering::Acquire) {
                            assert!(!last_look, "host stopped before command {n} completed");
                            last_look = true;
                        }
                        thread::yield_now();
                    })
                })
                .collect();
            Report {
                outcomes,
                active_buffer: engine.active_buffer(),
                sim: engine.release().0,
            }
        });

        {
            let _done = RaiseOnDrop(host_done);
            let link = RingLink {
                tx: producer,
                rx: reply_rx,
                pending: VecDeque::new(),
            };
            let mut client = BridgeClient::connect(link, SimIna226::ADDRESS).unwrap();
            host(&mut client);
        }

        bridge.join().unwrap()
    })
}

// ── Scenarios ─────────────────────────────────────────────────────────

#[test]
fn address_change_does_not_affect_buffer_len() {
    let report = session(4, |client| {
        client.set_address(0x41).unwrap();
        assert_eq!(client.buffer_len().unwrap(), 2048);
    });
    assert_eq!(
        report.outcomes,
        vec![
            Ok(Command::SetAddress),
            Ok(Command::GetBufferLen),
            Ok(Command::SetAddress),
            Ok(Command::GetBufferLen),
        ]
    );
}

#[test]
fn read_register_returns_device_value() {
    let report = session(4, |client| {
        assert_eq!(client.read_register(reg::MANUFACTURER_ID).unwrap(), 0x5449);
        assert_eq!(client.read_register(reg::DIE_ID).unwrap(), 0x2260);
    });
    assert!(report.outcomes.iter().all(Result::is_ok));
}

#[test]
fn continuous_stream_reads_without_arming() {
    let report = session(4, |client| {
        let cfg = ConfigRegister {
            averaging: Averaging::X4,
            bus_conversion: ConversionTime::Us1100,
            shunt_conversion: ConversionTime::Us1100,
            mode: Mode::ShuntAndBusContinuous,
        };
        client.write_register(reg::CONFIG, cfg.bits()).unwrap();

        let mut samples = [Sample::default(); 8];
        assert_eq!(client.read_samples(&mut samples).unwrap(), 8);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.current, 1 + i as u16);
            assert_eq!(s.bus_voltage, 0x2580);
        }
    });
    assert_eq!(report.outcomes[3], Ok(Command::Stream(16)));
    assert_eq!(report.sim.config_writes, 1);
    assert_eq!(report.sim.mask_reads, 0);
}

#[test]
fn triggered_stream_arms_every_pair() {
    let report = session(4, |client| {
        client.write_register(reg::CONFIG, 0x4123).unwrap();

        let mut samples = [Sample::default(); 2];
        assert_eq!(client.read_samples(&mut samples).unwrap(), 2);
        assert_eq!(samples[0].current, 1);
        assert_eq!(samples[1].current, 2);
    });
    assert_eq!(report.outcomes[3], Ok(Command::Stream(4)));
    // one host write, then one arming write per pair
    assert_eq!(report.sim.config_writes, 3);
    assert_eq!(report.sim.mask_reads, 4);
    assert_eq!(report.sim.regs[reg::CONFIG as usize], 0x4123);
}

#[test]
fn bus_fault_keeps_host_in_sync() {
    let report = session(6, |client| {
        client.set_address(0x41).unwrap();
        // Nobody answers at 0x41, but the reply still arrives
        assert_eq!(client.read_register(reg::CONFIG).unwrap(), 0);
        client.set_address(0x40).unwrap();
        assert_eq!(client.read_register(reg::CONFIG).unwrap(), reg::CONFIG_DEFAULT);
    });
    assert!(matches!(report.outcomes[3], Err(ina226_bridge::Error::Bus(Nack))));
    assert_eq!(report.outcomes[5], Ok(Command::ReadRegister));
}

#[test]
fn back_to_back_streams_flip_buffers() {
    let report = session(5, |client| {
        let mut samples = [Sample::default(); 3];
        for round in 0..3u16 {
            assert_eq!(client.read_samples(&mut samples).unwrap(), 3);
            assert_eq!(samples[0].current, 1 + round * 3);
            assert_eq!(samples[2].current, 3 + round * 3);
        }
    });
    assert!(report.outcomes[2..].iter().all(|o| *o == Ok(Command::Stream(6))));
    // 0 -> 1 -> 0 -> 1 after three streams
    assert_eq!(report.active_buffer, 1);
}

#[test]
fn register_commands_leave_buffer_selector() {
    let report = session(5, |client| {
        let mut samples = [Sample::default(); 2];
        client.read_samples(&mut samples).unwrap();
        client.read_register(reg::BUS_VOLTAGE).unwrap();
        client.buffer_len().unwrap();
    });
    assert_eq!(report.active_buffer, 1);
}
