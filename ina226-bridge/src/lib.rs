//! # ina226-bridge
//!
//! A `no_std`, allocation-free bridge that exposes an INA226 power monitor
//! (or any 16-bit register peripheral) over a byte-stream link such as a BLE
//! UART service or a plain serial port. A host can read and write registers
//! one handshake at a time, or request blocks of (current, bus voltage)
//! samples in free-running or triggered acquisition.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Buffer | [`ring`] | Lock-free SPSC byte ring between RX context and command loop |
//! | Device | [`registers`] / [`bus`] | INA226 register map, `RegisterBus` seam, I²C adapter |
//! | Link | [`transport`] / [`protocol`] | Outbound send seam, opcodes and wire layout |
//! | Core | [`engine`] | Command decode, register access, double-buffered streaming |
//! | Host | [`client`] / [`calibration`] | Protocol client, raw-to-SI conversions |
//!
//! ## Data flow
//!
//! ```text
//! link RX ──push──► ByteRing ──pop──► ProtocolEngine ──► RegisterBus (I²C)
//!                                          │
//!                                          └──send──► Transport (link TX)
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use ina226_bridge::bus::I2cRegisterBus;
//! use ina226_bridge::engine::ProtocolEngine;
//! use ina226_bridge::ring::RxRing;
//!
//! let ring: &'static mut RxRing = cortex_m::singleton!(: RxRing = RxRing::new()).unwrap();
//! let (producer, consumer) = ring.split();
//!
//! // Hand `producer` to the UART / BLE RX interrupt:
//! //     producer.push_blocking(byte);
//!
//! let mut engine = ProtocolEngine::new(consumer, I2cRegisterBus::new(i2c), uart_tx);
//! engine.run();
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `i2c` | yes | [`bus::I2cRegisterBus`] (requires `embedded-hal`) |
//! | `defmt` | no | `defmt::Format` on public types |

#![no_std]

#[cfg(test)]
extern crate std;

pub mod constants;
pub mod registers;
pub mod ring;
pub mod bus;
pub mod transport;
pub mod protocol;
pub mod engine;
pub mod calibration;
pub mod client;

pub use engine::{EngineConfig, Error, ProtocolEngine};
pub use ring::{ByteRing, RxRing};
