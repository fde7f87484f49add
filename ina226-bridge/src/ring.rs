//! Lock-free single-producer single-consumer byte ring.
//!
//! Decouples the context that receives transport bytes (radio callback, UART
//! ISR) from the cooperative loop that decodes commands. Uses atomic indices
//! and power-of-two masking, so neither side ever takes a lock.
//!
//! # Ownership
//!
//! A [`ByteRing`] exposes no push/pop methods of its own. Calling
//! [`split()`](ByteRing::split) yields exactly one [`Producer`] and one
//! [`Consumer`]; the `&mut` borrow guarantees no second pair exists while
//! those handles are alive. Each handle may move to a different context.
//!
//! ```ignore
//! let ring: &'static mut RxRing = cortex_m::singleton!(: RxRing = RxRing::new()).unwrap();
//!
//! let (producer, consumer) = ring.split();
//! // producer -> transport RX interrupt
//! // consumer -> ProtocolEngine
//! ```

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::RX_RING_SIZE;

/// Inbound ring sized for the bridge firmware.
pub type RxRing = ByteRing<RX_RING_SIZE>;

/// Fixed-capacity byte ring shared between one producer and one consumer.
///
/// The usable capacity is `N - 1`: one slot stays empty so that
/// `head == tail` always means empty and `head + 1 == tail` means full.
///
/// # Type Parameters
///
/// - `N`: Total number of slots. Must be a power of two and at least 2.
pub struct ByteRing<const N: usize> {
    buffer: UnsafeCell<[u8; N]>,
    /// Write position (only advanced by the producer).
    head: AtomicUsize,
    /// Read position (only advanced by the consumer).
    tail: AtomicUsize,
}

// SAFETY: Access to `buffer` only happens through `Producer` and `Consumer`,
// and `split()` hands out at most one of each. The producer writes only the
// slot at `head` when it is free, the consumer reads only the slot at `tail`
// when it is filled, and the release/acquire pairs on the indices order those
// accesses.
unsafe impl<const N: usize> Sync for ByteRing<N> {}

impl<const N: usize> ByteRing<N> {
    const MASK: usize = N - 1;

    /// Create a new empty ring.
    ///
    /// # Panics
    ///
    /// `N` must be a power of two and at least 2. In a `static` this is a
    /// compile-time error.
    pub const fn new() -> Self {
        assert!(N >= 2, "byte ring must have at least 2 slots (1 usable)");
        assert!(N.is_power_of_two(), "byte ring size must be a power of two");

        ByteRing {
            buffer: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of bytes the ring can hold at once (`N - 1`).
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Split the ring into its producer and consumer handles.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring: &Self = self;
        (
            Producer {
                ring,
                _not_sync: PhantomData,
            },
            Consumer {
                ring,
                _not_sync: PhantomData,
            },
        )
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & Self::MASK
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side of a [`ByteRing`]. Owned by the byte-arrival context.
pub struct Producer<'a, const N: usize> {
    ring: &'a ByteRing<N>,
    // Send but not Sync: the handle moves between contexts, it is never shared.
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<const N: usize> Producer<'_, N> {
    /// Enqueue one byte.
    ///
    /// Returns `Err(byte)` if the ring is full. Unread data is never
    /// overwritten; the caller chooses whether to retry or report
    /// backpressure.
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        let ring = self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let next_head = (head + 1) & ByteRing::<N>::MASK;

        if next_head == ring.tail.load(Ordering::Acquire) {
            return Err(byte);
        }

        // SAFETY: We are the sole producer and `head` is only advanced by us.
        // `next_head != tail` guarantees the consumer is not reading this slot.
        unsafe {
            ring.buffer.get().cast::<u8>().add(head).write(byte);
        }

        // Release ordering publishes the byte before the new head.
        ring.head.store(next_head, Ordering::Release);
        Ok(())
    }

    /// Enqueue one byte, spinning until the consumer frees a slot.
    pub fn push_blocking(&mut self, byte: u8) {
        while self.push(byte).is_err() {
            core::hint::spin_loop();
        }
    }

    /// Enqueue as many bytes of `bytes` as fit, in order.
    ///
    /// Returns the number accepted. Bytes past that count were not enqueued
    /// and must be offered again by the caller.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        for (n, &byte) in bytes.iter().enumerate() {
            if self.push(byte).is_err() {
                return n;
            }
        }
        bytes.len()
    }

    /// Number of bytes waiting to be consumed.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if another `push` would currently fail.
    pub fn is_full(&self) -> bool {
        self.len() == N - 1
    }

    pub fn capacity(&self) -> usize {
        N - 1
    }
}

/// Read side of a [`ByteRing`]. Owned by the command loop.
pub struct Consumer<'a, const N: usize> {
    ring: &'a ByteRing<N>,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Dequeue one byte if available.
    pub fn try_pop(&mut self) -> Option<u8> {
        let ring = self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);

        if tail == ring.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: We are the sole consumer and `tail` is only advanced by us.
        // `tail != head` guarantees the producer has published this slot.
        let byte = unsafe { ring.buffer.get().cast::<u8>().add(tail).read() };

        // Release ordering completes the read before the slot is handed back.
        ring.tail.store((tail + 1) & ByteRing::<N>::MASK, Ordering::Release);
        Some(byte)
    }

    /// Dequeue one byte, spinning until one arrives.
    pub fn pop(&mut self) -> u8 {
        self.pop_with(core::hint::spin_loop)
    }

    /// Dequeue one byte, calling `idle` each time the ring is found empty.
    ///
    /// Lets a cooperative runtime yield (or a low-power target `wfi`) instead
    /// of spinning.
    pub fn pop_with(&mut self, mut idle: impl FnMut()) -> u8 {
        loop {
            if let Some(byte) = self.try_pop() {
                return byte;
            }
            idle();
        }
    }

    /// Number of bytes waiting to be consumed.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
