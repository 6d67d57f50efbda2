//! Sensor sample acquisition: the interrupt-side half of a measurement
//! cycle.
//!
//! A hardware timer triggers a simultaneous four-channel conversion every
//! 100 ms; each channel's completion arrives asynchronously and lands in
//! [`SensorSampler::on_conversion`]. The first N completions per direction
//! fill that direction's buffer; the N+1-th raises the direction's
//! completion flag instead of writing, so every (N+1)-trigger window
//! (500 ms) yields exactly one "cycle complete" signal per direction:
//!
//! ```text
//! 100ms     200ms     300ms     400ms     500ms
//! sample    sample    sample    sample    raise flag; foreground
//!                                         aggregates, then resets
//! ```
//!
//! `SampleBank` is single-producer (conversion handler) / single-consumer
//! (foreground), with the foreground as sole writer of the reset
//! transition. Reading counts with `Acquire` and publishing them with
//! `Release` makes the buffered values visible without locks.

use core::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use crate::direction::Direction;
use crate::signal::CompletionFlags;

/// Raw readings per direction per cycle. Fixed by the acquisition window;
/// the averaging math and buffer sizes all key off this.
pub const SAMPLES_PER_CYCLE: usize = 4;

/// Largest value a 12-bit conversion can produce.
pub const MAX_RAW_READING: u16 = 0x0FFF;

/// Fixed-capacity per-direction reading buffers plus completion counters.
///
/// Const-constructible so it can live in a `static` and be handed to the
/// conversion handler as a narrow `&'static` — interrupt code never sees
/// the rest of the control state.
#[derive(Debug)]
pub struct SampleBank {
    readings: [[AtomicU16; SAMPLES_PER_CYCLE]; Direction::COUNT],
    counts: [AtomicU8; Direction::COUNT],
}

impl SampleBank {
    pub const fn new() -> Self {
        Self {
            readings: [const { [const { AtomicU16::new(0) }; SAMPLES_PER_CYCLE] };
                Direction::COUNT],
            counts: [const { AtomicU8::new(0) }; Direction::COUNT],
        }
    }

    /// Readings captured so far this cycle for `dir`.
    pub fn count(&self, dir: Direction) -> usize {
        self.counts[dir.index()].load(Ordering::Acquire) as usize
    }

    /// Snapshot of a direction's frozen buffer (exactly the `count` entries
    /// published so far). Bounded, heap-free copy for the aggregator.
    pub fn frozen(&self, dir: Direction) -> heapless::Vec<u16, SAMPLES_PER_CYCLE> {
        let n = self.count(dir);
        let mut out = heapless::Vec::new();
        for slot in &self.readings[dir.index()][..n] {
            // Capacity equals SAMPLES_PER_CYCLE, so the push cannot fail.
            let _ = out.push(slot.load(Ordering::Relaxed));
        }
        out
    }

    /// Consumer side: rewind every direction's count to start a new cycle.
    pub fn reset_counts(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Release);
        }
    }

    /// Producer side: append one reading. Caller guarantees `slot` is the
    /// current count for `dir` (single producer per direction).
    fn push(&self, dir: Direction, slot: usize, raw: u16) {
        self.readings[dir.index()][slot].store(raw, Ordering::Relaxed);
        self.counts[dir.index()].store(slot as u8 + 1, Ordering::Release);
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-reading capture routine, run in interrupt context.
///
/// Holds only the two handles it may touch: the sample bank and the
/// completion flags. Never reads the threat vector or the control state.
#[derive(Debug, Clone, Copy)]
pub struct SensorSampler<'a> {
    bank: &'a SampleBank,
    cycle_done: &'a CompletionFlags,
}

impl<'a> SensorSampler<'a> {
    pub const fn new(bank: &'a SampleBank, cycle_done: &'a CompletionFlags) -> Self {
        Self { bank, cycle_done }
    }

    /// Handle one conversion-complete event for `dir`.
    ///
    /// O(1), no loops, no blocking: either appends the reading (buffer not
    /// yet full) or raises the direction's completion flag (buffer full —
    /// the write is intercepted, never attempted past capacity).
    pub fn on_conversion(&self, dir: Direction, raw: u16) {
        debug_assert!(raw <= MAX_RAW_READING, "reading exceeds 12-bit range");

        let count = self.bank.count(dir);
        if count < SAMPLES_PER_CYCLE {
            self.bank.push(dir, count, raw);
        } else {
            self.cycle_done.raise(dir);
        }
    }
}
