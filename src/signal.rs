//! Level-triggered flags shared between interrupt handlers and the
//! foreground loop.
//!
//! ```text
//! ┌─────────────┐  raise()   ┌──────────┐  take() / is_set()  ┌────────────┐
//! │ timer / ADC │──────────▶ │   Flag   │───────────────────▶ │ foreground │
//! │  handlers   │            │ (atomic) │                     │    loop    │
//! └─────────────┘            └──────────┘                     └────────────┘
//! ```
//!
//! A `Flag` is the crate's sole cross-domain synchronization primitive:
//! not a queue, not a wrapping counter. Raising an already-raised flag is
//! a no-op (saturating), so producers may fire faster than the consumer
//! polls — excess ticks coalesce instead of queueing. Consumption is
//! read-and-clear (`take`), which the single consumer owns exclusively.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::direction::Direction;

/// A level-triggered, idempotent boolean signal.
///
/// Producer side (`raise`) is safe from interrupt context: a single store,
/// no loops, no blocking. Consumer side (`take`) is read-and-clear and
/// must only be called from the foreground.
#[derive(Debug)]
pub struct Flag(AtomicBool);

impl Flag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag. Idempotent — re-raising a set flag changes nothing.
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag: returns `true` exactly once per raise-since-clear.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Acquire)
    }

    /// Observe without consuming.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear without reading. Foreground-only, like `take`.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-direction "this direction's sampling cycle is done" flags.
///
/// Set by the conversion handler (interrupt context) once a direction's
/// sample buffer is full; cleared only by the foreground after it has
/// consumed a complete cycle (all four set).
#[derive(Debug)]
pub struct CompletionFlags([Flag; Direction::COUNT]);

impl CompletionFlags {
    pub const fn new() -> Self {
        Self([const { Flag::new() }; Direction::COUNT])
    }

    /// Producer side: mark a direction's cycle complete.
    #[inline]
    pub fn raise(&self, dir: Direction) {
        self.0[dir.index()].raise();
    }

    pub fn is_set(&self, dir: Direction) -> bool {
        self.0[dir.index()].is_set()
    }

    /// The aggregation gate: true iff every direction has completed.
    pub fn all_set(&self) -> bool {
        self.0.iter().all(Flag::is_set)
    }

    /// Consumer side: begin the next measurement cycle.
    pub fn clear_all(&self) {
        for flag in &self.0 {
            flag.clear();
        }
    }
}

impl Default for CompletionFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_read_and_clear() {
        let f = Flag::new();
        assert!(!f.take());
        f.raise();
        assert!(f.is_set());
        assert!(f.take());
        assert!(!f.take());
    }

    #[test]
    fn raise_is_idempotent() {
        let f = Flag::new();
        f.raise();
        f.raise();
        f.raise();
        // Three raises coalesce into one observation.
        assert!(f.take());
        assert!(!f.take());
    }

    #[test]
    fn all_set_requires_every_direction() {
        let flags = CompletionFlags::new();
        for dir in Direction::ALL {
            assert!(!flags.all_set());
            flags.raise(dir);
        }
        assert!(flags.all_set());

        flags.clear_all();
        assert!(!flags.all_set());
        for dir in Direction::ALL {
            assert!(!flags.is_set(dir));
        }
    }
}
