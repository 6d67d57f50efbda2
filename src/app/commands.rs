//! Inbound commands to the control core.
//!
//! External input (buttons in the original hardware, stdin in the
//! simulator) is mapped by the adapter into typed [`Command`]s and posted
//! into the [`CommandMailbox`]. The mailbox holds **at most one pending
//! command of each kind**: a new command of the same kind overwrites the
//! pending one (last-writer-wins, not a queue). The foreground consumes
//! each slot read-and-clear at its next check point, so an override posted
//! mid-ramp or mid-spin takes effect when that wait finishes, never
//! instantaneously.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use crate::direction::Direction;
use crate::fsm::StateId;

/// A typed external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ramp to the given speed (honored in Testing only).
    SetSpeed(u16),
    /// Change heading (honored in Testing only).
    SetHeading(Direction),
    /// Preempt the state machine into the given state (honored anywhere).
    ForceState(StateId),
}

/// Lock-free single-producer / single-consumer command slots.
///
/// Const-constructible so the input adapter can share a `static` with the
/// foreground.  Each slot is a value cell plus a pending flag; the value
/// is stored before the flag is raised (release), and the consumer swaps
/// the flag before loading the value (acquire), so a taken command is
/// always fully written.
#[derive(Debug)]
pub struct CommandMailbox {
    speed: AtomicU16,
    speed_pending: AtomicBool,
    heading: AtomicU8,
    heading_pending: AtomicBool,
    state: AtomicU8,
    state_pending: AtomicBool,
}

impl CommandMailbox {
    pub const fn new() -> Self {
        Self {
            speed: AtomicU16::new(0),
            speed_pending: AtomicBool::new(false),
            heading: AtomicU8::new(0),
            heading_pending: AtomicBool::new(false),
            state: AtomicU8::new(0),
            state_pending: AtomicBool::new(false),
        }
    }

    /// Post a command. Safe from interrupt context: two stores, no loops.
    pub fn post(&self, cmd: Command) {
        match cmd {
            Command::SetSpeed(ticks) => {
                self.speed.store(ticks, Ordering::Relaxed);
                self.speed_pending.store(true, Ordering::Release);
            }
            Command::SetHeading(dir) => {
                self.heading.store(dir as u8, Ordering::Relaxed);
                self.heading_pending.store(true, Ordering::Release);
            }
            Command::ForceState(state) => {
                self.state.store(state as u8, Ordering::Relaxed);
                self.state_pending.store(true, Ordering::Release);
            }
        }
    }

    /// Consume a pending speed command, if any.
    pub fn take_speed(&self) -> Option<u16> {
        self.speed_pending
            .swap(false, Ordering::Acquire)
            .then(|| self.speed.load(Ordering::Relaxed))
    }

    /// Consume a pending heading command, if any.
    pub fn take_heading(&self) -> Option<Direction> {
        self.heading_pending
            .swap(false, Ordering::Acquire)
            .then(|| Direction::from_index(self.heading.load(Ordering::Relaxed) as usize))
    }

    /// Consume a pending state override, if any.
    pub fn take_forced_state(&self) -> Option<StateId> {
        self.state_pending
            .swap(false, Ordering::Acquire)
            .then(|| StateId::from_index(self.state.load(Ordering::Relaxed) as usize))
    }
}

impl Default for CommandMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_read_and_clear() {
        let mb = CommandMailbox::new();
        mb.post(Command::SetSpeed(2_000));
        assert_eq!(mb.take_speed(), Some(2_000));
        assert_eq!(mb.take_speed(), None);
    }

    #[test]
    fn same_kind_overwrites() {
        let mb = CommandMailbox::new();
        mb.post(Command::SetHeading(Direction::Left));
        mb.post(Command::SetHeading(Direction::Back));
        assert_eq!(mb.take_heading(), Some(Direction::Back));
        assert_eq!(mb.take_heading(), None);
    }

    #[test]
    fn kinds_are_independent_slots() {
        let mb = CommandMailbox::new();
        mb.post(Command::SetSpeed(8_000));
        mb.post(Command::SetHeading(Direction::Right));
        mb.post(Command::ForceState(StateId::Testing));

        assert_eq!(mb.take_forced_state(), Some(StateId::Testing));
        assert_eq!(mb.take_speed(), Some(8_000));
        assert_eq!(mb.take_heading(), Some(Direction::Right));
    }
}
