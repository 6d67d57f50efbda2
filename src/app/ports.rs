//! Port traits — the boundary between the control core and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ control core (FSM · ramp · aggregator)
//! ```
//!
//! Driven adapters (PWM output stage, hardware timers, status indicator)
//! implement these traits. The core consumes them through `&mut dyn`
//! handles in [`RobotContext`](crate::fsm::context::RobotContext), so the
//! decision logic never touches hardware directly and every port can be
//! replaced by a recording mock or an injected fake time source in tests.

use crate::direction::Direction;
use crate::motor::MotorPair;

// ───────────────────────────────────────────────────────────────
// Drive output port (core → PWM + H-bridge phase pins)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the motor output stage.
pub trait DrivePort {
    /// Set the PWM duty (in ticks) for one diagonal motor pair.
    fn set_pair_duty(&mut self, pair: MotorPair, ticks: u16);

    /// Set the PWM duty for all four motors at once (ramp-down path).
    fn set_all_duty(&mut self, ticks: u16);

    /// Switch the H-bridge phase outputs to `heading`.
    ///
    /// The ramp controller only calls this at zero speed; implementations
    /// may assume the motors are stationary.
    fn set_heading(&mut self, heading: Direction);
}

// ───────────────────────────────────────────────────────────────
// Ramp pacing port (injected time source)
// ───────────────────────────────────────────────────────────────

/// The ramp controller's time source: one `wait_ready` return per ramp
/// step.
///
/// The production implementation busy-waits on the level-triggered ramp
/// tick flag (see [`FlagPacer`](crate::motor::FlagPacer)); tests inject a
/// pacer that returns immediately and counts the ticks it granted.
pub trait RampPacer {
    /// Block (by polling) until the next ramp tick has fired, consuming it.
    fn wait_ready(&mut self);
}

// ───────────────────────────────────────────────────────────────
// One-shot / recurring timer port (spin recovery)
// ───────────────────────────────────────────────────────────────

/// Arms and disarms the spin-recovery timers. The timers themselves
/// signal completion by raising the spin-complete and blink flags that
/// the spinning state polls.
pub trait TimerPort {
    /// Arm the one-shot spin-duration timer.
    fn arm_spin(&mut self, duration_ms: u32);

    /// Disarm the spin-duration timer.
    fn disarm_spin(&mut self);

    /// Arm the recurring blink timer.
    fn arm_blink(&mut self, period_ms: u32);

    /// Disarm the blink timer.
    fn disarm_blink(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Status indication port (core → LEDs / console)
// ───────────────────────────────────────────────────────────────

/// Pure side-effect outputs: how the robot shows what it decided.
pub trait IndicatorPort {
    /// One escaping cycle finished. `code` packs the decision: low nibble
    /// = closest-threat direction ordinal, high nibble = most-open
    /// direction ordinal.
    fn cycle_status(&mut self, code: u8);

    /// Advance the spin animation one step (called per blink tick while
    /// spinning).
    fn spin_step(&mut self);
}
