//! Current-limited motor ramp controller.
//!
//! Motor speed never jumps: it walks toward a target in fixed steps, one
//! step per ramp tick (40 ms hardware timer). Two rules bound the current
//! draw of the four brushed motors:
//!
//! 1. **Two-phase ramp-up** — the motors are split into diagonal pairs
//!    (LF+RR, then RF+LR); each pair ramps up independently so at most two
//!    motors ever inrush at once.
//! 2. **Minimum-start floor** — a pair beginning its ramp snaps straight
//!    to 70% duty; below that the motors stall and draw stall current
//!    without turning.
//!
//! Direction changes are only legal at standstill, so `set_direction`
//! always sequences stop → switch phase outputs → resume.

use log::debug;

use crate::app::ports::{DrivePort, RampPacer};
use crate::config::RobotConfig;
use crate::direction::Direction;
use crate::signal::Flag;

/// One diagonal pair of motors, sharing an H-bridge each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorPair {
    /// Left-front + right-rear (ramped first).
    LfRr,
    /// Right-front + left-rear (ramped second).
    RfLr,
}

impl MotorPair {
    /// Ramp-up phase order.
    pub const BOTH: [MotorPair; 2] = [Self::LfRr, Self::RfLr];
}

/// Production ramp pacer: busy-waits on the level-triggered tick flag the
/// ramp timer raises every period.
///
/// Ticks are consumed read-and-clear. Polling faster than ticks arrive
/// busy-waits (no step is skipped); ticks arriving faster than the loop
/// polls coalesce into one (a step is delayed, never lost) — ramp timing
/// is "at least every tick period", not exact real time.
#[derive(Debug, Clone, Copy)]
pub struct FlagPacer<'a> {
    tick: &'a Flag,
}

impl<'a> FlagPacer<'a> {
    pub const fn new(tick: &'a Flag) -> Self {
        Self { tick }
    }
}

impl RampPacer for FlagPacer<'_> {
    fn wait_ready(&mut self) {
        while !self.tick.take() {
            core::hint::spin_loop();
        }
    }
}

/// Owns the motor state: current speed, last requested target, heading.
///
/// Foreground-only; the single interrupt-produced input (the ramp tick)
/// arrives through the [`RampPacer`] passed to each call.
#[derive(Debug)]
pub struct RampController {
    speed: u16,
    target_speed: u16,
    heading: Direction,
    max: u16,
    floor: u16,
    step: u16,
}

impl RampController {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            speed: 0,
            target_speed: 0,
            heading: Direction::Front,
            max: config.max_speed_ticks,
            floor: config.min_start_ticks,
            step: config.ramp_step_ticks,
        }
    }

    /// Current PWM duty in ticks.
    pub fn speed(&self) -> u16 {
        self.speed
    }

    /// Last requested target speed.
    pub fn target_speed(&self) -> u16 {
        self.target_speed
    }

    /// Current heading of the output stage.
    pub fn heading(&self) -> Direction {
        self.heading
    }

    /// Ramp the motors to `target` ticks.
    ///
    /// Blocks (one pacer wait per step) until the ramp completes. Targets
    /// above the PWM period are the caller's bug, not validated here.
    pub fn set_speed(&mut self, target: u16, drive: &mut dyn DrivePort, pacer: &mut dyn RampPacer) {
        debug_assert!(target <= self.max, "target speed exceeds PWM period");
        self.target_speed = target;

        if target < self.speed {
            self.ramp_down(target, drive, pacer);
        } else {
            self.ramp_up(target, drive, pacer);
        }
    }

    /// Change heading. No-op when already heading that way; otherwise stop,
    /// switch the output stage, and resume at the previous speed.
    pub fn set_direction(
        &mut self,
        new_heading: Direction,
        drive: &mut dyn DrivePort,
        pacer: &mut dyn RampPacer,
    ) {
        if new_heading == self.heading {
            return;
        }

        debug!("heading {} -> {}, stopping to reorient", self.heading, new_heading);
        let resume = self.speed;
        self.ramp_down(0, drive, pacer);
        debug_assert_eq!(self.speed, 0, "heading changed at nonzero speed");

        drive.set_heading(new_heading);
        self.heading = new_heading;

        self.ramp_up(resume, drive, pacer);
    }

    // ── Internal ──────────────────────────────────────────────

    /// Step all four motors down together. Clamps to 0 when a step would
    /// underflow past the step size (no wraparound to a huge duty).
    fn ramp_down(&mut self, target: u16, drive: &mut dyn DrivePort, pacer: &mut dyn RampPacer) {
        while self.speed > target {
            pacer.wait_ready();
            self.speed = if self.speed < self.step {
                0
            } else {
                self.speed - self.step
            };
            drive.set_all_duty(self.speed);
        }
    }

    /// Ramp up one diagonal pair at a time. Each pair replays the same
    /// floor-then-step sequence from the pre-ramp speed, so both converge
    /// to the same final value via independently timed steps.
    fn ramp_up(&mut self, target: u16, drive: &mut dyn DrivePort, pacer: &mut dyn RampPacer) {
        let resume_from = self.speed;

        for pair in MotorPair::BOTH {
            self.speed = resume_from;

            while self.speed < target {
                if self.speed < self.floor {
                    // Snap to the start floor; consumes no tick.
                    self.speed = self.floor;
                } else {
                    pacer.wait_ready();
                    self.speed += self.step;
                }
                drive.set_pair_duty(pair, self.speed);
            }

            if self.speed > target {
                self.speed = target;
                drive.set_pair_duty(pair, self.speed);
            }
        }
    }
}
