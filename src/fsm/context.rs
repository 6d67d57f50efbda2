//! Shared mutable context threaded through every FSM handler.
//!
//! `RobotContext` is the explicit replacement for what the original
//! firmware kept as free global variables: the foreground loop owns it
//! outright, and the interrupt domain holds only the narrow atomic
//! handles (`SampleBank`, `CompletionFlags`, `Flag`, `CommandMailbox`)
//! that also appear here as shared references. Everything else — the
//! ramp controller, the threat vector, the output ports — is exclusively
//! foreground state.

use crate::app::commands::CommandMailbox;
use crate::app::ports::{DrivePort, IndicatorPort, RampPacer, TimerPort};
use crate::config::RobotConfig;
use crate::direction::Direction;
use crate::motor::RampController;
use crate::sampling::SampleBank;
use crate::signal::{CompletionFlags, Flag};
use crate::threat::ThreatVector;

/// The interrupt-shared handles: single-producer cells the hardware side
/// writes and the foreground consumes.
#[derive(Debug, Clone, Copy)]
pub struct Shared<'a> {
    /// Per-direction sample buffers (producer: conversion handler).
    pub samples: &'a SampleBank,
    /// Per-direction cycle-complete flags (producer: conversion handler).
    pub cycle_done: &'a CompletionFlags,
    /// Raised by the spin-duration timer expiry.
    pub spin_complete: &'a Flag,
    /// Raised by the recurring blink timer.
    pub blink_tick: &'a Flag,
    /// Last-writer-wins command slots (producer: input adapter).
    pub mailbox: &'a CommandMailbox,
}

/// The outbound port handles the state handlers drive.
pub struct Ports<'a> {
    pub drive: &'a mut dyn DrivePort,
    pub pacer: &'a mut dyn RampPacer,
    pub timers: &'a mut dyn TimerPort,
    pub indicator: &'a mut dyn IndicatorPort,
}

/// The context passed to every state handler function.
pub struct RobotContext<'a> {
    /// Tunable parameters.
    pub config: RobotConfig,

    // -- Interrupt-shared inputs --
    pub samples: &'a SampleBank,
    pub cycle_done: &'a CompletionFlags,
    pub spin_complete: &'a Flag,
    pub blink_tick: &'a Flag,
    pub mailbox: &'a CommandMailbox,

    // -- Foreground-owned motor state --
    pub ramp: RampController,

    // -- Output ports --
    pub drive: &'a mut dyn DrivePort,
    pub pacer: &'a mut dyn RampPacer,
    pub timers: &'a mut dyn TimerPort,
    pub indicator: &'a mut dyn IndicatorPort,

    // -- Per-cycle results --
    /// Latest averaged distances; overwritten each escaping cycle.
    pub threats: ThreatVector,
    /// Status byte of the last completed escaping cycle.
    pub last_status: u8,
}

impl<'a> RobotContext<'a> {
    pub fn new(config: RobotConfig, shared: Shared<'a>, ports: Ports<'a>) -> Self {
        let ramp = RampController::new(&config);
        Self {
            config,
            samples: shared.samples,
            cycle_done: shared.cycle_done,
            spin_complete: shared.spin_complete,
            blink_tick: shared.blink_tick,
            mailbox: shared.mailbox,
            ramp,
            drive: ports.drive,
            pacer: ports.pacer,
            timers: ports.timers,
            indicator: ports.indicator,
            threats: ThreatVector::default(),
            last_status: 0,
        }
    }

    /// Ramp the motors to `target` through the drive and pacer ports.
    pub fn ramp_to(&mut self, target: u16) {
        self.ramp.set_speed(target, &mut *self.drive, &mut *self.pacer);
    }

    /// Change heading (stop → reorient → resume) through the ports.
    pub fn steer(&mut self, heading: Direction) {
        self.ramp.set_direction(heading, &mut *self.drive, &mut *self.pacer);
    }

    /// Consumer-side reset: rewind all sample counts and clear the
    /// completion flags to begin a fresh measurement cycle.
    pub fn reset_cycle(&mut self) {
        self.samples.reset_counts();
        self.cycle_done.clear_all();
    }
}
