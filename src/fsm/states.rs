//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers — no closures, no heap.
//!
//! ```text
//!  ESCAPING ──[all four flags + every direction blocked]──▶ TRAPPED
//!     ▲                                                        │
//!     │                                          (pass-through) │
//!     │                                                        ▼
//!     └───────────[spin-duration expired]────────────────  SPINNING
//!
//!  Any state ◀──[ForceState override, applied between ticks]──▶ any state
//!  TESTING: manual SetSpeed / SetHeading only; leaves via ForceState.
//! ```
//!
//! Handlers may block: ramps wait on the pacer, and Spinning's update
//! busy-waits for the spin-duration expiry. Overrides are therefore
//! deferred — they land at the next tick boundary, never mid-wait.

use super::context::RobotContext;
use super::{StateDescriptor, StateId};
use crate::threat;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Escaping
        StateDescriptor {
            id: StateId::Escaping,
            name: "Escaping",
            on_enter: Some(escaping_enter),
            on_exit: None,
            on_update: escaping_update,
        },
        // Index 1 — Testing
        StateDescriptor {
            id: StateId::Testing,
            name: "Testing",
            on_enter: Some(testing_enter),
            on_exit: None,
            on_update: testing_update,
        },
        // Index 2 — Trapped
        StateDescriptor {
            id: StateId::Trapped,
            name: "Trapped",
            on_enter: Some(trapped_enter),
            on_exit: None,
            on_update: trapped_update,
        },
        // Index 3 — Spinning
        StateDescriptor {
            id: StateId::Spinning,
            name: "Spinning",
            on_enter: Some(spinning_enter),
            on_exit: None,
            on_update: spinning_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  ESCAPING — autonomous threat avoidance (initial state)
// ═══════════════════════════════════════════════════════════════════════════

fn escaping_enter(ctx: &mut RobotContext<'_>) {
    // Anything staged while in another state is stale; start a clean cycle.
    ctx.reset_cycle();
    info!("ESCAPING: autonomous avoidance active");
}

fn escaping_update(ctx: &mut RobotContext<'_>) -> Option<StateId> {
    // Manual drive commands are Testing-only. Drop them here so a later
    // mode switch doesn't replay stale input.
    let _ = ctx.mailbox.take_speed();
    let _ = ctx.mailbox.take_heading();

    // React only to a complete measurement cycle: all four directions done.
    if !ctx.cycle_done.all_set() {
        return None;
    }

    ctx.threats = threat::aggregate(ctx.samples);

    if threat::trapped(&ctx.threats, ctx.config.trapped_threshold) {
        // Skip the steering reaction; Spinning resets the cycle on its
        // way back out.
        return Some(StateId::Trapped);
    }

    let (closest, furthest) = threat::order(&ctx.threats);
    ctx.last_status = threat::status_code(closest, furthest);
    ctx.indicator.cycle_status(ctx.last_status);

    if ctx.threats[closest] > ctx.config.min_threat {
        // Move away from the closest threat toward the most open side.
        ctx.steer(furthest);
        let fast = ctx.config.fast_speed_ticks;
        ctx.ramp_to(fast);
    } else {
        // Nothing within the reaction threshold: sit and wait.
        ctx.ramp_to(0);
    }

    ctx.reset_cycle();
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TESTING — manual drive via external commands
// ═══════════════════════════════════════════════════════════════════════════

fn testing_enter(_ctx: &mut RobotContext<'_>) {
    info!("TESTING: manual control; sensors ignored");
}

fn testing_update(ctx: &mut RobotContext<'_>) -> Option<StateId> {
    // Sampling hardware keeps running in the background; its results are
    // simply never aggregated here.
    if let Some(ticks) = ctx.mailbox.take_speed() {
        let bounded = ticks.min(ctx.config.max_speed_ticks);
        ctx.ramp_to(bounded);
    }
    if let Some(heading) = ctx.mailbox.take_heading() {
        ctx.steer(heading);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRAPPED — pass-through into spin recovery
// ═══════════════════════════════════════════════════════════════════════════

fn trapped_enter(ctx: &mut RobotContext<'_>) {
    warn!(
        "TRAPPED: no open direction (threshold {})",
        ctx.config.trapped_threshold
    );
}

fn trapped_update(_ctx: &mut RobotContext<'_>) -> Option<StateId> {
    // Nothing to decide: the state exists so the trapped condition is
    // visible in the transition log, then forwards immediately.
    Some(StateId::Spinning)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SPINNING — timed spin to shake free, then back to escaping
// ═══════════════════════════════════════════════════════════════════════════

fn spinning_enter(ctx: &mut RobotContext<'_>) {
    let heading = ctx.config.spin_heading;
    ctx.steer(heading);
    let fast = ctx.config.fast_speed_ticks;
    ctx.ramp_to(fast);

    ctx.timers.arm_spin(ctx.config.spin_duration_ms);
    ctx.timers.arm_blink(ctx.config.blink_interval_ms);
    info!("SPINNING: {} ms at heading {}", ctx.config.spin_duration_ms, heading);
}

fn spinning_update(ctx: &mut RobotContext<'_>) -> Option<StateId> {
    // Block until the spin-duration timer fires, animating the indicator
    // on each blink tick. Both flags are level-triggered, so a tick that
    // fires while we are between polls is observed on the next pass.
    while !ctx.spin_complete.take() {
        if ctx.blink_tick.take() {
            ctx.indicator.spin_step();
        }
        core::hint::spin_loop();
    }

    ctx.timers.disarm_spin();
    ctx.timers.disarm_blink();
    ctx.ramp_to(0);

    // Discard whatever the sampler captured mid-spin.
    ctx.reset_cycle();
    Some(StateId::Escaping)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::super::context::{Ports, Shared};
    use super::*;
    use crate::app::commands::{Command, CommandMailbox};
    use crate::app::ports::{DrivePort, IndicatorPort, RampPacer, TimerPort};
    use crate::config::RobotConfig;
    use crate::direction::Direction;
    use crate::fsm::Fsm;
    use crate::motor::MotorPair;
    use crate::sampling::{SAMPLES_PER_CYCLE, SampleBank, SensorSampler};
    use crate::signal::{CompletionFlags, Flag};

    // ── Mock ports ────────────────────────────────────────────

    #[derive(Default)]
    struct NullDrive {
        headings: Vec<Direction>,
        last_duty: u16,
    }

    impl DrivePort for NullDrive {
        fn set_pair_duty(&mut self, _pair: MotorPair, ticks: u16) {
            self.last_duty = ticks;
        }
        fn set_all_duty(&mut self, ticks: u16) {
            self.last_duty = ticks;
        }
        fn set_heading(&mut self, heading: Direction) {
            self.headings.push(heading);
        }
    }

    struct InstantPacer;

    impl RampPacer for InstantPacer {
        fn wait_ready(&mut self) {}
    }

    #[derive(Default)]
    struct RecordingTimers {
        spin_armed: bool,
        blink_armed: bool,
        spin_arms: u32,
    }

    impl TimerPort for RecordingTimers {
        fn arm_spin(&mut self, _duration_ms: u32) {
            self.spin_armed = true;
            self.spin_arms += 1;
        }
        fn disarm_spin(&mut self) {
            self.spin_armed = false;
        }
        fn arm_blink(&mut self, _period_ms: u32) {
            self.blink_armed = true;
        }
        fn disarm_blink(&mut self) {
            self.blink_armed = false;
        }
    }

    #[derive(Default)]
    struct RecordingIndicator {
        codes: Vec<u8>,
        spin_steps: u32,
    }

    impl IndicatorPort for RecordingIndicator {
        fn cycle_status(&mut self, code: u8) {
            self.codes.push(code);
        }
        fn spin_step(&mut self) {
            self.spin_steps += 1;
        }
    }

    // ── Shared scaffolding ────────────────────────────────────

    struct Cells {
        bank: SampleBank,
        done: CompletionFlags,
        spin: Flag,
        blink: Flag,
        mailbox: CommandMailbox,
    }

    impl Cells {
        fn new() -> Self {
            Self {
                bank: SampleBank::new(),
                done: CompletionFlags::new(),
                spin: Flag::new(),
                blink: Flag::new(),
                mailbox: CommandMailbox::new(),
            }
        }

        fn shared(&self) -> Shared<'_> {
            Shared {
                samples: &self.bank,
                cycle_done: &self.done,
                spin_complete: &self.spin,
                blink_tick: &self.blink,
                mailbox: &self.mailbox,
            }
        }

        /// Run a full measurement cycle: N readings per direction plus the
        /// completion trigger.
        fn feed_cycle(&self, distances: [u16; Direction::COUNT]) {
            let sampler = SensorSampler::new(&self.bank, &self.done);
            for _ in 0..=SAMPLES_PER_CYCLE {
                for dir in Direction::ALL {
                    sampler.on_conversion(dir, distances[dir.index()]);
                }
            }
        }
    }

    #[test]
    fn escaping_steers_toward_most_open_side() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);

        cells.feed_cycle([100, 900, 100, 100]);
        fsm.tick(&mut ctx);

        assert_eq!(fsm.current_state(), StateId::Escaping);
        // Closest = Front; furthest = Left (first of the tied minima).
        assert_eq!(ctx.ramp.heading(), Direction::Left);
        assert_eq!(ctx.ramp.speed(), ctx.config.fast_speed_ticks);
        assert_eq!(ctx.last_status, 0x01);

        // Cycle state was consumed and reset.
        assert!(!cells.done.all_set());
        for dir in Direction::ALL {
            assert_eq!(cells.bank.count(dir), 0);
        }

        drop(ctx);
        assert_eq!(indicator.codes, vec![0x01]);
        assert_eq!(drive.headings, vec![Direction::Left]);
    }

    #[test]
    fn escaping_holds_position_below_min_threat() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);

        // Every reading well under min_threat (400): no credible threat.
        cells.feed_cycle([100, 120, 90, 110]);
        fsm.tick(&mut ctx);

        assert_eq!(ctx.ramp.speed(), 0);
        drop(ctx);
        assert!(drive.headings.is_empty(), "no reorientation without a threat");
    }

    #[test]
    fn escaping_waits_for_a_complete_cycle() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);

        // Three of four directions complete: no reaction yet.
        let sampler = SensorSampler::new(&cells.bank, &cells.done);
        for dir in [Direction::Left, Direction::Front, Direction::Back] {
            for _ in 0..=SAMPLES_PER_CYCLE {
                sampler.on_conversion(dir, 2_000);
            }
        }
        fsm.tick(&mut ctx);

        assert_eq!(ctx.ramp.speed(), 0);
        assert_eq!(cells.bank.count(Direction::Left), SAMPLES_PER_CYCLE);
        drop(ctx);
        assert!(indicator.codes.is_empty());
    }

    #[test]
    fn trapped_spins_and_returns_to_escaping_in_one_pass() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let config = RobotConfig::default();
        let spin_heading = config.spin_heading;
        let mut ctx = RobotContext::new(
            config,
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);

        // All directions above the trapped threshold; let the spin finish
        // immediately.
        cells.feed_cycle([1_500, 1_500, 1_500, 1_500]);
        cells.spin.raise();
        fsm.tick(&mut ctx);

        // Escaping → Trapped → Spinning → Escaping, all within the tick.
        assert_eq!(fsm.current_state(), StateId::Escaping);
        assert_eq!(ctx.ramp.speed(), 0);
        assert_eq!(ctx.ramp.heading(), spin_heading);
        assert!(!cells.done.all_set());
        for dir in Direction::ALL {
            assert_eq!(cells.bank.count(dir), 0);
        }

        drop(ctx);
        // Timers were armed for the spin and disarmed after.
        assert_eq!(timers.spin_arms, 1);
        assert!(!timers.spin_armed);
        assert!(!timers.blink_armed);
        // The trapped cycle publishes no status code.
        assert!(indicator.codes.is_empty());
    }

    #[test]
    fn spinning_services_blink_ticks_while_waiting() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Spinning, &mut ctx);

        // Blink fires now; the spin-complete signal arrives a moment later
        // from "hardware" (another thread), as it would in production.
        cells.blink.raise();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                cells.spin.raise();
            });
            fsm.tick(&mut ctx);
        });

        assert_eq!(fsm.current_state(), StateId::Escaping);
        drop(ctx);
        assert!(indicator.spin_steps >= 1);
    }

    #[test]
    fn testing_applies_manual_commands() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Testing);
        fsm.start(&mut ctx);

        cells.mailbox.post(Command::SetSpeed(8_000));
        cells.mailbox.post(Command::SetHeading(Direction::Back));
        fsm.tick(&mut ctx);

        assert_eq!(fsm.current_state(), StateId::Testing);
        assert_eq!(ctx.ramp.speed(), 8_000);
        assert_eq!(ctx.ramp.heading(), Direction::Back);
        assert_eq!(cells.mailbox.take_speed(), None);
        assert_eq!(cells.mailbox.take_heading(), None);
    }

    #[test]
    fn testing_bounds_requested_speed() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Testing);
        fsm.start(&mut ctx);

        cells.mailbox.post(Command::SetSpeed(u16::MAX));
        fsm.tick(&mut ctx);

        assert_eq!(ctx.ramp.speed(), ctx.config.max_speed_ticks);
    }

    #[test]
    fn testing_ignores_sensor_cycles() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Testing);
        fsm.start(&mut ctx);

        cells.feed_cycle([2_000, 2_000, 2_000, 2_000]);
        fsm.tick(&mut ctx);

        // No reaction, no reset: the stale cycle just sits there.
        assert_eq!(fsm.current_state(), StateId::Testing);
        assert_eq!(ctx.ramp.speed(), 0);
        assert!(cells.done.all_set());
    }

    #[test]
    fn escaping_discards_manual_commands() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Escaping);
        fsm.start(&mut ctx);

        cells.mailbox.post(Command::SetSpeed(8_000));
        cells.mailbox.post(Command::SetHeading(Direction::Back));
        fsm.tick(&mut ctx);

        assert_eq!(ctx.ramp.speed(), 0);
        assert_eq!(ctx.ramp.heading(), Direction::Front);
        // Dropped, not left pending for a later Testing entry.
        assert_eq!(cells.mailbox.take_speed(), None);
        assert_eq!(cells.mailbox.take_heading(), None);
    }

    #[test]
    fn entering_escaping_discards_stale_samples() {
        let cells = Cells::new();
        let mut drive = NullDrive::default();
        let mut pacer = InstantPacer;
        let mut timers = RecordingTimers::default();
        let mut indicator = RecordingIndicator::default();
        let mut ctx = RobotContext::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        let mut fsm = Fsm::new(build_state_table(), StateId::Testing);
        fsm.start(&mut ctx);

        // Samples accumulate while Testing ignores them.
        cells.feed_cycle([2_000, 2_000, 2_000, 2_000]);
        fsm.tick(&mut ctx);
        assert!(cells.done.all_set());

        // Back to Escaping: the stale cycle must never be aggregated.
        fsm.force_transition(StateId::Escaping, &mut ctx);
        assert!(!cells.done.all_set());
        for dir in Direction::ALL {
            assert_eq!(cells.bank.count(dir), 0);
        }

        fsm.tick(&mut ctx);
        assert_eq!(ctx.ramp.speed(), 0);
        drop(ctx);
        assert!(indicator.codes.is_empty());
    }
}
