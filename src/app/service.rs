//! The control service: the foreground loop's single entry point.
//!
//! Owns the state machine and the [`RobotContext`] and exposes one
//! `step()` the host loop calls repeatedly. Construction wires the
//! interrupt-shared handles and the outbound ports together; after that
//! the caller never touches the context directly.

use log::info;

use crate::config::RobotConfig;
use crate::direction::Direction;
use crate::fsm::context::{Ports, RobotContext, Shared};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};

pub struct ControlService<'a> {
    fsm: Fsm,
    ctx: RobotContext<'a>,
}

impl<'a> ControlService<'a> {
    pub fn new(config: RobotConfig, shared: Shared<'a>, ports: Ports<'a>) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Escaping),
            ctx: RobotContext::new(config, shared, ports),
        }
    }

    /// Enter the initial state. Call once before the first `step()`.
    pub fn start(&mut self) {
        info!("control service starting in {:?}", self.fsm.current_state());
        self.fsm.start(&mut self.ctx);
    }

    /// One control-loop pass: apply a pending state override, then run
    /// the current state's update. Overrides posted while a handler is
    /// blocked (mid-ramp, mid-spin) land here, at the next pass.
    pub fn step(&mut self) {
        if let Some(forced) = self.ctx.mailbox.take_forced_state() {
            if forced != self.fsm.current_state() {
                info!("external override -> {forced:?}");
                self.fsm.force_transition(forced, &mut self.ctx);
            }
        }
        self.fsm.tick(&mut self.ctx);
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn speed(&self) -> u16 {
        self.ctx.ramp.speed()
    }

    pub fn heading(&self) -> Direction {
        self.ctx.ramp.heading()
    }

    /// Status byte of the last completed avoidance cycle.
    pub fn last_status(&self) -> u8 {
        self.ctx.last_status
    }

    pub fn passes(&self) -> u64 {
        self.fsm.tick_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::{Command, CommandMailbox};
    use crate::app::ports::{DrivePort, IndicatorPort, RampPacer, TimerPort};
    use crate::motor::MotorPair;
    use crate::sampling::SampleBank;
    use crate::signal::{CompletionFlags, Flag};

    struct Silent;

    impl DrivePort for Silent {
        fn set_pair_duty(&mut self, _pair: MotorPair, _ticks: u16) {}
        fn set_all_duty(&mut self, _ticks: u16) {}
        fn set_heading(&mut self, _heading: Direction) {}
    }
    impl RampPacer for Silent {
        fn wait_ready(&mut self) {}
    }
    impl TimerPort for Silent {
        fn arm_spin(&mut self, _duration_ms: u32) {}
        fn disarm_spin(&mut self) {}
        fn arm_blink(&mut self, _period_ms: u32) {}
        fn disarm_blink(&mut self) {}
    }
    impl IndicatorPort for Silent {
        fn cycle_status(&mut self, _code: u8) {}
        fn spin_step(&mut self) {}
    }

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
    }

    #[test]
    fn starts_in_escaping() {
        let cells = Cells::new();
        let mut drive = Silent;
        let mut pacer = Silent;
        let mut timers = Silent;
        let mut indicator = Silent;
        let mut service = ControlService::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        service.start();

        assert_eq!(service.state(), StateId::Escaping);
        assert_eq!(service.speed(), 0);
        assert_eq!(service.heading(), Direction::Front);
    }

    #[test]
    fn override_applies_between_passes() {
        let cells = Cells::new();
        let mut drive = Silent;
        let mut pacer = Silent;
        let mut timers = Silent;
        let mut indicator = Silent;
        let mut service = ControlService::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        service.start();
        service.step();
        assert_eq!(service.state(), StateId::Escaping);

        cells.mailbox.post(Command::ForceState(StateId::Testing));
        service.step();
        assert_eq!(service.state(), StateId::Testing);

        // Re-forcing the current state is a no-op, not a re-entry.
        cells.mailbox.post(Command::ForceState(StateId::Testing));
        service.step();
        assert_eq!(service.state(), StateId::Testing);
    }

    #[test]
    fn passes_count_up() {
        let cells = Cells::new();
        let mut drive = Silent;
        let mut pacer = Silent;
        let mut timers = Silent;
        let mut indicator = Silent;
        let mut service = ControlService::new(
            RobotConfig::default(),
            cells.shared(),
            Ports {
                drive: &mut drive,
                pacer: &mut pacer,
                timers: &mut timers,
                indicator: &mut indicator,
            },
        );
        service.start();
        for _ in 0..5 {
            service.step();
        }
        assert_eq!(service.passes(), 5);
    }
}
