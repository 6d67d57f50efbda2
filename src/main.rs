//! # escapebot-sim
//!
//! Host-side simulator for the escape-robot control core.
//!
//! Runs the real [`ControlService`] against simulated hardware: a sampled
//! threat world standing in for the infrared sensors, thread-based timers
//! standing in for the hardware timer peripherals, and a console drive
//! stage standing in for PWM and the H-bridges. The interrupt-shared
//! handles are the same `static` atomic cells the firmware would use;
//! the simulator threads play the interrupt side.
//!
//! Interactive commands on stdin (one per line):
//! `test` / `escape` / `spin` / `trapped` force a state; `stop`, `slow`,
//! `fast` request a speed and `left`, `front`, `back`, `right` a heading
//! (honored in Testing); `quit` exits.

use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use escapebot::app::commands::{Command, CommandMailbox};
use escapebot::app::ports::{DrivePort, IndicatorPort, TimerPort};
use escapebot::app::service::ControlService;
use escapebot::config::RobotConfig;
use escapebot::direction::Direction;
use escapebot::fsm::context::{Ports, Shared};
use escapebot::fsm::StateId;
use escapebot::motor::{FlagPacer, MotorPair};
use escapebot::sampling::{MAX_RAW_READING, SampleBank, SensorSampler};
use escapebot::signal::{CompletionFlags, Flag};

// ── Interrupt-shared cells (simulator threads play the ISR side) ──

static BANK: SampleBank = SampleBank::new();
static CYCLE_DONE: CompletionFlags = CompletionFlags::new();
static RAMP_TICK: Flag = Flag::new();
static SPIN_DONE: Flag = Flag::new();
static BLINK_TICK: Flag = Flag::new();
static MAILBOX: CommandMailbox = CommandMailbox::new();

/// Drive state the console stage publishes for the sensor world.
static SIM_SPEED: AtomicU16 = AtomicU16::new(0);
static SIM_HEADING: AtomicU8 = AtomicU8::new(Direction::Front as u8);

static QUIT: AtomicBool = AtomicBool::new(false);

/// Simulated surroundings: one slowly-evolving threat level per direction.
static WORLD: [AtomicU16; Direction::COUNT] = [const { AtomicU16::new(0) }; Direction::COUNT];

/// Ambient reading with nothing nearby.
const WORLD_FLOOR: u16 = 100;
/// Threat decay per sample trigger while the robot is moving.
const WORLD_DECAY: u16 = 25;
/// Threat growth per trigger in the direction the robot is driving:
/// whatever lies that way gets closer.
const WORLD_APPROACH: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Nothing nearby; the robot idles (useful with `test`).
    Open,
    /// Threats closing in from the left and front.
    Corner,
    /// Blocked on all four sides: trapped, spins, then escapes.
    Boxed,
}

impl Scenario {
    fn initial_threats(self) -> [u16; Direction::COUNT] {
        match self {
            Self::Open => [WORLD_FLOOR; Direction::COUNT],
            Self::Corner => [2_500, 1_800, WORLD_FLOOR, WORLD_FLOOR],
            Self::Boxed => [1_600, 1_600, 1_600, 1_600],
        }
    }
}

/// escapebot-sim — escape-robot control core on simulated hardware
#[derive(Parser, Debug)]
#[command(name = "escapebot-sim")]
#[command(version)]
#[command(about = "Runs the escape-robot control loop against a simulated world")]
struct Args {
    /// Threat scenario to start from.
    #[arg(long, value_enum, default_value = "corner")]
    scenario: Scenario,

    /// How long to run, in seconds (0 = until `quit`).
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Path to a JSON tuning config; defaults are used when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("escapebot-sim v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        log::error!("FATAL: {e:#}");
        process::exit(1);
    }
}

fn setup_tracing(args: &Args) {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    info!(
        "config: max {} / floor {} / step {} ticks, min threat {}, trapped {}",
        config.max_speed_ticks,
        config.min_start_ticks,
        config.ramp_step_ticks,
        config.min_threat,
        config.trapped_threshold
    );

    for (cell, level) in WORLD.iter().zip(args.scenario.initial_threats()) {
        cell.store(level, Ordering::Relaxed);
    }

    spawn_sampler(config.sample_interval_ms);
    spawn_ramp_timer(config.ramp_tick_interval_ms);
    spawn_stdin_dispatcher(config.clone());

    let mut drive = ConsoleDrive;
    let mut pacer = FlagPacer::new(&RAMP_TICK);
    let mut timers = SimTimers::default();
    let mut indicator = ConsoleIndicator::default();

    let shared = Shared {
        samples: &BANK,
        cycle_done: &CYCLE_DONE,
        spin_complete: &SPIN_DONE,
        blink_tick: &BLINK_TICK,
        mailbox: &MAILBOX,
    };
    let mut service = ControlService::new(
        config,
        shared,
        Ports {
            drive: &mut drive,
            pacer: &mut pacer,
            timers: &mut timers,
            indicator: &mut indicator,
        },
    );
    service.start();

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    while !QUIT.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        service.step();
        // The control loop itself is event-paced (sample cycles, ramp
        // ticks); this sleep only keeps idle passes from spinning a core.
        thread::sleep(Duration::from_millis(5));
    }

    info!(
        "done after {} passes: state {:?}, speed {}, heading {}, status {:#04x}",
        service.passes(),
        service.state(),
        service.speed(),
        service.heading(),
        service.last_status()
    );
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RobotConfig> {
    let Some(path) = path else {
        return Ok(RobotConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: RobotConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    anyhow::ensure!(
        config.fast_speed_ticks <= config.max_speed_ticks,
        "fast_speed_ticks must not exceed max_speed_ticks"
    );
    Ok(config)
}

// ── Simulated interrupt side ──────────────────────────────────

/// Advance the threat world by one travelled step: the obstacle in the
/// direction of travel closes in, everything else recedes toward ambient.
fn advance_world(heading: Direction) {
    for dir in Direction::ALL {
        let cell = &WORLD[dir.index()];
        let level = cell.load(Ordering::Relaxed);
        let next = if dir == heading {
            (level + WORLD_APPROACH).min(MAX_RAW_READING)
        } else {
            level.saturating_sub(WORLD_DECAY).max(WORLD_FLOOR)
        };
        cell.store(next, Ordering::Relaxed);
    }
}

/// Plays the ADC conversion interrupt: every sample interval, one reading
/// per direction is pushed into the shared bank. Also evolves the world
/// while the robot is moving, using the heading the drive stage published.
fn spawn_sampler(interval_ms: u32) {
    thread::spawn(move || {
        let sampler = SensorSampler::new(&BANK, &CYCLE_DONE);
        loop {
            if SIM_SPEED.load(Ordering::Relaxed) > 0 {
                let heading =
                    Direction::from_index(SIM_HEADING.load(Ordering::Relaxed) as usize);
                advance_world(heading);
            }
            for dir in Direction::ALL {
                sampler.on_conversion(dir, WORLD[dir.index()].load(Ordering::Relaxed));
            }
            thread::sleep(Duration::from_millis(u64::from(interval_ms)));
        }
    });
}

/// Plays the ramp-tick timer interrupt.
fn spawn_ramp_timer(interval_ms: u32) {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_millis(u64::from(interval_ms)));
        RAMP_TICK.raise();
    });
}

/// Maps console words to typed commands, standing in for the buttons.
fn spawn_stdin_dispatcher(config: RobotConfig) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "" => {}
                "quit" | "q" => {
                    QUIT.store(true, Ordering::Relaxed);
                    break;
                }
                "escape" => MAILBOX.post(Command::ForceState(StateId::Escaping)),
                "test" => MAILBOX.post(Command::ForceState(StateId::Testing)),
                "trapped" => MAILBOX.post(Command::ForceState(StateId::Trapped)),
                "spin" => MAILBOX.post(Command::ForceState(StateId::Spinning)),
                "stop" => MAILBOX.post(Command::SetSpeed(0)),
                "slow" => MAILBOX.post(Command::SetSpeed(config.min_start_ticks)),
                "fast" => MAILBOX.post(Command::SetSpeed(config.fast_speed_ticks)),
                "left" => MAILBOX.post(Command::SetHeading(Direction::Left)),
                "front" => MAILBOX.post(Command::SetHeading(Direction::Front)),
                "back" => MAILBOX.post(Command::SetHeading(Direction::Back)),
                "right" => MAILBOX.post(Command::SetHeading(Direction::Right)),
                other => warn!("unknown command {other:?}"),
            }
        }
        QUIT.store(true, Ordering::Relaxed);
    });
}

// ── Simulated output stage ────────────────────────────────────

/// Console stand-in for the PWM output stage and H-bridge phase pins.
struct ConsoleDrive;

impl DrivePort for ConsoleDrive {
    fn set_pair_duty(&mut self, pair: MotorPair, ticks: u16) {
        debug!("drive: {pair:?} duty {ticks}");
        SIM_SPEED.store(ticks, Ordering::Relaxed);
    }

    fn set_all_duty(&mut self, ticks: u16) {
        debug!("drive: all duty {ticks}");
        SIM_SPEED.store(ticks, Ordering::Relaxed);
    }

    fn set_heading(&mut self, heading: Direction) {
        info!("drive: heading -> {heading}");
        SIM_HEADING.store(heading as u8, Ordering::Relaxed);
    }
}

/// Thread-backed stand-in for the hardware spin and blink timers. Each
/// arm hands its thread a cancel token; disarm trips the token so a
/// cancelled timer never raises its flag late.
#[derive(Default)]
struct SimTimers {
    spin_armed: Option<Arc<AtomicBool>>,
    blink_armed: Option<Arc<AtomicBool>>,
}

impl TimerPort for SimTimers {
    fn arm_spin(&mut self, duration_ms: u32) {
        let armed = Arc::new(AtomicBool::new(true));
        self.spin_armed = Some(Arc::clone(&armed));
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(u64::from(duration_ms)));
            if armed.load(Ordering::Relaxed) {
                SPIN_DONE.raise();
            }
        });
    }

    fn disarm_spin(&mut self) {
        if let Some(armed) = self.spin_armed.take() {
            armed.store(false, Ordering::Relaxed);
        }
    }

    fn arm_blink(&mut self, period_ms: u32) {
        let armed = Arc::new(AtomicBool::new(true));
        self.blink_armed = Some(Arc::clone(&armed));
        thread::spawn(move || {
            while armed.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(u64::from(period_ms)));
                BLINK_TICK.raise();
            }
        });
    }

    fn disarm_blink(&mut self) {
        if let Some(armed) = self.blink_armed.take() {
            armed.store(false, Ordering::Relaxed);
        }
    }
}

/// Console stand-in for the status LEDs.
#[derive(Default)]
struct ConsoleIndicator {
    spin_frame: usize,
}

impl IndicatorPort for ConsoleIndicator {
    fn cycle_status(&mut self, code: u8) {
        let closest = Direction::from_index(usize::from(code & 0x0F));
        let furthest = Direction::from_index(usize::from(code >> 4));
        info!("cycle {code:#04x}: closest {closest}, most open {furthest}");
    }

    fn spin_step(&mut self) {
        const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
        self.spin_frame = (self.spin_frame + 1) % FRAMES.len();
        debug!("spin {}", FRAMES[self.spin_frame]);
    }
}
