//! System configuration parameters.
//!
//! All tunable parameters for the escape robot, with defaults matching
//! the reference hardware (10 kHz-tick PWM stage, infrared rangers on a
//! 12-bit converter). The simulator can override them from a JSON file.

use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// Core robot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    // --- Motor / ramp ---
    /// PWM period in ticks; speed never exceeds this.
    pub max_speed_ticks: u16,
    /// Floor a motor pair snaps to the instant ramp-up begins. Starting
    /// a motor below this duty stalls it and draws excessive current.
    pub min_start_ticks: u16,
    /// Speed change per ramp tick.
    pub ramp_step_ticks: u16,
    /// "Fast" cruise speed used when escaping and when spinning.
    pub fast_speed_ticks: u16,
    /// Ramp tick period (milliseconds).
    pub ramp_tick_interval_ms: u32,

    // --- Threat thresholds ---
    /// Closest-threat magnitude below which the robot just sits and waits.
    pub min_threat: u16,
    /// Magnitude every direction must strictly exceed to count as trapped.
    pub trapped_threshold: u16,

    // --- Sampling ---
    /// Conversion trigger period (milliseconds).
    pub sample_interval_ms: u32,

    // --- Spin recovery ---
    /// Heading held while spinning out of a trapped position.
    pub spin_heading: Direction,
    /// How long a recovery spin lasts (milliseconds).
    pub spin_duration_ms: u32,
    /// Status-indicator blink period while spinning (milliseconds).
    pub blink_interval_ms: u32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            // Motor / ramp
            max_speed_ticks: 10_000,
            min_start_ticks: 7_000, // 70% of max
            ramp_step_ticks: 500,
            fast_speed_ticks: 8_000,
            ramp_tick_interval_ms: 40,

            // Thresholds
            min_threat: 400,
            trapped_threshold: 1_000,

            // Sampling
            sample_interval_ms: 100,

            // Spin recovery
            spin_heading: Direction::Right,
            spin_duration_ms: 3_000,
            blink_interval_ms: 100,
        }
    }
}
