//! The four fixed robot headings.
//!
//! `Direction` doubles as a sensor/actuator index: every per-direction
//! array in the crate is indexed by `dir as usize`, and every loop that
//! touches "all directions" iterates [`Direction::ALL`] in ascending
//! ordinal order. That order is load-bearing — the threat aggregator's
//! first-wins tie-break depends on it.

use core::fmt;
use serde::{Deserialize, Serialize};

/// One of the four fixed headings, also used as a sensor channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Left = 0,
    Front = 1,
    Back = 2,
    Right = 3,
}

impl Direction {
    /// Number of directions — used to size per-direction arrays.
    pub const COUNT: usize = 4;

    /// Canonical ascending iteration order.
    pub const ALL: [Direction; Direction::COUNT] =
        [Self::Left, Self::Front, Self::Back, Self::Right];

    /// Array index for this direction.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Convert a `usize` index back to a `Direction`. Panics on
    /// out-of-range in debug builds; returns `Front` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Left,
            1 => Self::Front,
            2 => Self::Back,
            3 => Self::Right,
            _ => {
                debug_assert!(false, "invalid direction index: {idx}");
                Self::Front
            }
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
            Self::Right => write!(f, "right"),
        }
    }
}
