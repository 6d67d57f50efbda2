//! Threat aggregation: turns a completed sampling cycle into a
//! four-direction distance vector and a steering decision input.
//!
//! Threat distances are raw 12-bit proximity magnitudes: **larger means
//! closer**. The aggregator never validates cycle completeness — the
//! state machine gates every call on all four completion flags being set,
//! so partial-cycle aggregation is prevented at the call site, not here.

use crate::direction::Direction;
use crate::sampling::{SAMPLES_PER_CYCLE, SampleBank};

/// One averaged distance per direction, overwritten in place each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreatVector([u16; Direction::COUNT]);

impl ThreatVector {
    pub const fn new(values: [u16; Direction::COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, dir: Direction) -> u16 {
        self.0[dir.index()]
    }
}

impl core::ops::Index<Direction> for ThreatVector {
    type Output = u16;

    fn index(&self, dir: Direction) -> &u16 {
        &self.0[dir.index()]
    }
}

/// Average each direction's frozen sample buffer into a threat vector.
///
/// Integer mean over exactly [`SAMPLES_PER_CYCLE`] readings, truncating on
/// division (fixed-point behaviour — no rounding).
pub fn aggregate(bank: &SampleBank) -> ThreatVector {
    let mut values = [0u16; Direction::COUNT];
    for dir in Direction::ALL {
        let samples = bank.frozen(dir);
        debug_assert_eq!(
            samples.len(),
            SAMPLES_PER_CYCLE,
            "aggregated a partial cycle for {dir}"
        );
        let sum: u32 = samples.iter().map(|&s| u32::from(s)).sum();
        values[dir.index()] = (sum / SAMPLES_PER_CYCLE as u32) as u16;
    }
    ThreatVector(values)
}

/// True iff every direction reads strictly above `threshold` — no open
/// direction exists. A single reading at or below the threshold means the
/// robot still has somewhere to go.
pub fn trapped(vector: &ThreatVector, threshold: u16) -> bool {
    Direction::ALL.iter().all(|&dir| vector[dir] > threshold)
}

/// Rank the directions: `closest` is the strongest threat (highest value
/// wins), `furthest` is the most open escape route (lowest value wins).
///
/// Ties break to the first direction in canonical ascending order — a
/// later direction displaces the running extreme only on strict
/// improvement, never on equality.
pub fn order(vector: &ThreatVector) -> (Direction, Direction) {
    let mut closest = Direction::Left;
    let mut furthest = Direction::Left;

    for dir in Direction::ALL {
        if vector[dir] > vector[closest] {
            closest = dir;
        }
        if vector[dir] < vector[furthest] {
            furthest = dir;
        }
    }
    (closest, furthest)
}

/// Pack the cycle's decision into the indicator status byte:
/// low nibble = closest-threat ordinal, high nibble = most-open ordinal.
pub fn status_code(closest: Direction, furthest: Direction) -> u8 {
    (furthest as u8) << 4 | closest as u8
}
