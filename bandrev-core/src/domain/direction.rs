//! Direction — the three-state value shared by signals and positions.

use serde::{Deserialize, Serialize};

/// Long, flat or short. Signals and positions are both series of `Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Short,
    #[default]
    Flat,
    Long,
}

impl Direction {
    /// Numeric sign: -1, 0 or 1.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Short => -1.0,
            Direction::Flat => 0.0,
            Direction::Long => 1.0,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Short => -1,
            Direction::Flat => 0,
            Direction::Long => 1,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Direction::Flat
    }
}
