//! Named column regions of the pad grid.
use std::fmt;

/// A logical region used for operation-specific placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Zone {
    /// Where droplets wait between operations and where new droplets appear.
    Staging,
    /// Scratch space for merging, splitting and disposal.
    Mixing,
    Warm,
    Hot,
}

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Staging, Zone::Mixing, Zone::Warm, Zone::Hot];
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Staging => "staging",
            Zone::Mixing => "mixing",
            Zone::Warm => "warm",
            Zone::Hot => "hot",
        };
        f.write_str(name)
    }
}

/// Column offset of every [`Zone`], in pad units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoneLayout {
    pub staging: usize,
    pub mixing: usize,
    pub warm: usize,
    pub hot: usize,
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self {
            staging: 0,
            mixing: 2,
            warm: 12,
            hot: 18,
        }
    }
}

impl ZoneLayout {
    pub fn new(staging: usize, mixing: usize, warm: usize, hot: usize) -> Self {
        Self {
            staging,
            mixing,
            warm,
            hot,
        }
    }

    /// First column of the given zone.
    pub fn column(&self, zone: Zone) -> usize {
        match zone {
            Zone::Staging => self.staging,
            Zone::Mixing => self.mixing,
            Zone::Warm => self.warm,
            Zone::Hot => self.hot,
        }
    }

    /// Highest zone column, used to size the initial grid.
    pub fn max_column(&self) -> usize {
        Zone::ALL
            .iter()
            .map(|zone| self.column(*zone))
            .max()
            .unwrap_or(0)
    }
}
