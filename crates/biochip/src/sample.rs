//! Droplet identities and the two scalar attributes the router reads.
use std::fmt;

use crate::error::{Error, Result};

const EPHEMERAL_BIT: u64 = 1 << 63;

/// Identity of a droplet.
///
/// Ids handed out by the protocol layer live in the lower half of the `u64` range. The upper
/// half is reserved for intermediate droplets the choreography creates while folding a merge
/// or peeling a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleId(u64);

impl SampleId {
    /// Largest id the protocol layer may use (63 bits).
    pub const MAX: u64 = EPHEMERAL_BIT - 1;

    /// Creates an external sample id from the low 63 bits of `raw`.
    ///
    /// The top bit is masked off, so `raw` above [`SampleId::MAX`] aliases a smaller id. Use
    /// [`SampleId::try_new`] for ids that come from outside the program.
    pub const fn new(raw: u64) -> Self {
        Self(raw & !EPHEMERAL_BIT)
    }

    /// Like [`SampleId::new`], failing with [`Error::InvariantViolation`] if `raw` exceeds
    /// [`SampleId::MAX`].
    pub fn try_new(raw: u64) -> Result<Self> {
        if raw > Self::MAX {
            return Err(Error::InvariantViolation(format!(
                "sample id {raw} does not fit in 63 bits"
            )));
        }
        Ok(Self(raw))
    }

    pub(crate) const fn ephemeral(counter: u64) -> Self {
        Self(counter | EPHEMERAL_BIT)
    }

    /// Returns `true` for ids created internally by merge/split folding.
    pub const fn is_ephemeral(self) -> bool {
        self.0 & EPHEMERAL_BIT != 0
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ephemeral() {
            write!(f, "~{}", self.0 & !EPHEMERAL_BIT)
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// A droplet as seen by the router: identity, volume and temperature (Kelvin).
///
/// Two samples are the same droplet iff their [`SampleId`]s are equal; the attributes are
/// only read, never compared.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    pub id: SampleId,
    pub volume: f64,
    pub temperature: f64,
}

impl Sample {
    pub fn new(id: SampleId, volume: f64, temperature: f64) -> Self {
        Self {
            id,
            volume,
            temperature,
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Returns a copy carrying a new volume, keeping identity and temperature.
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }
}
