//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! cooperative cancellation, caller bugs (double placement, non-adjacent hops), lookups of
//! samples or pads that are not tracked, routing failures and invalid configuration.
//!
//! None of these are recovered inside the crate. Hops and placements committed before an
//! error are left in place.
use thiserror::Error;

use crate::sample::SampleId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("execution cancelled")]
    Cancelled,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("sample {sample} is not placed")]
    NotPlaced { sample: SampleId },

    #[error("pad ({row}, {col}) is not occupied")]
    NotOccupied { row: usize, col: usize },

    #[error("pad id {id} does not belong to this grid")]
    UnknownPlace { id: usize },

    #[error("route blocked stepping from {from:?} to {to:?}")]
    Blocked {
        from: (usize, usize),
        to: (usize, usize),
    },

    #[error("no route advanced in a round; {remaining} route(s) unfinished")]
    Deadlock { remaining: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns `true` for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
