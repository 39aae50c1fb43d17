//! Pads and their presentation state.
use std::fmt;

use crate::error::{Error, Result};

/// Stable handle of a pad. Issued once by [`crate::grid::Grid`] and valid for the grid's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaceId(pub(crate) usize);

impl PlaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad:{}", self.0)
    }
}

/// Direction of a single hop between unit-adjacent pads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Direction of the hop `from -> to`, or an invariant violation if the pads are not unit-adjacent.
    pub fn between(from: (usize, usize), to: (usize, usize)) -> Result<Self> {
        let (fr, fc) = from;
        let (tr, tc) = to;
        match (tr as isize - fr as isize, tc as isize - fc as isize) {
            (0, -1) => Ok(Direction::Left),
            (0, 1) => Ok(Direction::Right),
            (-1, 0) => Ok(Direction::Up),
            (1, 0) => Ok(Direction::Down),
            _ => Err(Error::InvariantViolation(format!(
                "pads {from:?} and {to:?} are not adjacent"
            ))),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Rendered size of a droplet while it materializes or vanishes. Idle droplets are drawn at
/// full size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropletSize {
    Quarter,
    Half,
}

/// Presentation tag of a pad. Read by renderers only; routing never looks at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Animation {
    #[default]
    Idle,
    /// Droplet is drawn toward the neighbouring electrode.
    Pull(Direction),
    /// Droplet is stretched across two electrodes.
    Split(Direction),
    /// Droplet just arrived, coming from the opposite side.
    Arrive(Direction),
    /// Droplet is growing in or shrinking out.
    Size(DropletSize),
}

/// One electrode of the device.
#[derive(Clone, Debug)]
pub struct Place {
    id: PlaceId,
    row: usize,
    col: usize,
    /// Excludes the pad from allocation until a droplet is placed on it.
    pub reserved: bool,
    pub animation: Animation,
}

impl Place {
    pub(crate) fn new(id: PlaceId, row: usize, col: usize) -> Self {
        Self {
            id,
            row,
            col,
            reserved: false,
            animation: Animation::Idle,
        }
    }

    pub fn id(&self) -> PlaceId {
        self.id
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn coords(&self) -> (usize, usize) {
        (self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_between_adjacent_pads() {
        assert_eq!(Direction::between((2, 2), (2, 1)).unwrap(), Direction::Left);
        assert_eq!(Direction::between((2, 2), (2, 3)).unwrap(), Direction::Right);
        assert_eq!(Direction::between((2, 2), (1, 2)).unwrap(), Direction::Up);
        assert_eq!(Direction::between((2, 2), (3, 2)).unwrap(), Direction::Down);
    }

    #[test]
    fn direction_rejects_diagonal_and_identical_pads() {
        assert!(matches!(
            Direction::between((2, 2), (3, 3)),
            Err(Error::InvariantViolation(_))
        ));
        assert!(Direction::between((2, 2), (2, 2)).is_err());
        assert!(Direction::between((0, 0), (0, 2)).is_err());
    }

    #[test]
    fn opposite_is_an_involution() {
        for dir in [
            Direction::Left,
            Direction::Right,
            Direction::Up,
            Direction::Down,
        ] {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }
}
