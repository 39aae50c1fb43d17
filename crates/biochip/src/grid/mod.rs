//! The pad grid.
//!
//! Pads live in an append-only arena and are addressed by [`PlaceId`]. The row/column matrix
//! only stores ids, so growing the grid appends new pads and never rebuilds existing ones:
//! every id issued before a growth still names the same pad afterwards.
use tracing::debug;

use crate::error::{Error, Result};

pub mod place;
pub mod zone;

pub use place::{Animation, Direction, DropletSize, Place, PlaceId};
pub use zone::{Zone, ZoneLayout};

/// Growable matrix of pads.
#[derive(Clone, Debug, Default)]
pub struct Grid {
    places: Vec<Place>,
    matrix: Vec<Vec<PlaceId>>,
    cols: usize,
}

impl Grid {
    /// Creates a grid with `rows * cols` fresh pads.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut grid = Self::default();
        grid.grow_to(rows, cols);
        grid
    }

    pub fn rows(&self) -> usize {
        self.matrix.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows(), self.cols)
    }

    /// Total number of pads ever created.
    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Grows to at least `rows * cols`. Returns `true` if any pad was created.
    ///
    /// Dimensions never shrink; requests smaller than the current shape only extend the
    /// larger axis.
    pub fn grow_to(&mut self, rows: usize, cols: usize) -> bool {
        let target_rows = rows.max(self.rows());
        let target_cols = cols.max(self.cols);
        if target_rows == self.rows() && target_cols == self.cols {
            return false;
        }

        for r in 0..self.matrix.len() {
            for c in self.cols..target_cols {
                let id = self.push_place(r, c);
                self.matrix[r].push(id);
            }
        }
        for r in self.matrix.len()..target_rows {
            let mut row = Vec::with_capacity(target_cols);
            for c in 0..target_cols {
                row.push(self.push_place(r, c));
            }
            self.matrix.push(row);
        }
        self.cols = target_cols;

        debug!("Grid grown to {} x {}.", target_rows, target_cols);
        true
    }

    fn push_place(&mut self, row: usize, col: usize) -> PlaceId {
        let id = PlaceId(self.places.len());
        self.places.push(Place::new(id, row, col));
        id
    }

    /// Id of the pad at `(row, col)`, if the grid covers it.
    pub fn id_at(&self, row: usize, col: usize) -> Option<PlaceId> {
        self.matrix.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Id of the pad at `(row, col)`, growing the grid to cover it first.
    pub fn ensure(&mut self, row: usize, col: usize) -> PlaceId {
        self.grow_to(row + 1, col + 1);
        self.matrix[row][col]
    }

    pub fn get(&self, id: PlaceId) -> Result<&Place> {
        self.places
            .get(id.0)
            .ok_or(Error::UnknownPlace { id: id.0 })
    }

    pub fn get_mut(&mut self, id: PlaceId) -> Result<&mut Place> {
        self.places
            .get_mut(id.0)
            .ok_or(Error::UnknownPlace { id: id.0 })
    }

    /// `(row, col)` of a pad.
    pub fn coords(&self, id: PlaceId) -> Result<(usize, usize)> {
        self.get(id).map(Place::coords)
    }

    /// Pads in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Place> + '_ {
        self.matrix
            .iter()
            .flat_map(|row| row.iter().map(|id| &self.places[id.0]))
    }
}
