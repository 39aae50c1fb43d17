//! Read-only views of device state for renderers.
use crate::device::ChipState;
use crate::grid::Animation;
use crate::sample::Sample;

/// Global droplet tint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tint {
    #[default]
    Normal,
    /// Droplets are incubating under an external simulation.
    Processing,
}

/// One pad as seen by a renderer.
#[derive(Clone, Debug)]
pub struct CellView {
    pub row: usize,
    pub col: usize,
    pub reserved: bool,
    pub animation: Animation,
    pub occupant: Option<Sample>,
}

/// Internally consistent copy of grid dimensions, occupancy and animation tags.
#[derive(Clone, Debug)]
pub struct DeviceSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub tint: Tint,
    /// Cells in row-major order.
    pub cells: Vec<CellView>,
}

impl DeviceSnapshot {
    pub(crate) fn capture(state: &ChipState) -> Self {
        let (rows, cols) = state.grid.dimensions();
        let cells = state
            .grid
            .iter()
            .map(|place| CellView {
                row: place.row(),
                col: place.col(),
                reserved: place.reserved,
                animation: place.animation,
                occupant: state.placement.occupant(place.id()).copied(),
            })
            .collect();
        Self {
            rows,
            cols,
            tint: state.tint,
            cells,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellView> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    /// Cells holding a droplet.
    pub fn occupied(&self) -> impl Iterator<Item = &CellView> + '_ {
        self.cells.iter().filter(|c| c.occupant.is_some())
    }

    /// Total volume of all droplets on the grid.
    pub fn total_volume(&self) -> f64 {
        self.occupied()
            .filter_map(|c| c.occupant.map(|s| s.volume))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleId;

    #[test]
    fn capture_is_row_major_and_tracks_occupants() {
        let mut state = ChipState::new(2, 3);
        let at = state.grid.id_at(1, 2).unwrap();
        state
            .place(Sample::new(SampleId::new(5), 0.25, 300.0), at)
            .unwrap();

        let snapshot = DeviceSnapshot::capture(&state);
        assert_eq!((snapshot.rows, snapshot.cols), (2, 3));
        assert_eq!(snapshot.cells.len(), 6);

        let cell = snapshot.cell(1, 2).expect("in range");
        assert_eq!((cell.row, cell.col), (1, 2));
        assert_eq!(cell.occupant.map(|s| s.id), Some(SampleId::new(5)));
        assert!(snapshot.cell(2, 0).is_none());
        assert_eq!(snapshot.occupied().count(), 1);
        assert_eq!(snapshot.total_volume(), 0.25);
    }

    #[test]
    fn cell_lookup_survives_column_growth() {
        let mut state = ChipState::new(2, 2);
        state.grow_to(2, 4);
        let snapshot = DeviceSnapshot::capture(&state);
        let cell = snapshot.cell(1, 3).expect("in range");
        assert_eq!((cell.row, cell.col), (1, 3));
    }
}
