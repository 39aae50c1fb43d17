//! Zone allocator: finds and reserves free pads inside zone columns.
//!
//! Searches start at a minimum row and advance two rows at a time, leaving a buffer row
//! between neighbouring droplet lanes. When the scan runs off the bottom of the grid, the
//! grid grows by one row-step and the scan continues. Growth is bounded by
//! [`crate::config::DeviceConfig::max_growth_steps`].
//!
//! Reservations are one-shot: they are consumed by the next placement on the pad.
use tracing::debug;

use crate::device::{ChipState, Device};
use crate::error::{Error, Result};
use crate::grid::{PlaceId, Zone};

const ROW_STEP: usize = 2;

impl ChipState {
    /// A pad is free if it is neither reserved nor occupied, or if it is `exclude`.
    fn is_free(&self, at: PlaceId, exclude: Option<PlaceId>) -> Result<bool> {
        if exclude == Some(at) {
            return Ok(true);
        }
        let place = self.grid.get(at)?;
        Ok(!place.reserved && !self.placement.is_occupied(at))
    }

    fn grow_or_give_up(
        &mut self,
        growths: &mut usize,
        limit: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if *growths >= limit {
            return Err(Error::InvariantViolation(format!(
                "no free pad found after {limit} growth steps"
            )));
        }
        *growths += 1;
        self.grow_to(rows, cols);
        Ok(())
    }

    pub(crate) fn free_in_column(
        &mut self,
        column: usize,
        min_row: usize,
        exclude: Option<PlaceId>,
        skip: usize,
        limit: usize,
    ) -> Result<PlaceId> {
        let mut row = min_row;
        let mut skipped = 0;
        let mut growths = 0;
        loop {
            let Some(at) = self.grid.id_at(row, column) else {
                self.grow_or_give_up(&mut growths, limit, row + 1, column + 1)?;
                continue;
            };
            if self.is_free(at, exclude)? {
                if skipped == skip {
                    return Ok(at);
                }
                skipped += 1;
            }
            row += ROW_STEP;
        }
    }

    pub(crate) fn reserve_in_column(
        &mut self,
        column: usize,
        min_row: usize,
        limit: usize,
    ) -> Result<PlaceId> {
        let at = self.free_in_column(column, min_row, None, 0, limit)?;
        self.reserve(at)?;
        Ok(at)
    }

    /// Like [`ChipState::free_in_column`] with `exclude = Some(current)`, reserving the result
    /// unless it is `current` itself.
    pub(crate) fn claim_in_column(
        &mut self,
        column: usize,
        min_row: usize,
        current: PlaceId,
        limit: usize,
    ) -> Result<PlaceId> {
        let at = self.free_in_column(column, min_row, Some(current), 0, limit)?;
        if at != current {
            self.reserve(at)?;
        }
        Ok(at)
    }

    pub(crate) fn free_area(
        &mut self,
        column: usize,
        min_row: usize,
        rows: usize,
        cols: usize,
        limit: usize,
    ) -> Result<Vec<Vec<PlaceId>>> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvariantViolation(format!(
                "cannot allocate an empty {rows} x {cols} area"
            )));
        }
        let mut top = min_row;
        let mut growths = 0;
        loop {
            let (grid_rows, grid_cols) = self.grid.dimensions();
            if top + rows > grid_rows || column + cols > grid_cols {
                self.grow_or_give_up(&mut growths, limit, top + rows, column + cols)?;
                continue;
            }
            if let Some(area) = self.area_if_free(top, column, rows, cols)? {
                return Ok(area);
            }
            top += ROW_STEP;
        }
    }

    fn area_if_free(
        &self,
        top: usize,
        left: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Option<Vec<Vec<PlaceId>>>> {
        let mut area = Vec::with_capacity(rows);
        for r in top..top + rows {
            let mut line = Vec::with_capacity(cols);
            for c in left..left + cols {
                let Some(at) = self.grid.id_at(r, c) else {
                    return Ok(None);
                };
                if !self.is_free(at, None)? {
                    return Ok(None);
                }
                line.push(at);
            }
            area.push(line);
        }
        Ok(Some(area))
    }

    pub(crate) fn reserve(&mut self, at: PlaceId) -> Result<()> {
        self.grid.get_mut(at)?.reserved = true;
        self.invalidate();
        Ok(())
    }

    /// Drops the reservation of every pad in `pads` that never received a droplet.
    pub(crate) fn release_unused(&mut self, pads: &[PlaceId]) -> Result<usize> {
        let mut released = 0;
        for &at in pads {
            if self.placement.is_occupied(at) {
                continue;
            }
            let place = self.grid.get_mut(at)?;
            if place.reserved {
                place.reserved = false;
                released += 1;
            }
        }
        if released > 0 {
            self.invalidate();
        }
        Ok(released)
    }
}

impl Device {
    fn growth_limit(&self) -> usize {
        self.config().max_growth_steps
    }

    /// First column of `zone`.
    pub fn zone_column(&self, zone: Zone) -> usize {
        self.config().zones.column(zone)
    }

    /// First free pad in `column` at or below `min_row`, stepping two rows at a time.
    ///
    /// `exclude` is treated as free even if occupied, so a droplet can find "itself".
    /// `skip` free candidates are passed over first.
    pub fn free_in_column(
        &self,
        column: usize,
        min_row: usize,
        exclude: Option<PlaceId>,
        skip: usize,
    ) -> Result<PlaceId> {
        let limit = self.growth_limit();
        self.with_state(|state| state.free_in_column(column, min_row, exclude, skip, limit))
    }

    /// Finds a free pad in `column` and marks it reserved.
    pub fn reserve_in_column(&self, column: usize, min_row: usize) -> Result<PlaceId> {
        let limit = self.growth_limit();
        let at = self.with_state(|state| state.reserve_in_column(column, min_row, limit))?;
        debug!("Reserved {} in column {}.", at, column);
        Ok(at)
    }

    /// A fully free `rows * cols` rectangle whose left edge is `column`, as a row-major matrix.
    pub fn free_area(
        &self,
        column: usize,
        min_row: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<PlaceId>>> {
        let limit = self.growth_limit();
        self.with_state(|state| state.free_area(column, min_row, rows, cols, limit))
    }

    /// Like [`Device::free_area`], reserving every pad of the rectangle.
    pub fn reserve_area(
        &self,
        column: usize,
        min_row: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<PlaceId>>> {
        let limit = self.growth_limit();
        self.with_state(|state| {
            let area = state.free_area(column, min_row, rows, cols, limit)?;
            for at in area.iter().flatten() {
                state.reserve(*at)?;
            }
            Ok(area)
        })
    }

    /// Reserves `count` distinct pads in `column`, all or none.
    pub(crate) fn reserve_many_in_column(
        &self,
        column: usize,
        min_row: usize,
        count: usize,
    ) -> Result<Vec<PlaceId>> {
        let limit = self.growth_limit();
        self.with_state(|state| {
            let mut pads = Vec::with_capacity(count);
            for _ in 0..count {
                match state.reserve_in_column(column, min_row, limit) {
                    Ok(at) => pads.push(at),
                    Err(err) => {
                        state.release_unused(&pads)?;
                        return Err(err);
                    }
                }
            }
            Ok(pads)
        })
    }

    /// For every `(current, column)` pair, a pad in `column` for the droplet on `current`,
    /// searched from the droplet's row. All or none.
    pub(crate) fn claim_in_columns(&self, claims: &[(PlaceId, usize)]) -> Result<Vec<PlaceId>> {
        let limit = self.growth_limit();
        self.with_state(|state| {
            let mut pads = Vec::with_capacity(claims.len());
            for &(current, column) in claims {
                let claimed = state
                    .coords(current)
                    .and_then(|(row, _)| state.claim_in_column(column, row, current, limit));
                match claimed {
                    Ok(at) => pads.push(at),
                    Err(err) => {
                        state.release_unused(&pads)?;
                        return Err(err);
                    }
                }
            }
            Ok(pads)
        })
    }

    /// Reserves every pad of `pads` that is not occupied.
    pub(crate) fn reserve_vacant(&self, pads: &[PlaceId]) -> Result<()> {
        let reserved = self.with_state(|state| -> Result<usize> {
            let mut reserved = 0;
            for &at in pads {
                if !state.placement.is_occupied(at) {
                    state.reserve(at)?;
                    reserved += 1;
                }
            }
            Ok(reserved)
        })?;
        debug!("Held {} vacated pad(s) in reserve.", reserved);
        Ok(())
    }

    /// Returns the spare pads of a reserved work area to the allocator.
    pub(crate) fn release_unused(&self, pads: &[PlaceId]) -> Result<()> {
        let released = self.with_state(|state| state.release_unused(pads))?;
        if released > 0 {
            debug!("Released {} unused reservation(s).", released);
        }
        Ok(())
    }

    /// Runs `f`; if it fails, the pads of `reserved` that are still vacant go back to the
    /// allocator before the error is returned.
    pub(crate) fn releasing<T>(
        &self,
        reserved: &[PlaceId],
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = f();
        if result.is_err() {
            self.release_unused(reserved)?;
        }
        result
    }
}
