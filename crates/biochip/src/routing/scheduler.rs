//! Single-route stepping through the four-phase actuation protocol.
//!
//! A hop from one pad to its neighbour takes four phases: pull toward the neighbour, split
//! across both electrodes, transfer occupancy, settle. Only the transfer phase changes
//! placement. The cancellation token is polled before every phase.
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::DeviceConfig;
use crate::device::{ChipState, Device};
use crate::error::{Error, Result};
use crate::events::DeviceEvent;
use crate::grid::{Animation, Direction, Grid, PlaceId};
use crate::placement::Placement;
use crate::routing::path::Route;

/// One of the four actuation phases of a hop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Pull,
    Split,
    Transfer,
    Settle,
}

impl Phase {
    pub(crate) const ALL: [Phase; 4] = [Phase::Pull, Phase::Split, Phase::Transfer, Phase::Settle];

    /// Pause that follows this phase.
    pub(crate) fn delay(self, config: &DeviceConfig) -> Duration {
        match self {
            Phase::Settle => config.step_delay,
            _ => config.phase_delay,
        }
    }
}

/// Applies one phase of the hop `from -> to`.
pub(crate) fn apply_phase(
    state: &mut ChipState,
    phase: Phase,
    direction: Direction,
    from: PlaceId,
    to: PlaceId,
) -> Result<()> {
    match phase {
        Phase::Pull => state.set_animation(from, Animation::Pull(direction)),
        Phase::Split => state.set_animation(from, Animation::Split(direction)),
        Phase::Transfer => {
            let sample = state.extract(from)?;
            state.set_animation(from, Animation::Idle)?;
            state.place(sample, to)?;
            state.set_animation(to, Animation::Arrive(direction))
        }
        Phase::Settle => state.set_animation(to, Animation::Idle),
    }
}

/// Whether the window of half-width `clearance` around `to` is empty, ignoring `from`.
///
/// `clearance = 0` only checks `to` itself; `clearance = 1` also requires the eight
/// surrounding pads to be empty.
pub fn can_step_to(
    grid: &Grid,
    placement: &Placement,
    from: PlaceId,
    to: PlaceId,
    clearance: usize,
) -> Result<bool> {
    let (tr, tc) = grid.coords(to)?;
    for r in tr.saturating_sub(clearance)..=tr.saturating_add(clearance) {
        if r >= grid.rows() {
            break;
        }
        for c in tc.saturating_sub(clearance)..=tc.saturating_add(clearance) {
            let Some(at) = grid.id_at(r, c) else {
                break;
            };
            if at != from && placement.is_occupied(at) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Direction of the hop `from -> to`; fails if the pads are not unit-adjacent.
pub fn direction(grid: &Grid, from: PlaceId, to: PlaceId) -> Result<Direction> {
    Direction::between(grid.coords(from)?, grid.coords(to)?)
}

impl Device {
    /// See [`can_step_to`].
    pub fn can_step_to(&self, from: PlaceId, to: PlaceId, clearance: usize) -> Result<bool> {
        self.read_state(|state| can_step_to(&state.grid, &state.placement, from, to, clearance))
    }

    /// See [`direction`].
    pub fn direction(&self, from: PlaceId, to: PlaceId) -> Result<Direction> {
        self.read_state(|state| direction(&state.grid, from, to))
    }

    /// Moves the droplet on `from` one pad in `direction` onto `to`.
    ///
    /// On cancellation the hop stops at the current phase; a transfer already made stays made.
    pub fn step(&self, direction: Direction, from: PlaceId, to: PlaceId) -> Result<()> {
        let actual = self.direction(from, to)?;
        if actual != direction {
            return Err(Error::InvariantViolation(format!(
                "hop {from} -> {to} goes {actual:?}, not {direction:?}"
            )));
        }
        self.read_state(|state| -> Result<()> {
            state.occupant(from)?;
            if state.placement.is_occupied(to) {
                let (row, col) = state.coords(to)?;
                return Err(Error::InvariantViolation(format!(
                    "hop {from} -> {to} lands on occupied pad ({row}, {col})"
                )));
            }
            Ok(())
        })?;
        for phase in Phase::ALL {
            self.check()?;
            self.with_state(|state| -> Result<()> {
                apply_phase(state, phase, direction, from, to)?;
                state.changed();
                Ok(())
            })?;
            trace!("Hop {} -> {}: {:?} done.", from, to, phase);
            self.pace(phase.delay(self.config()));
        }
        Ok(())
    }

    /// Walks the droplet at the route's origin to its destination, hop by hop.
    ///
    /// Each hop first checks [`can_step_to`] with the given clearance and fails with
    /// [`Error::Blocked`] if the window is not empty. Hops already taken are kept.
    pub fn follow_route(&self, route: &Route, clearance: usize) -> Result<()> {
        self.check()?;
        if route.hops() == 0 {
            return Ok(());
        }
        let sample = self.read_state(|state| state.occupant(route.origin()))?;
        let coords = route.coords();

        for (i, pair) in route.places().windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            self.check()?;
            if !self.can_step_to(from, to, clearance)? {
                warn!(
                    "Route of sample {} blocked at hop {}: {:?} -> {:?}.",
                    sample.id,
                    i,
                    coords[i],
                    coords[i + 1]
                );
                return Err(Error::Blocked {
                    from: coords[i],
                    to: coords[i + 1],
                });
            }
            let direction = Direction::between(coords[i], coords[i + 1])?;
            self.step(direction, from, to)?;
        }

        debug!(
            "Sample {} reached {:?} after {} hop(s).",
            sample.id,
            coords[coords.len() - 1],
            route.hops()
        );
        self.emit(DeviceEvent::RouteFinished {
            sample: sample.id,
            hops: route.hops(),
        });
        Ok(())
    }
}
