//! Routes and the L-shaped pathfinder.
//!
//! Paths walk one axis to alignment and then the other, one pad at a time. They know nothing
//! about occupancy; collisions are the scheduler's business.
use crate::error::{Error, Result};
use crate::grid::{Direction, Grid, PlaceId};

/// Ordered sequence of unit-adjacent pads from an origin to a destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    places: Vec<PlaceId>,
    coords: Vec<(usize, usize)>,
}

impl Route {
    /// Builds a route from explicit pads, validating adjacency.
    pub fn from_places(grid: &Grid, places: Vec<PlaceId>) -> Result<Self> {
        if places.is_empty() {
            return Err(Error::InvariantViolation("route has no pads".into()));
        }
        let coords = places
            .iter()
            .map(|at| grid.coords(*at))
            .collect::<Result<Vec<_>>>()?;
        for pair in coords.windows(2) {
            Direction::between(pair[0], pair[1])?;
        }
        Ok(Self { places, coords })
    }

    pub fn places(&self) -> &[PlaceId] {
        &self.places
    }

    /// `(row, col)` of every pad, in route order.
    pub fn coords(&self) -> &[(usize, usize)] {
        &self.coords
    }

    pub fn origin(&self) -> PlaceId {
        self.places[0]
    }

    pub fn destination(&self) -> PlaceId {
        self.places[self.places.len() - 1]
    }

    /// Number of pads, including the origin.
    pub fn len(&self) -> usize {
        self.places.len()
    }

    /// Always `false`; a route holds at least its origin.
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.places.len() - 1
    }

    /// `(from, to)` of hop `index`.
    pub fn hop(&self, index: usize) -> Option<(PlaceId, PlaceId)> {
        Some((*self.places.get(index)?, *self.places.get(index + 1)?))
    }
}

fn walk(pos: &mut (usize, usize), target: usize, horizontal: bool, out: &mut Vec<(usize, usize)>) {
    loop {
        let axis = if horizontal { &mut pos.1 } else { &mut pos.0 };
        if *axis == target {
            break;
        }
        if *axis < target {
            *axis += 1;
        } else {
            *axis -= 1;
        }
        out.push(*pos);
    }
}

/// L-shaped route from `from` to `to`, travelling along columns first if `horizontal_first`,
/// along rows first otherwise. Grows `grid` to cover both endpoints.
pub fn path_axis_first(
    grid: &mut Grid,
    from: PlaceId,
    to: PlaceId,
    horizontal_first: bool,
) -> Result<Route> {
    let start = grid.coords(from)?;
    let (tr, tc) = grid.coords(to)?;
    grid.grow_to(start.0.max(tr) + 1, start.1.max(tc) + 1);

    let mut pos = start;
    let mut coords = vec![start];
    if horizontal_first {
        walk(&mut pos, tc, true, &mut coords);
        walk(&mut pos, tr, false, &mut coords);
    } else {
        walk(&mut pos, tr, false, &mut coords);
        walk(&mut pos, tc, true, &mut coords);
    }

    let places = coords
        .iter()
        .map(|&(r, c)| grid.ensure(r, c))
        .collect();
    Ok(Route { places, coords })
}

/// [`path_axis_first`] travelling horizontally first.
pub fn path_horizontal_first(grid: &mut Grid, from: PlaceId, to: PlaceId) -> Result<Route> {
    path_axis_first(grid, from, to, true)
}

/// [`path_axis_first`] travelling vertically first.
pub fn path_vertical_first(grid: &mut Grid, from: PlaceId, to: PlaceId) -> Result<Route> {
    path_axis_first(grid, from, to, false)
}
